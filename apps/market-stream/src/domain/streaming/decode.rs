//! Per-record decode failures.

use std::fmt;

/// A record that was dropped because it did not match its tag's shape.
///
/// The rest of the frame is still delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Position of the record in its frame.
    pub index: usize,
    /// Event-type tag of the record, if it had one.
    pub tag: Option<String>,
    /// Why the record was dropped.
    pub reason: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "record {} ({tag}): {}", self.index, self.reason),
            None => write!(f, "record {}: {}", self.index, self.reason),
        }
    }
}

impl std::error::Error for DecodeError {}
