//! Application Services
//!
//! - `dispatcher`: routes decoded events to the caller's [`EventHandler`]
//!
//! [`EventHandler`]: crate::application::ports::EventHandler

mod dispatcher;

pub use dispatcher::{dispatch, dispatch_decode_error};
