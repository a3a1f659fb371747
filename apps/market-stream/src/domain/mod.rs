//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the core domain types for market data streaming
//! with no I/O. All types here are pure Rust with serialization support.

/// Market data events and connection state.
pub mod streaming;

/// Subscription building.
pub mod subscription;
