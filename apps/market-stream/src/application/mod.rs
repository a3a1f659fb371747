//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the streaming core interacts with its callers and
//! with the REST side of the service.

/// Port interfaces (event handler callbacks, REST fetch).
pub mod ports;

/// Application services (event dispatch).
pub mod services;
