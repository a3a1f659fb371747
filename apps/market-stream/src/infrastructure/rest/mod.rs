//! REST Client
//!
//! Authenticated GET requests against the market-data REST API.

mod client;

pub use client::{DEFAULT_TIMEOUT, RestClient, RestError};
