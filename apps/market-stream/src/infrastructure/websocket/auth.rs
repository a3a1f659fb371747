//! Stream Authentication
//!
//! The service expects an auth message as the first client frame and answers
//! with a `status` record.
//!
//! # Authentication Flow
//!
//! 1. Connect to `<base>/<asset class>`
//! 2. Send `{"action":"auth","params":"<api key>"}`
//! 3. Receive `[{"ev":"status","status":"connected",...}]` (may arrive first)
//! 4. Receive `[{"ev":"status","status":"auth_success",...}]` or
//!    `[{"ev":"status","status":"auth_failed",...}]`
//!
//! A rejected key is fatal: retrying with the same key cannot succeed.

use std::time::Duration;

use thiserror::Error;

use crate::domain::streaming::StatusMessage;

// =============================================================================
// Constants
// =============================================================================

/// Default time to wait for the auth acknowledgement.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// API Key
// =============================================================================

/// API key with redacted `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingKey`] if the key is empty after trimming.
    pub fn new(key: impl Into<String>) -> Result<Self, AuthError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(AuthError::MissingKey);
        }
        Ok(Self(key))
    }

    /// The raw key, for the auth message and the REST bearer header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No key configured.
    #[error("API key is empty")]
    MissingKey,

    /// Service rejected the key.
    #[error("server rejected API key ({status}): {message}")]
    Rejected {
        /// Status code from the service.
        status: String,
        /// Detail from the service.
        message: String,
    },
}

// =============================================================================
// Authentication State
// =============================================================================

/// Progress of the handshake on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Auth message sent, nothing heard yet.
    #[default]
    Pending,
    /// Service greeted the connection; still waiting for the verdict.
    Connected,
    /// Key accepted.
    Authenticated,
}

/// Tracks status records until the service accepts or rejects the key.
#[derive(Debug, Default)]
pub struct AuthHandler {
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler in [`AuthState::Pending`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handshake state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Whether the key has been accepted.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Feed one status record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the status reports an auth failure.
    pub fn on_status(&mut self, status: &StatusMessage) -> Result<AuthState, AuthError> {
        if status.is_auth_failure() {
            return Err(AuthError::Rejected {
                status: status.status.clone(),
                message: status.message.clone(),
            });
        }

        if status.is_auth_success() {
            self.state = AuthState::Authenticated;
        } else if status.status == "connected" && self.state == AuthState::Pending {
            self.state = AuthState::Connected;
        }

        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: &str, message: &str) -> StatusMessage {
        StatusMessage {
            status: status.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn api_key_rejects_blank() {
        assert_eq!(ApiKey::new("   "), Err(AuthError::MissingKey));
        assert_eq!(ApiKey::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super_secret").unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("super_secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn connected_then_success() {
        let mut handler = AuthHandler::new();
        assert_eq!(handler.state(), AuthState::Pending);

        let state = handler.on_status(&status("connected", "Connected Successfully")).unwrap();
        assert_eq!(state, AuthState::Connected);
        assert!(!handler.is_authenticated());

        let state = handler.on_status(&status("auth_success", "authenticated")).unwrap();
        assert_eq!(state, AuthState::Authenticated);
        assert!(handler.is_authenticated());
    }

    #[test]
    fn success_without_greeting() {
        let mut handler = AuthHandler::new();
        handler.on_status(&status("auth_success", "authenticated")).unwrap();
        assert!(handler.is_authenticated());
    }

    #[test]
    fn failure_is_rejected() {
        let mut handler = AuthHandler::new();
        let err = handler
            .on_status(&status("auth_failed", "authentication failed"))
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::Rejected {
                status: "auth_failed".to_string(),
                message: "authentication failed".to_string(),
            }
        );
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn unrelated_status_keeps_state() {
        let mut handler = AuthHandler::new();
        let state = handler.on_status(&status("success", "subscribed to: T.AAPL")).unwrap();
        assert_eq!(state, AuthState::Pending);
    }
}
