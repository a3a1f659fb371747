//! Outbound Control Messages
//!
//! Client-to-server messages. Every control message has the same shape:
//!
//! ```json
//! {"action": "auth", "params": "<api key>"}
//! {"action": "subscribe", "params": "T.AAPL,Q.MSFT"}
//! ```

use serde::Serialize;

/// A client action with its params string.
#[derive(Clone, Serialize)]
pub struct ActionRequest {
    /// Action name.
    pub action: &'static str,

    /// Action parameters.
    pub params: String,
}

impl ActionRequest {
    /// Authenticate with an API key.
    #[must_use]
    pub fn auth(api_key: impl Into<String>) -> Self {
        Self {
            action: "auth",
            params: api_key.into(),
        }
    }

    /// Subscribe to a comma-joined topic list.
    #[must_use]
    pub fn subscribe(params: impl Into<String>) -> Self {
        Self {
            action: "subscribe",
            params: params.into(),
        }
    }
}

impl std::fmt::Debug for ActionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = if self.action == "auth" {
            "[REDACTED]"
        } else {
            self.params.as_str()
        };
        f.debug_struct("ActionRequest")
            .field("action", &self.action)
            .field("params", &params)
            .finish()
    }
}
