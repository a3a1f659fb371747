//! HTTP client wrapper for the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{Fetch, FetchError};
use crate::infrastructure::websocket::ApiKey;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RestError {
    /// Base URL or path could not form a URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Request failed before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// API key rejected (401 or 403).
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Error detail from the service.
        message: String,
    },

    /// Any other non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail from the service.
        message: String,
    },

    /// Response body did not match the expected type.
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<RestError> for FetchError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::InvalidUrl(msg) | RestError::Network(msg) => Self::Http(msg),
            RestError::Unauthorized { message, .. } => Self::Unauthorized(message),
            RestError::Api { status, message } => Self::Api { status, message },
            RestError::JsonParse(msg) => Self::JsonParse(msg),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// REST client with bearer-token auth.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl RestClient {
    /// Create a client with [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s) or the HTTP client
    /// cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Result<Self, RestError> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s) or the HTTP client
    /// cannot be built.
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed =
            reqwest::Url::parse(&base_url).map_err(|e| RestError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RestError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query `params` and decode the body as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, non-success status, or a
    /// body that does not decode as `T`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, RestError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        tracing::debug!(url = %url, params = params.len(), "REST request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .query(params)
            .send()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            tracing::warn!(status = status.as_u16(), message = %message, "REST request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RestError::Unauthorized {
                    status: status.as_u16(),
                    message,
                },
                _ => RestError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| RestError::JsonParse(e.to_string()))
    }
}

#[async_trait]
impl Fetch for RestClient {
    async fn fetch_value(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError> {
        Ok(self.fetch(path, params).await?)
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn key() -> ApiKey {
        ApiKey::new("key").unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = RestClient::new("https://api.example.com/", key()).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test_case("not a url" ; "garbage")]
    #[test_case("wss://api.example.com" ; "websocket scheme")]
    fn invalid_base_url(url: &str) {
        assert!(matches!(
            RestClient::new(url, key()),
            Err(RestError::InvalidUrl(_))
        ));
    }

    #[test_case(r#"{"status":"ERROR","error":"Unknown API Key"}"#, "Unknown API Key" ; "error field")]
    #[test_case(r#"{"message":"Not found"}"#, "Not found" ; "message field")]
    #[test_case("plain text", "plain text" ; "plain body")]
    #[test_case("", "Bad Gateway" ; "empty body")]
    fn error_message_extraction(body: &str, expected: &str) {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, body), expected);
    }

    #[test]
    fn rest_error_maps_to_fetch_error() {
        let err: FetchError = RestError::Unauthorized {
            status: 401,
            message: "bad key".to_string(),
        }
        .into();
        assert!(matches!(err, FetchError::Unauthorized(m) if m == "bad key"));

        let err: FetchError = RestError::Api {
            status: 404,
            message: "missing".to_string(),
        }
        .into();
        assert!(matches!(err, FetchError::Api { status: 404, .. }));
    }
}
