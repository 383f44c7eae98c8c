//! HTTP data source for the dashboard REST backend.
//!
//! Every list resource is a `GET {base}/api/{path}` with the filters encoded
//! as query parameters (see [`FilterSet::query_params`]). The body is either
//! a bare JSON array or an envelope object holding the array under `data`,
//! `results`, or `items`.
//!
//! # Example
//!
//! ```no_run
//! use wattboard_core::{DataSource, HttpSource};
//! use wattboard_types::{FilterSet, MeterReading, ResourceKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = HttpSource::new("https://energy.example.org")?.with_token("secret");
//!
//! let rows: Vec<MeterReading> = source
//!     .fetch_list(
//!         ResourceKind::MeterIndicators,
//!         &FilterSet::new().with_institution("42"),
//!     )
//!     .await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use wattboard_types::{FilterSet, ResourceKind};

use crate::error::{Error, Result};
use crate::traits::DataSource;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Envelope keys checked, in order, for the row array.
const ENVELOPE_KEYS: [&str; 3] = ["data", "results", "items"];

/// [`DataSource`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::invalid_config(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }
    Ok(base_url)
}

impl HttpSource {
    /// Create a source for the backend at `base_url`
    /// (e.g. `"https://energy.example.org"`).
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a source with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::invalid_config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            token: None,
            timeout,
        })
    }

    /// Create a source with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Send `token` as a bearer credential with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the list endpoint for `kind`.
    pub fn endpoint(&self, kind: ResourceKind) -> String {
        format!("{}/api/{}", self.base_url, kind.path())
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::transport(url, err.to_string())
        }
    }

    async fn handle_response(&self, url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| Error::Decode(e.to_string()));
        }
        let body = response.json::<Value>().await.ok();
        let message = body
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| status.to_string());
        debug!("{} answered {}: {}", url, status, message);
        Err(Error::from_status(status.as_u16(), message))
    }
}

/// Pull the row array out of a response body.
fn extract_rows(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(rows)) = map.remove(key) {
                    return Ok(rows);
                }
            }
            Err(Error::Decode(format!(
                "expected an array or an object with one of {:?}",
                ENVELOPE_KEYS
            )))
        }
        Value::Null => Ok(Vec::new()),
        other => Err(Error::Decode(format!(
            "expected an array, got {}",
            json_type(&other)
        ))),
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "detail"]
        .iter()
        .find_map(|k| body.get(k).and_then(Value::as_str))
        .map(String::from)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch_list<T>(&self, kind: ResourceKind, filters: &FilterSet) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(kind);
        let mut request = self.client.get(&url).query(&filters.query_params());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!("GET {} {:?}", url, filters.query_params());
        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;
        let body = self.handle_response(&url, response).await?;
        let rows = extract_rows(body)?;
        Ok(serde_json::from_value(Value::Array(rows))?)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_creation() {
        let source = HttpSource::new("http://localhost:8080").unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_source_normalizes_url() {
        let source = HttpSource::new(" https://energy.example.org/ ").unwrap();
        assert_eq!(source.base_url(), "https://energy.example.org");
        assert_eq!(
            source.endpoint(ResourceKind::MeterIndicators),
            "https://energy.example.org/api/meters/indicators"
        );
    }

    #[test]
    fn test_source_invalid_url() {
        let result = HttpSource::new("localhost:8080");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let source = HttpSource::new("http://x").unwrap().with_token("  ");
        assert!(source.token.is_none());
    }

    #[test]
    fn test_extract_rows_shapes() {
        assert_eq!(extract_rows(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(extract_rows(json!({"data": [1]})).unwrap().len(), 1);
        assert_eq!(extract_rows(json!({"count": 2, "results": [1, 2]})).unwrap().len(), 2);
        assert!(extract_rows(Value::Null).unwrap().is_empty());
        assert!(matches!(extract_rows(json!({"data": 1})), Err(Error::Decode(_))));
        assert!(matches!(extract_rows(json!("oops")), Err(Error::Decode(_))));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(&json!({"error": "token expired"})).as_deref(),
            Some("token expired")
        );
        assert_eq!(
            error_message(&json!({"detail": "not found"})).as_deref(),
            Some("not found")
        );
        assert_eq!(error_message(&json!({"code": 3})), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let source = HttpSource::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result: Result<Vec<Value>> = source
            .fetch_list(ResourceKind::Devices, &FilterSet::new())
            .await;
        let err = result.unwrap_err();
        assert!(err.is_retryable());
    }
}
