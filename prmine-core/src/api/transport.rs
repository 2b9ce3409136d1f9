//! HTTP transport for the GraphQL endpoint.
//!
//! Failures are classified into tagged [`ApiError`] variants here, at the
//! edge, so the sync engine matches on variants instead of message text.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

/// Production GraphQL endpoint.
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Executes one GraphQL request with one credential.
///
/// An empty token means anonymous access; no Authorization header is sent.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` and return the response's `data` object.
    async fn execute(&self, request: &Value, token: &str) -> Result<Value, ApiError>;
}

/// `reqwest`-backed transport for the GitHub GraphQL API.
#[derive(Debug)]
pub struct GithubTransport {
    client: Client,
    endpoint: String,
}

impl Default for GithubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: GITHUB_GRAPHQL_URL.to_string(),
        }
    }

    /// Point the transport at a different endpoint (for testing).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl Transport for GithubTransport {
    async fn execute(&self, request: &Value, token: &str) -> Result<Value, ApiError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("User-Agent", "prmine/0.1")
            .json(request);
        if !token.is_empty() {
            req = req.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, anonymous = token.is_empty(), "GraphQL request");

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("reading response body: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::Malformed(format!("response is not JSON: {e}")))?;
        extract_data(value)
    }
}

/// Map a non-success HTTP status to a tagged error.
fn classify_status(status: u16, body: &str) -> ApiError {
    let summary = truncate(body, 200);
    match status {
        401 => ApiError::Unauthorized(summary),
        403 | 429 => {
            if body.to_lowercase().contains("rate limit") {
                ApiError::RateLimited(summary)
            } else {
                ApiError::Unauthorized(summary)
            }
        }
        _ => ApiError::Transport(format!("HTTP {status}: {summary}")),
    }
}

/// Pull the `data` object out of a GraphQL response envelope, converting
/// a non-empty `errors` array into a tagged error.
fn extract_data(mut value: Value) -> Result<Value, ApiError> {
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let rate_limited = errors.iter().any(|e| {
                e.get("type").and_then(Value::as_str) == Some("RATE_LIMITED")
                    || e.get("message")
                        .and_then(Value::as_str)
                        .is_some_and(|m| m.to_lowercase().contains("rate limit"))
            });
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            let joined = messages.join("; ");
            return if rate_limited {
                Err(ApiError::RateLimited(joined))
            } else {
                Err(ApiError::Transport(format!("GraphQL errors: {joined}")))
            };
        }
    }

    match value.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(ApiError::Malformed(
            "response has no data object".to_string(),
        )),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}…", &text[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_401_is_unauthorized() {
        let err = classify_status(401, "Bad credentials");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn status_403_with_rate_limit_text_is_rate_limited() {
        let err = classify_status(403, "API rate limit exceeded for user");
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[test]
    fn status_403_without_rate_limit_text_is_unauthorized() {
        let err = classify_status(403, "Resource not accessible by integration");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn status_500_is_transport() {
        let err = classify_status(500, "oops");
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn graphql_rate_limited_error_is_tagged() {
        let err = extract_data(json!({
            "errors": [{"type": "RATE_LIMITED", "message": "API rate limit exceeded"}]
        }))
        .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[test]
    fn graphql_other_errors_are_transport() {
        let err = extract_data(json!({
            "data": null,
            "errors": [{"message": "Field 'bogus' doesn't exist"}]
        }))
        .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn data_object_is_returned() {
        let data = extract_data(json!({"data": {"rateLimit": {"cost": 1}}})).unwrap();
        assert_eq!(data["rateLimit"]["cost"], 1);
    }

    #[test]
    fn missing_data_is_malformed() {
        let err = extract_data(json!({"message": "moved"})).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn truncate_preserves_short_text() {
        assert_eq!(truncate("short", 200), "short");
        assert!(truncate(&"x".repeat(500), 200).len() < 500);
    }
}
