//! HTTP utilities for AWS REST-JSON API calls

use super::error::{ApiError, ErrorKind, Operation};
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the error code on REST-JSON services
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull the error code out of an `x-amzn-ErrorType` header or a JSON error body.
///
/// The header looks like `ResourceNotFoundException:http://internal.amazon.com/...`
/// and body types may be namespaced (`com.amazonaws.eks#ResourceNotFoundException`).
pub fn parse_error_code(headers: &HeaderMap, body: &Value) -> Option<String> {
    let from_header = headers
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(':').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(code) = from_header {
        return Some(code.to_string());
    }

    ["__type", "code", "Code"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .and_then(|v| v.rsplit('#').next())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn parse_error_message(body: &Value) -> String {
    ["message", "Message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("")
        .to_string()
}

/// HTTP client wrapper for AWS API calls
#[derive(Clone)]
pub struct AwsHttpClient {
    client: Client,
}

impl AwsHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("eks-addons/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request and decode the JSON body.
    ///
    /// Non-success responses are turned into an [`ApiError`] carrying the
    /// provider error code, so callers can classify them.
    pub async fn get(&self, url: &str, operation: Operation, target: &str) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(operation, target, e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(operation, target, e.to_string()))?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let code = parse_error_code(&headers, &parsed).unwrap_or_else(|| "UnknownError".to_string());
            return Err(ApiError::new(
                operation,
                target,
                Some(status.as_u16()),
                code,
                parse_error_message(&parsed),
            ));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::network(operation, target, format!("Failed to parse response JSON: {}", e))
        })
    }
}

/// Format an error for display on the terminal.
/// Avoids echoing raw API payloads back to the user.
pub fn format_aws_error(error: &anyhow::Error) -> String {
    if let Some(api) = error.downcast_ref::<ApiError>() {
        return match api.kind() {
            ErrorKind::Authorization => format!(
                "{} denied for {}. Check your IAM permissions and credentials.",
                api.operation, api.target
            ),
            ErrorKind::Throttling => format!(
                "{} was throttled on {}. Lower --concurrency or try again later.",
                api.operation, api.target
            ),
            ErrorKind::NotFound | ErrorKind::InvalidIdentifier => {
                format!("{}: resource not found ({})", api.operation, api.target)
            }
            ErrorKind::Transient => format!(
                "{} failed on {}: service temporarily unavailable ({}).",
                api.operation, api.target, api.code
            ),
            ErrorKind::Other => format!("{} failed on {}: {}", api.operation, api.target, api.code),
        };
    }

    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
