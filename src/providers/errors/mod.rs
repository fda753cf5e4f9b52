use crate::errors::MaturationError;
use crate::providers::base::DeliveryError;
use crate::utils::http::{MAX_ERROR_BODY_BYTES, limited_text};
use crate::utils::truncate_chars;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::warn;

/// Longest error body kept inside a typed error message.
const ERROR_SNIPPET_CHARS: usize = 300;

/// Shared HTTP error classification for provider and content clients.
pub struct ProviderErrorHandler;

impl ProviderErrorHandler {
    /// Build a typed error from a non-success status and its body.
    pub fn parse_api_error(status: u16, error_text: &str) -> MaturationError {
        let retryable = matches!(status, 500 | 502 | 503 | 504);

        // OpenAI-style `{"error": {"type", "message"}}` or flat `{"message"}`
        if let Ok(error_json) = serde_json::from_str::<Value>(error_text) {
            let err = error_json.get("error").unwrap_or(&error_json);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| err.as_str());
            if let Some(message) = message {
                let error_type = err.get("type").and_then(Value::as_str).unwrap_or("api");
                return MaturationError::Provider {
                    message: format!("API error ({}): {}", error_type, message),
                    retryable,
                };
            }
        }

        MaturationError::Provider {
            message: format!(
                "API error ({}): {}",
                status,
                truncate_chars(error_text, ERROR_SNIPPET_CHARS)
            ),
            retryable,
        }
    }

    pub fn rate_limit(provider: &str, retry_after: Option<u64>) -> MaturationError {
        if let Some(seconds) = retry_after {
            warn!("{} rate limit hit, retry after {} seconds", provider, seconds);
        } else {
            warn!("{} rate limit hit", provider);
        }
        MaturationError::RateLimit { retry_after }
    }

    pub fn auth_error(provider: &str, status: u16, error_text: &str) -> MaturationError {
        warn!(
            "{} authentication error (status: {}): {}",
            provider, status, error_text
        );
        MaturationError::Auth(format!(
            "{} rejected the API key. Error: {}",
            provider,
            truncate_chars(error_text, ERROR_SNIPPET_CHARS)
        ))
    }

    /// Return the response unchanged on success, or consume it into a typed error.
    pub async fn check_http_status(
        resp: Response,
        provider: &str,
        operation: &str,
    ) -> Result<Response, MaturationError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let error_text = limited_text(resp, MAX_ERROR_BODY_BYTES)
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Self::rate_limit(provider, retry_after));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Self::auth_error(provider, status.as_u16(), &error_text));
        }

        warn!(
            "{} {} failed with HTTP {}",
            provider,
            operation,
            status.as_u16()
        );
        Err(Self::parse_api_error(status.as_u16(), &error_text))
    }

    /// Turn a non-success send response into a delivery error.
    pub async fn rejection(resp: Response) -> DeliveryError {
        let status = resp.status().as_u16();
        let body = limited_text(resp, MAX_ERROR_BODY_BYTES)
            .await
            .unwrap_or_default();
        DeliveryError::Rejected {
            status,
            body: truncate_chars(body.trim(), ERROR_SNIPPET_CHARS),
        }
    }
}
