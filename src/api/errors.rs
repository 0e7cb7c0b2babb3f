//! API error types for the match/tournament REST client.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("HTTP error: {status_code} - {message}")]
    Http { status_code: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (retry after {retry_after}s)")]
    RateLimited { retry_after: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Created record has no id")]
    MissingId,

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl ApiError {
    /// Build an error from a non-success response body. The collaborator
    /// reports validation failures as `{"detail": ...}`.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get("detail").cloned())
            .map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| body.to_string());

        match status_code {
            404 => Self::NotFound(message),
            429 => Self::RateLimited { retry_after: 1 },
            _ => Self::Http {
                status_code,
                message,
            },
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::Http {
                    status_code: 500..=599,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_uses_detail() {
        let err = ApiError::from_response(422, r#"{"detail":"team1 is required"}"#);
        match err {
            ApiError::Http {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 422);
                assert_eq!(message, "team1 is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_structured_detail_and_plain_body() {
        let err = ApiError::from_response(422, r#"{"detail":[{"loc":["body","date"]}]}"#);
        assert!(err.to_string().contains("loc"));

        let err = ApiError::from_response(404, "no such match");
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "no such match"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::from_response(503, "").is_retryable());
        assert!(!ApiError::from_response(400, "").is_retryable());
        assert!(!ApiError::MissingId.is_retryable());
    }
}
