use thiserror::Error;

/// Failure vocabulary every provider client reports in.
///
/// Anything a client cannot classify as an authentication or transport problem
/// is `Other`; the error normalizer depends on this set staying closed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ProviderError {
    /// Truncate a response body to avoid carrying excessive data
    fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }

    /// Classify a non-success HTTP status returned by the provider.
    ///
    /// Only 401 means the provider rejected the session; every other failing
    /// status is treated as the provider being unavailable to us right now.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ProviderError::Authentication(format!("Status {}: {}", status, truncated)),
            429 => ProviderError::Connection("Rate limited by provider".to_string()),
            _ => ProviderError::Connection(format!("Status {}: {}", status, truncated)),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Other(format!("Invalid response: {}", err))
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status, "")
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Other(format!("Invalid response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_unauthorized_is_authentication() {
        let err = ProviderError::from_status(StatusCode::UNAUTHORIZED, "expired");
        assert!(matches!(err, ProviderError::Authentication(_)));
    }

    #[test]
    fn test_from_status_other_failures_are_connection() {
        for status in [
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
        ] {
            let err = ProviderError::from_status(status, "");
            assert!(
                matches!(err, ProviderError::Connection(_)),
                "{} should classify as a connection failure",
                status
            );
        }
    }

    #[test]
    fn test_truncate_body_keeps_short_bodies() {
        assert_eq!(ProviderError::truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ProviderError::truncate_body(&body);
        assert!(truncated.starts_with(&"é".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated"));
    }
}
