//! Uniform error envelope returned to callers.
//!
//! Every failure, whether from acquiring a session, calling the provider or
//! validating input, leaves the service as one of four kinds with a fixed
//! HTTP status.

use std::future::Future;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::api::{ProviderError, ProviderResult};
use crate::auth::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    AuthenticationFailure,
    ConnectionFailure,
    ValidationFailure,
    Other,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::AuthenticationFailure => 401,
            ErrorKind::ConnectionFailure => 503,
            ErrorKind::ValidationFailure => 400,
            ErrorKind::Other => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailure => "AuthenticationFailure",
            ErrorKind::ConnectionFailure => "ConnectionFailure",
            ErrorKind::ValidationFailure => "ValidationFailure",
            ErrorKind::Other => "Other",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    pub http_status: u16,
    /// Extra context for the caller, e.g. why a login was rejected
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: kind.http_status(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailure, message)
    }

    /// JSON body: `{"error": message, "code": status, "kind": kind}`, plus
    /// `details` when set.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "error": self.message,
            "code": self.http_status,
            "kind": self.kind.as_str(),
        });
        if let (Some(details), Some(map)) = (&self.details, body.as_object_mut()) {
            map.insert("details".to_string(), json!(details));
        }
        body
    }
}

impl From<ProviderError> for ErrorEnvelope {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Authentication(_) => {
                Self::new(ErrorKind::AuthenticationFailure, "Authentication failed")
            }
            ProviderError::Connection(_) => Self::new(ErrorKind::ConnectionFailure, "Connection error"),
            ProviderError::Other(msg) => Self::new(ErrorKind::Other, msg),
        }
    }
}

/// Provider rejections and transport failures get the same fixed texts as
/// data-call failures; the token store errors are ours and name the path.
impl From<SessionError> for ErrorEnvelope {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected(_) => {
                Self::new(ErrorKind::AuthenticationFailure, "Authentication failed")
            }
            SessionError::Unreachable(_) => Self::new(ErrorKind::ConnectionFailure, "Connection error"),
            other => Self::new(other.kind(), other.to_string()),
        }
    }
}

/// Await a provider call and convert its failure into an envelope.
///
/// The detailed provider message is logged; callers only see the envelope.
pub async fn guard<T, Fut>(call: Fut) -> Result<T, ErrorEnvelope>
where
    Fut: Future<Output = ProviderResult<T>>,
{
    call.await.map_err(|e| {
        warn!(error = %e, "Provider call failed");
        ErrorEnvelope::from(e)
    })
}

#[cfg(feature = "http-response")]
mod http_response {
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;

    use super::ErrorEnvelope;

    impl IntoResponse for ErrorEnvelope {
        fn into_response(self) -> Response {
            let status =
                StatusCode::from_u16(self.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(self.body())).into_response()
        }
    }
}
