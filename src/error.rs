use axum::{
    Json,
    body::Body,
    http::StatusCode,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("authorization backend returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("authorization backend unavailable: {0}")]
    Transport(String),
    #[error("authorization backend returned an invalid payload: {0}")]
    Payload(String),
    #[error("invalid authorization backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header required")]
    CredentialRequired,
    #[error("failed to decode credentials")]
    CredentialInvalid,
    #[error("access denied")]
    AccessDenied,
    #[error("repository namespace required")]
    NamespaceRequired,
    #[error("unsupported action")]
    UnsupportedAction,
    #[error("unsupported resource")]
    UnsupportedResource,
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::CredentialRequired | Self::CredentialInvalid | Self::AccessDenied => {
                StatusCode::UNAUTHORIZED
            }
            Self::NamespaceRequired
            | Self::UnsupportedAction
            | Self::UnsupportedResource
            | Self::InvalidScope(_) => StatusCode::BAD_REQUEST,
            Self::Backend(BackendError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid runtime configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub(crate) fn json_error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::to_vec(&ErrorBody { error: message })
        .unwrap_or_else(|_| b"{\"error\":\"unknown error\"}".to_vec());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, crate::constants::HEADER_JSON)
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            let fallback = Json(ErrorBody {
                error: "unknown error",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, fallback).into_response()
        })
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        json_error_response(self.status(), &self.to_string())
    }
}
