use crate::{
    config::Config,
    error::{AuthError, json_error_response},
};
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic {
        realm: String,
        error: AuthError,
    },
    Bearer {
        realm: String,
        service: Option<String>,
        error: AuthError,
    },
}

impl Challenge {
    pub fn error(&self) -> &AuthError {
        match self {
            Self::Basic { error, .. } | Self::Bearer { error, .. } => error,
        }
    }

    pub fn realm(&self) -> &str {
        match self {
            Self::Basic { realm, .. } | Self::Bearer { realm, .. } => realm,
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            Self::Basic { realm, error } => {
                format!("Basic realm={},error={}", quote(realm), quote(&error.to_string()))
            }
            Self::Bearer { realm, service, .. } => {
                let mut value = format!("Bearer realm={}", quote(realm));
                if let Some(service) = service.as_deref().filter(|s| !s.is_empty()) {
                    value.push_str(&format!(",service={}", quote(service)));
                }
                value
            }
        }
    }

    pub fn set_headers(&self, headers: &mut HeaderMap) {
        match HeaderValue::from_str(&self.header_value()) {
            Ok(value) => {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
            Err(err) => {
                warn!(realm = self.realm(), error = %err, "challenge is not a valid header value");
            }
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error().fmt(f)
    }
}

impl std::error::Error for Challenge {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error())
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error(transparent)]
    Challenge(Challenge),
    #[error(transparent)]
    Error(AuthError),
}

impl AuthFailure {
    pub fn error(&self) -> &AuthError {
        match self {
            Self::Challenge(challenge) => challenge.error(),
            Self::Error(error) => error,
        }
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        match self {
            Self::Challenge(challenge) => Some(challenge),
            Self::Error(_) => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Challenge(_) => StatusCode::UNAUTHORIZED,
            Self::Error(error) => error.status(),
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let mut response = json_error_response(self.status(), &self.to_string());
        if let Some(challenge) = self.challenge() {
            challenge.set_headers(response.headers_mut());
        }
        response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMapper {
    realm: String,
    token_realm: Option<String>,
    token_service: Option<String>,
}

impl ChallengeMapper {
    pub fn new(
        realm: impl Into<String>,
        token_realm: Option<String>,
        token_service: Option<String>,
    ) -> Self {
        Self {
            realm: realm.into(),
            token_realm: token_realm.filter(|value| !value.is_empty()),
            token_service: token_service.filter(|value| !value.is_empty()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.realm.clone(),
            config.token_realm.clone(),
            config.token_service.clone(),
        )
    }

    pub fn wrap(&self, error: AuthError) -> AuthFailure {
        match error {
            AuthError::CredentialRequired => match &self.token_realm {
                // Send token-aware clients to the token endpoint when one is configured.
                Some(token_realm) => AuthFailure::Challenge(Challenge::Bearer {
                    realm: token_realm.clone(),
                    service: self.token_service.clone(),
                    error,
                }),
                None => self.basic(error),
            },
            AuthError::CredentialInvalid | AuthError::AccessDenied => self.basic(error),
            AuthError::NamespaceRequired
            | AuthError::UnsupportedAction
            | AuthError::UnsupportedResource
            | AuthError::InvalidScope(_)
            | AuthError::Backend(_) => AuthFailure::Error(error),
        }
    }

    fn basic(&self, error: AuthError) -> AuthFailure {
        AuthFailure::Challenge(Challenge::Basic {
            realm: self.realm.clone(),
            error,
        })
    }
}
