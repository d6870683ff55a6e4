use crate::{constants::ANONYMOUS_TOKEN, error::AuthError};
use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use std::fmt;

/// The empty credential is the anonymous caller, distinct from a missing header.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("Credential(<anonymous>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

pub fn credential_from_headers(headers: &HeaderMap) -> Result<Credential, AuthError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    extract_credential(raw)
}

pub fn extract_credential(header: Option<&str>) -> Result<Credential, AuthError> {
    let Some((scheme, value)) = header.and_then(|raw| raw.split_once(' ')) else {
        return Err(AuthError::CredentialRequired);
    };

    match scheme.to_ascii_lowercase().as_str() {
        // Either a cluster API token or one minted by the registry token endpoint.
        "bearer" if value == ANONYMOUS_TOKEN => Ok(Credential::anonymous()),
        "bearer" => Ok(Credential::new(value)),
        "basic" => basic_password(value).map(Credential::new),
        _ => Err(AuthError::CredentialRequired),
    }
}

fn basic_password(encoded: &str) -> Result<String, AuthError> {
    let decoded = B64
        .decode(encoded)
        .map_err(|_| AuthError::CredentialInvalid)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::CredentialInvalid)?;
    match decoded.split_once(':') {
        Some((_, password)) if !password.is_empty() => Ok(password.to_string()),
        _ => Err(AuthError::CredentialInvalid),
    }
}
