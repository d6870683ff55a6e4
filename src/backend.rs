use crate::{credential::Credential, error::BackendError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAction {
    pub verb: String,
    #[serde(rename = "resourceAPIGroup")]
    pub group: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccessReview {
    pub allowed: bool,
    #[serde(default)]
    pub reason: String,
}

impl AccessReview {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentUser {
    pub name: Option<String>,
}

#[async_trait]
pub trait AuthorizationBackend: fmt::Debug + Send + Sync {
    async fn current_user(&self) -> Result<CurrentUser, BackendError>;

    async fn local_access_review(
        &self,
        namespace: &str,
        action: &ResourceAction,
    ) -> Result<AccessReview, BackendError>;

    async fn cluster_access_review(
        &self,
        action: &ResourceAction,
    ) -> Result<AccessReview, BackendError>;
}

pub trait BackendConnector: Send + Sync {
    fn connect(&self, credential: &Credential)
    -> Result<Arc<dyn AuthorizationBackend>, BackendError>;
}
