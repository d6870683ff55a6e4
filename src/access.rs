use crate::{
    constants::{
        ACTION_PRUNE, ACTION_PULL, ACTION_PUSH, ACTION_WILDCARD, RESOURCE_ADMIN,
        RESOURCE_REPOSITORY,
    },
    error::AuthError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Repository,
    Admin,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Repository => RESOURCE_REPOSITORY,
            Self::Admin => RESOURCE_ADMIN,
            Self::Other(value) => value,
        }
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        match value {
            RESOURCE_REPOSITORY => Self::Repository,
            RESOURCE_ADMIN => Self::Admin,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub resource: Resource,
    pub action: String,
}

impl AccessRecord {
    pub fn new(
        kind: impl Into<ResourceType>,
        name: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            resource: Resource {
                kind: kind.into(),
                name: name.into(),
            },
            action: action.into(),
        }
    }

    pub fn repository(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(ResourceType::Repository, name, action)
    }

    pub fn admin(action: impl Into<String>) -> Self {
        Self::new(ResourceType::Admin, "", action)
    }

    /// The name sits between the first and the last `:` so host:port names survive.
    pub fn parse_scope(scope: &str) -> Result<Vec<Self>, AuthError> {
        let invalid = || AuthError::InvalidScope(scope.to_string());
        let (kind, rest) = scope.split_once(':').ok_or_else(invalid)?;
        let (name, actions) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if kind.is_empty() {
            return Err(invalid());
        }

        let records = actions
            .split(',')
            .map(str::trim)
            .filter(|action| !action.is_empty())
            .map(|action| Self::new(kind, name, action))
            .collect::<Vec<_>>();
        if records.is_empty() {
            return Err(invalid());
        }
        Ok(records)
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.resource.kind, self.resource.name, self.action
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryIdentity {
    pub namespace: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn parse(resource_name: &str) -> Result<Self, AuthError> {
        match resource_name.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => Ok(Self {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            _ => Err(AuthError::NamespaceRequired),
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Update,
    Get,
    Prune,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Get => "get",
            Self::Prune => "prune",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Push(RepositoryIdentity),
    Pull(RepositoryIdentity),
    Prune,
}

impl Check {
    pub fn resolve(record: &AccessRecord) -> Result<Self, AuthError> {
        match &record.resource.kind {
            ResourceType::Repository => {
                // Name errors win over action errors for repository records.
                let identity = RepositoryIdentity::parse(&record.resource.name)?;
                match record.action.as_str() {
                    ACTION_PUSH => Ok(Self::Push(identity)),
                    ACTION_PULL => Ok(Self::Pull(identity)),
                    ACTION_WILDCARD => Ok(Self::Prune),
                    _ => Err(AuthError::UnsupportedAction),
                }
            }
            ResourceType::Admin => match record.action.as_str() {
                ACTION_PRUNE => Ok(Self::Prune),
                _ => Err(AuthError::UnsupportedAction),
            },
            ResourceType::Other(_) => Err(AuthError::UnsupportedResource),
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::Push(_) => Verb::Update,
            Self::Pull(_) => Verb::Get,
            Self::Prune => Verb::Prune,
        }
    }

    pub fn repository(&self) -> Option<&RepositoryIdentity> {
        match self {
            Self::Push(identity) | Self::Pull(identity) => Some(identity),
            Self::Prune => None,
        }
    }
}
