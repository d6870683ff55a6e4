use crate::{
    backend::{AccessReview, AuthorizationBackend, BackendConnector, CurrentUser, ResourceAction},
    config::ClusterConfig,
    constants::AUTHORIZATION_API_VERSION,
    credential::Credential,
    error::BackendError,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Certificate, Client, Method, RequestBuilder, Url, redirect::Policy};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone)]
pub struct ClusterConnector {
    base_url: Url,
    client: Client,
}

impl ClusterConnector {
    pub fn new(cfg: &ClusterConfig) -> Result<Self, BackendError> {
        let host = cfg.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(BackendError::Config("cluster host is required".to_string()));
        }
        let base_url = Url::parse(host)
            .map_err(|err| BackendError::Config(format!("invalid cluster host '{host}': {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Config(format!(
                "invalid cluster host '{host}': not a base URL"
            )));
        }

        let timeout = Duration::from_millis(cfg.timeout_ms.max(250));
        let connect_timeout = timeout.min(Duration::from_secs(3));
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(15))
            .tcp_keepalive(Duration::from_secs(30))
            .redirect(Policy::none());
        if cfg.insecure {
            warn!(host, "TLS verification disabled for cluster API");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_file) = &cfg.ca_file {
            let pem = std::fs::read(ca_file).map_err(|err| {
                BackendError::Config(format!("failed to read {}: {err}", ca_file.display()))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|err| {
                BackendError::Config(format!("invalid CA bundle {}: {err}", ca_file.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|err| BackendError::Config(format!("failed to build HTTP client: {err}")))?;

        debug!(host, timeout_ms = cfg.timeout_ms, "initialized cluster connector");
        Ok(Self { base_url, client })
    }
}

impl BackendConnector for ClusterConnector {
    fn connect(
        &self,
        credential: &Credential,
    ) -> Result<Arc<dyn AuthorizationBackend>, BackendError> {
        Ok(Arc::new(ClusterClient {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            token: (!credential.is_anonymous()).then(|| credential.token().to_string()),
        }))
    }
}

#[derive(Clone)]
pub struct ClusterClient {
    base_url: Url,
    client: Client,
    token: Option<String>,
}

impl fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterClient")
            .field("base_url", &self.base_url.as_str())
            .field("anonymous", &self.token.is_none())
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessReviewRequest<'a> {
    kind: &'static str,
    api_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(flatten)]
    action: &'a ResourceAction,
}

impl ClusterClient {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Config("cluster host is not a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T>(&self, builder: RequestBuilder, endpoint: &str) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await.map_err(|err| {
            error!(endpoint, error = ?err, "cluster API call failed");
            BackendError::Transport(err.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            debug!(endpoint, "cluster API rejected credential");
            return Err(BackendError::Unauthorized);
        }
        if status == StatusCode::FORBIDDEN {
            debug!(endpoint, "cluster API forbade request");
            return Err(BackendError::Forbidden);
        }
        if !status.is_success() {
            let message = extract_error_message(response)
                .await
                .unwrap_or_else(|| "request failed".to_string());
            warn!(
                endpoint,
                status = status.as_u16(),
                message = message.as_str(),
                "cluster API returned non-success"
            );
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|err| {
            error!(endpoint, error = ?err, "cluster API returned invalid JSON payload");
            BackendError::Payload(err.to_string())
        })
    }
}

#[async_trait]
impl AuthorizationBackend for ClusterClient {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<CurrentUser, BackendError> {
        let url = self.endpoint(&["apis", "user.openshift.io", "v1", "users", "~"])?;
        let payload: Value = self
            .send(self.request(Method::GET, url), "users/~")
            .await?;
        let name = payload
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        debug!(has_name = name.is_some(), "resolved current user");
        Ok(CurrentUser { name })
    }

    #[instrument(skip(self, action), fields(verb = action.verb.as_str(), resource = action.resource.as_str()))]
    async fn local_access_review(
        &self,
        namespace: &str,
        action: &ResourceAction,
    ) -> Result<AccessReview, BackendError> {
        let url = self.endpoint(&[
            "apis",
            "authorization.openshift.io",
            "v1",
            "namespaces",
            namespace,
            "localsubjectaccessreviews",
        ])?;
        let body = AccessReviewRequest {
            kind: "LocalSubjectAccessReview",
            api_version: AUTHORIZATION_API_VERSION,
            namespace: Some(namespace),
            action,
        };
        self.send(
            self.request(Method::POST, url).json(&body),
            "localsubjectaccessreviews",
        )
        .await
    }

    #[instrument(skip(self, action), fields(verb = action.verb.as_str(), resource = action.resource.as_str()))]
    async fn cluster_access_review(
        &self,
        action: &ResourceAction,
    ) -> Result<AccessReview, BackendError> {
        let url = self.endpoint(&[
            "apis",
            "authorization.openshift.io",
            "v1",
            "subjectaccessreviews",
        ])?;
        let body = AccessReviewRequest {
            kind: "SubjectAccessReview",
            api_version: AUTHORIZATION_API_VERSION,
            namespace: None,
            action,
        };
        self.send(
            self.request(Method::POST, url).json(&body),
            "subjectaccessreviews",
        )
        .await
    }
}

async fn extract_error_message(response: reqwest::Response) -> Option<String> {
    let parsed = response.json::<Value>().await.ok()?;
    parsed
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| parsed.get("error").and_then(Value::as_str))
        .map(ToOwned::to_owned)
}
