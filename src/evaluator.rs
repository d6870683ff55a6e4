use crate::{
    access::{Check, RepositoryIdentity, Verb},
    backend::{AccessReview, AuthorizationBackend, ResourceAction},
    constants::{DELETE_VERB, IMAGES_RESOURCE, LAYERS_RESOURCE},
    error::{AuthError, BackendError},
};
use tracing::{debug, error, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { reason: String },
    Failed(AuthError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied { .. } => Err(AuthError::AccessDenied),
            Self::Failed(error) => Err(error),
        }
    }

    fn from_review(result: Result<AccessReview, BackendError>) -> Self {
        match result {
            Ok(review) if review.allowed => Self::Allowed,
            Ok(review) => {
                error!(reason = review.reason.as_str(), "cluster access denied");
                Self::Denied {
                    reason: review.reason,
                }
            }
            Err(err) => Self::Failed(classify(err)),
        }
    }
}

fn classify(err: BackendError) -> AuthError {
    error!(error = %err, "cluster client error");
    if err.is_rejection() {
        AuthError::AccessDenied
    } else {
        AuthError::Backend(err)
    }
}

pub async fn evaluate(backend: &dyn AuthorizationBackend, check: &Check, group: &str) -> Decision {
    match check.repository() {
        Some(identity) => evaluate_repository(backend, identity, check.verb(), group).await,
        None => evaluate_prune(backend, group).await,
    }
}

#[instrument(skip(backend, identity), fields(repository = %identity, verb = verb.as_str()))]
pub async fn evaluate_repository(
    backend: &dyn AuthorizationBackend,
    identity: &RepositoryIdentity,
    verb: Verb,
    group: &str,
) -> Decision {
    let action = ResourceAction {
        verb: verb.as_str().to_string(),
        group: group.to_string(),
        resource: LAYERS_RESOURCE.to_string(),
        resource_name: Some(identity.name.clone()),
    };
    let decision =
        Decision::from_review(backend.local_access_review(&identity.namespace, &action).await);
    debug!(allowed = decision.is_allowed(), "repository access evaluated");
    decision
}

#[instrument(skip(backend))]
pub async fn evaluate_prune(backend: &dyn AuthorizationBackend, group: &str) -> Decision {
    let action = ResourceAction {
        verb: DELETE_VERB.to_string(),
        group: group.to_string(),
        resource: IMAGES_RESOURCE.to_string(),
        resource_name: None,
    };
    let decision = Decision::from_review(backend.cluster_access_review(&action).await);
    debug!(allowed = decision.is_allowed(), "prune access evaluated");
    decision
}

#[instrument(skip(backend))]
pub async fn verify_current_user(backend: &dyn AuthorizationBackend) -> Result<(), AuthError> {
    match backend.current_user().await {
        Ok(user) => {
            debug!(user = user.name.as_deref().unwrap_or("<unknown>"), "current user verified");
            Ok(())
        }
        Err(err) => Err(classify(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Decision, evaluate, verify_current_user};
    use crate::{
        access::{Check, RepositoryIdentity},
        backend::{AccessReview, AuthorizationBackend, CurrentUser, ResourceAction},
        error::{AuthError, BackendError},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct RecordingBackend {
        outcome: Result<AccessReview, BackendError>,
        requests: Mutex<Vec<(Option<String>, ResourceAction)>>,
    }

    impl RecordingBackend {
        fn new(outcome: Result<AccessReview, BackendError>) -> Self {
            Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(Option<String>, ResourceAction)> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl AuthorizationBackend for RecordingBackend {
        async fn current_user(&self) -> Result<CurrentUser, BackendError> {
            self.outcome.clone().map(|_| CurrentUser {
                name: Some("alice".to_string()),
            })
        }

        async fn local_access_review(
            &self,
            namespace: &str,
            action: &ResourceAction,
        ) -> Result<AccessReview, BackendError> {
            self.requests
                .lock()
                .expect("lock")
                .push((Some(namespace.to_string()), action.clone()));
            self.outcome.clone()
        }

        async fn cluster_access_review(
            &self,
            action: &ResourceAction,
        ) -> Result<AccessReview, BackendError> {
            self.requests
                .lock()
                .expect("lock")
                .push((None, action.clone()));
            self.outcome.clone()
        }
    }

    fn identity() -> RepositoryIdentity {
        RepositoryIdentity::parse("myns/app").expect("identity")
    }

    #[tokio::test]
    async fn push_queries_namespaced_layers_update() {
        let backend = RecordingBackend::new(Ok(AccessReview::allowed()));
        let decision = evaluate(&backend, &Check::Push(identity()), "image.openshift.io").await;
        assert_eq!(decision, Decision::Allowed);
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let (namespace, action) = &requests[0];
        assert_eq!(namespace.as_deref(), Some("myns"));
        assert_eq!(action.verb, "update");
        assert_eq!(action.resource, "imagestreams/layers");
        assert_eq!(action.resource_name.as_deref(), Some("app"));
        assert_eq!(action.group, "image.openshift.io");
    }

    #[tokio::test]
    async fn prune_queries_cluster_scoped_image_delete() {
        let backend = RecordingBackend::new(Ok(AccessReview::allowed()));
        evaluate(&backend, &Check::Prune, "image.openshift.io").await;
        let requests = backend.requests();
        let (namespace, action) = &requests[0];
        assert_eq!(namespace, &None);
        assert_eq!(action.verb, "delete");
        assert_eq!(action.resource, "images");
        assert_eq!(action.resource_name, None);
    }

    #[tokio::test]
    async fn denial_keeps_reason_and_maps_to_access_denied() {
        let backend = RecordingBackend::new(Ok(AccessReview::denied("no rolebinding")));
        let decision = evaluate(&backend, &Check::Pull(identity()), "").await;
        assert_eq!(
            decision,
            Decision::Denied {
                reason: "no rolebinding".to_string()
            }
        );
        assert_eq!(decision.into_result(), Err(AuthError::AccessDenied));
    }

    #[tokio::test]
    async fn forbidden_transport_error_is_a_denial() {
        let backend = RecordingBackend::new(Err(BackendError::Forbidden));
        let decision = evaluate(&backend, &Check::Pull(identity()), "").await;
        assert_eq!(decision, Decision::Failed(AuthError::AccessDenied));
    }

    #[tokio::test]
    async fn other_transport_errors_propagate() {
        let unreachable = BackendError::Transport("connection refused".to_string());
        let backend = RecordingBackend::new(Err(unreachable.clone()));
        let decision = evaluate(&backend, &Check::Prune, "").await;
        assert_eq!(decision, Decision::Failed(AuthError::Backend(unreachable)));
    }

    #[tokio::test]
    async fn current_user_rejection_is_access_denied() {
        let backend = RecordingBackend::new(Err(BackendError::Unauthorized));
        assert_eq!(
            verify_current_user(&backend).await,
            Err(AuthError::AccessDenied)
        );
        let backend = RecordingBackend::new(Ok(AccessReview::allowed()));
        assert_eq!(verify_current_user(&backend).await, Ok(()));
    }
}
