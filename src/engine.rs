use crate::{
    access::{AccessRecord, Check},
    backend::{AuthorizationBackend, BackendConnector},
    challenge::{AuthFailure, ChallengeMapper},
    cluster::ClusterConnector,
    config::Config,
    credential::credential_from_headers,
    error::{AuthError, BackendError},
    evaluator::{evaluate, verify_current_user},
    ledger::{DeferredErrors, PushChecks},
};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct AuthorizedContext {
    pub backend: Arc<dyn AuthorizationBackend>,
    pub auth_performed: bool,
    pub push_checks: PushChecks,
    pub deferred: DeferredErrors,
}

pub struct AccessController {
    mapper: ChallengeMapper,
    connector: Arc<dyn BackendConnector>,
    api_group: String,
}

impl AccessController {
    pub fn new(
        mapper: ChallengeMapper,
        connector: Arc<dyn BackendConnector>,
        api_group: impl Into<String>,
    ) -> Self {
        Self {
            mapper,
            connector,
            api_group: api_group.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let connector = ClusterConnector::new(&config.cluster)?;
        debug!(
            realm = config.realm.as_str(),
            token_realm = config.token_realm.as_deref().unwrap_or("<none>"),
            api_group = config.api_group.as_str(),
            "initialized access controller"
        );
        Ok(Self::new(
            ChallengeMapper::from_config(config),
            Arc::new(connector),
            config.api_group.clone(),
        ))
    }

    pub fn mapper(&self) -> &ChallengeMapper {
        &self.mapper
    }

    /// An empty `records` slice only checks that the credential resolves to a user.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn authorized(
        &self,
        headers: &HeaderMap,
        records: &[AccessRecord],
    ) -> Result<AuthorizedContext, AuthFailure> {
        let credential = credential_from_headers(headers).map_err(|err| self.mapper.wrap(err))?;
        let backend = self
            .connector
            .connect(&credential)
            .map_err(|err| self.mapper.wrap(err.into()))?;

        if records.is_empty() {
            verify_current_user(backend.as_ref())
                .await
                .map_err(|err| self.mapper.wrap(err))?;
            return Ok(AuthorizedContext {
                backend,
                auth_performed: true,
                push_checks: PushChecks::default(),
                deferred: DeferredErrors::default(),
            });
        }

        let mut push_checks = PushChecks::default();
        let mut deferred = DeferredErrors::default();
        let mut verified_prune = false;

        for record in records {
            debug!(record = %record, "checking access");
            let check = Check::resolve(record).map_err(|err| self.mapper.wrap(err))?;

            match &check {
                Check::Prune if verified_prune => continue,
                Check::Prune => {
                    evaluate(backend.as_ref(), &check, &self.api_group)
                        .await
                        .into_result()
                        .map_err(|err| self.mapper.wrap(err))?;
                    verified_prune = true;
                }
                Check::Push(identity) => {
                    evaluate(backend.as_ref(), &check, &self.api_group)
                        .await
                        .into_result()
                        .map_err(|err| self.mapper.wrap(err))?;
                    push_checks.record(identity);
                }
                Check::Pull(identity) => {
                    match evaluate(backend.as_ref(), &check, &self.api_group)
                        .await
                        .into_result()
                    {
                        Ok(()) => {}
                        // An unreachable backend is never explained by a mount.
                        Err(err @ AuthError::Backend(_)) => return Err(self.mapper.wrap(err)),
                        // Might be the pull half of a cross-repository mount; decide later.
                        Err(err) => {
                            debug!(repository = %identity, error = %err, "deferring pull failure");
                            deferred.add(identity, self.mapper.wrap(err));
                        }
                    }
                }
            }
        }

        let deferred = deferred.reconcile(&push_checks).inspect_err(|failure| {
            warn!(error = %failure, "pull failure not explained by a cross-repository mount");
        })?;
        if !deferred.is_empty() {
            debug!(
                deferred = ?deferred.iter().map(|(key, _)| key).collect::<Vec<_>>(),
                "keeping deferred pull failures"
            );
        }

        Ok(AuthorizedContext {
            backend,
            auth_performed: true,
            push_checks,
            deferred,
        })
    }
}
