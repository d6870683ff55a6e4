use crate::{
    access::AccessRecord,
    app::AppState,
    challenge::AuthFailure,
    engine::AuthorizedContext,
    error::AuthError,
};
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DeferredEntry {
    pub repository: String,
    pub error: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AuthorizeResponse {
    pub authorized: bool,
    pub pushes: Vec<String>,
    pub deferred: Vec<DeferredEntry>,
}

impl From<&AuthorizedContext> for AuthorizeResponse {
    fn from(context: &AuthorizedContext) -> Self {
        Self {
            authorized: context.auth_performed,
            pushes: context.push_checks.iter().map(ToOwned::to_owned).collect(),
            deferred: context
                .deferred
                .iter()
                .map(|(repository, failure)| DeferredEntry {
                    repository: repository.to_string(),
                    error: failure.to_string(),
                })
                .collect(),
        }
    }
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<AuthorizeResponse>, AuthFailure> {
    let records = records_from_params(&params).map_err(|err| state.controller.mapper().wrap(err))?;
    debug!(records = records.len(), "parsed requested scopes");
    let context = state.controller.authorized(&headers, &records).await?;
    Ok(Json(AuthorizeResponse::from(&context)))
}

fn records_from_params(params: &[(String, String)]) -> Result<Vec<AccessRecord>, AuthError> {
    let mut records = Vec::new();
    for (_, value) in params.iter().filter(|(key, _)| key == "scope") {
        for scope in value.split_whitespace() {
            records.extend(AccessRecord::parse_scope(scope)?);
        }
    }
    Ok(records)
}
