use crate::{api, engine::AccessController};
use axum::{Router, routing::get};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AccessController>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/v1/authorize", get(api::authorize))
        .with_state(state)
}
