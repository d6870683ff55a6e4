use crate::{
    app::{AppState, build_router},
    config::Config,
    engine::AccessController,
    error::RuntimeError,
    observability,
};
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(config))]
pub fn build_state(config: &Config) -> Result<AppState, RuntimeError> {
    let controller = AccessController::from_config(config)?;
    Ok(AppState {
        controller: Arc::new(controller),
    })
}

pub async fn run(config: Config) -> Result<(), RuntimeError> {
    let bind = config.bind;
    let state = build_state(&config)?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!(
        bind = %bind,
        realm = config.realm.as_str(),
        cluster_host = config.cluster.host.as_str(),
        "imagegate listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub async fn run_standalone(config: Config) -> Result<(), RuntimeError> {
    let tracing_settings = observability::init_from_env(startup_log_level(&config));
    tracing::debug!(
        log_filter = tracing_settings.filter,
        log_format = tracing_settings.log_format.as_str(),
        installed = tracing_settings.installed,
        "initialized tracing subscriber"
    );
    run(config).await
}

fn startup_log_level(config: &Config) -> &str {
    config.log_level.as_str()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                let _ = sigterm.recv().await;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
