//! HTTP trigger for verification passes.
//!
//! An external scheduler calls `POST /api/cron/verify-providers` with
//! `Authorization: Bearer <cron secret>`; the pass runs inline and the counts
//! come back in the response body. `GET /health` is unauthenticated.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::Result,
    notify::PassNotifier,
    storage::ProviderStore,
    verification::VerificationRunner,
};
use handlers::{health_handler, trigger_handler};
use rate_limit::RateLimiter;

pub const TRIGGER_PATH: &str = "/api/cron/verify-providers";

pub struct AppState<S: ProviderStore> {
    pub runner: Arc<VerificationRunner<S>>,
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub notifier: Option<PassNotifier>,
}

impl<S: ProviderStore> AppState<S> {
    pub fn new(runner: Arc<VerificationRunner<S>>, config: Config, notifier: Option<PassNotifier>) -> Arc<Self> {
        let rate_limiter = RateLimiter::new(&config.server.rate_limit);

        Arc::new(Self {
            runner,
            config,
            rate_limiter,
            notifier,
        })
    }
}

pub fn router<S: ProviderStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route(TRIGGER_PATH, post(trigger_handler::<S>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<S: ProviderStore + 'static>(state: Arc<AppState<S>>) -> Result<()> {
    if state.config.trigger.cron_secret.is_none() {
        warn!("No cron secret configured, the verification trigger is open to anyone");
    }

    let address = state.config.bind_addr()?;
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
