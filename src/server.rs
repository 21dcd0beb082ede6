//! Health and status endpoints served next to the scheduler

use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::ledger::FjallStore;
use crate::messaging::MessageProducer;
use crate::observability::{Metrics, MetricsSnapshot};

pub type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StatusState {
    pub store: FjallStore,
    pub metrics: Arc<Metrics>,
    pub producer: Arc<dyn MessageProducer>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub metrics: MetricsSnapshot,
    pub requests: BTreeMap<&'static str, usize>,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
}

pub async fn serve<F>(address: SocketAddr, state: StatusState, shutdown: F) -> Result<(), AnyError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(address).await?;
    info!(%address, "Status server listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health(State(state): State<StatusState>) -> impl IntoResponse {
    if state.producer.health().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "messaging unavailable")
    }
}

async fn status(State(state): State<StatusState>) -> impl IntoResponse {
    match state.store.status_counts() {
        Ok(counts) => {
            let requests = counts
                .into_iter()
                .map(|(status, count)| (status.as_str(), count))
                .collect();
            let body = StatusResponse {
                metrics: state.metrics.snapshot(),
                requests,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Status counts unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
    info!("Shutdown signal received");
}
