//! HTTP exporter for the access metrics.

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors from the exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address is unavailable.
    #[error("cannot listen on metrics address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("metrics server failed: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// All interfaces, given port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

/// Registry plus worker liveness, shared with the handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    running: bool,
}

impl MetricsState {
    /// Folds a status snapshot into the registry.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
    }

    /// Marks the access worker as stopped; `/health` then reports 503.
    pub fn mark_stopped(&mut self) {
        self.running = false;
    }
}

type SharedState = Arc<RwLock<MetricsState>>;

/// Serves `/metrics` and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedState,
}

impl MetricsServer {
    /// Creates a server reporting the worker as running.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        let state = MetricsState {
            registry,
            running: true,
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Handle for pushing updates from the monitor thread.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Serves until the task is dropped or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = Router::new()
            .route("/metrics", get(render_metrics))
            .route("/health", get(report_health))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn render_metrics(State(state): State<SharedState>) -> Response {
    match state.read().await.registry.encode() {
        Ok(body) => ([(CONTENT_TYPE, PROMETHEUS_TEXT)], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("cannot encode metrics: {e}"),
        )
            .into_response(),
    }
}

async fn report_health(State(state): State<SharedState>) -> Response {
    if state.read().await.running {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "STOPPED").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> MetricsServer {
        MetricsServer::new(
            MetricsServerConfig::with_port(0),
            MetricsRegistry::new().unwrap(),
        )
    }

    #[test]
    fn test_default_port() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
    }

    #[tokio::test]
    async fn test_health_follows_worker() {
        let state = server().state();
        let response = report_health(State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::OK);

        state.write().await.mark_stopped();
        let response = report_health(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_are_prometheus_text() {
        let state = server().state();
        let response = render_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], PROMETHEUS_TEXT);
    }
}
