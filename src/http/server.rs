//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener
//! - Dispatch requests into the resolve → relay pipeline

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::{range_header, request_id, LogicalPath, MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::relay::{RelayService, Upstream};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayService,
}

/// HTTP server for the range relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a server that talks to the configured platform over HTTP.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let relay = RelayService::from_config(&config)?;
        Ok(Self::with_relay(config, relay))
    }

    /// Create a server over a caller-supplied upstream.
    pub fn with_upstream(config: RelayConfig, upstream: Arc<dyn Upstream>) -> Self {
        let template = crate::relay::BackingUrlTemplate::from_config(&config.upstream);
        Self::with_relay(config, RelayService::new(upstream, template))
    }

    fn with_relay(config: RelayConfig, relay: RelayService) -> Self {
        let router = build_router(&config, AppState { relay });
        Self { router, config }
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            namespace = %self.config.upstream.namespace,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &RelayConfig, state: AppState) -> Router {
    let x_request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/{*path}", get(relay_handler))
        .route("/", get(relay_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
}

/// Extract → resolve → relay.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());

    let path = match LogicalPath::from_uri_path(request.uri().path()) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(request_id = %request_id, "Rejected request without a path");
            metrics::record_request(e.outcome(), e.status().as_u16(), start_time);
            return e.into_response();
        }
    };
    let range = range_header(request.headers());

    tracing::debug!(
        request_id = %request_id,
        logical_path = %path,
        range = ?range,
        "Relaying request"
    );

    match state.relay.relay(&path, &range, &request_id).await {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                logical_path = %path,
                status = %response.status(),
                "Relay started"
            );
            metrics::record_request("relayed", response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                logical_path = %path,
                error = %e,
                "Relay failed"
            );
            metrics::record_request(e.outcome(), e.status().as_u16(), start_time);
            e.into_response()
        }
    }
}
