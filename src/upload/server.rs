//! Upload API server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the upload API
//! - Wire up middleware (CORS, request ID, tracing)
//! - Hold the shared hub client and staging directory

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{RelayConfig, UploadConfig};
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::upload::handlers;
use crate::upload::hub::HubClient;
use crate::upload::staging::Staging;
use crate::upload::store::{DatasetStore, RepoId, RepoKind, StoreError};

/// State shared by the upload handlers.
#[derive(Clone)]
pub struct UploadState {
    pub store: Arc<dyn DatasetStore>,
    pub staging: Staging,
    pub default_repo: RepoId,
    pub license: String,
    pub public_base_url: String,
}

impl UploadState {
    pub fn from_config(config: &UploadConfig, store: Arc<dyn DatasetStore>) -> Result<Self, StoreError> {
        let kind: RepoKind = config.repo_type.parse()?;
        Ok(Self {
            store,
            staging: Staging::new(&config.staging_dir, config.max_file_size),
            default_repo: RepoId::new(kind, config.repo_name.clone()),
            license: config.license.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Link under which the relay serves a repository path.
    pub fn public_url(&self, path: &str) -> String {
        let encoded: Vec<_> = path.split('/').map(urlencoding::encode).collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}

/// HTTP server for the upload API.
pub struct UploadServer {
    router: Router,
    config: RelayConfig,
}

impl UploadServer {
    /// Create a server backed by the configured hub.
    pub fn new(config: RelayConfig) -> Result<Self, StoreError> {
        let store = HubClient::from_config(&config)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create a server over a caller-supplied store.
    pub fn with_store(config: RelayConfig, store: Arc<dyn DatasetStore>) -> Result<Self, StoreError> {
        let state = UploadState::from_config(&config.upload, store)?;
        Ok(Self {
            router: build_router(state),
            config,
        })
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
            repo = %self.config.upload.repo_name,
            staging_dir = %self.config.upload.staging_dir,
            "Upload server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("Upload server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the upload API router with its middleware.
pub fn build_router(state: UploadState) -> Router {
    let x_request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/api/upload", post(handlers::upload_files))
        .route("/api/repo/create", post(handlers::create_repo))
        .route("/api/repo/{kind}/{owner}/{name}/files", get(handlers::list_files))
        .route(
            "/api/repo/{kind}/{owner}/{name}/files/{*path}",
            delete(handlers::delete_file),
        )
        .with_state(state)
        // Size is enforced per file while staging.
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuidV4))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
}
