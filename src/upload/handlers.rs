//! Upload API handlers.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::observability::metrics;
use crate::upload::server::UploadState;
use crate::upload::staging::{format_file_size, randomized_name, target_path, StagedFile, StagingError};
use crate::upload::store::{RepoCreation, RepoFile, RepoId, RepoKind, RepoSpec, StoreError};

/// Failure of an upload API call, rendered as `{ success: false, error }`.
#[derive(Debug, thiserror::Error)]
pub enum UploadApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadApiError {
    fn status(&self) -> StatusCode {
        match self {
            UploadApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UploadApiError::Multipart(e) => e.status(),
            UploadApiError::Staging(StagingError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            UploadApiError::Staging(StagingError::Stream(_)) => StatusCode::BAD_REQUEST,
            UploadApiError::Staging(_) | UploadApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Upload API request failed");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

/// Per-file outcome of `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadedFile>,
}

/// `POST /api/upload`: stage every `files` field, then push each to the default repository.
pub async fn upload_files(
    State(state): State<UploadState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadApiError> {
    let mut prefix: Option<String> = None;
    let mut staged: Vec<StagedFile> = Vec::new();

    let read: Result<(), UploadApiError> = async {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("targetPath") => prefix = Some(field.text().await?),
                Some("files") => {
                    let name = field.file_name().unwrap_or("upload").to_string();
                    staged.push(state.staging.stage(&name, field).await?);
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = read {
        cleanup_all(staged).await;
        return Err(e);
    }
    if staged.is_empty() {
        return Err(UploadApiError::BadRequest("No files uploaded".into()));
    }

    let repo = state.default_repo.clone();
    tracing::info!(count = staged.len(), repo = %repo.name, "Starting upload");

    if let Err(e) = ensure_repo(&state, &repo).await {
        cleanup_all(staged).await;
        return Err(e.into());
    }

    let mut files = Vec::with_capacity(staged.len());
    for file in staged {
        let path = target_path(prefix.as_deref(), &randomized_name(&file.original_name));
        tracing::info!(
            file = %file.original_name,
            path = %path,
            size = %format_file_size(file.size),
            "Uploading file"
        );

        let outcome = match file.read().await {
            Ok(content) => state.store.upload_blob(&repo, &path, content).await.map_err(UploadApiError::from),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(()) => {
                metrics::record_upload("success");
                tracing::info!(file = %file.original_name, path = %path, "Uploaded file");
                files.push(UploadedFile {
                    url: Some(state.public_url(&path)),
                    error: None,
                });
            }
            Err(e) => {
                metrics::record_upload("failure");
                tracing::error!(file = %file.original_name, error = %e, "Upload failed");
                files.push(UploadedFile {
                    url: None,
                    error: Some(e.to_string()),
                });
            }
        }
        file.cleanup().await;
    }

    let succeeded = files.iter().filter(|f| f.error.is_none()).count();
    tracing::info!(succeeded = succeeded, total = files.len(), "Upload completed");

    Ok(Json(UploadResponse {
        success: true,
        files,
    }))
}

async fn ensure_repo(state: &UploadState, repo: &RepoId) -> Result<(), StoreError> {
    let spec = RepoSpec {
        repo: repo.clone(),
        license: Some(state.license.clone()),
        private: false,
    };
    match state.store.create_repo_if_absent(&spec).await? {
        RepoCreation::Created => tracing::info!(repo = %repo.name, "Repository created"),
        RepoCreation::AlreadyExists => tracing::info!(repo = %repo.name, "Repository already exists"),
    }
    Ok(())
}

async fn cleanup_all(staged: Vec<StagedFile>) {
    for file in staged {
        file.cleanup().await;
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepoRequest {
    pub repo_name: String,
    pub repo_type: Option<String>,
    pub license: Option<String>,
    #[serde(default)]
    pub private: bool,
}

/// `POST /api/repo/create`.
pub async fn create_repo(
    State(state): State<UploadState>,
    Json(request): Json<CreateRepoRequest>,
) -> Result<Json<serde_json::Value>, UploadApiError> {
    let repo_name = request.repo_name.trim().trim_matches('/');
    if repo_name.is_empty() {
        return Err(UploadApiError::BadRequest("repoName is required".into()));
    }
    let kind = match request.repo_type.as_deref() {
        Some(kind) => kind
            .parse::<RepoKind>()
            .map_err(|e| UploadApiError::BadRequest(e.to_string()))?,
        None => state.default_repo.kind,
    };
    let name = if repo_name.contains('/') {
        repo_name.to_string()
    } else {
        format!("{}/{}", state.store.whoami().await?, repo_name)
    };

    let repo = RepoId::new(kind, name);
    let spec = RepoSpec {
        repo: repo.clone(),
        license: Some(request.license.unwrap_or_else(|| state.license.clone())),
        private: request.private,
    };
    state.store.create_repo(&spec).await?;
    tracing::info!(repo = %repo.name, kind = %repo.kind, "Repository created");

    Ok(Json(json!({ "success": true, "repo": repo })))
}

fn repo_from_path(kind: &str, owner: &str, name: &str) -> Result<RepoId, UploadApiError> {
    let kind = kind
        .parse::<RepoKind>()
        .map_err(|_| UploadApiError::BadRequest("Invalid repository type".into()))?;
    Ok(RepoId::new(kind, format!("{}/{}", owner, name)))
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub success: bool,
    pub files: Vec<RepoFile>,
}

/// `GET /api/repo/{kind}/{owner}/{name}/files`.
pub async fn list_files(
    State(state): State<UploadState>,
    Path((kind, owner, name)): Path<(String, String, String)>,
) -> Result<Json<FilesResponse>, UploadApiError> {
    let repo = repo_from_path(&kind, &owner, &name)?;
    let files = state.store.list_files(&repo).await?;
    Ok(Json(FilesResponse {
        success: true,
        files,
    }))
}

/// `DELETE /api/repo/{kind}/{owner}/{name}/files/{*path}`.
pub async fn delete_file(
    State(state): State<UploadState>,
    Path((kind, owner, name, path)): Path<(String, String, String, String)>,
) -> Result<Json<serde_json::Value>, UploadApiError> {
    let repo = repo_from_path(&kind, &owner, &name)?;
    state.store.delete_file(&repo, &path).await?;
    tracing::info!(repo = %repo.name, path = %path, "File deleted");
    Ok(Json(json!({ "success": true, "message": "File deleted successfully" })))
}
