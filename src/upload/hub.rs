//! Hub API client.
//!
//! # Responsibilities
//! - Create repositories and report who the token belongs to
//! - Commit files, choosing inline or LFS upload per the platform's answer
//! - Delete files and list repository trees
//!
//! # Design Decisions
//! - One commit per operation; batching is left to callers
//! - LFS objects already on the platform are not uploaded again
//! - Error bodies are reduced to their `error` field when they are JSON

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, LINK};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::RelayConfig;
use crate::upload::store::{DatasetStore, RepoFile, RepoId, RepoKind, RepoSpec, StoreError};

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Bytes of file content sent with a preupload request.
const PREUPLOAD_SAMPLE_LEN: usize = 512;

/// Talks to the hub's REST and Git LFS endpoints.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    revision: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

impl HubClient {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        revision: &str,
        user_agent: &str,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            revision: revision.to_string(),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.upstream.base_url,
            config.upload.token.clone(),
            &config.upstream.revision,
            &config.upstream.user_agent,
            Duration::from_secs(config.timeouts.connect_secs),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn repo_api(&self, repo: &RepoId) -> String {
        format!("{}/api/{}/{}", self.endpoint, repo.kind.api_segment(), repo.name)
    }

    /// Resolve URL of `path` in `repo` at the configured revision.
    pub fn resolve_url(&self, repo: &RepoId, path: &str) -> String {
        format!("{}/{}/resolve/{}/{}", self.endpoint, repo, self.revision(), path)
    }

    fn revision(&self) -> String {
        urlencoding::encode(&self.revision).into_owned()
    }

    /// Pass successful responses through, turn the rest into [`StoreError::Api`].
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);

        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn commit(&self, repo: &RepoId, summary: &str, operations: Vec<Value>) -> Result<(), StoreError> {
        let mut payload = json!({
            "key": "header",
            "value": { "summary": summary, "description": "" },
        })
        .to_string();
        for operation in operations {
            payload.push('\n');
            payload.push_str(&operation.to_string());
        }

        let url = format!("{}/commit/{}", self.repo_api(repo), self.revision());
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(payload);
        Self::check(self.authorized(request).send().await?).await?;
        Ok(())
    }

    async fn upload_mode(&self, repo: &RepoId, path: &str, content: &Bytes) -> Result<UploadMode, StoreError> {
        let sample = &content[..content.len().min(PREUPLOAD_SAMPLE_LEN)];
        let url = format!("{}/preupload/{}", self.repo_api(repo), self.revision());
        let request = self.client.post(url).json(&json!({
            "files": [{
                "path": path,
                "size": content.len(),
                "sample": BASE64.encode(sample),
            }]
        }));

        let response = Self::check(self.authorized(request).send().await?).await?;
        let preupload: PreuploadResponse = response.json().await?;
        preupload
            .files
            .into_iter()
            .find(|f| f.path == path)
            .map(|f| f.upload_mode)
            .ok_or_else(|| StoreError::Protocol(format!("preupload did not mention {}", path)))
    }

    /// Push `content` to LFS storage; returns its SHA-256 oid.
    async fn upload_lfs_object(&self, repo: &RepoId, content: Bytes) -> Result<String, StoreError> {
        let oid = hex::encode(Sha256::digest(&content));
        let size = content.len();

        let url = format!("{}/{}.git/info/lfs/objects/batch", self.endpoint, repo);
        let request = self
            .client
            .post(url)
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(
                json!({
                    "operation": "upload",
                    "transfers": ["basic"],
                    "hash_algo": "sha256",
                    "objects": [{ "oid": oid, "size": size }],
                })
                .to_string(),
            );
        let response = Self::check(self.authorized(request).send().await?).await?;
        let batch: LfsBatchResponse = serde_json::from_slice(&response.bytes().await?)
            .map_err(|e| StoreError::Protocol(format!("LFS batch response: {}", e)))?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Protocol("LFS batch returned no objects".into()))?;
        if let Some(error) = object.error {
            return Err(StoreError::Api {
                status: error.code,
                message: error.message,
            });
        }

        let Some(actions) = object.actions else {
            tracing::debug!(oid = %oid, "LFS object already stored");
            return Ok(oid);
        };

        if let Some(upload) = actions.upload {
            let request = self
                .client
                .put(&upload.href)
                .headers(action_headers(&upload)?)
                .body(content);
            Self::check(request.send().await?).await?;
        }

        if let Some(verify) = actions.verify {
            let request = self
                .client
                .post(&verify.href)
                .headers(action_headers(&verify)?)
                .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
                .body(json!({ "oid": oid, "size": size }).to_string());
            Self::check(self.authorized(request).send().await?).await?;
        }

        Ok(oid)
    }
}

fn action_headers(action: &LfsAction) -> Result<HeaderMap, StoreError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &action.header {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StoreError::Protocol(format!("LFS header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StoreError::Protocol(format!("LFS header value: {}", e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// URL of the `rel="next"` entry of a `Link` header, if any.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }
        let target = target.trim();
        Some(target.strip_prefix('<')?.strip_suffix('>')?.to_string())
    })
}

#[async_trait]
impl DatasetStore for HubClient {
    async fn whoami(&self) -> Result<String, StoreError> {
        let request = self.client.get(format!("{}/api/whoami-v2", self.endpoint));
        let response = Self::check(self.authorized(request).send().await?).await?;
        let who: WhoAmI = response.json().await?;
        Ok(who.name)
    }

    async fn create_repo(&self, spec: &RepoSpec) -> Result<(), StoreError> {
        let mut payload = json!({
            "name": spec.repo.short_name(),
            "private": spec.private,
        });
        if let Some(owner) = spec.repo.owner() {
            payload["organization"] = json!(owner);
        }
        if spec.repo.kind != RepoKind::Model {
            payload["type"] = json!(spec.repo.kind.as_str());
        }
        if let Some(license) = &spec.license {
            payload["license"] = json!(license);
        }

        let request = self
            .client
            .post(format!("{}/api/repos/create", self.endpoint))
            .json(&payload);
        Self::check(self.authorized(request).send().await?).await?;
        Ok(())
    }

    async fn upload_blob(&self, repo: &RepoId, path: &str, content: Bytes) -> Result<(), StoreError> {
        let operation = match self.upload_mode(repo, path, &content).await? {
            UploadMode::Regular => json!({
                "key": "file",
                "value": {
                    "content": BASE64.encode(&content),
                    "path": path,
                    "encoding": "base64",
                },
            }),
            UploadMode::Lfs => {
                let oid = self.upload_lfs_object(repo, content).await?;
                json!({
                    "key": "lfsFile",
                    "value": { "path": path, "algo": "sha256", "oid": oid },
                })
            }
        };

        self.commit(repo, &format!("Upload {}", path), vec![operation]).await
    }

    async fn delete_file(&self, repo: &RepoId, path: &str) -> Result<(), StoreError> {
        let operation = json!({ "key": "deletedFile", "value": { "path": path } });
        self.commit(repo, &format!("Delete {}", path), vec![operation]).await
    }

    async fn list_files(&self, repo: &RepoId) -> Result<Vec<RepoFile>, StoreError> {
        let mut files = Vec::new();
        let mut next = Some(format!(
            "{}/tree/{}?recursive=true",
            self.repo_api(repo),
            self.revision()
        ));

        while let Some(url) = next {
            let response = Self::check(self.authorized(self.client.get(url)).send().await?).await?;
            next = next_page(response.headers());
            let page: Vec<RepoFile> = response.json().await?;
            files.extend(page);
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> HubClient {
        HubClient::new(
            &server.url(),
            Some("hf_test".into()),
            "main",
            "range-relay-test",
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn dataset() -> RepoId {
        RepoId::new(RepoKind::Dataset, "acme/clips")
    }

    #[tokio::test]
    async fn test_whoami() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/whoami-v2")
            .match_header("authorization", "Bearer hf_test")
            .with_body(r#"{"name":"acme","type":"user"}"#)
            .create_async()
            .await;

        assert_eq!(client(&server).whoami().await.unwrap(), "acme");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_repo_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/repos/create")
            .match_body(Matcher::Json(json!({
                "name": "clips",
                "organization": "acme",
                "type": "dataset",
                "private": false,
                "license": "mit",
            })))
            .with_body(r#"{"url":"https://hub.example/datasets/acme/clips"}"#)
            .create_async()
            .await;

        let spec = RepoSpec {
            repo: dataset(),
            license: Some("mit".into()),
            private: false,
        };
        client(&server).create_repo(&spec).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_existing_repo_is_reported_as_such() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/repos/create")
            .with_status(409)
            .with_body(r#"{"error":"You already created this dataset repo"}"#)
            .create_async()
            .await;

        let spec = RepoSpec {
            repo: dataset(),
            license: None,
            private: false,
        };
        let hub = client(&server);
        match hub.create_repo(&spec).await {
            Err(StoreError::Api { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, "You already created this dataset repo");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(
            hub.create_repo_if_absent(&spec).await.unwrap(),
            crate::upload::store::RepoCreation::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_regular_upload_commits_inline() {
        let mut server = mockito::Server::new_async().await;
        let preupload = server
            .mock("POST", "/api/datasets/acme/clips/preupload/main")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""path":"notes.txt""#.into()),
                Matcher::Regex(r#""size":5"#.into()),
            ]))
            .with_body(r#"{"files":[{"path":"notes.txt","uploadMode":"regular"}]}"#)
            .create_async()
            .await;
        let commit = server
            .mock("POST", "/api/datasets/acme/clips/commit/main")
            .match_header("content-type", NDJSON_CONTENT_TYPE)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""key":"header""#.into()),
                Matcher::Regex(r#""key":"file""#.into()),
                Matcher::Regex(r#""content":"aGVsbG8=""#.into()),
            ]))
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        client(&server)
            .upload_blob(&dataset(), "notes.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        preupload.assert_async().await;
        commit.assert_async().await;
    }

    #[tokio::test]
    async fn test_lfs_upload_skips_existing_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/datasets/acme/clips/preupload/main")
            .with_body(r#"{"files":[{"path":"movie.mp4","uploadMode":"lfs"}]}"#)
            .create_async()
            .await;
        let oid = hex::encode(Sha256::digest(b"movie"));
        let batch = server
            .mock("POST", "/datasets/acme/clips.git/info/lfs/objects/batch")
            .match_header("accept", LFS_CONTENT_TYPE)
            .with_body(format!(r#"{{"objects":[{{"oid":"{}","size":5}}]}}"#, oid))
            .create_async()
            .await;
        let commit = server
            .mock("POST", "/api/datasets/acme/clips/commit/main")
            .match_body(Matcher::Regex(format!(r#""oid":"{}""#, oid)))
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        client(&server)
            .upload_blob(&dataset(), "movie.mp4", Bytes::from_static(b"movie"))
            .await
            .unwrap();
        batch.assert_async().await;
        commit.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_commits_deleted_file() {
        let mut server = mockito::Server::new_async().await;
        let commit = server
            .mock("POST", "/api/datasets/acme/clips/commit/main")
            .match_body(Matcher::Regex(r#""key":"deletedFile","value":\{"path":"old.mp4"\}"#.into()))
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        client(&server).delete_file(&dataset(), "old.mp4").await.unwrap();
        commit.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_files_follows_pagination() {
        let mut server = mockito::Server::new_async().await;
        let second_page = format!("{}/api/datasets/acme/clips/tree/main?recursive=true&cursor=abc", server.url());
        server
            .mock("GET", "/api/datasets/acme/clips/tree/main")
            .match_query(Matcher::Exact("recursive=true&cursor=abc".into()))
            .with_body(r#"[{"type":"file","path":"b.mp4","size":2,"oid":"o2"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/datasets/acme/clips/tree/main")
            .match_query(Matcher::Exact("recursive=true".into()))
            .with_header("link", &format!("<{}>; rel=\"next\"", second_page))
            .with_body(r#"[{"type":"file","path":"a.mp4","size":1,"oid":"o1"}]"#)
            .create_async()
            .await;

        let files = client(&server).list_files(&dataset()).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.mp4", "b.mp4"]);
    }

    #[test]
    fn test_next_page_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);

        headers.insert(
            LINK,
            HeaderValue::from_static("<https://hub.example/p2>; rel=\"next\", <https://hub.example/p0>; rel=\"prev\""),
        );
        assert_eq!(next_page(&headers).as_deref(), Some("https://hub.example/p2"));
    }

    #[test]
    fn test_resolve_url() {
        let client = HubClient::new(
            "https://hub.example/",
            None,
            "main",
            "range-relay-test",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(
            client.resolve_url(&dataset(), "clips/a.mp4"),
            "https://hub.example/datasets/acme/clips/resolve/main/clips/a.mp4"
        );
    }
}
