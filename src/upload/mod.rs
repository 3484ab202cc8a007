//! Upload side: getting files into the repository the relay serves from.
//!
//! # Data Flow
//! ```text
//! multipart request
//!     → handlers.rs (field parsing, per-file outcome)
//!     → staging.rs (stream to disk, size limit, naming)
//!     → DatasetStore (hub.rs over HTTP: preupload → LFS / inline → commit)
//!     → link under the relay's public address
//! ```

pub mod handlers;
pub mod hub;
pub mod server;
pub mod staging;
pub mod store;

pub use hub::HubClient;
pub use server::{UploadServer, UploadState};
pub use staging::{StagedFile, Staging, StagingError};
pub use store::{DatasetStore, RepoCreation, RepoFile, RepoId, RepoKind, RepoSpec, StoreError};
