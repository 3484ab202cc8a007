//! Range-aware redirect relay for hub-hosted datasets, plus the upload API
//! that fills the dataset it serves from.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod upload;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use upload::UploadServer;
