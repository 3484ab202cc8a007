//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, logical path, Range)
//!     → [relay pipeline resolves and fetches] (crate::relay)
//!     → response.rs (status, header mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{LogicalPath, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
