//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for servers and desktops
//! (Linux containers, macOS, Windows).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (rustls, connection pooling, optional retry)
//! - `CheckpointStore` using a SQLite key-value table via `sqlx`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteCheckpointStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let checkpoints = SqliteCheckpointStore::new("data/checkpoints.db".into()).await.unwrap();
//!
//!     // Hand both to core_service::CoreDependencies
//! }
//! ```

mod checkpoint;
mod http;

pub use checkpoint::SqliteCheckpointStore;
pub use http::ReqwestHttpClient;
