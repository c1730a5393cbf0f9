//! # Host Bridge Traits
//!
//! Contracts between the sync core and the outside world.
//!
//! ## Overview
//!
//! The sync core never talks to the network or to disk directly. Every external
//! collaborator it needs is expressed as a trait here and implemented elsewhere:
//! the Immich connector (`provider-immich`) implements the media traits, and the
//! desktop bridge (`bridge-desktop`) implements HTTP and checkpoint persistence.
//!
//! ## Traits
//!
//! ### Photo service
//! - [`MediaSearchClient`](media::MediaSearchClient) - Paginated person-filtered search
//! - [`CollectionMutator`](media::CollectionMutator) - Bulk-add media to an album
//!
//! ### Persistence
//! - [`CheckpointStore`](checkpoint::CheckpointStore) - Scope key → last seen timestamp
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests used by connectors
//!
//! ### Utilities
//! - [`LogLevel`](log::LogLevel) - Level names shared by logging setup and the CLI
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert their own errors into `BridgeError` at the trait boundary and keep
//! the message actionable (status code, key, path).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be shared
//! by rules running concurrently.

pub mod checkpoint;
pub mod error;
pub mod http;
pub mod log;
pub mod media;

pub use error::BridgeError;

// Re-export commonly used types
pub use checkpoint::CheckpointStore;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log::LogLevel;
pub use media::{
    BulkAddSummary, CollectionMutator, MediaItem, MediaSearchClient, SearchPage, SearchQuery,
};
