//! # Sync Module
//!
//! Incremental person-to-album synchronization.
//!
//! ## Overview
//!
//! For every configured rule this crate:
//! - Resumes from the rule's checkpoint (the newest update time already processed)
//! - Pages through the service's person search via `MediaSearchClient`
//! - Selects the items the rule wants with the matching engine
//! - Adds the selection to the rule's album via `CollectionMutator`
//! - Advances the checkpoint once every page has been applied
//!
//! ## Components
//!
//! - **Rules** (`rule`): Validated rule definition and its checkpoint scope key
//! - **Matching Engine** (`matcher`): Pure ALL-of / exclusion / exclusivity filters
//! - **Sync Coordinator** (`coordinator`): Pagination, album updates and checkpoints

pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod rule;

pub use coordinator::{SyncConfig, SyncCoordinator, SyncOutcome};
pub use error::{Result, SyncError};
pub use matcher::{select, select_with, MatchOptions};
pub use rule::{RequiredOperation, Rule};
