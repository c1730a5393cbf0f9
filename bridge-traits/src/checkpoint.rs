//! Checkpoint Persistence Abstraction
//!
//! A key-value store mapping a sync scope key to the newest update timestamp that
//! was fully processed for that scope.

use async_trait::async_trait;

use crate::error::Result;

/// Checkpoint storage trait
///
/// Implementations must make `set_checkpoint` atomic per key: two rules writing
/// different keys never interfere, and a single key is never left half-written.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::checkpoint::CheckpointStore;
///
/// async fn reset(store: &dyn CheckpointStore, key: &str) -> Result<()> {
///     store.delete_checkpoint(key).await
/// }
/// ```
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Retrieve the stored value for `scope_key`
    ///
    /// Returns `Ok(None)` if no run has completed for this scope yet.
    async fn get_checkpoint(&self, scope_key: &str) -> Result<Option<String>>;

    /// Store `value` for `scope_key`, replacing any previous value
    async fn set_checkpoint(&self, scope_key: &str, value: &str) -> Result<()>;

    /// Forget the checkpoint, forcing a full-history search on the next run
    async fn delete_checkpoint(&self, scope_key: &str) -> Result<()>;

    /// List all stored scope keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}
