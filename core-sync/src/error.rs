use thiserror::Error;

/// Errors raised while building or running a sync rule.
///
/// Every variant other than `InvalidRule` is fatal to the current rule only and
/// leaves its checkpoint untouched.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Adding assets to album failed: {0}")]
    Mutation(String),

    #[error("Checkpoint storage failed: {0}")]
    Checkpoint(String),

    #[error("Search did not terminate within {0} pages")]
    PageLimitExceeded(u32),
}

pub type Result<T> = std::result::Result<T, SyncError>;
