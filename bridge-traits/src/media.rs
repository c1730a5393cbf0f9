//! Photo Service Abstractions
//!
//! The two operations the sync core needs from a photo-management service:
//! person-filtered paginated search and bulk album membership.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;

/// A media item as returned by a search.
///
/// `person_ids` is empty when the service reports no recognised people (or omits
/// the field entirely).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Service-side asset identifier
    pub id: String,
    /// Last-updated timestamp, opaque to the core (Immich: RFC 3339)
    pub updated_at: String,
    /// Identifiers of the people recognised in the item
    #[serde(default)]
    pub person_ids: BTreeSet<String>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updated_at: updated_at.into(),
            person_ids: BTreeSet::new(),
        }
    }

    pub fn with_people<I, S>(mut self, people: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.person_ids = people.into_iter().map(Into::into).collect();
        self
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Items in service order (newest first)
    pub items: Vec<MediaItem>,
    /// 1-based number of the next page, `None` when exhausted
    pub next_page: Option<u32>,
}

/// Search parameters for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Matches items containing ANY of these people
    pub person_ids: BTreeSet<String>,
    /// Only items updated after this timestamp; `None` searches the full history
    pub updated_after: Option<String>,
    /// 1-based page number
    pub page: u32,
}

/// Result of a bulk add, used for logging only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkAddSummary {
    pub added: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Paginated media search
///
/// # Ordering
///
/// Implementations must return items in descending update order; the sync core
/// takes the first item of the first non-empty page as the newest one observed.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::{MediaSearchClient, SearchQuery};
///
/// let page = client.search(&SearchQuery {
///     person_ids: ["p1".to_string()].into(),
///     updated_after: None,
///     page: 1,
/// }).await?;
/// ```
#[async_trait]
pub trait MediaSearchClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;
}

/// Attaches media to a collection (album)
#[async_trait]
pub trait CollectionMutator: Send + Sync {
    /// Add `media_ids` to `collection_id` in one request.
    ///
    /// Adding an item that is already present is not an error.
    async fn add_to_collection(
        &self,
        collection_id: &str,
        media_ids: &[String],
    ) -> Result<BulkAddSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_item_people_are_deduplicated() {
        let item = MediaItem::new("a1", "2024-01-01T00:00:00.000Z").with_people(["p2", "p1", "p2"]);

        assert_eq!(item.person_ids.len(), 2);
        assert_eq!(
            item.person_ids.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["p1", "p2"]
        );
    }

    #[test]
    fn test_media_item_missing_people_deserializes_empty() {
        let item: MediaItem =
            serde_json::from_str(r#"{"id":"a1","updated_at":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(item.person_ids.is_empty());
    }
}
