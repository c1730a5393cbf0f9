//! # Sync Coordinator
//!
//! Runs one rule end to end: paginated search, matching, album updates and the
//! checkpoint write.
//!
//! ## Workflow
//!
//! 1. Read the checkpoint stored under the rule's scope key
//! 2. Search page by page (people = required set, lower bound = checkpoint)
//! 3. Remember the first item of the first non-empty page as the newest seen
//! 4. Match each page and add the matches to the album in one bulk call
//! 5. After the last page, store the newest timestamp seen as the new checkpoint
//!
//! The checkpoint is written only after every page has been mutated, and only if
//! at least one item was observed. Any error stops the rule with its checkpoint
//! unchanged, so the next run picks up everything that was not confirmed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{Rule, SyncConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::new(SyncConfig::default(), search, mutator, checkpoints)
//!     .with_event_bus(event_bus);
//!
//! let outcome = coordinator.run(&rule).await?;
//! println!("{} assets matched over {} pages", outcome.items_matched, outcome.pages);
//! ```

use crate::{
    matcher::{self, MatchOptions},
    rule::Rule,
    Result, SyncError,
};
use bridge_traits::{
    checkpoint::CheckpointStore,
    media::{BulkAddSummary, CollectionMutator, MediaSearchClient, SearchPage, SearchQuery},
};
use core_runtime::config::SyncOptions;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use futures::{stream, Stream, TryStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Sync coordinator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Fail the rule once this many pages were fetched without reaching the end
    pub max_pages: Option<u32>,

    /// Log matches instead of adding them; leaves checkpoints untouched
    pub dry_run: bool,

    pub match_options: MatchOptions,
}

impl From<&SyncOptions> for SyncConfig {
    fn from(options: &SyncOptions) -> Self {
        Self {
            max_pages: options.max_pages,
            dry_run: options.dry_run,
            match_options: MatchOptions {
                verify_any_of: options.verify_any_of,
            },
        }
    }
}

/// Result of one successful rule run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub scope_key: String,
    pub pages: u32,
    pub items_observed: usize,
    pub items_matched: usize,
    /// Totals reported by the album endpoint (zero on a dry run)
    pub added: BulkAddSummary,
    /// Value written to the checkpoint store
    pub checkpoint: Option<String>,
}

/// Accumulator carried across pages.
#[derive(Debug, Default)]
struct Progress {
    most_recent: Option<String>,
    pages: u32,
    observed: usize,
    matched: usize,
    added: BulkAddSummary,
}

/// Pagination cursor: next page to fetch and pages fetched so far.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    next: Option<u32>,
    fetched: u32,
}

/// Drives a single rule against the injected collaborators.
///
/// The coordinator holds no per-rule state, so one instance can run many rules
/// (sequentially or concurrently).
pub struct SyncCoordinator {
    config: SyncConfig,
    search: Arc<dyn MediaSearchClient>,
    mutator: Arc<dyn CollectionMutator>,
    checkpoints: Arc<dyn CheckpointStore>,
    event_bus: Option<EventBus>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        search: Arc<dyn MediaSearchClient>,
        mutator: Arc<dyn CollectionMutator>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config,
            search,
            mutator,
            checkpoints,
            event_bus: None,
        }
    }

    /// Publish progress events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run `rule` once.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Checkpoint`] if the checkpoint cannot be read or written
    /// - [`SyncError::Search`] if a page fetch fails
    /// - [`SyncError::Mutation`] if adding assets to the album fails
    /// - [`SyncError::PageLimitExceeded`] if the search keeps returning pages
    ///
    /// In every case the stored checkpoint is left as it was.
    #[instrument(skip(self, rule), fields(scope_key = %rule.scope_key(), album_id = %rule.collection_id()))]
    pub async fn run(&self, rule: &Rule) -> Result<SyncOutcome> {
        let job_id = Uuid::new_v4().to_string();
        let scope_key = rule.scope_key();
        let started = Instant::now();

        log_rule(rule);

        // Started precedes every Completed or Failed, including a failed checkpoint read.
        self.emit(SyncEvent::Started {
            job_id: job_id.clone(),
            scope_key: scope_key.clone(),
            description: rule.description().map(str::to_string),
        });

        let result = self.execute(rule, &job_id, &scope_key).await;

        match &result {
            Ok(outcome) => {
                info!(
                    pages = outcome.pages,
                    observed = outcome.items_observed,
                    matched = outcome.items_matched,
                    checkpoint = ?outcome.checkpoint,
                    "Rule completed"
                );
                self.emit(SyncEvent::Completed {
                    job_id,
                    scope_key,
                    pages: outcome.pages,
                    items_observed: outcome.items_observed,
                    items_matched: outcome.items_matched,
                    checkpoint: outcome.checkpoint.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(e) => {
                error!(error = %e, "Rule failed, checkpoint unchanged");
                self.emit(SyncEvent::Failed {
                    job_id,
                    scope_key,
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn execute(&self, rule: &Rule, job_id: &str, scope_key: &str) -> Result<SyncOutcome> {
        let updated_after = self
            .checkpoints
            .get_checkpoint(scope_key)
            .await
            .map_err(|e| SyncError::Checkpoint(e.to_string()))?;

        match &updated_after {
            Some(ts) => debug!(updated_after = %ts, "Resuming from checkpoint"),
            None => debug!("No checkpoint, searching full history"),
        }

        let progress = self
            .pages(rule.required().clone(), updated_after)
            .try_fold(Progress::default(), |progress, (page_number, page)| {
                self.process_page(rule, job_id, scope_key, progress, page_number, page)
            })
            .await?;

        let checkpoint = match progress.most_recent {
            Some(most_recent) if !self.config.dry_run => {
                self.checkpoints
                    .set_checkpoint(scope_key, &most_recent)
                    .await
                    .map_err(|e| SyncError::Checkpoint(e.to_string()))?;
                Some(most_recent)
            }
            Some(most_recent) => {
                info!(checkpoint = %most_recent, "Dry run: checkpoint not written");
                None
            }
            None => {
                debug!("No items observed, checkpoint unchanged");
                None
            }
        };

        Ok(SyncOutcome {
            scope_key: scope_key.to_string(),
            pages: progress.pages,
            items_observed: progress.observed,
            items_matched: progress.matched,
            added: progress.added,
            checkpoint,
        })
    }

    /// Lazy stream of `(page number, page)` following the search cursor.
    fn pages(
        &self,
        person_ids: BTreeSet<String>,
        updated_after: Option<String>,
    ) -> impl Stream<Item = Result<(u32, SearchPage)>> {
        let search = Arc::clone(&self.search);
        let max_pages = self.config.max_pages;
        let start = Cursor {
            next: Some(1),
            fetched: 0,
        };

        stream::try_unfold(start, move |cursor| {
            let search = Arc::clone(&search);
            let query = cursor.next.map(|page| SearchQuery {
                person_ids: person_ids.clone(),
                updated_after: updated_after.clone(),
                page,
            });

            async move {
                let Some(query) = query else {
                    return Ok(None);
                };

                if let Some(limit) = max_pages {
                    if cursor.fetched >= limit {
                        return Err(SyncError::PageLimitExceeded(limit));
                    }
                }

                debug!(page = query.page, "Processing page");
                let page = search
                    .search(&query)
                    .await
                    .map_err(|e| SyncError::Search(format!("page {}: {}", query.page, e)))?;

                let next = Cursor {
                    next: page.next_page,
                    fetched: cursor.fetched + 1,
                };
                Ok(Some(((query.page, page), next)))
            }
        })
    }

    async fn process_page(
        &self,
        rule: &Rule,
        job_id: &str,
        scope_key: &str,
        mut progress: Progress,
        page_number: u32,
        page: SearchPage,
    ) -> Result<Progress> {
        if progress.most_recent.is_none() {
            if let Some(first) = page.items.first() {
                progress.most_recent = Some(first.updated_at.clone());
            }
        }

        let matched = matcher::select_with(&page.items, rule, self.config.match_options);
        let ids: Vec<String> = matched.into_iter().map(|item| item.id).collect();

        if ids.is_empty() {
            debug!(page = page_number, items = page.items.len(), "No assets matched criteria");
        } else if self.config.dry_run {
            info!(page = page_number, assets = ?ids, "Dry run: would add assets");
        } else {
            let summary = self
                .mutator
                .add_to_collection(rule.collection_id(), &ids)
                .await
                .map_err(|e| SyncError::Mutation(e.to_string()))?;

            info!(
                page = page_number,
                matched = ids.len(),
                added = summary.added,
                duplicates = summary.duplicates,
                rejected = summary.failed,
                "Added assets"
            );

            progress.added.added += summary.added;
            progress.added.duplicates += summary.duplicates;
            progress.added.failed += summary.failed;
        }

        progress.pages += 1;
        progress.observed += page.items.len();
        progress.matched += ids.len();

        self.emit(SyncEvent::PageProcessed {
            job_id: job_id.to_string(),
            scope_key: scope_key.to_string(),
            page: page_number,
            items: page.items.len(),
            matched: ids.len(),
        });

        Ok(progress)
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}

fn log_rule(rule: &Rule) {
    let persons: Vec<&str> = rule.required().iter().map(String::as_str).collect();

    info!(
        description = rule.description().unwrap_or(""),
        operation = %rule.operation(),
        persons = ?persons,
        album_id = %rule.collection_id(),
        "Syncing rule"
    );

    if !rule.excluded().is_empty() {
        info!(excluded = ?rule.excluded(), "Excluding persons");
    }

    if rule.is_exclusive() {
        info!("Only the required persons may appear");
    }

    if rule.has_redundant_exclusions() {
        warn!("Excluded persons are redundant when the rule is exclusive");
    }

    let conflicting = rule.conflicting_people();
    if !conflicting.is_empty() {
        warn!(persons = ?conflicting, "Persons are both required and excluded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::SqliteCheckpointStore;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::media::MediaItem;
    use mockall::{mock, predicate::eq, Sequence};

    mock! {
        Search {}

        #[async_trait]
        impl MediaSearchClient for Search {
            async fn search(&self, query: &SearchQuery) -> BridgeResult<SearchPage>;
        }
    }

    mock! {
        Checkpoints {}

        #[async_trait]
        impl CheckpointStore for Checkpoints {
            async fn get_checkpoint(&self, scope_key: &str) -> BridgeResult<Option<String>>;
            async fn set_checkpoint(&self, scope_key: &str, value: &str) -> BridgeResult<()>;
            async fn delete_checkpoint(&self, scope_key: &str) -> BridgeResult<()>;
            async fn list_keys(&self) -> BridgeResult<Vec<String>>;
        }
    }

    mock! {
        Mutator {}

        #[async_trait]
        impl CollectionMutator for Mutator {
            async fn add_to_collection(&self, collection_id: &str, media_ids: &[String]) -> BridgeResult<BulkAddSummary>;
        }
    }

    fn page(items: Vec<MediaItem>, next_page: Option<u32>) -> SearchPage {
        SearchPage { items, next_page }
    }

    fn item(id: &str, updated_at: &str, people: &[&str]) -> MediaItem {
        MediaItem::new(id, updated_at).with_people(people.iter().copied())
    }

    async fn store() -> Arc<SqliteCheckpointStore> {
        Arc::new(SqliteCheckpointStore::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_mutator_not_called_when_nothing_matches() {
        let mut search = MockSearch::new();
        search.expect_search().times(1).returning(|_| {
            Ok(page(
                vec![item("a1", "2024-03-01T00:00:00Z", &["P1", "P3"])],
                None,
            ))
        });

        let mut mutator = MockMutator::new();
        mutator.expect_add_to_collection().times(0);

        let checkpoints = store().await;
        let rule = Rule::new(["P1"], "album", "k").unwrap().excluding(["P3"]);
        let coordinator = SyncCoordinator::new(
            SyncConfig::default(),
            Arc::new(search),
            Arc::new(mutator),
            checkpoints.clone(),
        );

        let outcome = coordinator.run(&rule).await.unwrap();

        assert_eq!(outcome.items_observed, 1);
        assert_eq!(outcome.items_matched, 0);
        // The item was observed, so the checkpoint still advances.
        assert_eq!(
            checkpoints.get_checkpoint(&rule.scope_key()).await.unwrap(),
            Some("2024-03-01T00:00:00Z".to_string())
        );
    }

    #[tokio::test]
    async fn test_pages_requested_in_order_with_checkpoint_bound() {
        let checkpoints = store().await;
        let rule = Rule::new(["P1", "P2"], "album", "k").unwrap();
        checkpoints
            .set_checkpoint(&rule.scope_key(), "2024-01-01T00:00:00Z")
            .await
            .unwrap();

        let mut seq = Sequence::new();
        let mut search = MockSearch::new();
        search
            .expect_search()
            .withf(|q| q.page == 1 && q.updated_after.as_deref() == Some("2024-01-01T00:00:00Z"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![item("a1", "2024-02-02T00:00:00Z", &["P1"])], Some(2))));
        search
            .expect_search()
            .withf(|q| q.page == 2 && q.person_ids.len() == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![item("a2", "2024-01-15T00:00:00Z", &["P2"])], None)));

        let mut mutator = MockMutator::new();
        mutator
            .expect_add_to_collection()
            .with(eq("album"), eq(vec!["a1".to_string()]))
            .times(1)
            .returning(|_, ids| {
                Ok(BulkAddSummary {
                    added: ids.len(),
                    ..Default::default()
                })
            });
        mutator
            .expect_add_to_collection()
            .with(eq("album"), eq(vec!["a2".to_string()]))
            .times(1)
            .returning(|_, _| {
                Ok(BulkAddSummary {
                    duplicates: 1,
                    ..Default::default()
                })
            });

        let coordinator = SyncCoordinator::new(
            SyncConfig::default(),
            Arc::new(search),
            Arc::new(mutator),
            checkpoints.clone(),
        );
        let outcome = coordinator.run(&rule).await.unwrap();

        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.added.added, 1);
        assert_eq!(outcome.added.duplicates, 1);
        assert_eq!(outcome.checkpoint.as_deref(), Some("2024-02-02T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_search_error_leaves_checkpoint() {
        let checkpoints = store().await;
        let rule = Rule::new(["P1"], "album", "k").unwrap();
        checkpoints
            .set_checkpoint(&rule.scope_key(), "before")
            .await
            .unwrap();

        let mut search = MockSearch::new();
        search
            .expect_search()
            .withf(|q| q.page == 1)
            .returning(|_| Ok(page(vec![item("a1", "after", &["P1"])], Some(2))));
        search
            .expect_search()
            .withf(|q| q.page == 2)
            .returning(|_| Err(BridgeError::Timeout("request timed out".to_string())));

        let mut mutator = MockMutator::new();
        mutator
            .expect_add_to_collection()
            .times(1)
            .returning(|_, _| Ok(BulkAddSummary::default()));

        let coordinator = SyncCoordinator::new(
            SyncConfig::default(),
            Arc::new(search),
            Arc::new(mutator),
            checkpoints.clone(),
        );

        let err = coordinator.run(&rule).await.unwrap_err();
        assert!(matches!(err, SyncError::Search(msg) if msg.contains("page 2")));
        assert_eq!(
            checkpoints.get_checkpoint(&rule.scope_key()).await.unwrap(),
            Some("before".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreadable_checkpoint_reports_started_then_failed() {
        let mut checkpoints = MockCheckpoints::new();
        checkpoints
            .expect_get_checkpoint()
            .times(1)
            .returning(|_| Err(BridgeError::DatabaseError("database is locked".to_string())));
        checkpoints.expect_set_checkpoint().times(0);

        let mut search = MockSearch::new();
        search.expect_search().times(0);
        let mut mutator = MockMutator::new();
        mutator.expect_add_to_collection().times(0);

        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let rule = Rule::new(["P1"], "album", "k").unwrap();
        let coordinator = SyncCoordinator::new(
            SyncConfig::default(),
            Arc::new(search),
            Arc::new(mutator),
            Arc::new(checkpoints),
        )
        .with_event_bus(bus);

        let err = coordinator.run(&rule).await.unwrap_err();
        assert!(matches!(err, SyncError::Checkpoint(msg) if msg.contains("database is locked")));

        let started = match events.try_recv().unwrap() {
            CoreEvent::Sync(SyncEvent::Started { job_id, scope_key, .. }) => {
                assert_eq!(scope_key, rule.scope_key());
                job_id
            }
            other => panic!("expected Started, got {:?}", other),
        };
        match events.try_recv().unwrap() {
            CoreEvent::Sync(SyncEvent::Failed { job_id, message, .. }) => {
                assert_eq!(job_id, started);
                assert!(message.contains("database is locked"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_config_from_options() {
        let options = SyncOptions {
            max_concurrent_rules: 3,
            max_pages: Some(10),
            dry_run: true,
            verify_any_of: true,
        };

        let config = SyncConfig::from(&options);
        assert_eq!(config.max_pages, Some(10));
        assert!(config.dry_run);
        assert!(config.match_options.verify_any_of);
    }
}
