//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP and checkpoint
//! storage) into the sync core and runs every configured rule. Servers and
//! desktops enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and call [`bootstrap_desktop`]; tests and other hosts build
//! [`CoreDependencies`] themselves.
//!
//! Rules are built from the configuration when the service is created, so an
//! incomplete link fails before any request is sent. During a run each rule is
//! isolated: a failure is recorded in the [`RunReport`] and the remaining rules
//! still execute.

pub mod error;
pub mod report;

pub use error::{CoreError, Result};
pub use report::{RuleReport, RunReport};

use std::sync::Arc;
use std::time::Instant;

use bridge_traits::{checkpoint::CheckpointStore, http::HttpClient};
use core_runtime::config::AppConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, RunEvent};
use core_sync::{Rule, SyncConfig, SyncCoordinator, SyncError};
use futures::{stream, StreamExt};
use provider_immich::ImmichConnector;
use tracing::{info, instrument};
use uuid::Uuid;

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{ReqwestHttpClient, SqliteCheckpointStore};
#[cfg(feature = "desktop-shims")]
use bridge_traits::http::RetryPolicy;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub checkpoint_store: Arc<dyn CheckpointStore>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        checkpoint_store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            http_client,
            checkpoint_store,
        }
    }
}

/// A rule paired with the coordinator of the account it belongs to.
struct PlannedRule {
    coordinator: Arc<SyncCoordinator>,
    rule: Rule,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<AppConfig>,
    deps: Arc<CoreDependencies>,
    plan: Arc<Vec<PlannedRule>>,
    event_bus: EventBus,
}

impl CoreService {
    /// Validate `config`, build every rule and bind it to its account.
    pub fn new(config: AppConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::default();
        let sync_config = SyncConfig::from(&config.sync);
        let mut plan = Vec::with_capacity(config.link_count());

        for user in &config.users {
            let connector = Arc::new(
                ImmichConnector::new(
                    Arc::clone(&deps.http_client),
                    config.server_url(),
                    user.api_key.clone(),
                )
                .with_request_timeout(config.http.request_timeout()),
            );

            let coordinator = Arc::new(
                SyncCoordinator::new(
                    sync_config.clone(),
                    connector.clone(),
                    connector,
                    Arc::clone(&deps.checkpoint_store),
                )
                .with_event_bus(event_bus.clone()),
            );

            let prefix = user.credential_prefix();
            for link in &user.person_links {
                plan.push(PlannedRule {
                    coordinator: Arc::clone(&coordinator),
                    rule: Rule::from_link(link, &prefix)?,
                });
            }
        }

        Ok(Self {
            config: Arc::new(config),
            deps: Arc::new(deps),
            plan: Arc::new(plan),
            event_bus,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    /// Configured rules, in configuration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.plan.iter().map(|planned| &planned.rule)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to run and sync events published from now on.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Run every rule once.
    ///
    /// Up to `sync.maxConcurrentRules` rules execute at the same time. The
    /// report lists rules in configuration order regardless of completion order.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run_once(&self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let started = Instant::now();
        let concurrency = self.config.sync.max_concurrent_rules.max(1);

        info!(
            rules = self.plan.len(),
            concurrency,
            dry_run = self.config.sync.dry_run,
            "Starting sync run"
        );
        self.emit(RunEvent::Started {
            run_id: run_id.clone(),
            rule_count: self.plan.len(),
        });

        let mut finished: Vec<(usize, RuleReport)> = stream::iter(self.plan.iter().enumerate())
            .map(|(index, planned)| async move {
                let outcome = planned.coordinator.run(&planned.rule).await;
                let report = RuleReport {
                    description: planned.rule.description().map(str::to_string),
                    album_id: planned.rule.collection_id().to_string(),
                    scope_key: planned.rule.scope_key(),
                    outcome,
                };
                (index, report)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        finished.sort_by_key(|(index, _)| *index);

        let report = RunReport {
            run_id,
            rules: finished.into_iter().map(|(_, report)| report).collect(),
            duration: started.elapsed(),
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration_ms = report.duration.as_millis() as u64,
            "Sync run finished"
        );
        self.emit(RunEvent::Finished {
            run_id: report.run_id.clone(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            duration_ms: report.duration.as_millis() as u64,
        });

        report
    }

    /// Scope keys currently stored, sorted.
    pub async fn list_checkpoints(&self) -> Result<Vec<(String, Option<String>)>> {
        let store = &self.deps.checkpoint_store;
        let mut keys = store.list_keys().await?;
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = store.get_checkpoint(&key).await?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Forget one scope's checkpoint so its next run searches the full history.
    pub async fn reset_checkpoint(&self, scope_key: &str) -> Result<()> {
        self.deps.checkpoint_store.delete_checkpoint(scope_key).await?;
        info!(scope_key, "Checkpoint reset");
        Ok(())
    }

    fn emit(&self, event: RunEvent) {
        self.event_bus.emit(CoreEvent::Run(event)).ok();
    }
}

/// Build the rules of `config` without creating a service.
///
/// Fails on the first link that cannot become a rule.
pub fn build_rules(config: &AppConfig) -> std::result::Result<Vec<Rule>, SyncError> {
    config
        .users
        .iter()
        .flat_map(|user| {
            let prefix = user.credential_prefix();
            user.person_links
                .iter()
                .map(move |link| Rule::from_link(link, &prefix))
        })
        .collect()
}

/// Convenience bootstrapper for server and desktop hosts.
///
/// Uses `reqwest` for HTTP (timeout and retry attempts from `config.http`) and a
/// SQLite checkpoint store at `config.databasePath`.
///
/// ```ignore
/// use core_runtime::config::{AppConfig, ConfigSource};
/// use core_service::bootstrap_desktop;
///
/// let config = AppConfig::load(&ConfigSource::from_env(None))?;
/// let core = bootstrap_desktop(config).await?;
/// let report = core.run_once().await;
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(config: AppConfig) -> Result<CoreService> {
    let retry_policy = RetryPolicy {
        max_attempts: config.http.retry_attempts,
        ..RetryPolicy::default()
    };

    let http_client = ReqwestHttpClient::with_timeout(config.http.request_timeout(), retry_policy)
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    let checkpoint_store = SqliteCheckpointStore::new(config.database_path.clone())
        .await
        .map_err(|e| {
            CoreError::InitializationFailed(format!(
                "checkpoint database {}: {}",
                config.database_path.display(),
                e
            ))
        })?;

    CoreService::new(
        config,
        CoreDependencies::new(Arc::new(http_client), Arc::new(checkpoint_store)),
    )
}
