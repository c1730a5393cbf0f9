//! Per-run results handed back to the host.

use core_sync::{SyncError, SyncOutcome};
use std::fmt;
use std::time::Duration;

/// Result of one rule within a run.
#[derive(Debug)]
pub struct RuleReport {
    pub description: Option<String>,
    pub album_id: String,
    pub scope_key: String,
    pub outcome: Result<SyncOutcome, SyncError>,
}

impl RuleReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Description if configured, otherwise the album id.
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.album_id)
    }
}

/// Result of one pass over every configured rule, in configuration order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub rules: Vec<RuleReport>,
    pub duration: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.rules.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.rules.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|r| !r.is_success())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            match &rule.outcome {
                Ok(outcome) => writeln!(
                    f,
                    "ok      {}: {} matched of {} observed over {} page(s), {} added, {} already present{}",
                    rule.label(),
                    outcome.items_matched,
                    outcome.items_observed,
                    outcome.pages,
                    outcome.added.added,
                    outcome.added.duplicates,
                    match &outcome.checkpoint {
                        Some(checkpoint) => format!(", checkpoint {}", checkpoint),
                        None => String::new(),
                    }
                )?,
                Err(e) => writeln!(f, "FAILED  {}: {}", rule.label(), e)?,
            }
        }
        write!(
            f,
            "{} rule(s) succeeded, {} failed in {:.1}s",
            self.succeeded(),
            self.failed(),
            self.duration.as_secs_f64()
        )
    }
}
