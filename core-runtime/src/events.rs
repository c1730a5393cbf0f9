//! # Event Bus System
//!
//! Typed progress events for sync runs, delivered over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The sync coordinator and the service façade publish events as rules start,
//! process pages and finish. Hosts subscribe to observe progress (dashboards,
//! notifications, test assertions) without scraping log output. Publishing never
//! blocks and never fails a sync: with no subscribers the event is dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         if let CoreEvent::Sync(SyncEvent::Failed { scope_key, message, .. }) = event {
//!             eprintln!("{scope_key}: {message}");
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Run Events
//! - `Started`: a pass over every configured rule began
//! - `Finished`: every rule has either completed or failed
//!
//! ### Sync Events (one rule)
//! - `Started`: rule processing began, before the checkpoint is read
//! - `PageProcessed`: one search page was fetched, matched and mutated
//! - `Completed`: all pages processed, checkpoint written if anything was observed
//! - `Failed`: the rule stopped on an error; its checkpoint is unchanged
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Whole-run lifecycle events
    Run(RunEvent),
    /// Per-rule sync events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Run(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Run(RunEvent::Finished { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Run(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Run Events
// ============================================================================

/// Events describing one pass over every configured rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RunEvent {
    Started {
        run_id: String,
        /// Number of rules scheduled in this pass.
        rule_count: usize,
    },
    Finished {
        run_id: String,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
}

impl RunEvent {
    fn description(&self) -> &str {
        match self {
            RunEvent::Started { .. } => "Sync run started",
            RunEvent::Finished { .. } => "Sync run finished",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events describing the processing of a single rule.
///
/// `job_id` is unique per rule execution; `scope_key` identifies the rule's
/// checkpoint scope and is stable across runs. Each execution emits `Started`
/// first and ends with exactly one of `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        job_id: String,
        scope_key: String,
        description: Option<String>,
    },
    PageProcessed {
        job_id: String,
        scope_key: String,
        /// 1-based page number.
        page: u32,
        items: usize,
        matched: usize,
    },
    Completed {
        job_id: String,
        scope_key: String,
        pages: u32,
        items_observed: usize,
        items_matched: usize,
        /// Value written to the checkpoint store, `None` when nothing was observed
        /// or the run was a dry run.
        checkpoint: Option<String>,
        duration_ms: u64,
    },
    Failed {
        job_id: String,
        scope_key: String,
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Rule sync started",
            SyncEvent::PageProcessed { .. } => "Search page processed",
            SyncEvent::Completed { .. } => "Rule sync completed successfully",
            SyncEvent::Failed { .. } => "Rule sync failed",
        }
    }

    /// Scope key of the rule this event belongs to.
    pub fn scope_key(&self) -> &str {
        match self {
            SyncEvent::Started { scope_key, .. }
            | SyncEvent::PageProcessed { scope_key, .. }
            | SyncEvent::Completed { scope_key, .. }
            | SyncEvent::Failed { scope_key, .. } => scope_key,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an independent
/// receiver that sees events published after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error if
    /// there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let sync_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()` / `try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered event that passes the filter.
    ///
    /// Lag notifications are skipped; the drain stops at the first empty or
    /// closed state.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
