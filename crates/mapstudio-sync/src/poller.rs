//! Cancellable background polling of a conversation's audit log.
//!
//! ```text
//!   PollScope (generation counter, shared with the consumer)
//!       │ begin() → g
//!       ▼
//!   AuditPoller task ──fetch──► AuditSource
//!       │  PollUpdate { generation: g, .. }
//!       ▼
//!   consumer applies the update only while scope.is_current(g)
//! ```
//!
//! Cancelling stops the loop, aborts an in-flight fetch at its next await
//! point and retires the generation, so a response that still slips through
//! the channel is recognized as stale and discarded by the consumer.

use crate::payload::AuditEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("audit request failed: {0}")]
    Request(String),

    #[error("audit response could not be decoded: {0}")]
    Decode(String),
}

/// Anything that can return the audit rows of a conversation.
#[async_trait]
pub trait AuditSource: Send + Sync {
    async fn fetch_audit(&self, conversation_id: &str) -> Result<Vec<AuditEvent>, SourceError>;
}

// ============================================================================
// Generations
// ============================================================================

/// Generation counter deciding which polling context is current.
#[derive(Debug, Clone, Default)]
pub struct PollScope {
    current: Arc<AtomicU64>,
}

impl PollScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new context. Every earlier generation becomes stale.
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation != 0 && self.current.load(Ordering::SeqCst) == generation
    }

    /// Retire `generation` if it is still the current one.
    pub fn retire(&self, generation: u64) -> bool {
        self.current
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Retire whatever is current.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Updates
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Events(Vec<AuditEvent>),
    Failed { message: String },
}

/// One poll result, tagged with the context that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub generation: u64,
    pub conversation_id: String,
    pub outcome: PollOutcome,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PollStats {
    pub polls: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

// ============================================================================
// Poller
// ============================================================================

/// Smallest interval the ticker accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct AuditPoller {
    generation: u64,
    conversation_id: String,
    scope: PollScope,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    stats: Arc<RwLock<PollStats>>,
}

impl AuditPoller {
    /// Start polling `conversation_id` every `interval`; the first fetch is
    /// immediate. Updates go to `updates` until cancelled, until the
    /// receiver is dropped, or until the poller itself is dropped.
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn spawn(
        source: Arc<dyn AuditSource>,
        conversation_id: impl Into<String>,
        interval: Duration,
        scope: &PollScope,
        updates: mpsc::UnboundedSender<PollUpdate>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let interval = interval.max(MIN_POLL_INTERVAL);
        let generation = scope.begin();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(RwLock::new(PollStats::default()));

        let handle = tokio::spawn(poll_loop(
            source,
            conversation_id.clone(),
            interval,
            generation,
            scope.clone(),
            shutdown_rx,
            updates,
            Arc::clone(&stats),
        ));
        debug!(generation, conversation_id = %conversation_id, "audit polling started");

        Self {
            generation,
            conversation_id,
            scope: scope.clone(),
            shutdown,
            handle,
            stats,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn stats(&self) -> PollStats {
        self.stats.read().clone()
    }

    /// Stop issuing requests and retire this poller's generation.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
        self.scope.retire(self.generation);
        debug!(generation = self.generation, "audit polling cancelled");
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "audit poll task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop(
    source: Arc<dyn AuditSource>,
    conversation_id: String,
    interval: Duration,
    generation: u64,
    scope: PollScope,
    mut shutdown: watch::Receiver<bool>,
    updates: mpsc::UnboundedSender<PollUpdate>,
    stats: Arc<RwLock<PollStats>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() || !scope.is_current(generation) {
            break;
        }

        let fetched = tokio::select! {
            _ = shutdown.changed() => break,
            fetched = source.fetch_audit(&conversation_id) => fetched,
        };
        if *shutdown.borrow() || !scope.is_current(generation) {
            debug!(generation, "dropping audit response from a retired poll");
            break;
        }

        let now = Utc::now();
        let outcome = {
            let mut stats = stats.write();
            stats.polls += 1;
            match fetched {
                Ok(events) => {
                    stats.last_success = Some(now);
                    PollOutcome::Events(events)
                }
                Err(err) => {
                    stats.failures += 1;
                    stats.last_error = Some(err.to_string());
                    warn!(generation, error = %err, "audit poll failed");
                    PollOutcome::Failed {
                        message: err.to_string(),
                    }
                }
            }
        };

        let update = PollUpdate {
            generation,
            conversation_id: conversation_id.clone(),
            outcome,
            fetched_at: now,
        };
        if updates.send(update).is_err() {
            break;
        }
    }
    debug!(generation, "audit poll loop exited");
}
