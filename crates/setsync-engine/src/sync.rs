//! # Background Sync
//!
//! [`SyncScheduler`] re-fetches flags and the compliance score on a fixed
//! interval and merges them into the store. A failed poll is logged and
//! skipped; the next tick tries again. Fields with a remediation in flight
//! keep their local state.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use setsync_core::FieldKey;

use crate::backend::AuditBackend;
use crate::effect::Effect;
use crate::engine::{ComplianceEngine, FLAGS_ENDPOINT, SCORE_ENDPOINT};

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The poll was merged into the store.
    Merged {
        effects: Vec<Effect>,
        /// Pending fields whose local state was kept.
        preserved: Vec<FieldKey>,
    },
    /// A fetch failed; nothing changed.
    Skipped { reason: String },
    /// Nothing is loaded yet.
    NotLoaded,
}

impl<B: AuditBackend> ComplianceEngine<B> {
    /// Fetch flags and score once and merge them.
    pub async fn poll_once(&self) -> PollOutcome {
        if !self.is_loaded() {
            return PollOutcome::NotLoaded;
        }
        let backend = &self.inner.backend;
        let (flags, score) = tokio::join!(
            self.call(FLAGS_ENDPOINT, backend.fetch_flags()),
            self.call(SCORE_ENDPOINT, backend.fetch_score()),
        );
        let (flags, score) = match (flags, score) {
            (Ok(flags), Ok(score)) => (flags, score),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "background sync failed; keeping current state");
                return PollOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let (effects, preserved) = self.inner.state.write().merge_poll(flags, score);
        if !preserved.is_empty() {
            tracing::debug!(fields = ?preserved, "kept pending fields during sync");
        }
        self.emit(&effects);
        PollOutcome::Merged { effects, preserved }
    }
}

/// Spawns the periodic sync task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncScheduler;

impl SyncScheduler {
    /// Poll at the engine's configured interval.
    pub fn spawn<B: AuditBackend>(engine: ComplianceEngine<B>) -> SyncHandle {
        let period = engine.config().poll_interval;
        Self::spawn_every(engine, period)
    }

    /// Poll every `period`. The first poll happens one period from now.
    pub fn spawn_every<B: AuditBackend>(engine: ComplianceEngine<B>, period: Duration) -> SyncHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match engine.poll_once().await {
                            PollOutcome::Merged { effects, .. } => {
                                tracing::debug!(effects = effects.len(), "background sync merged");
                            }
                            PollOutcome::Skipped { .. } | PollOutcome::NotLoaded => {}
                        }
                    }
                }
            }
            tracing::debug!("background sync stopped");
        });
        SyncHandle {
            task: Some(task),
            shutdown,
        }
    }
}

/// Owns the sync task. Dropping the handle aborts it.
#[derive(Debug)]
pub struct SyncHandle {
    task: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl SyncHandle {
    /// Stop after any in-progress poll has merged. No merge happens after
    /// this returns.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "background sync task panicked");
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
