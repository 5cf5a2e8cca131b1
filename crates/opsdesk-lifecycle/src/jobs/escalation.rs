//! Escalation sweep job.
//!
//! Periodically scans unresolved trackings whose escalation deadline has
//! passed and flips the one-way `is_escalated` flag, emitting an
//! `SlaEscalated` event per flip. The flip is claimed through
//! [`TicketRepository::mark_escalated`], so the sweep is idempotent and
//! safe to run from multiple concurrent workers: whoever loses the claim
//! simply skips the event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::events::{EventSink, TicketEvent};
use crate::services::ticket::TicketRepository;

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default batch size per scan.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Statistics from one sweep cycle.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Trackings examined.
    pub scanned: usize,
    /// Flags newly flipped.
    pub escalated: usize,
    /// Claims lost to a concurrent worker or already-flipped rows.
    pub skipped: usize,
    /// Failed operations.
    pub failed: usize,
}

impl SweepStats {
    /// Merge stats from another batch.
    pub fn merge(&mut self, other: &SweepStats) {
        self.scanned += other.scanned;
        self.escalated += other.escalated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// The periodic escalation sweep.
pub struct EscalationSweepJob {
    repo: Arc<dyn TicketRepository>,
    events: Arc<dyn EventSink>,
    batch_size: i64,
    shutdown: Arc<AtomicBool>,
}

impl EscalationSweepJob {
    /// Create a sweep over a repository and event sink.
    pub fn new(repo: Arc<dyn TicketRepository>, events: Arc<dyn EventSink>) -> Self {
        Self {
            repo,
            events,
            batch_size: DEFAULT_BATCH_SIZE,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run a single sweep cycle.
    #[instrument(skip(self))]
    pub async fn poll(&self) -> Result<SweepStats> {
        let now = Utc::now();
        let mut stats = SweepStats::default();

        loop {
            let candidates = self.repo.escalation_candidates(now, self.batch_size).await?;
            if candidates.is_empty() {
                break;
            }
            let batch_len = candidates.len();

            let mut batch = SweepStats::default();
            for tracking in candidates {
                batch.scanned += 1;
                match self
                    .repo
                    .mark_escalated(tracking.tenant_id, tracking.ticket_id)
                    .await
                {
                    Ok(true) => {
                        batch.escalated += 1;
                        if let Some(escalation_due_at) = tracking.escalation_due_at {
                            if let Err(e) = self
                                .events
                                .publish(TicketEvent::SlaEscalated {
                                    ticket_id: tracking.ticket_id,
                                    tenant_id: tracking.tenant_id,
                                    escalation_due_at,
                                })
                                .await
                            {
                                error!(
                                    ticket_id = %tracking.ticket_id,
                                    error = %e,
                                    "failed to publish escalation event"
                                );
                            }
                        }
                    }
                    Ok(false) => batch.skipped += 1,
                    Err(e) => {
                        batch.failed += 1;
                        error!(
                            ticket_id = %tracking.ticket_id,
                            error = %e,
                            "failed to mark tracking escalated"
                        );
                    }
                }
            }
            stats.merge(&batch);

            // A short batch means the backlog is drained. A batch where
            // nothing advanced means every row is contested; stop rather
            // than spin against the same rows.
            if batch_len < self.batch_size as usize || batch.escalated == 0 {
                break;
            }
        }

        if stats.scanned > 0 {
            info!(
                scanned = stats.scanned,
                escalated = stats.escalated,
                skipped = stats.skipped,
                failed = stats.failed,
                "escalation sweep cycle complete"
            );
        } else {
            debug!("no escalation candidates");
        }

        Ok(stats)
    }

    /// Run the sweep on an interval until [`Self::shutdown`] is called.
    ///
    /// A failed cycle is logged and the next tick proceeds; the sweep
    /// never takes interactive request paths down with it.
    pub async fn run(&self, poll_interval_secs: u64) {
        info!(
            poll_interval_secs,
            batch_size = self.batch_size,
            "starting escalation sweep"
        );
        let mut ticker = interval(Duration::from_secs(poll_interval_secs.max(1)));
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                info!("escalation sweep stopped");
                break;
            }
            if let Err(e) = self.poll().await {
                error!(error = %e, "escalation sweep cycle failed");
            }
        }
    }

    /// Request a graceful stop of [`Self::run`].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
