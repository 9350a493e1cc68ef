use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::board::JobBoard;
use crate::config::EngineConfig;
use crate::reconcile;
use crate::remote::JobStore;

/// Fallback poller for clients the push channel cannot reach.
///
/// Polls immediately on becoming eligible, then on a fixed interval;
/// suspends while the liveness signal is false and polls again the moment
/// it comes back. Mechanics refresh on a coarser cycle than jobs to bound
/// request volume, and at most one job poll is in flight at a time.
pub struct Poller {
    remote: Arc<dyn JobStore>,
    board: Arc<RwLock<JobBoard>>,
    visible: watch::Receiver<bool>,
    config: EngineConfig,
    jobs_in_flight: AtomicBool,
    mechanics_in_flight: AtomicBool,
}

impl Poller {
    pub fn new(
        remote: Arc<dyn JobStore>,
        board: Arc<RwLock<JobBoard>>,
        visible: watch::Receiver<bool>,
        config: EngineConfig,
    ) -> Self {
        Self {
            remote,
            board,
            visible,
            config,
            jobs_in_flight: AtomicBool::new(false),
            mechanics_in_flight: AtomicBool::new(false),
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut visible = self.visible.clone();
        let mut is_visible = *visible.borrow();
        let mut jobs_tick = tokio::time::interval(self.config.poll_interval);
        let mut mechanics_tick = tokio::time::interval(self.config.mechanic_poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = visible.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    is_visible = *visible.borrow_and_update();
                    if is_visible {
                        // Catch up immediately after being hidden.
                        self.poll_jobs().await;
                        jobs_tick.reset();
                    }
                }
                _ = jobs_tick.tick(), if is_visible => {
                    self.poll_jobs().await;
                }
                _ = mechanics_tick.tick(), if is_visible => {
                    self.poll_mechanics().await;
                }
            }
        }
    }

    /// Fetch today's jobs and reconcile them into the board. Concurrent
    /// calls collapse: a poll that lands while one is in flight is
    /// dropped.
    pub async fn poll_jobs(&self) {
        if self.jobs_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("job poll already in flight, skipping");
            return;
        }
        let today = Utc::now().date_naive();
        match self.remote.jobs_for_date(today).await {
            Ok(jobs) => {
                let count = jobs.len();
                reconcile::apply_job_snapshot(&mut *self.board.write().await, jobs);
                tracing::debug!(count, "job poll reconciled");
            }
            Err(e) => tracing::warn!(error = %e, "job poll failed"),
        }
        self.jobs_in_flight.store(false, Ordering::SeqCst);
    }

    /// Refresh the mechanic roster. Collapses like `poll_jobs`: at most
    /// one roster fetch in flight.
    pub async fn poll_mechanics(&self) {
        if self.mechanics_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("mechanic poll already in flight, skipping");
            return;
        }
        match self.remote.mechanics().await {
            Ok(mechanics) => {
                reconcile::apply_mechanic_snapshot(&mut *self.board.write().await, mechanics);
            }
            Err(e) => tracing::warn!(error = %e, "mechanic poll failed"),
        }
        self.mechanics_in_flight.store(false, Ordering::SeqCst);
    }
}
