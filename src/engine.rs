use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc, Weekday};
use serde_json::json;
use tokio::sync::{watch, RwLock};

use crate::board::JobBoard;
use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::lifecycle::assigner;
use crate::lifecycle::job::{
    DutyStatus, Job, JobDraft, JobFields, JobId, MechanicId, PartLine, PaymentMethod, ServiceKind,
};
use crate::lifecycle::machine::{self, Guards, JobEvent};
use crate::queue::{
    backoff_delay, Mutation, QueueItem, QueueStore, ReplaySummary, StatusUpdate, SyncStatus,
};
use crate::reconcile;
use crate::remote::{AuditSink, ChangeEvent, JobStore, MechanicEvent};

/// Who is asking. Passed explicitly to every pipeline operation instead of
/// being read from ambient state, so operations stay testable and the
/// caller identity travels with the call.
#[derive(Debug, Clone)]
pub struct Session {
    pub actor: String,
    pub mechanic_id: Option<MechanicId>,
}

impl Session {
    pub fn staff(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            mechanic_id: None,
        }
    }

    pub fn mechanic(actor: impl Into<String>, mechanic_id: MechanicId) -> Self {
        Self {
            actor: actor.into(),
            mechanic_id: Some(mechanic_id),
        }
    }

    fn require_mechanic(&self) -> Result<&MechanicId> {
        self.mechanic_id
            .as_ref()
            .ok_or_else(|| SyncError::Validation("operation requires a mechanic session".into()))
    }
}

/// Result of one pipeline mutation. `deferred` means the device was
/// offline: the change is applied locally and queued for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub job_id: JobId,
    pub deferred: bool,
}

/// Inverse of one optimistic write. Reverting restores the board to its
/// pre-mutation state, so rollback is a property of the command rather
/// than a hand-derived inverse at each call site.
enum Reversal {
    Replace(Job),
    Remove(JobId),
}

impl Reversal {
    fn revert(self, board: &mut JobBoard) {
        match self {
            Reversal::Replace(prev) => {
                board.insert_job(prev);
            }
            Reversal::Remove(id) => {
                board.remove_job(&id);
            }
        }
    }
}

/// The job-lifecycle synchronization engine.
///
/// Every mutating operation follows the same contract: validate against
/// the state machine, apply the new state to the board immediately, then
/// either queue the operation (offline) or confirm it remotely (online),
/// rolling the board back if the server rejects it.
pub struct SyncEngine {
    board: Arc<RwLock<JobBoard>>,
    queue: Arc<dyn QueueStore>,
    remote: Arc<dyn JobStore>,
    audit: Arc<dyn AuditSink>,
    online: watch::Receiver<bool>,
    config: EngineConfig,
    replaying: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        board: Arc<RwLock<JobBoard>>,
        queue: Arc<dyn QueueStore>,
        remote: Arc<dyn JobStore>,
        audit: Arc<dyn AuditSink>,
        online: watch::Receiver<bool>,
        config: EngineConfig,
    ) -> Self {
        Self {
            board,
            queue,
            remote,
            audit,
            online,
            config,
            replaying: AtomicBool::new(false),
        }
    }

    pub fn board(&self) -> Arc<RwLock<JobBoard>> {
        self.board.clone()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Derived queue health. Recomputed from the store on every call; the
    /// store's change hook tells observers when to re-read it.
    pub fn sync_status(&self) -> SyncStatus {
        if self.replaying.load(Ordering::SeqCst) {
            return SyncStatus::Syncing;
        }
        if self.queue.count() == 0 {
            SyncStatus::Idle
        } else if self.queue.failed_count() > 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::Pending
        }
    }

    // ------------------------------------------------------------------
    // Pipeline operations
    // ------------------------------------------------------------------

    /// Check a vehicle in, creating a new job in `received`.
    ///
    /// Offline creates carry a `temp-` identifier that is swapped for the
    /// server id once the queued create replays.
    pub async fn check_in(&self, session: &Session, draft: JobDraft) -> Result<MutationOutcome> {
        if draft.customer_name.trim().is_empty() {
            return Err(SyncError::Validation("customer name is required".into()));
        }
        if draft.vehicle.trim().is_empty() {
            return Err(SyncError::Validation("vehicle is required".into()));
        }

        let local_id = JobId::temp();
        let job = Job::from_draft(local_id.clone(), &draft, Utc::now());
        self.board.write().await.insert_job(job);

        if !self.is_online() {
            let item = QueueItem::new(Mutation::Create {
                local_id: local_id.clone(),
                draft,
            });
            // An unqueued mutation would be lost on restart: undo the
            // optimistic write rather than keep a record the server will
            // never hear about.
            if let Err(e) = self.queue.append(item) {
                Reversal::Remove(local_id.clone()).revert(&mut *self.board.write().await);
                tracing::warn!(job_id = %local_id, error = %e, "offline create not queued, rolled back");
                return Err(e);
            }
            tracing::info!(job_id = %local_id, "job created offline, queued for sync");
            return Ok(MutationOutcome {
                job_id: local_id,
                deferred: true,
            });
        }

        match self.remote.create_job(&draft).await {
            Ok(confirmed) => {
                let job_id = confirmed.id.clone();
                self.board.write().await.retarget_job(&local_id, confirmed);
                tracing::info!(job_id = %job_id, "job checked in");
                self.audit(
                    session,
                    "job.check_in".to_string(),
                    json!({ "job_id": job_id.as_str() }),
                );
                Ok(MutationOutcome {
                    job_id,
                    deferred: false,
                })
            }
            Err(e) => {
                Reversal::Remove(local_id).revert(&mut *self.board.write().await);
                Err(e)
            }
        }
    }

    /// Assign a job to an on-duty mechanic.
    pub async fn assign(
        &self,
        session: &Session,
        job_id: &JobId,
        mechanic_id: MechanicId,
    ) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Assign { mechanic_id })
            .await
    }

    /// Mechanic picks a job for themselves and starts work.
    pub async fn pick(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        let mechanic_id = session.require_mechanic()?.clone();
        self.transition(
            session,
            job_id,
            JobEvent::Start {
                mechanic_id,
                at: Utc::now(),
            },
        )
        .await
    }

    /// Start work on a job for an explicit mechanic.
    pub async fn start(
        &self,
        session: &Session,
        job_id: &JobId,
        mechanic_id: MechanicId,
    ) -> Result<MutationOutcome> {
        self.transition(
            session,
            job_id,
            JobEvent::Start {
                mechanic_id,
                at: Utc::now(),
            },
        )
        .await
    }

    pub async fn request_parts(
        &self,
        session: &Session,
        job_id: &JobId,
        parts: Vec<PartLine>,
    ) -> Result<MutationOutcome> {
        self.transition(
            session,
            job_id,
            JobEvent::RequestParts {
                parts,
                at: Utc::now(),
            },
        )
        .await
    }

    pub async fn parts_arrived(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::PartsArrived).await
    }

    pub async fn pause(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Pause { at: Utc::now() })
            .await
    }

    pub async fn resume(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Resume).await
    }

    /// Complete the work. Routes to `quality_check` or `ready` depending
    /// on the service type, and settles time and cost fields.
    pub async fn complete(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Complete { at: Utc::now() })
            .await
    }

    pub async fn qc_pass(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::QcPass).await
    }

    pub async fn qc_fail(&self, session: &Session, job_id: &JobId) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::QcFail).await
    }

    pub async fn pay(
        &self,
        session: &Session,
        job_id: &JobId,
        method: PaymentMethod,
    ) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Pay { method, at: Utc::now() })
            .await
    }

    pub async fn reassign(
        &self,
        session: &Session,
        job_id: &JobId,
        mechanic_id: MechanicId,
    ) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Reassign { mechanic_id })
            .await
    }

    /// Edit job fields. Only legal while the job is still `received`.
    pub async fn edit_job(
        &self,
        session: &Session,
        job_id: &JobId,
        fields: JobFields,
    ) -> Result<MutationOutcome> {
        self.transition(session, job_id, JobEvent::Edit { fields })
            .await
    }

    /// Suggest the best mechanic for a new job of the given kind, based on
    /// the current board. Runs the pure scorer; calling it again without
    /// intervening state changes yields the same answer.
    pub async fn suggest_mechanic(&self, service: ServiceKind) -> Option<MechanicId> {
        let board = self.board.read().await;
        let candidates = board.candidates();
        let weekend = matches!(Utc::now().weekday(), Weekday::Sat | Weekday::Sun);
        assigner::suggest_mechanic(&candidates, service, weekend)
    }

    // ------------------------------------------------------------------
    // Queue replay
    // ------------------------------------------------------------------

    /// Replay queued mutations in FIFO order. Non-reentrant: a call while
    /// a pass is in flight returns immediately with `skipped`.
    pub async fn replay(&self) -> Result<ReplaySummary> {
        if self.replaying.swap(true, Ordering::SeqCst) {
            return Ok(ReplaySummary {
                skipped: true,
                ..ReplaySummary::default()
            });
        }
        let result = self.replay_pass().await;
        self.replaying.store(false, Ordering::SeqCst);
        result
    }

    async fn replay_pass(&self) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for item in self.queue.list_retryable()? {
            if !self.is_online() {
                tracing::info!("went offline mid-replay, stopping pass");
                break;
            }
            if item.retry_count > 0 {
                tokio::time::sleep(backoff_delay(item.retry_count, &self.config)).await;
            }
            match self.push_remote(&item.mutation).await {
                Ok(confirmed) => {
                    self.queue.remove(&item.id)?;
                    summary.replayed += 1;
                    if let (Mutation::Create { local_id, .. }, Some(job)) =
                        (&item.mutation, confirmed)
                    {
                        self.adopt_server_id(local_id, job).await?;
                    }
                    tracing::info!(action = item.mutation.action(), "queued mutation replayed");
                }
                Err(e) if e.is_transient() => {
                    let retries = item.retry_count + 1;
                    self.queue.increment_retry(&item.id, &e.to_string())?;
                    tracing::warn!(
                        action = item.mutation.action(),
                        error = %e,
                        retries,
                        "queued mutation failed"
                    );
                    if retries >= self.config.retry_threshold {
                        // Past the threshold the item no longer blocks the
                        // queue; it waits for a manual retry.
                        summary.failed += 1;
                        continue;
                    }
                    // Below the threshold, stop to preserve FIFO order.
                    // The item is retried on the next replay trigger.
                    break;
                }
                Err(e) => {
                    self.queue.mark_failed(&item.id, &e.to_string())?;
                    summary.failed += 1;
                    tracing::warn!(
                        action = item.mutation.action(),
                        error = %e,
                        "queued mutation rejected permanently"
                    );
                }
            }
        }
        summary.remaining = self.queue.count();
        Ok(summary)
    }

    /// Restore failed items to retryable and run a replay pass.
    pub async fn retry_failed(&self) -> Result<ReplaySummary> {
        self.queue.reset_failed()?;
        self.replay().await
    }

    async fn push_remote(&self, mutation: &Mutation) -> Result<Option<Job>> {
        match mutation {
            Mutation::Create { draft, .. } => self.remote.create_job(draft).await.map(Some),
            Mutation::UpdateStatus { job_id, update } => self
                .remote
                .update_job_status(job_id, update)
                .await
                .map(|()| None),
            Mutation::Assign { job_id, mechanic_id } => self
                .remote
                .assign_job(job_id, mechanic_id)
                .await
                .map(|()| None),
            Mutation::Pay { job_id, method } => self
                .remote
                .process_payment(job_id, *method)
                .await
                .map(|()| None),
        }
    }

    /// Swap a confirmed offline create's temp id for the server id on the
    /// board and in every queued mutation that still references it.
    async fn adopt_server_id(&self, temp: &JobId, confirmed: Job) -> Result<()> {
        let server_id = confirmed.id.clone();
        self.board.write().await.retarget_job(temp, confirmed);
        self.queue.retarget(temp, &server_id)?;
        tracing::info!(temp = %temp, job_id = %server_id, "temporary id retargeted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reconciliation entry points
    // ------------------------------------------------------------------

    /// Fold one push event into the board.
    pub async fn handle_change(&self, event: ChangeEvent) {
        reconcile::apply_change(&mut *self.board.write().await, event);
    }

    pub async fn handle_mechanic_change(&self, event: MechanicEvent) {
        reconcile::apply_mechanic_change(&mut *self.board.write().await, event);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn transition(
        &self,
        session: &Session,
        job_id: &JobId,
        event: JobEvent,
    ) -> Result<MutationOutcome> {
        // Validate and apply optimistically under one write lock, keeping
        // the pre-image for rollback.
        let (next, reversal) = {
            let mut board = self.board.write().await;
            let prev = board
                .job(job_id)
                .cloned()
                .ok_or_else(|| SyncError::JobNotFound(job_id.clone()))?;
            let guards = Self::guards_for(&board, &event)?;
            let next = machine::apply(&prev, &event, &guards)?;
            board.insert_job(next.clone());
            (next, Reversal::Replace(prev))
        };

        let mutation = Self::mutation_for(job_id, &event, &next);

        if !self.is_online() {
            if let Err(e) = self.queue.append(QueueItem::new(mutation)) {
                reversal.revert(&mut *self.board.write().await);
                tracing::warn!(job_id = %job_id, event = event.name(), error = %e, "mutation not queued, rolled back");
                return Err(e);
            }
            tracing::info!(job_id = %job_id, event = event.name(), "mutation queued (offline)");
            return Ok(MutationOutcome {
                job_id: job_id.clone(),
                deferred: true,
            });
        }

        match self.push_remote(&mutation).await {
            Ok(_) => {
                tracing::debug!(job_id = %job_id, status = %next.status, event = event.name(), "mutation confirmed");
                self.audit(
                    session,
                    format!("job.{}", event.name()),
                    json!({ "job_id": job_id.as_str(), "status": next.status.to_string() }),
                );
                Ok(MutationOutcome {
                    job_id: job_id.clone(),
                    deferred: false,
                })
            }
            Err(e) => {
                reversal.revert(&mut *self.board.write().await);
                tracing::warn!(job_id = %job_id, event = event.name(), error = %e, "mutation rolled back");
                Err(e)
            }
        }
    }

    /// Compute the state-machine guards an event needs from board state.
    fn guards_for(board: &JobBoard, event: &JobEvent) -> Result<Guards> {
        Ok(match event {
            JobEvent::Assign { mechanic_id } | JobEvent::Reassign { mechanic_id } => {
                let mechanic = board
                    .mechanic(mechanic_id)
                    .ok_or_else(|| SyncError::MechanicNotFound(mechanic_id.clone()))?;
                Guards {
                    mechanic_on_duty: mechanic.status == DutyStatus::OnDuty,
                    actor_busy: false,
                }
            }
            JobEvent::Start { mechanic_id, .. } => Guards {
                mechanic_on_duty: true,
                actor_busy: board.mechanic_has_in_progress(mechanic_id),
            },
            _ => Guards::default(),
        })
    }

    /// Map a validated transition onto the remote operation that confirms
    /// it.
    fn mutation_for(job_id: &JobId, event: &JobEvent, next: &Job) -> Mutation {
        match event {
            JobEvent::Assign { mechanic_id } | JobEvent::Reassign { mechanic_id } => {
                Mutation::Assign {
                    job_id: job_id.clone(),
                    mechanic_id: mechanic_id.clone(),
                }
            }
            JobEvent::Pay { method, .. } => Mutation::Pay {
                job_id: job_id.clone(),
                method: *method,
            },
            JobEvent::Edit { .. } => Mutation::UpdateStatus {
                job_id: job_id.clone(),
                update: StatusUpdate::edit(next),
            },
            _ => Mutation::UpdateStatus {
                job_id: job_id.clone(),
                update: StatusUpdate::of(next),
            },
        }
    }

    /// Fire-and-forget bookkeeping entry. Failures are logged and
    /// swallowed; the pipeline never blocks on the sink.
    fn audit(&self, session: &Session, action: String, details: serde_json::Value) {
        let audit = self.audit.clone();
        let actor = session.actor.clone();
        tokio::spawn(async move {
            let details = json!({ "actor": actor, "details": details });
            if let Err(e) = audit.log(&action, details).await {
                tracing::debug!(action, error = %e, "audit entry dropped");
            }
        });
    }
}
