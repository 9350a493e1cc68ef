pub mod replay;
pub mod store;

pub use replay::{backoff_delay, ReplaySummary};
pub use store::{FileQueueStore, MemoryQueueStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::lifecycle::job::{
    Job, JobDraft, JobId, JobStatus, MechanicId, PartLine, PaymentMethod, Priority, ServiceType,
};

/// Status patch pushed to the remote store: the post-transition values of
/// every field a lifecycle event can touch. `status: None` is a pure field
/// edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<JobStatus>,
    pub mechanic_id: Option<MechanicId>,
    pub priority: Priority,
    pub customer_name: String,
    pub vehicle: String,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub estimated_min: i64,
    pub actual_min: Option<i64>,
    pub labor_charge_cents: Option<i64>,
    pub total_cost_cents: Option<i64>,
    pub parts_needed: Vec<PartLine>,
    pub parts_used: Vec<PartLine>,
    pub services: Vec<ServiceType>,
    pub checkin_parts: Vec<String>,
}

impl StatusUpdate {
    /// Snapshot the mutable fields of a job after a transition.
    pub fn of(job: &Job) -> Self {
        Self {
            status: Some(job.status),
            mechanic_id: job.mechanic_id.clone(),
            priority: job.priority,
            customer_name: job.customer_name.clone(),
            vehicle: job.vehicle.clone(),
            started_at: job.started_at,
            paused_at: job.paused_at,
            completed_at: job.completed_at,
            paid_at: job.paid_at,
            payment_method: job.payment_method,
            estimated_min: job.estimated_min,
            actual_min: job.actual_min,
            labor_charge_cents: job.labor_charge_cents,
            total_cost_cents: job.total_cost_cents,
            parts_needed: job.parts_needed.clone(),
            parts_used: job.parts_used.clone(),
            services: job.services.clone(),
            checkin_parts: job.checkin_parts.clone(),
        }
    }

    /// Field-only patch: same snapshot without a status change.
    pub fn edit(job: &Job) -> Self {
        let mut update = Self::of(job);
        update.status = None;
        update
    }
}

/// One not-yet-confirmed remote operation. A closed union so replay
/// dispatch is matched exhaustively instead of keying on action strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Create { local_id: JobId, draft: JobDraft },
    UpdateStatus { job_id: JobId, update: StatusUpdate },
    Assign { job_id: JobId, mechanic_id: MechanicId },
    Pay { job_id: JobId, method: PaymentMethod },
}

impl Mutation {
    pub fn job_id(&self) -> &JobId {
        match self {
            Mutation::Create { local_id, .. } => local_id,
            Mutation::UpdateStatus { job_id, .. } => job_id,
            Mutation::Assign { job_id, .. } => job_id,
            Mutation::Pay { job_id, .. } => job_id,
        }
    }

    pub(crate) fn job_id_mut(&mut self) -> &mut JobId {
        match self {
            Mutation::Create { local_id, .. } => local_id,
            Mutation::UpdateStatus { job_id, .. } => job_id,
            Mutation::Assign { job_id, .. } => job_id,
            Mutation::Pay { job_id, .. } => job_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create_job",
            Mutation::UpdateStatus { .. } => "update_job_status",
            Mutation::Assign { .. } => "assign_job",
            Mutation::Pay { .. } => "process_payment",
        }
    }
}

/// One queued mutation with its retry metadata. Destroyed only by a
/// successful replay; transient failures just bump the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub mutation: Mutation,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(mutation: Mutation) -> Self {
        Self {
            id: Uuid::new_v4(),
            mutation,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}

/// Derived queue health, recomputed from the store's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Pending,
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Durable, ordered store of pending remote mutations.
///
/// Append-only FIFO; items are removed only by successful replay. An item
/// whose retry count reaches the configured threshold is "failed": it is
/// excluded from `list_retryable` until `reset_failed` restores it.
pub trait QueueStore: Send + Sync {
    fn append(&self, item: QueueItem) -> Result<()>;

    /// Items still eligible for automatic replay, oldest first.
    fn list_retryable(&self) -> Result<Vec<QueueItem>>;

    fn remove(&self, id: &Uuid) -> Result<()>;

    fn increment_retry(&self, id: &Uuid, error: &str) -> Result<()>;

    /// Jump an item straight past the retry threshold. Used when the
    /// server rejects a mutation permanently.
    fn mark_failed(&self, id: &Uuid, error: &str) -> Result<()>;

    fn count(&self) -> usize;

    fn failed_count(&self) -> usize;

    /// Restore failed items to retryable by resetting their counters.
    fn reset_failed(&self) -> Result<()>;

    /// Rewrite job references after an offline create is confirmed.
    fn retarget(&self, old: &JobId, new: &JobId) -> Result<()>;

    /// Change-notification hook: the revision bumps on every queue change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}
