use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::Result;
use crate::lifecycle::job::{DutyStatus, Job, JobDraft, JobId, Mechanic, MechanicId, PaymentMethod};
use crate::queue::StatusUpdate;

/// Remote job store the pipeline confirms mutations against.
///
/// Implementations surface `SyncError::Validation` for rejected input and
/// `SyncError::Remote` for transient network/server failures; the replay
/// loop retries only the latter.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, draft: &JobDraft) -> Result<Job>;

    async fn update_job_status(&self, id: &JobId, update: &StatusUpdate) -> Result<()>;

    async fn assign_job(&self, id: &JobId, mechanic_id: &MechanicId) -> Result<()>;

    async fn process_payment(&self, id: &JobId, method: PaymentMethod) -> Result<()>;

    async fn jobs_for_date(&self, date: NaiveDate) -> Result<Vec<Job>>;

    async fn mechanics(&self) -> Result<Vec<Mechanic>>;
}

/// Fire-and-forget audit/bookkeeping sink. The pipeline swallows errors
/// from this trait; a failing sink never blocks a mutation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, action: &str, details: Value) -> Result<()>;
}

/// Sink for deployments without a bookkeeping mirror.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn log(&self, _action: &str, _details: Value) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One change-feed event for a job matching today's date.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub new: Option<Job>,
    pub old: Option<Job>,
}

/// Duty-status-only change for a mechanic.
#[derive(Debug, Clone)]
pub struct MechanicEvent {
    pub id: MechanicId,
    pub status: DutyStatus,
}
