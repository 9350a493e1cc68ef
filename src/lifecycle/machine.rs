use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};
use crate::lifecycle::job::{Job, JobFields, JobStatus, MechanicId, PartLine, PaymentMethod};

/// Facts about surrounding state that individual transitions guard on.
/// The engine computes these from the board so the machine stays pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guards {
    /// The target mechanic is currently on duty (assign).
    pub mechanic_on_duty: bool,
    /// The acting mechanic already holds an in_progress job (start).
    pub actor_busy: bool,
}

/// One lifecycle event. A closed union so every edge of the transition
/// table is matched exhaustively.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Assign { mechanic_id: MechanicId },
    Start { mechanic_id: MechanicId, at: DateTime<Utc> },
    RequestParts { parts: Vec<PartLine>, at: DateTime<Utc> },
    PartsArrived,
    Pause { at: DateTime<Utc> },
    Resume,
    Complete { at: DateTime<Utc> },
    QcPass,
    QcFail,
    Pay { method: PaymentMethod, at: DateTime<Utc> },
    Reassign { mechanic_id: MechanicId },
    Edit { fields: JobFields },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Assign { .. } => "assign",
            JobEvent::Start { .. } => "start",
            JobEvent::RequestParts { .. } => "request_parts",
            JobEvent::PartsArrived => "parts_arrived",
            JobEvent::Pause { .. } => "pause",
            JobEvent::Resume => "resume",
            JobEvent::Complete { .. } => "complete",
            JobEvent::QcPass => "qc_pass",
            JobEvent::QcFail => "qc_fail",
            JobEvent::Pay { .. } => "pay",
            JobEvent::Reassign { .. } => "reassign",
            JobEvent::Edit { .. } => "edit",
        }
    }
}

/// Elapsed whole minutes between two instants, rounded half-up.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    ((end - start).num_milliseconds() as f64 / 60_000.0).round() as i64
}

/// Apply one lifecycle event to a job, returning the updated record.
///
/// Pure: the same inputs always produce the same output. An illegal
/// transition returns an error and leaves the input untouched, so callers
/// can reject synchronously before any local or remote write.
pub fn apply(job: &Job, event: &JobEvent, guards: &Guards) -> Result<Job> {
    let mut next = job.clone();
    match (job.status, event) {
        (JobStatus::Received, JobEvent::Assign { mechanic_id }) => {
            if !guards.mechanic_on_duty {
                return Err(SyncError::OffDuty(mechanic_id.clone()));
            }
            next.status = JobStatus::Assigned;
            next.mechanic_id = Some(mechanic_id.clone());
        }
        (JobStatus::Received | JobStatus::Assigned, JobEvent::Start { mechanic_id, at }) => {
            if guards.actor_busy {
                return Err(SyncError::MechanicBusy(mechanic_id.clone()));
            }
            next.status = JobStatus::InProgress;
            next.started_at = Some(*at);
            // Self-pick from `received` claims the job for the actor.
            next.mechanic_id = Some(mechanic_id.clone());
        }
        (JobStatus::InProgress, JobEvent::RequestParts { parts, at }) => {
            next.status = JobStatus::PartsPending;
            next.parts_needed = parts.clone();
            next.paused_at = Some(*at);
        }
        (JobStatus::PartsPending, JobEvent::PartsArrived) => {
            next.status = JobStatus::InProgress;
            next.paused_at = None;
        }
        // Pause does not change status, only marks the clock stopped.
        (JobStatus::InProgress, JobEvent::Pause { at }) => {
            next.paused_at = Some(*at);
        }
        (JobStatus::InProgress, JobEvent::Resume) => {
            next.paused_at = None;
        }
        (JobStatus::InProgress, JobEvent::Complete { at }) => {
            let started = job
                .started_at
                .ok_or_else(|| SyncError::Validation("job has no start time".into()))?;
            next.status = if job.service.requires_qc {
                JobStatus::QualityCheck
            } else {
                JobStatus::Ready
            };
            next.completed_at = Some(*at);
            next.actual_min = Some(elapsed_minutes(started, *at));
            next.total_cost_cents = Some(
                next.parts_subtotal_cents()
                    + job.labor_charge_cents.unwrap_or(job.service.price_cents),
            );
        }
        (JobStatus::QualityCheck, JobEvent::QcPass) => {
            next.status = JobStatus::Ready;
        }
        (JobStatus::QualityCheck, JobEvent::QcFail) => {
            next.status = JobStatus::InProgress;
            next.completed_at = None;
            next.actual_min = None;
        }
        (JobStatus::Ready, JobEvent::Pay { method, at }) => {
            next.status = JobStatus::Completed;
            next.payment_method = Some(*method);
            next.paid_at = Some(*at);
        }
        (JobStatus::Assigned, JobEvent::Reassign { mechanic_id }) => {
            next.mechanic_id = Some(mechanic_id.clone());
        }
        (JobStatus::InProgress, JobEvent::Reassign { mechanic_id }) => {
            next.status = JobStatus::Assigned;
            next.mechanic_id = Some(mechanic_id.clone());
            next.started_at = None;
        }
        // Field edits are only permitted before assignment.
        (JobStatus::Received, JobEvent::Edit { fields }) => {
            next.apply_fields(fields);
        }
        (from, event) => {
            return Err(SyncError::IllegalTransition {
                from,
                event: event.name(),
            })
        }
    }
    Ok(next)
}
