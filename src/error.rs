use thiserror::Error;

use crate::lifecycle::job::{JobId, JobStatus, MechanicId};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("illegal transition: cannot {event} a job in status {from}")]
    IllegalTransition { from: JobStatus, event: &'static str },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("mechanic not found: {0}")]
    MechanicNotFound(MechanicId),

    #[error("mechanic {0} is off duty")]
    OffDuty(MechanicId),

    #[error("mechanic {0} already has a job in progress")]
    MechanicBusy(MechanicId),

    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("queue store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Transient errors are retried by queue replay; everything else is a
    /// permanent rejection.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Remote(_) | SyncError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
