use std::collections::HashMap;

use crate::lifecycle::assigner::Candidate;
use crate::lifecycle::job::{DutyStatus, Job, JobId, JobStatus, Mechanic, MechanicId};

/// Local working set of jobs and mechanics for the current day.
///
/// Written only by the mutation pipeline and the reconciler; everything
/// else reads. Jobs are never deleted here except by an inbound delete
/// event or a temp-id retarget.
#[derive(Debug, Default)]
pub struct JobBoard {
    jobs: HashMap<JobId, Job>,
    mechanics: HashMap<MechanicId, Mechanic>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Insert or replace a job, returning the prior record if any.
    pub fn insert_job(&mut self, job: Job) -> Option<Job> {
        self.jobs.insert(job.id.clone(), job)
    }

    pub fn remove_job(&mut self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id)
    }

    /// All jobs sorted chronologically by creation time.
    pub fn all_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    pub fn jobs_for_mechanic(&self, id: &MechanicId) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|j| j.mechanic_id.as_ref() == Some(id))
            .collect()
    }

    pub fn mechanic_has_in_progress(&self, id: &MechanicId) -> bool {
        self.jobs
            .values()
            .any(|j| j.status == JobStatus::InProgress && j.mechanic_id.as_ref() == Some(id))
    }

    pub fn mechanic(&self, id: &MechanicId) -> Option<&Mechanic> {
        self.mechanics.get(id)
    }

    pub fn upsert_mechanic(&mut self, mechanic: Mechanic) {
        self.mechanics.insert(mechanic.id.clone(), mechanic);
    }

    pub fn set_duty(&mut self, id: &MechanicId, status: DutyStatus) -> bool {
        if let Some(mechanic) = self.mechanics.get_mut(id) {
            mechanic.status = status;
            true
        } else {
            false
        }
    }

    /// On-duty mechanics with their current load, for the assignment
    /// scorer. Ordered by mechanic id so tie-breaks are deterministic.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut ids: Vec<&MechanicId> = self
            .mechanics
            .values()
            .filter(|m| m.status == DutyStatus::OnDuty)
            .map(|m| &m.id)
            .collect();
        ids.sort();

        ids.into_iter()
            .map(|id| {
                let active: Vec<&Job> = self
                    .jobs
                    .values()
                    .filter(|j| j.is_active() && j.mechanic_id.as_ref() == Some(id))
                    .collect();
                let hours = active.iter().map(|j| j.estimated_min as f64 / 60.0).sum();
                Candidate {
                    id: id.clone(),
                    level: self.mechanics[id].level,
                    active_jobs: active.len(),
                    active_hours: hours,
                }
            })
            .collect()
    }

    /// Swap a temporary local id for the server-assigned identity once an
    /// offline create is confirmed. Local field values win: any offline
    /// mutations applied after the create are still queued behind it and
    /// will reach the server under the new id.
    pub fn retarget_job(&mut self, temp: &JobId, confirmed: Job) {
        match self.jobs.remove(temp) {
            Some(mut local) => {
                local.id = confirmed.id.clone();
                local.created_at = confirmed.created_at;
                self.jobs.insert(local.id.clone(), local);
            }
            None => {
                self.jobs.insert(confirmed.id.clone(), confirmed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
