use crate::board::JobBoard;
use crate::lifecycle::job::{Job, Mechanic};
use crate::remote::{ChangeEvent, ChangeKind, MechanicEvent};

/// Merge an inbound job payload into the locally-known record.
///
/// Scalar fields take the inbound value. Collection fields keep local data
/// when the inbound payload carries an empty list and the local one does
/// not: a narrower event payload must not erase richer local state.
pub fn merge_job(local: &Job, inbound: Job) -> Job {
    let mut merged = inbound;
    if merged.services.is_empty() && !local.services.is_empty() {
        merged.services = local.services.clone();
    }
    if merged.parts_used.is_empty() && !local.parts_used.is_empty() {
        merged.parts_used = local.parts_used.clone();
    }
    if merged.parts_needed.is_empty() && !local.parts_needed.is_empty() {
        merged.parts_needed = local.parts_needed.clone();
    }
    if merged.checkin_parts.is_empty() && !local.checkin_parts.is_empty() {
        merged.checkin_parts = local.checkin_parts.clone();
    }
    merged
}

/// Fold one inbound change event into the board.
///
/// Inserts replace in place on an id collision (e.g. an optimistic local
/// record now confirmed); updates of unseen ids behave as inserts; deletes
/// remove by id.
pub fn apply_change(board: &mut JobBoard, event: ChangeEvent) {
    match event.kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let Some(inbound) = event.new else {
                tracing::warn!(kind = ?event.kind, "change event without a payload, dropped");
                return;
            };
            let merged = match board.job(&inbound.id) {
                Some(local) => merge_job(local, inbound),
                None => inbound,
            };
            tracing::debug!(job_id = %merged.id, status = %merged.status, "change applied");
            board.insert_job(merged);
        }
        ChangeKind::Delete => {
            let id = event
                .old
                .as_ref()
                .or(event.new.as_ref())
                .map(|job| job.id.clone());
            if let Some(id) = id {
                board.remove_job(&id);
                tracing::debug!(job_id = %id, "job removed by change feed");
            }
        }
    }
}

pub fn apply_mechanic_change(board: &mut JobBoard, event: MechanicEvent) {
    if !board.set_duty(&event.id, event.status) {
        tracing::debug!(mechanic_id = %event.id, "duty change for unknown mechanic, dropped");
    }
}

/// Fold a poll snapshot of jobs into the board through the same merge
/// rules as push events.
pub fn apply_job_snapshot(board: &mut JobBoard, jobs: Vec<Job>) {
    for job in jobs {
        apply_change(
            board,
            ChangeEvent {
                kind: ChangeKind::Update,
                new: Some(job),
                old: None,
            },
        );
    }
}

pub fn apply_mechanic_snapshot(board: &mut JobBoard, mechanics: Vec<Mechanic>) {
    for mechanic in mechanics {
        board.upsert_mechanic(mechanic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::job::{
        JobDraft, JobId, JobStatus, Priority, ServiceKind, ServiceType,
    };
    use chrono::Utc;

    fn service(name: &str) -> ServiceType {
        ServiceType {
            kind: ServiceKind::Maintenance,
            name: name.to_string(),
            price_cents: 5_000,
            requires_qc: false,
            estimated_min: 45,
        }
    }

    fn job(id: &str) -> Job {
        let draft = JobDraft {
            customer_name: "Ana".to_string(),
            vehicle: "Golf".to_string(),
            service: service("wash"),
            priority: Priority::Standard,
            services: Vec::new(),
            checkin_parts: Vec::new(),
            estimated_min: None,
            labor_charge_cents: None,
        };
        Job::from_draft(JobId::new(id), &draft, Utc::now())
    }

    #[test]
    fn empty_inbound_collections_preserve_local_data() {
        let mut local = job("j1");
        local.services = vec![service("wax"), service("polish")];

        let mut inbound = job("j1");
        inbound.status = JobStatus::Assigned;
        inbound.services = Vec::new();

        let merged = merge_job(&local, inbound);
        assert_eq!(merged.status, JobStatus::Assigned);
        assert_eq!(merged.services.len(), 2, "local services survive");
    }

    #[test]
    fn populated_inbound_collections_overwrite() {
        let mut local = job("j1");
        local.services = vec![service("wax")];

        let mut inbound = job("j1");
        inbound.services = vec![service("polish"), service("buff")];

        let merged = merge_job(&local, inbound);
        assert_eq!(merged.services.len(), 2);
        assert_eq!(merged.services[0].name, "polish");
    }

    #[test]
    fn insert_collision_replaces_in_place() {
        let mut board = JobBoard::new();
        let mut local = job("j1");
        local.services = vec![service("wax")];
        board.insert_job(local);

        let mut inbound = job("j1");
        inbound.status = JobStatus::Assigned;
        apply_change(
            &mut board,
            ChangeEvent {
                kind: ChangeKind::Insert,
                new: Some(inbound),
                old: None,
            },
        );

        assert_eq!(board.len(), 1, "no duplicate record");
        let merged = board.job(&JobId::new("j1")).unwrap();
        assert_eq!(merged.status, JobStatus::Assigned);
        assert_eq!(merged.services.len(), 1);
    }

    #[test]
    fn update_of_unseen_id_inserts() {
        let mut board = JobBoard::new();
        apply_change(
            &mut board,
            ChangeEvent {
                kind: ChangeKind::Update,
                new: Some(job("j9")),
                old: None,
            },
        );
        assert!(board.job(&JobId::new("j9")).is_some());
    }

    #[test]
    fn delete_removes_by_id() {
        let mut board = JobBoard::new();
        board.insert_job(job("j1"));

        apply_change(
            &mut board,
            ChangeEvent {
                kind: ChangeKind::Delete,
                new: None,
                old: Some(job("j1")),
            },
        );
        assert!(board.is_empty());
    }

    #[test]
    fn snapshot_merges_every_job() {
        let mut board = JobBoard::new();
        let mut local = job("j1");
        local.parts_used = vec![crate::lifecycle::job::PartLine {
            name: "belt".to_string(),
            price_cents: 2_000,
            qty: 1,
        }];
        board.insert_job(local);

        let mut polled = job("j1");
        polled.status = JobStatus::Ready;
        apply_job_snapshot(&mut board, vec![polled, job("j2")]);

        assert_eq!(board.len(), 2);
        let merged = board.job(&JobId::new("j1")).unwrap();
        assert_eq!(merged.status, JobStatus::Ready);
        assert_eq!(merged.parts_used.len(), 1, "poll payload keeps local parts");
    }
}
