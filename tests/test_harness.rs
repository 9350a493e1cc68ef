//! Shared fixtures for sync-engine integration tests.
//!
//! Provides a scriptable fake remote store (injectable transient failures
//! and permanent rejections), a recording audit sink, and an engine
//! builder wired to an in-memory queue.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::{Notify, RwLock};

use pitline::board::JobBoard;
use pitline::config::EngineConfig;
use pitline::connectivity::Connectivity;
use pitline::engine::SyncEngine;
use pitline::error::{Result, SyncError};
use pitline::lifecycle::job::{
    DutyStatus, Job, JobDraft, JobId, Mechanic, MechanicId, PaymentMethod, Priority, ServiceKind,
    ServiceType, SkillLevel,
};
use pitline::queue::{MemoryQueueStore, StatusUpdate};
use pitline::remote::{AuditSink, JobStore};

/// Fake remote job store with scriptable failures.
pub struct FakeJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    mechanics: Mutex<Vec<Mechanic>>,
    next_id: AtomicU64,
    fail_remaining: AtomicU32,
    reject_remaining: AtomicU32,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            mechanics: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            fail_remaining: AtomicU32::new(0),
            reject_remaining: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Make the next `n` mutating calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` mutating calls fail with a validation error.
    pub fn reject_next(&self, n: u32) {
        self.reject_remaining.store(n, Ordering::SeqCst);
    }

    /// Block calls on this gate until it is notified.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn open_gate(&self) {
        if let Some(notify) = self.gate.lock().unwrap().take() {
            notify.notify_waiters();
        }
    }

    /// All recorded calls, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls whose name starts with the given prefix.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn server_job(&self, id: &str) -> Option<Job> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }
    }

    fn scripted_failure(&self) -> Result<()> {
        if self
            .reject_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Validation("rejected by server".into()));
        }
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Remote("injected network failure".into()));
        }
        Ok(())
    }
}

impl Default for FakeJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for FakeJobStore {
    async fn create_job(&self, draft: &JobDraft) -> Result<Job> {
        self.record("create_job".to_string());
        self.wait_gate().await;
        self.scripted_failure()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Job::from_draft(JobId::new(format!("job-{n}")), draft, Utc::now());
        self.jobs
            .lock()
            .unwrap()
            .insert(job.id.as_str().to_string(), job.clone());
        Ok(job)
    }

    async fn update_job_status(&self, id: &JobId, update: &StatusUpdate) -> Result<()> {
        self.record(format!("update_job_status {id}"));
        self.scripted_failure()?;
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id.as_str()) {
            if let Some(status) = update.status {
                job.status = status;
            }
            job.mechanic_id = update.mechanic_id.clone();
            job.started_at = update.started_at;
            job.paused_at = update.paused_at;
            job.completed_at = update.completed_at;
            job.actual_min = update.actual_min;
            job.total_cost_cents = update.total_cost_cents;
            job.parts_needed = update.parts_needed.clone();
            job.parts_used = update.parts_used.clone();
            job.customer_name = update.customer_name.clone();
            job.vehicle = update.vehicle.clone();
        }
        Ok(())
    }

    async fn assign_job(&self, id: &JobId, mechanic_id: &MechanicId) -> Result<()> {
        self.record(format!("assign_job {id} {mechanic_id}"));
        self.scripted_failure()?;
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id.as_str()) {
            job.mechanic_id = Some(mechanic_id.clone());
        }
        Ok(())
    }

    async fn process_payment(&self, id: &JobId, method: PaymentMethod) -> Result<()> {
        self.record(format!("process_payment {id}"));
        self.scripted_failure()?;
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id.as_str()) {
            job.payment_method = Some(method);
        }
        Ok(())
    }

    async fn jobs_for_date(&self, _date: NaiveDate) -> Result<Vec<Job>> {
        self.record("jobs_for_date".to_string());
        self.wait_gate().await;
        self.scripted_failure()?;
        Ok(self.jobs.lock().unwrap().values().cloned().collect())
    }

    async fn mechanics(&self) -> Result<Vec<Mechanic>> {
        self.record("mechanics".to_string());
        self.wait_gate().await;
        Ok(self.mechanics.lock().unwrap().clone())
    }
}

/// Audit sink that records every entry.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub entries: Mutex<Vec<(String, Value)>>,
    pub failing: bool,
}

impl RecordingAuditSink {
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(a, _)| a.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log(&self, action: &str, details: Value) -> Result<()> {
        if self.failing {
            return Err(SyncError::Remote("audit sink down".into()));
        }
        self.entries
            .lock()
            .unwrap()
            .push((action.to_string(), details));
        Ok(())
    }
}

pub fn service(kind: ServiceKind, requires_qc: bool) -> ServiceType {
    ServiceType {
        kind,
        name: format!("{kind:?}"),
        price_cents: 15_000,
        requires_qc,
        estimated_min: 60,
    }
}

pub fn draft(customer: &str, kind: ServiceKind, requires_qc: bool) -> JobDraft {
    JobDraft {
        customer_name: customer.to_string(),
        vehicle: "Corolla ABC-123".to_string(),
        service: service(kind, requires_qc),
        priority: Priority::Standard,
        services: Vec::new(),
        checkin_parts: Vec::new(),
        estimated_min: None,
        labor_charge_cents: Some(10_000),
    }
}

pub fn mechanic(id: &str, level: SkillLevel) -> Mechanic {
    Mechanic {
        id: MechanicId::new(id),
        name: id.to_string(),
        status: DutyStatus::OnDuty,
        level,
    }
}

/// Fast test config: millisecond backoffs, threshold of 3.
pub fn test_config() -> EngineConfig {
    EngineConfig::default().with_backoff(1, 8)
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub connectivity: Connectivity,
    pub store: Arc<FakeJobStore>,
    pub queue: Arc<MemoryQueueStore>,
    pub audit: Arc<RecordingAuditSink>,
}

impl Harness {
    pub async fn add_mechanic(&self, id: &str, level: SkillLevel) {
        let m = mechanic(id, level);
        self.store.mechanics.lock().unwrap().push(m.clone());
        self.engine.board().write().await.upsert_mechanic(m);
    }

    pub async fn job(&self, id: &JobId) -> Option<Job> {
        self.engine.board().read().await.job(id).cloned()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    build_harness(config, RecordingAuditSink::default())
}

pub fn harness_with_failing_audit() -> Harness {
    build_harness(test_config(), RecordingAuditSink::failing())
}

fn build_harness(config: EngineConfig, audit: RecordingAuditSink) -> Harness {
    let connectivity = Connectivity::new(true);
    let store = Arc::new(FakeJobStore::new());
    let queue = Arc::new(MemoryQueueStore::new(config.retry_threshold));
    let audit = Arc::new(audit);
    let engine = Arc::new(SyncEngine::new(
        Arc::new(RwLock::new(JobBoard::new())),
        queue.clone(),
        store.clone(),
        audit.clone(),
        connectivity.subscribe(),
        config,
    ));
    Harness {
        engine,
        connectivity,
        store,
        queue,
        audit,
    }
}
