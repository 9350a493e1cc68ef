use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Locally generated identifier for a job created offline. Replaced
    /// in place once the create replays and the server id is known.
    pub fn temp() -> Self {
        Self(format!("temp-{}", Uuid::new_v4()))
    }

    pub fn is_temp(&self) -> bool {
        self.0.starts_with("temp-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MechanicId(String);

impl MechanicId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MechanicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Received,
    Assigned,
    InProgress,
    PartsPending,
    QualityCheck,
    Ready,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Received => write!(f, "received"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::PartsPending => write!(f, "parts_pending"),
            JobStatus::QualityCheck => write!(f, "quality_check"),
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Standard,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    OnDuty,
    OffDuty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Junior,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Repair,
    Makeover,
    Maintenance,
}

/// One billable service offering. `requires_qc` routes completion through
/// the quality_check stage instead of straight to ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub kind: ServiceKind,
    pub name: String,
    pub price_cents: i64,
    pub requires_qc: bool,
    pub estimated_min: i64,
}

/// A parts line item. Prices are in cents to keep cost arithmetic exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLine {
    pub name: String,
    pub price_cents: i64,
    pub qty: u32,
}

impl PartLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.price_cents * i64::from(self.qty)
    }
}

/// One vehicle service ticket, tracked from check-in to payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub mechanic_id: Option<MechanicId>,
    pub priority: Priority,
    pub customer_name: String,
    pub vehicle: String,
    pub service: ServiceType,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub estimated_min: i64,
    pub actual_min: Option<i64>,
    pub labor_charge_cents: Option<i64>,
    pub total_cost_cents: Option<i64>,
    pub parts_used: Vec<PartLine>,
    pub parts_needed: Vec<PartLine>,
    pub services: Vec<ServiceType>,
    pub checkin_parts: Vec<String>,
}

impl Job {
    pub fn from_draft(id: JobId, draft: &JobDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Received,
            mechanic_id: None,
            priority: draft.priority,
            customer_name: draft.customer_name.clone(),
            vehicle: draft.vehicle.clone(),
            estimated_min: draft.estimated_min.unwrap_or(draft.service.estimated_min),
            labor_charge_cents: draft.labor_charge_cents,
            service: draft.service.clone(),
            created_at,
            started_at: None,
            paused_at: None,
            completed_at: None,
            paid_at: None,
            payment_method: None,
            actual_min: None,
            total_cost_cents: None,
            parts_used: Vec::new(),
            parts_needed: Vec::new(),
            services: draft.services.clone(),
            checkin_parts: draft.checkin_parts.clone(),
        }
    }

    pub fn parts_subtotal_cents(&self) -> i64 {
        self.parts_used.iter().map(PartLine::subtotal_cents).sum()
    }

    /// Whether this job counts toward a mechanic's current load.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Assigned | JobStatus::InProgress | JobStatus::PartsPending
        )
    }

    /// Apply an edit patch. Only legal while the job is still `received`;
    /// the state machine enforces that.
    pub fn apply_fields(&mut self, fields: &JobFields) {
        if let Some(v) = &fields.customer_name {
            self.customer_name = v.clone();
        }
        if let Some(v) = &fields.vehicle {
            self.vehicle = v.clone();
        }
        if let Some(v) = fields.priority {
            self.priority = v;
        }
        if let Some(v) = fields.estimated_min {
            self.estimated_min = v;
        }
        if let Some(v) = fields.labor_charge_cents {
            self.labor_charge_cents = Some(v);
        }
        if let Some(v) = &fields.services {
            self.services = v.clone();
        }
        if let Some(v) = &fields.checkin_parts {
            self.checkin_parts = v.clone();
        }
    }
}

/// Check-in payload for a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub customer_name: String,
    pub vehicle: String,
    pub service: ServiceType,
    pub priority: Priority,
    pub services: Vec<ServiceType>,
    pub checkin_parts: Vec<String>,
    pub estimated_min: Option<i64>,
    pub labor_charge_cents: Option<i64>,
}

/// Partial edit patch. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFields {
    pub customer_name: Option<String>,
    pub vehicle: Option<String>,
    pub priority: Option<Priority>,
    pub estimated_min: Option<i64>,
    pub labor_charge_cents: Option<i64>,
    pub services: Option<Vec<ServiceType>>,
    pub checkin_parts: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mechanic {
    pub id: MechanicId,
    pub name: String,
    pub status: DutyStatus,
    pub level: SkillLevel,
}
