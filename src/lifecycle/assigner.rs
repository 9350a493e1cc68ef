use crate::lifecycle::job::{MechanicId, ServiceKind, SkillLevel};

/// Snapshot of one on-duty mechanic's current load.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: MechanicId,
    pub level: SkillLevel,
    pub active_jobs: usize,
    pub active_hours: f64,
}

const BASE_SCORE: f64 = 100.0;
const JOB_WEIGHT: f64 = 20.0;
const HOUR_WEIGHT: f64 = 10.0;
const SENIOR_REPAIR_BONUS: f64 = 15.0;
const SENIOR_MAKEOVER_BONUS: f64 = 10.0;
const WEEKEND_OVERLOAD_PENALTY: f64 = 50.0;
const WEEKEND_OVERLOAD_JOBS: usize = 4;

/// Score one candidate for a new job of the given service kind.
pub fn score(candidate: &Candidate, service: ServiceKind, weekend: bool) -> f64 {
    let mut score = BASE_SCORE
        - JOB_WEIGHT * candidate.active_jobs as f64
        - HOUR_WEIGHT * candidate.active_hours;
    if candidate.level == SkillLevel::Senior {
        score += match service {
            ServiceKind::Repair => SENIOR_REPAIR_BONUS,
            ServiceKind::Makeover => SENIOR_MAKEOVER_BONUS,
            ServiceKind::Maintenance => 0.0,
        };
    }
    if weekend && candidate.active_jobs >= WEEKEND_OVERLOAD_JOBS {
        score -= WEEKEND_OVERLOAD_PENALTY;
    }
    score
}

/// Pick the best mechanic for a new job, or `None` if nobody is on duty.
///
/// Pure: the optimistic run and the post-round-trip run must agree for
/// identical inputs. Ties go to the earliest candidate in input order.
pub fn suggest_mechanic(
    candidates: &[Candidate],
    service: ServiceKind,
    weekend: bool,
) -> Option<MechanicId> {
    let mut best: Option<(f64, &Candidate)> = None;
    for candidate in candidates {
        let s = score(candidate, service, weekend);
        match best {
            Some((top, _)) if s <= top => {}
            _ => best = Some((s, candidate)),
        }
    }
    best.map(|(_, candidate)| candidate.id.clone())
}
