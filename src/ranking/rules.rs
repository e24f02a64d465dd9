//! Dealership priority rules and the rule-match predicate.
//!
//! A [`PriorityRule`] is a dealership-scoped conditional override: when it
//! matches a job it adds `ranking_score` to the job's score and may escalate
//! the job's urgency to `target_urgency`.  Matching is a pure predicate with
//! no side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobProfile, UrgencyLevel, ValidationError};

/// A conditional ranking override owned by one dealership.
///
/// Every unset optional filter means "don't care" for that dimension; a rule
/// with no filters set matches every job of its dealership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRule {
    pub id: Uuid,
    /// Hard scope: the rule is only ever evaluated against jobs of this
    /// dealership.
    pub dealership_id: String,
    /// Optional filter on the job's service.
    pub service_id: Option<String>,
    /// Optional filter on the job's vehicle make (case-sensitive).
    pub vehicle_make: Option<String>,
    /// Optional filter on the job's *input* urgency.
    pub urgency_match: Option<UrgencyLevel>,
    /// Urgency to escalate to when matched, if higher than the job's current
    /// final urgency.
    pub target_urgency: UrgencyLevel,
    /// Additive score delta applied on match.
    pub ranking_score: i64,
    pub is_active: bool,
    /// Human-readable label, collected into the applied-rules trail.
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PriorityRule {
    /// Validate the rule before it is stored.
    ///
    /// Malformed rules that slip past this (e.g. hand-edited database rows)
    /// are still harmless at ranking time: [`rule_matches`] treats them as
    /// non-matching.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dealership_id.trim().is_empty() {
            return Err(ValidationError::EmptyDealershipId);
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        Ok(())
    }
}

/// Does `rule` apply to `job`?
///
/// True iff the rule is well-formed and active, scoped to the job's
/// dealership, and every set optional filter equals the job's corresponding
/// field exactly (case-sensitive for ids and makes).  A malformed rule never
/// matches, so one bad rule cannot block ranking.
pub fn rule_matches(rule: &PriorityRule, job: &JobProfile) -> bool {
    if rule.validate().is_err() || !rule.is_active {
        return false;
    }
    if rule.dealership_id != job.dealership_id {
        return false;
    }
    if let Some(service_id) = &rule.service_id {
        if *service_id != job.service_id {
            return false;
        }
    }
    if let Some(make) = &rule.vehicle_make {
        if job.vehicle_make.as_ref() != Some(make) {
            return false;
        }
    }
    if let Some(urgency) = rule.urgency_match {
        if urgency != job.urgency {
            return false;
        }
    }
    true
}
