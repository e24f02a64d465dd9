//! Job ranking domain types and scoring.

pub mod calculator;
pub mod rules;
pub mod sort;

pub use self::calculator::RankingCalculator;
pub use self::rules::{rule_matches, PriorityRule};
pub use self::sort::{sort_by_score, RankedJob};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("dealership id must not be empty")]
    EmptyDealershipId,

    #[error("service id must not be empty")]
    EmptyServiceId,

    #[error("rule description must not be empty")]
    EmptyDescription,

    #[error("unknown urgency level: {0}")]
    UnknownUrgency(String),
}

/// Urgency classification of a job.
///
/// The variant order is the escalation order: comparisons (`Ord`) decide
/// whether a rule may escalate a job, while the numeric base weight each
/// level feeds into the score comes from [`crate::config::RankingConfig`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(UrgencyLevel::Low),
            "medium" => Ok(UrgencyLevel::Medium),
            "high" => Ok(UrgencyLevel::High),
            "critical" => Ok(UrgencyLevel::Critical),
            other => Err(ValidationError::UnknownUrgency(other.to_string())),
        }
    }
}

/// The slice of a job the ranking engine looks at.
///
/// The full job record (code, assignment, timestamps) is owned by the
/// surrounding system; ranking only needs the dealership scope, the service,
/// the reported urgency, and the vehicle make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProfile {
    pub dealership_id: String,
    pub service_id: String,
    pub urgency: UrgencyLevel,
    pub vehicle_make: Option<String>,
}

impl JobProfile {
    /// Reject profiles that cannot be ranked meaningfully.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dealership_id.trim().is_empty() {
            return Err(ValidationError::EmptyDealershipId);
        }
        if self.service_id.trim().is_empty() {
            return Err(ValidationError::EmptyServiceId);
        }
        Ok(())
    }
}

/// A job as the dispatch queue sees it: an opaque id plus its ranking view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub id: Uuid,
    pub profile: JobProfile,
}

/// Outcome of ranking one job against the active rule set.
///
/// `applied_rules` is the audit trail, appended in evaluation order and
/// never mutated after the result is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingResult {
    pub score: i64,
    pub final_urgency: UrgencyLevel,
    pub applied_rules: Vec<String>,
}
