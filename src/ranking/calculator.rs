//! The ranking calculator -- base urgency weight, fixed escalations, and
//! dealership rule overrides folded into a single score.
//!
//! Scoring is additive only and urgency moves only upward; no rule can make
//! a job less urgent than its input.  The calculator is pure and stateless,
//! so callers may rank jobs concurrently without coordination.

use tracing::debug;

use crate::config::RankingConfig;

use super::rules::{rule_matches, PriorityRule};
use super::{JobProfile, RankingResult, UrgencyLevel};

/// Trail label for the high/critical urgency bonus.
const URGENCY_RULE_LABEL: &str = "Urgency Ranking";

/// The one make with its own fixed escalation behavior.
const ESCALATED_MAKE: &str = "Audi";

/// Computes ranking scores from a job profile and the dealership rule set.
///
/// All weights and the premium-make list come from [`RankingConfig`] so
/// deployments (and tests) can tune them without touching the algorithm.
#[derive(Debug, Clone)]
pub struct RankingCalculator {
    config: RankingConfig,
}

impl RankingCalculator {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Rank one job against the supplied rules.
    ///
    /// Rules are folded in the exact order given.  The rule store returns
    /// them ordered by creation time, which makes that the effective
    /// evaluation order: when two matching rules name conflicting target
    /// urgencies, the later-created rule wins if its target is strictly
    /// higher.  Malformed rules are skipped, never an error.
    pub fn rank(&self, job: &JobProfile, rules: &[PriorityRule]) -> RankingResult {
        let cfg = &self.config;
        let mut score = cfg.base_weight(job.urgency);
        let mut final_urgency = job.urgency;
        let mut applied_rules = Vec::new();

        // Fixed escalation: high and critical jobs get a flat bonus.
        if job.urgency >= UrgencyLevel::High {
            score += cfg.urgency_bonus;
            applied_rules.push(URGENCY_RULE_LABEL.to_string());
        }

        // Fixed escalation: premium vehicle makes.
        if let Some(make) = job.vehicle_make.as_deref() {
            if cfg.premium_makes.iter().any(|m| m == make) {
                score += cfg.premium_make_bonus;
                applied_rules.push(format!("Premium Vehicle ({make})"));

                // Audi additionally forces at least High urgency.  The trail
                // entry is recorded even when the job is already High (the
                // escalation is then a no-op), but never for Critical.
                if make == ESCALATED_MAKE && final_urgency != UrgencyLevel::Critical {
                    final_urgency = UrgencyLevel::High;
                    applied_rules.push("Audi Escalation".to_string());
                }
            }
        }

        // Dealership rule overrides, in caller-supplied order.
        for rule in rules.iter().filter(|r| rule_matches(r, job)) {
            score += rule.ranking_score;
            applied_rules.push(rule.description.clone());
            if rule.target_urgency > final_urgency {
                final_urgency = rule.target_urgency;
            }
        }

        debug!(
            dealership_id = job.dealership_id.as_str(),
            score,
            final_urgency = final_urgency.as_str(),
            applied = applied_rules.len(),
            "ranked job"
        );

        RankingResult {
            score,
            final_urgency,
            applied_rules,
        }
    }
}
