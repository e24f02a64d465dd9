//! Ordering of pending jobs for technician presentation.

use std::cmp::Reverse;

use serde::Serialize;

use super::calculator::RankingCalculator;
use super::rules::PriorityRule;
use super::{DispatchJob, RankingResult};

/// A job paired with the ranking that ordered it, so presentation layers do
/// not have to rank a second time.
#[derive(Debug, Clone, Serialize)]
pub struct RankedJob {
    pub job: DispatchJob,
    pub ranking: RankingResult,
}

/// Rank every job and order the collection by descending score.
///
/// Scores are recomputed on every call; they are a pure function of the
/// current job and rule inputs, never cached as truth.  The sort is stable
/// (`sort_by_key`), so equal-score jobs keep their input order -- dispatch
/// fairness for same-score jobs depends on this.
pub fn sort_by_score(
    calculator: &RankingCalculator,
    jobs: Vec<DispatchJob>,
    rules: &[PriorityRule],
) -> Vec<RankedJob> {
    let mut ranked: Vec<RankedJob> = jobs
        .into_iter()
        .map(|job| {
            let ranking = calculator.rank(&job.profile, rules);
            RankedJob { job, ranking }
        })
        .collect();

    ranked.sort_by_key(|r| Reverse(r.ranking.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::ranking::{JobProfile, UrgencyLevel};
    use uuid::Uuid;

    fn job(urgency: UrgencyLevel) -> DispatchJob {
        DispatchJob {
            id: Uuid::new_v4(),
            profile: JobProfile {
                dealership_id: "d-1".to_string(),
                service_id: "svc-oil".to_string(),
                urgency,
                vehicle_make: None,
            },
        }
    }

    #[test]
    fn test_orders_by_descending_score() {
        let calc = RankingCalculator::new(RankingConfig::default());
        let low = job(UrgencyLevel::Low);
        let critical = job(UrgencyLevel::Critical);
        let medium = job(UrgencyLevel::Medium);

        let ranked = sort_by_score(
            &calc,
            vec![low.clone(), critical.clone(), medium.clone()],
            &[],
        );

        let ids: Vec<Uuid> = ranked.iter().map(|r| r.job.id).collect();
        assert_eq!(ids, vec![critical.id, medium.id, low.id]);
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let calc = RankingCalculator::new(RankingConfig::default());
        // a and b tie on score; c beats both.
        let a = job(UrgencyLevel::Medium);
        let b = job(UrgencyLevel::Medium);
        let c = job(UrgencyLevel::Critical);

        let ranked = sort_by_score(&calc, vec![a.clone(), b.clone(), c.clone()], &[]);

        let ids: Vec<Uuid> = ranked.iter().map(|r| r.job.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
    }

    #[test]
    fn test_input_is_not_reordered_in_place() {
        let calc = RankingCalculator::new(RankingConfig::default());
        let a = job(UrgencyLevel::Low);
        let b = job(UrgencyLevel::High);
        let input = vec![a.clone(), b.clone()];

        let ranked = sort_by_score(&calc, input.clone(), &[]);
        // A fresh sequence is produced; the caller's vector is untouched.
        assert_eq!(input[0].id, a.id);
        assert_eq!(ranked[0].job.id, b.id);
    }

    #[test]
    fn test_carries_ranking_alongside_job() {
        let calc = RankingCalculator::new(RankingConfig::default());
        let ranked = sort_by_score(&calc, vec![job(UrgencyLevel::High)], &[]);
        assert_eq!(ranked[0].ranking.score, 20);
        assert_eq!(ranked[0].ranking.final_urgency, UrgencyLevel::High);
    }
}
