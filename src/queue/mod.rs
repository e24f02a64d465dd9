//! Dispatch queue for pending job offers.
//!
//! Tracks jobs awaiting technician acceptance, filters each technician's
//! view by eligibility and prior rejections, and mediates the race between
//! acceptance and rejection.  All state lives in one map behind a
//! `tokio::sync::RwLock`; accept is an atomic check-and-remove under the
//! write lock, which is what guarantees at most one technician ever
//! successfully accepts a given offer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ranking::DispatchJob;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The offer is gone (accepted by someone else or cancelled) or not
    /// visible to the caller.  Expected under contention; the client should
    /// re-fetch its feed rather than treat this as a fault.
    #[error("job {0} is not available for acceptance")]
    NotAvailable(Uuid),
}

/// One pending offer: a job plus the per-technician visibility state.
///
/// Presence in the queue map *is* the ready-for-acceptance state.  Removal
/// (accept or cancel) is the terminal transition; other job statuses belong
/// to the surrounding system and never enter this queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub job: DispatchJob,
    /// When non-empty, only these technicians may see the offer.
    pub eligible_techs: HashSet<String>,
    /// Technicians who have permanently declined this offer.
    pub rejected_techs: HashSet<String>,
    // TODO: expire offers that sit unaccepted past a configurable TTL.
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Visibility predicate: eligible (or unrestricted) and not rejected.
    pub fn visible_to(&self, tech_id: &str) -> bool {
        if !self.eligible_techs.is_empty() && !self.eligible_techs.contains(tech_id) {
            return false;
        }
        !self.rejected_techs.contains(tech_id)
    }
}

/// Shared queue of jobs awaiting technician acceptance.
///
/// Cheap to clone; clones share the same underlying state.  Readers only
/// ever receive snapshots of entries, never references into the map, so a
/// half-mutated entry can never be observed.
#[derive(Clone)]
pub struct DispatchQueue {
    entries: Arc<RwLock<HashMap<Uuid, QueueEntry>>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Offer a job to technicians.
    ///
    /// `eligible_techs` restricts visibility to exactly those technicians;
    /// an empty list leaves the offer visible to everyone.  The queue is
    /// keyed by job id: enqueueing a job that is already pending replaces
    /// the existing offer (last write wins), dropping its rejection set.
    pub async fn enqueue(&self, job: DispatchJob, eligible_techs: Vec<String>) {
        let entry = QueueEntry {
            job,
            eligible_techs: eligible_techs.into_iter().collect(),
            rejected_techs: HashSet::new(),
            enqueued_at: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        let job_id = entry.job.id;
        let restricted = entry.eligible_techs.len();
        if entries.insert(job_id, entry).is_some() {
            info!(job_id = %job_id, "replaced pending offer for re-enqueued job");
        } else {
            info!(job_id = %job_id, eligible = restricted, "job offered for acceptance");
        }
    }

    /// Attempt to accept an offer on behalf of a technician.
    ///
    /// Atomic check-and-remove: the entry must still exist and be visible to
    /// `tech_id` at the moment the write lock is held.  On success the offer
    /// is gone for every other technician.  A losing racer gets
    /// [`QueueError::NotAvailable`] and should re-fetch its feed.
    pub async fn accept(&self, job_id: Uuid, tech_id: &str) -> Result<DispatchJob, QueueError> {
        let mut entries = self.entries.write().await;

        let visible = entries
            .get(&job_id)
            .is_some_and(|entry| entry.visible_to(tech_id));
        if !visible {
            debug!(job_id = %job_id, tech_id = tech_id, "accept lost: offer gone or not visible");
            return Err(QueueError::NotAvailable(job_id));
        }

        // The check above held under the same write lock, so this removal
        // cannot race another accept.
        let entry = entries
            .remove(&job_id)
            .ok_or(QueueError::NotAvailable(job_id))?;
        info!(job_id = %job_id, tech_id = tech_id, "job accepted");
        Ok(entry.job)
    }

    /// Permanently hide an offer from one technician.
    ///
    /// Idempotent: rejecting twice is a no-op, and rejecting an offer that
    /// no longer exists (already accepted or cancelled) is silently ignored
    /// rather than an error.  The offer stays pending for everyone else.
    /// Returns whether the rejection was newly recorded.
    pub async fn reject(&self, job_id: Uuid, tech_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&job_id) {
            Some(entry) => {
                let inserted = entry.rejected_techs.insert(tech_id.to_string());
                if inserted {
                    info!(job_id = %job_id, tech_id = tech_id, "job rejected by technician");
                } else {
                    debug!(job_id = %job_id, tech_id = tech_id, "duplicate rejection ignored");
                }
                inserted
            }
            None => {
                debug!(job_id = %job_id, tech_id = tech_id, "rejection for missing offer ignored");
                false
            }
        }
    }

    /// Remove an offer outright (external cancellation).
    ///
    /// Returns whether an offer was actually pending.
    pub async fn remove(&self, job_id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(&job_id).is_some();
        if removed {
            info!(job_id = %job_id, "pending offer cancelled");
        } else {
            warn!(job_id = %job_id, "cancellation for unknown offer");
        }
        removed
    }

    /// Snapshot of the jobs currently visible to a technician, unordered.
    ///
    /// Callers rank the snapshot for presentation; see
    /// [`crate::ranking::sort_by_score`].
    pub async fn visible_to(&self, tech_id: &str) -> Vec<DispatchJob> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| entry.visible_to(tech_id))
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Number of pending offers.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
