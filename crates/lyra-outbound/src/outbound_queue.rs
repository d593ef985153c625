//! Outbound delivery queue with at-least-once semantics.
//!
//! Jobs stay visible to `poll` until the delivery collaborator confirms them
//! with the exact (origin, external_user_id, message_id) tuple; confirm is a
//! compare-and-remove so a retried confirmation is harmless. The backing
//! collection is never exposed, only enqueue/poll/confirm, so the storage
//! technology can change behind the same three operations.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use lyra_contract::Origin;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One queued unit of "deliver this text to this external recipient."
pub struct OutboundJob {
    pub origin: Origin,
    pub external_user_id: String,
    pub text: String,
    pub conversation_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Default)]
/// In-process queue of pending outbound deliveries.
///
/// No capacity bound and no retry/backoff for platform-side failures; both
/// are acknowledged gaps of the current design, not hidden behavior.
pub struct OutboundQueue {
    jobs: Mutex<Vec<OutboundJob>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. Always succeeds in the current in-memory design.
    pub fn enqueue(&self, job: OutboundJob) {
        tracing::debug!(
            origin = job.origin.as_str(),
            external_user_id = %job.external_user_id,
            message_id = job.message_id,
            "queued outbound message"
        );
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        jobs.push(job);
    }

    /// Pending jobs for one origin, in enqueue order, without removing them.
    pub fn poll(&self, origin: Origin, limit: usize) -> Vec<OutboundJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        jobs.iter()
            .filter(|job| job.origin == origin)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Compare-and-remove on the full delivery tuple. Returns false when no
    /// matching job exists (already confirmed, or never enqueued).
    pub fn confirm(&self, origin: Origin, external_user_id: &str, message_id: i64) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let position = jobs.iter().position(|job| {
            job.origin == origin
                && job.external_user_id == external_user_id
                && job.message_id == message_id
        });
        match position {
            Some(index) => {
                jobs.remove(index);
                tracing::debug!(
                    origin = origin.as_str(),
                    external_user_id,
                    message_id,
                    "confirmed outbound delivery"
                );
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(origin: Origin, external_user_id: &str, message_id: i64) -> OutboundJob {
        OutboundJob {
            origin,
            external_user_id: external_user_id.to_string(),
            text: format!("reply {message_id}"),
            conversation_id: 1,
            message_id,
        }
    }

    #[test]
    fn poll_is_non_destructive_and_ordered() {
        let queue = OutboundQueue::new();
        queue.enqueue(job(Origin::Marketplace, "fm_1", 10));
        queue.enqueue(job(Origin::Marketplace, "fm_1", 11));
        queue.enqueue(job(Origin::Messenger, "tg_1", 12));

        let first = queue.poll(Origin::Marketplace, 10);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message_id, 10);
        assert_eq!(first[1].message_id, 11);

        // Repeated polls see the same jobs until confirmation.
        let second = queue.poll(Origin::Marketplace, 10);
        assert_eq!(second, first);
        assert_eq!(queue.pending_count(), 3);
    }

    #[test]
    fn poll_respects_limit() {
        let queue = OutboundQueue::new();
        for message_id in 0..5 {
            queue.enqueue(job(Origin::Web, "web_1", message_id));
        }
        assert_eq!(queue.poll(Origin::Web, 2).len(), 2);
    }

    #[test]
    fn confirm_removes_only_the_exact_tuple() {
        let queue = OutboundQueue::new();
        queue.enqueue(job(Origin::Marketplace, "fm_1", 10));
        queue.enqueue(job(Origin::Marketplace, "fm_2", 11));

        assert!(queue.confirm(Origin::Marketplace, "fm_1", 10));
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.poll(Origin::Marketplace, 10)[0].message_id, 11);

        // Wrong origin or user never matches.
        assert!(!queue.confirm(Origin::Messenger, "fm_2", 11));
        assert!(!queue.confirm(Origin::Marketplace, "fm_1", 11));
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn regression_confirm_is_idempotent_to_retry() {
        let queue = OutboundQueue::new();
        queue.enqueue(job(Origin::Web, "web_9", 42));
        assert!(queue.confirm(Origin::Web, "web_9", 42));
        assert!(!queue.confirm(Origin::Web, "web_9", 42));
        assert_eq!(queue.pending_count(), 0);
    }
}
