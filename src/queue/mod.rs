//! FIFO admission queue for recording requests that arrive at capacity.
//!
//! Waiting entries are promoted by handing them the semaphore permit of a
//! freed session slot directly, so a freshly freed slot cannot be stolen
//! by a start request that never waited. Clients poll `check_turn`; an
//! entry whose client stops polling is purged after the configured TTL.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use uuid::Uuid;

use crate::recorder::{CallKey, CallType};

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub call_type: CallType,
    pub call_id: String,
    pub group_id: String,
    pub requester_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReceipt {
    pub queue_id: Uuid,
    pub position: usize,
    pub total_in_queue: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStatus {
    pub is_your_turn: bool,
    pub position: usize,
    pub total_in_queue: usize,
}

struct WaitingEntry {
    queue_id: Uuid,
    call: CallKey,
    group_id: String,
    requester_id: Option<String>,
    enqueued_at: DateTime<Utc>,
    last_seen: Instant,
    /// A reserved capacity slot. `Some` means "your turn": the slot is
    /// held for this entry until it starts, leaves, or expires.
    reservation: Option<OwnedSemaphorePermit>,
}

pub struct AdmissionQueue {
    slots: Arc<Semaphore>,
    ttl: Duration,
    entries: Mutex<VecDeque<WaitingEntry>>,
}

impl AdmissionQueue {
    pub fn new(slots: Arc<Semaphore>, ttl: Duration) -> Self {
        Self {
            slots,
            ttl,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Add a request to the back of the queue. Always succeeds; when a
    /// slot is already free the new entry is promoted before this call
    /// returns, so the first `check_turn` can answer "your turn".
    pub async fn join(&self, request: JoinRequest) -> JoinReceipt {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        let queue_id = Uuid::new_v4();
        let call = CallKey::new(request.call_type, request.call_id);
        info!(
            "Queue entry {} joined for {} (group {}, {} waiting)",
            queue_id,
            call,
            request.group_id,
            entries.len() + 1
        );

        entries.push_back(WaitingEntry {
            queue_id,
            call,
            group_id: request.group_id,
            requester_id: request.requester_id,
            enqueued_at: Utc::now(),
            last_seen: Instant::now(),
            reservation: None,
        });

        self.fill_reservations(&mut entries);

        JoinReceipt {
            queue_id,
            position: entries.len(),
            total_in_queue: entries.len(),
        }
    }

    /// Poll one entry. `None` means the entry is gone: claimed by a
    /// start, left, or expired. Polling refreshes the entry's TTL clock.
    pub async fn check_turn(&self, queue_id: Uuid) -> Option<TurnStatus> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        let total_in_queue = entries.len();
        let index = entries.iter().position(|e| e.queue_id == queue_id)?;

        let entry = &mut entries[index];
        entry.last_seen = Instant::now();

        Some(TurnStatus {
            is_your_turn: entry.reservation.is_some(),
            position: index + 1,
            total_in_queue,
        })
    }

    /// Remove an entry. Idempotent: an unknown id simply reports false.
    /// A promoted entry's reserved slot moves on to the next waiter.
    pub async fn leave(&self, queue_id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        let Some(index) = entries.iter().position(|e| e.queue_id == queue_id) else {
            return false;
        };

        let entry = entries.remove(index).expect("index is in bounds");
        debug!("Queue entry {} left", entry.queue_id);
        if let Some(permit) = entry.reservation {
            assign(&mut entries, permit);
        }
        true
    }

    /// Consume the promoted entry for `call`, transferring its reserved
    /// slot to the session that is starting. The entry is removed;
    /// later polls for it answer "not found".
    pub async fn claim(&self, call: &CallKey) -> Option<OwnedSemaphorePermit> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);

        let index = entries
            .iter()
            .position(|e| e.reservation.is_some() && &e.call == call)?;
        let entry = entries.remove(index).expect("index is in bounds");
        info!(
            "Queue entry {} (group {}, requester {}) claimed by start of {}",
            entry.queue_id,
            entry.group_id,
            entry.requester_id.as_deref().unwrap_or("unknown"),
            call
        );
        entry.reservation
    }

    /// Invoked whenever a session slot frees. The permit goes straight to
    /// the oldest waiter, or back to the pool when nobody waits.
    pub async fn hand_off(&self, permit: OwnedSemaphorePermit) {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        assign(&mut entries, permit);
    }

    pub async fn depth(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.len()
    }

    /// Drop entries whose client stopped polling. Their reserved slots,
    /// if any, move on to the remaining waiters in order.
    fn purge_expired(&self, entries: &mut VecDeque<WaitingEntry>) {
        let mut freed = Vec::new();
        let mut index = 0;
        while index < entries.len() {
            if entries[index].last_seen.elapsed() > self.ttl {
                let entry = entries.remove(index).expect("index is in bounds");
                info!(
                    "Queue entry {} for {} expired (enqueued {})",
                    entry.queue_id, entry.call, entry.enqueued_at
                );
                if let Some(permit) = entry.reservation {
                    freed.push(permit);
                }
            } else {
                index += 1;
            }
        }
        for permit in freed {
            assign(entries, permit);
        }
    }

    /// Reserve free slots for waiters at the head of the queue. Promoted
    /// entries always form a prefix, preserving FIFO order.
    fn fill_reservations(&self, entries: &mut VecDeque<WaitingEntry>) {
        for entry in entries.iter_mut() {
            if entry.reservation.is_none() {
                match Arc::clone(&self.slots).try_acquire_owned() {
                    Ok(permit) => {
                        info!("Queue entry {} promoted", entry.queue_id);
                        entry.reservation = Some(permit);
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

fn assign(entries: &mut VecDeque<WaitingEntry>, permit: OwnedSemaphorePermit) {
    match entries.iter_mut().find(|e| e.reservation.is_none()) {
        Some(entry) => {
            info!("Queue entry {} promoted", entry.queue_id);
            entry.reservation = Some(permit);
        }
        // Dropping the permit returns the slot to the pool.
        None => drop(permit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn queue_with(slots: Arc<Semaphore>, ttl: Duration) -> AdmissionQueue {
        AdmissionQueue::new(slots, ttl)
    }

    fn request(call_id: &str) -> JoinRequest {
        JoinRequest {
            call_type: CallType::Audio,
            call_id: call_id.to_string(),
            group_id: "group-1".to_string(),
            requester_id: None,
        }
    }

    fn key(call_id: &str) -> CallKey {
        CallKey::new(CallType::Audio, call_id)
    }

    #[tokio::test]
    async fn join_with_free_capacity_is_immediately_your_turn() {
        let slots = Arc::new(Semaphore::new(1));
        let queue = queue_with(Arc::clone(&slots), Duration::from_secs(60));

        let receipt = queue.join(request("a")).await;
        let turn = queue.check_turn(receipt.queue_id).await.unwrap();

        assert!(turn.is_your_turn);
        assert_eq!(turn.position, 1);
        assert_eq!(turn.total_in_queue, 1);
        // The reservation holds the only slot.
        assert_eq!(slots.available_permits(), 0);
    }

    #[tokio::test]
    async fn promotion_follows_enqueue_order() {
        let slots = Arc::new(Semaphore::new(2));
        // Simulate two running sessions holding both slots.
        let first = Arc::clone(&slots).try_acquire_owned().unwrap();
        let second = Arc::clone(&slots).try_acquire_owned().unwrap();

        let queue = queue_with(Arc::clone(&slots), Duration::from_secs(60));
        let a = queue.join(request("a")).await;
        let b = queue.join(request("b")).await;

        assert!(!queue.check_turn(a.queue_id).await.unwrap().is_your_turn);
        assert_eq!(queue.check_turn(b.queue_id).await.unwrap().position, 2);

        // One session stops; its slot goes to the oldest waiter.
        queue.hand_off(first).await;
        assert!(queue.check_turn(a.queue_id).await.unwrap().is_your_turn);
        assert!(!queue.check_turn(b.queue_id).await.unwrap().is_your_turn);

        queue.hand_off(second).await;
        assert!(queue.check_turn(b.queue_id).await.unwrap().is_your_turn);
    }

    #[tokio::test]
    async fn claim_consumes_the_entry() {
        let slots = Arc::new(Semaphore::new(1));
        let queue = queue_with(Arc::clone(&slots), Duration::from_secs(60));

        let receipt = queue.join(request("a")).await;
        assert!(queue.check_turn(receipt.queue_id).await.unwrap().is_your_turn);

        let permit = queue.claim(&key("a")).await;
        assert!(permit.is_some());

        // Claimed entries answer "not found", never a stale positive.
        assert!(queue.check_turn(receipt.queue_id).await.is_none());
    }

    #[tokio::test]
    async fn claim_requires_promotion() {
        let slots = Arc::new(Semaphore::new(1));
        let blocker = Arc::clone(&slots).try_acquire_owned().unwrap();

        let queue = queue_with(Arc::clone(&slots), Duration::from_secs(60));
        let receipt = queue.join(request("a")).await;

        // Still waiting: nothing to claim.
        assert!(queue.claim(&key("a")).await.is_none());
        assert!(queue.check_turn(receipt.queue_id).await.is_some());

        drop(blocker);
    }

    #[tokio::test]
    async fn leave_is_idempotent_and_rehands_reservations() {
        let slots = Arc::new(Semaphore::new(1));
        let queue = queue_with(Arc::clone(&slots), Duration::from_secs(60));

        let a = queue.join(request("a")).await;
        let b = queue.join(request("b")).await;
        assert!(queue.check_turn(a.queue_id).await.unwrap().is_your_turn);

        assert!(queue.leave(a.queue_id).await);
        // Unknown ids are not an error.
        assert!(!queue.leave(a.queue_id).await);
        assert!(!queue.leave(Uuid::new_v4()).await);

        // The reservation moved on to b.
        assert!(queue.check_turn(b.queue_id).await.unwrap().is_your_turn);
    }

    #[tokio::test]
    async fn stale_entries_expire_and_release_their_slot() {
        let slots = Arc::new(Semaphore::new(1));
        let queue = queue_with(Arc::clone(&slots), Duration::from_millis(50));

        let a = queue.join(request("a")).await;
        let b = queue.join(request("b")).await;
        assert!(queue.check_turn(a.queue_id).await.unwrap().is_your_turn);

        // Keep b alive while a goes quiet past the TTL.
        sleep(Duration::from_millis(30)).await;
        queue.check_turn(b.queue_id).await.unwrap();
        sleep(Duration::from_millis(35)).await;

        let turn = queue.check_turn(b.queue_id).await.unwrap();
        assert!(turn.is_your_turn, "a's reservation should pass to b");
        assert_eq!(turn.position, 1);

        // And a is gone for good.
        assert!(queue.check_turn(a.queue_id).await.is_none());
    }

    #[tokio::test]
    async fn abandoned_queue_returns_slots_to_the_pool() {
        let slots = Arc::new(Semaphore::new(1));
        let queue = queue_with(Arc::clone(&slots), Duration::from_millis(20));

        queue.join(request("a")).await;
        assert_eq!(slots.available_permits(), 0);

        sleep(Duration::from_millis(40)).await;
        assert_eq!(queue.depth().await, 0);
        assert_eq!(slots.available_permits(), 1);
    }
}
