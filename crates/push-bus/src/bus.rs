use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dto::PushEvent;
use tokio::sync::Mutex as AsyncMutex;

use crate::queue::{PushOutcome, SubscriberQueue};

struct Subscriber {
    user_id: Option<i64>,
    queue: Arc<SubscriberQueue>,
}

/// C2: the process-wide event bus. `publish` is non-blocking with respect
/// to subscribers — it only ever touches in-memory queues, never network
/// I/O — and preserves per-subscriber publish order (§5).
pub struct PushBus {
    subscribers: AsyncMutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    default_capacity: usize,
}

/// A live subscription handle. Dropping it does not auto-unsubscribe —
/// callers call `PushBus::unsubscribe` explicitly when their stream ends,
/// matching the teacher's explicit-cleanup style in `services/signaling`.
pub struct Subscription {
    pub id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub async fn recv(&self) -> Option<PushEvent> {
        self.queue.recv().await
    }
}

impl PushBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            subscribers: AsyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_capacity,
        }
    }

    pub async fn subscribe(&self, user_id: Option<i64>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(self.default_capacity));
        self.subscribers.lock().await.insert(
            id,
            Subscriber {
                user_id,
                queue: queue.clone(),
            },
        );
        Subscription { id, queue }
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().await.remove(&id);
    }

    /// Publishes to every stream subscriber. Subscribers whose queue is full
    /// of a critical event are disconnected to preserve ringing semantics,
    /// per §4.2.
    pub async fn publish(&self, event: PushEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let mut to_disconnect = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if matches!(
                subscriber.queue.push(event.clone()),
                PushOutcome::MustDisconnect
            ) {
                to_disconnect.push(*id);
            }
        }
        for id in to_disconnect {
            subscribers.remove(&id);
            tracing::warn!(subscriber_id = id, "disconnected slow subscriber to preserve ringing semantics");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn user_ids_subscribed(&self) -> Vec<i64> {
        self.subscribers
            .lock()
            .await
            .values()
            .filter_map(|s| s.user_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_preserves_order_per_subscriber() {
        let bus = PushBus::new(8);
        let sub = bus.subscribe(None).await;
        bus.publish(PushEvent::CallHistoryUpdate { call_id: "1".into() }).await;
        bus.publish(PushEvent::CallHistoryUpdate { call_id: "2".into() }).await;

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        match (first, second) {
            (
                PushEvent::CallHistoryUpdate { call_id: a },
                PushEvent::CallHistoryUpdate { call_id: b },
            ) => {
                assert_eq!(a, "1");
                assert_eq!(b, "2");
            }
            _ => panic!("unexpected events"),
        }
    }

    #[tokio::test]
    async fn full_critical_queue_disconnects_subscriber() {
        let bus = PushBus::new(1);
        let sub = bus.subscribe(None).await;
        bus.publish(PushEvent::CallHistoryUpdate { call_id: "1".into() }).await;
        bus.publish(PushEvent::IncomingCall {
            call_id: "2".into(),
            caller_number: "123".into(),
            caller_name: None,
            line_name: None,
            extension: None,
        })
        .await;
        assert_eq!(bus.subscriber_count().await, 0);
        let _ = sub.id;
    }
}
