use std::collections::VecDeque;
use std::sync::Mutex;

use dto::PushEvent;
use tokio::sync::Notify;

/// A single subscriber's bounded event queue with the backpressure policy
/// from §4.2: non-critical events drop the oldest entry to make room;
/// critical events (`incoming_call`, `call_ended`) are never dropped —
/// instead `push` reports the queue was full so the caller can disconnect
/// the subscriber.
pub struct SubscriberQueue {
    capacity: usize,
    inner: Mutex<VecDeque<PushEvent>>,
    notify: Notify,
}

pub enum PushOutcome {
    Queued,
    /// A critical event could not be queued without dropping something;
    /// the subscriber must be torn down.
    MustDisconnect,
}

impl SubscriberQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, event: PushEvent) -> PushOutcome {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            if event.is_critical() {
                return PushOutcome::MustDisconnect;
            }
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
        PushOutcome::Queued
    }

    /// Waits for and removes the next queued event, preserving publish
    /// order for this subscriber.
    pub async fn recv(&self) -> Option<PushEvent> {
        loop {
            {
                let mut queue = self.inner.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_critical_drops_oldest_when_full() {
        let queue = SubscriberQueue::new(2);
        queue.push(PushEvent::CallHistoryUpdate { call_id: "a".into() });
        queue.push(PushEvent::CallHistoryUpdate { call_id: "b".into() });
        queue.push(PushEvent::CallHistoryUpdate { call_id: "c".into() });
        let inner = queue.inner.lock().unwrap();
        assert_eq!(inner.len(), 2);
        match &inner[0] {
            PushEvent::CallHistoryUpdate { call_id } => assert_eq!(call_id, "b"),
            _ => panic!("unexpected event"),
        }
    }

    #[test]
    fn critical_event_requires_disconnect_when_full() {
        let queue = SubscriberQueue::new(1);
        queue.push(PushEvent::CallHistoryUpdate { call_id: "a".into() });
        let outcome = queue.push(PushEvent::IncomingCall {
            call_id: "b".into(),
            caller_number: "123".into(),
            caller_name: None,
            line_name: None,
            extension: None,
        });
        assert!(matches!(outcome, PushOutcome::MustDisconnect));
    }
}
