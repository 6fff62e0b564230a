//! C2: fan-out of typed events to connected subscribers — long-lived
//! streams, web-push endpoints, and mobile push tokens (§4.2).

mod bus;
mod mobile;
mod queue;
mod webpush;

pub use bus::{PushBus, Subscription};
pub use mobile::{MobileDispatcher, MobilePayload};
pub use webpush::deliver_web_push;

use dto::PushEvent;
use store::Store;

/// Top-level fan-out entry point: publishes to stream subscribers, then
/// best-effort delivers to every user's web-push and mobile endpoints.
/// Called by every component that raises an event (C4, C7, C8).
pub struct PushFanout {
    pub bus: PushBus,
    mobile: MobileDispatcher,
    http: reqwest::Client,
}

impl PushFanout {
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            bus: PushBus::new(stream_capacity),
            mobile: MobileDispatcher::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Publishes to live streams immediately, then dispatches push
    /// notifications to every team member's devices. The deployment serves
    /// one small team sharing one inbox (§1), so there is no per-event
    /// recipient to resolve — every registered device is a fan-out target,
    /// and push delivery is the catch-up path for devices without a live
    /// stream connected.
    pub async fn publish(&self, store: &Store, recipients: &[i64], event: PushEvent) {
        self.bus.publish(event.clone()).await;

        let Some(payload) = self.mobile.build_payload(&event) else {
            return;
        };

        for user_id in recipients {
            if let Ok(tokens) = store.push_tokens.list_for_user(*user_id).await {
                self.mobile.deliver(&tokens, &payload).await;
            }
            deliver_web_push(&self.http, store, *user_id, &event).await;
        }
    }
}
