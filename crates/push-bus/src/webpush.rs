use dto::PushEvent;
use models::WebPushSubscription;
use store::Store;

/// Delivers `event` to every web-push endpoint registered for `user_id`.
/// A 404/410 from the push service means the browser dropped the
/// subscription; we deregister it so future fan-outs don't keep retrying
/// a dead endpoint, per §4.2.
pub async fn deliver_web_push(
    client: &reqwest::Client,
    store: &Store,
    user_id: i64,
    event: &PushEvent,
) {
    let subs = match store.web_push.list_for_user(user_id).await {
        Ok(subs) => subs,
        Err(err) => {
            tracing::warn!(%err, user_id, "failed to load web-push subscriptions");
            return;
        }
    };

    for sub in subs {
        send_one(client, store, &sub, event).await;
    }
}

async fn send_one(client: &reqwest::Client, store: &Store, sub: &WebPushSubscription, event: &PushEvent) {
    let body = serde_json::to_vec(event).unwrap_or_default();
    match client.post(&sub.endpoint).body(body).send().await {
        Ok(resp) if resp.status() == 404 || resp.status() == 410 => {
            if let Err(err) = store.web_push.deregister(&sub.endpoint).await {
                tracing::warn!(%err, endpoint = %sub.endpoint, "failed to deregister stale web-push endpoint");
            }
        }
        Ok(resp) if !resp.status().is_success() => {
            tracing::warn!(status = %resp.status(), endpoint = %sub.endpoint, "web-push delivery failed");
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(%err, endpoint = %sub.endpoint, "web-push request failed");
        }
    }
}
