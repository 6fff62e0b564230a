//! C8: mirrors polling-only remote conversation stores (typified by the
//! SMS bridge) into the local store, idempotently (§4.8).

mod config;
mod error;
mod reflector;
mod source;

pub use config::ReflectorConfig;
pub use error::{ReflectorError, Result};
pub use reflector::ChatReflector;
pub use source::{RemoteConversation, RemoteMessage, ReflectorSource};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use sqlx::SqlitePool;

    use super::*;

    struct FixedSource {
        sent: AtomicU64,
        outbox: Mutex<Vec<(String, String)>>,
    }

    impl FixedSource {
        fn new() -> Self {
            Self {
                sent: AtomicU64::new(0),
                outbox: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReflectorSource for FixedSource {
        fn provider_id(&self) -> &str {
            "sms_bridge"
        }

        async fn list_conversations(&self) -> Result<Vec<RemoteConversation>> {
            Ok(vec![RemoteConversation {
                id: "7".to_string(),
                display_name: "+33611111111".to_string(),
                remote_number: "+33611111111".to_string(),
            }])
        }

        async fn list_messages(&self, conversation_id: &str, _limit: u32) -> Result<Vec<RemoteMessage>> {
            assert_eq!(conversation_id, "7");
            Ok(vec![
                RemoteMessage {
                    id: "m1".to_string(),
                    from_me: false,
                    content: "hello".to_string(),
                    sender_id: None,
                    timestamp: 100,
                },
                RemoteMessage {
                    id: "m2".to_string(),
                    from_me: false,
                    content: "world".to_string(),
                    sender_id: None,
                    timestamp: 200,
                },
            ])
        }

        async fn send_text(&self, remote_number: &str, text: &str) -> Result<RemoteMessage> {
            self.outbox.lock().unwrap().push((remote_number.to_string(), text.to_string()));
            let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RemoteMessage {
                id: format!("out-{n}"),
                from_me: true,
                content: text.to_string(),
                sender_id: None,
                timestamp: 300 + n as i64,
            })
        }
    }

    async fn test_store() -> store::Store {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("../store/migrations").run(&pool).await.unwrap();
        store::Store::from_pool(pool)
    }

    #[tokio::test]
    async fn scenario_5_reflector_idempotence() {
        let source = Arc::new(FixedSource::new());
        let store = test_store().await;
        let push = Arc::new(push_bus::PushFanout::new(16));
        let reflector = ChatReflector::new(source, store.clone(), push, vec![], ReflectorConfig::default());

        let first = reflector.poll_once().await.unwrap();
        assert_eq!(first, 2);

        let chat = store.chats.get("sms_7").await.unwrap().unwrap();
        assert_eq!(chat.timestamp, 200);
        let messages = store.messages.list_for_chat("sms_7", 10).await.unwrap();
        assert_eq!(messages.len(), 2);

        let second = reflector.poll_once().await.unwrap();
        assert_eq!(second, 0);
        let messages_again = store.messages.list_for_chat("sms_7", 10).await.unwrap();
        assert_eq!(messages_again.len(), 2);
    }

    #[tokio::test]
    async fn send_text_stores_locally_before_next_poll_echoes() {
        let source = Arc::new(FixedSource::new());
        let store = test_store().await;
        let push = Arc::new(push_bus::PushFanout::new(16));
        let reflector = ChatReflector::new(source, store.clone(), push, vec![], ReflectorConfig::default());

        reflector.poll_once().await.unwrap();
        let sent = reflector.send_text("sms_7", "reply").await.unwrap();
        assert!(sent.from_me);

        let messages = store.messages.list_for_chat("sms_7", 10).await.unwrap();
        assert_eq!(messages.len(), 3);
    }
}
