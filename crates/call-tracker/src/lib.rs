//! C4: the call tracker. Consumes the PBX-MI event stream and maintains
//! per-channel state, the ringing-call set, and authoritative call rows
//! written from CDRs (§4.4 of the design).

mod cdr;
mod classify;
mod config;
mod error;
mod event;
mod ringing;
mod tracker;

pub use config::CallTrackerConfig;
pub use error::{CallTrackerError, Result};
pub use tracker::CallTracker;

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;

    use models::CallStatus;
    use pbx_mi::{Frame, PbxMiClient, PbxMiConfig};
    use push_bus::PushFanout;
    use store::Store;

    use crate::config::CallTrackerConfig;
    use crate::tracker::CallTracker;

    async fn test_store() -> Store {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("../store/migrations").run(&pool).await.unwrap();
        Store::from_pool(pool)
    }

    fn config() -> CallTrackerConfig {
        CallTrackerConfig {
            national_prefix: Some("+33".into()),
            ..CallTrackerConfig::default()
        }
    }

    async fn tracker_with_store() -> (Arc<CallTracker>, Arc<PushFanout>, Store) {
        let store = test_store().await;
        let pbx = PbxMiClient::new(PbxMiConfig::default());
        let push = Arc::new(PushFanout::new(16));
        let tracker = CallTracker::new(pbx, push.clone(), store.clone(), config(), vec![]);
        (tracker, push, store)
    }

    #[tokio::test]
    async fn incoming_ring_then_answer_then_cdr() {
        let (tracker, push, store) = tracker_with_store().await;
        let sub = push.bus.subscribe(None).await;

        let newchannel = Frame::new()
            .with("Event", "Newchannel")
            .with("Channel", "PJSIP/GSM-Line1-aaa")
            .with("CallerIDNum", "+33123456789")
            .with("Context", "from-trunk")
            .with("Linkedid", "L1");
        tracker.handle_frame(&newchannel).await;

        let dest_channel = Frame::new()
            .with("Event", "Newchannel")
            .with("Channel", "PJSIP/1001-xyz")
            .with("CallerIDNum", "1001")
            .with("Context", "from-internal")
            .with("Linkedid", "L1")
            .with("Exten", "1001");
        tracker.handle_frame(&dest_channel).await;

        let dial_begin = Frame::new()
            .with("Event", "DialBegin")
            .with("Channel", "PJSIP/GSM-Line1-aaa")
            .with("DestChannel", "PJSIP/1001-xyz")
            .with("Linkedid", "L1");
        tracker.handle_frame(&dial_begin).await;

        let incoming = sub.recv().await.unwrap();
        match incoming {
            dto::PushEvent::IncomingCall { call_id, caller_number, extension, .. } => {
                assert_eq!(call_id, "L1");
                assert_eq!(caller_number, "+33123456789");
                assert_eq!(extension.as_deref(), Some("1001"));
            }
            other => panic!("expected incoming_call, got {other:?}"),
        }

        let bridge = Frame::new()
            .with("Event", "Bridge")
            .with("Channel1", "PJSIP/GSM-Line1-aaa")
            .with("Channel2", "PJSIP/1001-xyz")
            .with("Linkedid", "L1");
        tracker.handle_frame(&bridge).await;

        let ended = sub.recv().await.unwrap();
        match ended {
            dto::PushEvent::CallEnded { call_id, status } => {
                assert_eq!(call_id, "L1");
                assert_eq!(status, "answered");
            }
            other => panic!("expected call_ended, got {other:?}"),
        }
        assert!(store.calls.get("pbx_L1").await.unwrap().is_none());

        let cdr = Frame::new()
            .with("Event", "CDR")
            .with("UniqueID", "L1")
            .with("Source", "+33123456789")
            .with("Destination", "1001")
            .with("DestinationContext", "from-trunk")
            .with("Disposition", "ANSWERED")
            .with("StartTime", "0")
            .with("AnswerTime", "10")
            .with("EndTime", "70")
            .with("Channel", "PJSIP/GSM-Line1-aaa")
            .with("DestChannel", "PJSIP/1001-xyz");
        tracker.handle_frame(&cdr).await;

        let history = sub.recv().await.unwrap();
        assert!(matches!(history, dto::PushEvent::CallHistoryUpdate { call_id } if call_id == "pbx_L1"));

        let stored = store.calls.get("pbx_L1").await.unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Answered);
        assert_eq!(stored.caller_number, "0123456789");
        assert_eq!(stored.duration(), 60);
    }

    #[tokio::test]
    async fn answer_call_reports_channel_not_found_when_unknown() {
        let (tracker, _push, _store) = tracker_with_store().await;
        let err = tracker.answer_call("missing", "200").await.unwrap_err();
        assert!(matches!(err, crate::CallTrackerError::Unavailable));
    }
}
