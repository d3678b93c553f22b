//! Outbound attendance events.
//!
//! Delivery is best effort: events are dispatched after the write is durable,
//! and a failed delivery is logged, never propagated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::attendance_record::AttendanceStatus;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use util::ws::{WebSocketManager, emit};

/// Topic every attendance event is mirrored on.
pub const ALL_TOPIC: &str = "attendance:all";

pub fn subject_topic(subject_id: &str) -> String {
    format!("attendance:subject:{subject_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventType {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub subject_id: String,
    pub event_type: EventType,
    pub at: DateTime<Utc>,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AttendanceEvent) -> Result<(), NotifyError>;
}

/// Spawns delivery and returns immediately.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: AttendanceEvent) {
    tokio::spawn(async move {
        if let Err(err) = notifier.notify(&event).await {
            tracing::warn!(
                subject_id = %event.subject_id,
                event_type = %event.event_type,
                error = %err,
                "Attendance notification dropped"
            );
        }
    });
}

/// Publishes events to the WebSocket hub, on the subject's topic and on
/// [`ALL_TOPIC`].
#[derive(Clone)]
pub struct BroadcastNotifier {
    ws: WebSocketManager,
}

impl BroadcastNotifier {
    pub fn new(ws: WebSocketManager) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: &AttendanceEvent) -> Result<(), NotifyError> {
        let name = event.event_type.to_string();
        let topic = subject_topic(&event.subject_id);
        let reached = emit(&self.ws, &topic, &name, event).await?
            + emit(&self.ws, ALL_TOPIC, &name, event).await?;
        tracing::debug!(subject_id = %event.subject_id, reached, "Broadcast attendance event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::time::{Duration, timeout};

    fn event() -> AttendanceEvent {
        AttendanceEvent {
            subject_id: "S-001".into(),
            event_type: EventType::CheckIn,
            at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            status: AttendanceStatus::Present,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["subjectId"], "S-001");
        assert_eq!(json["eventType"], "checkIn");
        assert_eq!(json["status"], "present");
        assert!(json.get("durationMinutes").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subject_and_all_topics() {
        let ws = WebSocketManager::new();
        let mut mine = ws.subscribe(&subject_topic("S-001")).await;
        let mut all = ws.subscribe(ALL_TOPIC).await;

        BroadcastNotifier::new(ws.clone()).notify(&event()).await.unwrap();

        for rx in [&mut mine, &mut all] {
            let raw = timeout(Duration::from_millis(50), rx.recv()).await.unwrap().unwrap();
            let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(v["event"], "checkIn");
            assert_eq!(v["payload"]["subjectId"], "S-001");
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _: &AttendanceEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable("smtp down".into()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        dispatch(Arc::new(Failing), event());
        tokio::task::yield_now().await;
    }
}
