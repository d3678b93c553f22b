//! State handed to every handler: the database, the attendance topic hub and
//! the instant the server came up.

use crate::ws::WebSocketManager;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    ws: WebSocketManager,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, ws: WebSocketManager) -> Self {
        Self {
            db,
            ws,
            started_at: Utc::now(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Hub that attendance events are published on.
    pub fn ws(&self) -> &WebSocketManager {
        &self.ws
    }

    /// Whole seconds since startup, never negative.
    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn uptime_counts_from_startup_and_never_goes_negative() {
        let started_at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let state = AppState {
            db: DatabaseConnection::Disconnected,
            ws: WebSocketManager::new(),
            started_at,
        };

        assert_eq!(state.uptime_seconds(started_at + Duration::seconds(90)), 90);
        assert_eq!(state.uptime_seconds(started_at - Duration::seconds(5)), 0);
    }
}
