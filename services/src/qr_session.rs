//! Session store: the only writer of `qr_sessions`.

use crate::error::AttendanceError;
use crate::settings::AttendanceSettings;
use crate::storage::bounded;
use crate::token;
use chrono::{DateTime, Duration, TimeZone, Utc};
use db::models::qr_session::{ActiveModel, Column, Entity, Model as QrSession};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

#[derive(Clone)]
pub struct QrSessionService {
    db: DatabaseConnection,
    settings: AttendanceSettings,
}

impl QrSessionService {
    pub fn new(db: DatabaseConnection, settings: AttendanceSettings) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &AttendanceSettings {
        &self.settings
    }

    /// Issues a token for `subject_id` and persists its session.
    ///
    /// `duration_seconds` falls back to the configured lifetime and may not
    /// exceed the configured cap. `issued_at` is truncated to whole seconds so
    /// the stored row matches the token.
    pub async fn create(
        &self,
        subject_id: &str,
        duration_seconds: Option<i64>,
        origin_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<QrSession, AttendanceError> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(AttendanceError::InvalidRequest("subject id is required".into()));
        }
        let duration = duration_seconds.unwrap_or(self.settings.session_duration_seconds);
        if duration < 1 {
            return Err(AttendanceError::InvalidRequest(format!(
                "session duration must be at least one second, got {duration}"
            )));
        }
        let cap = self.settings.max_session_duration_seconds;
        if duration > cap {
            return Err(AttendanceError::InvalidRequest(format!(
                "session duration may not exceed {cap} seconds, got {duration}"
            )));
        }

        let issued_secs = now.timestamp();
        let issued_at = Utc
            .timestamp_opt(issued_secs, 0)
            .single()
            .ok_or_else(|| AttendanceError::InvalidRequest("issuance time out of range".into()))?;
        let expires_at = Duration::try_seconds(duration)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| AttendanceError::InvalidRequest("expiry time out of range".into()))?;
        let session_id = token::generate_session_id(subject_id, issued_secs);
        let token = token::encode(&self.settings.secret, subject_id, &session_id, issued_secs);

        let active = ActiveModel {
            session_id: Set(session_id),
            subject_id: Set(subject_id.to_owned()),
            raw_payload: Set(token.serialize()),
            integrity_tag: Set(token.integrity_tag),
            issued_at: Set(issued_at),
            expires_at: Set(expires_at),
            consumed: Set(false),
            consumed_at: Set(None),
            origin_ip: Set(origin_ip.map(str::to_owned)),
        };

        let session = bounded(self.settings.storage_timeout, "qr_session.create", active.insert(&self.db)).await?;
        tracing::info!(
            subject_id = %session.subject_id,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Issued attendance token"
        );
        Ok(session)
    }

    /// Exact lookup. A subject mismatch reads as "not found".
    pub async fn find(&self, session_id: &str, subject_id: &str) -> Result<Option<QrSession>, AttendanceError> {
        bounded(
            self.settings.storage_timeout,
            "qr_session.find",
            Entity::find_by_id(session_id.to_owned())
                .filter(Column::SubjectId.eq(subject_id))
                .one(&self.db),
        )
        .await
    }

    /// Flips `consumed` false→true in one conditional update.
    ///
    /// Returns `false` when the session is missing or was already consumed;
    /// of two concurrent callers exactly one sees `true`.
    pub async fn mark_consumed(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, AttendanceError> {
        let res = bounded(
            self.settings.storage_timeout,
            "qr_session.mark_consumed",
            Entity::update_many()
                .col_expr(Column::Consumed, Expr::value(true))
                .col_expr(Column::ConsumedAt, Expr::value(now))
                .filter(Column::SessionId.eq(session_id))
                .filter(Column::Consumed.eq(false))
                .exec(&self.db),
        )
        .await?;

        Ok(res.rows_affected == 1)
    }

    /// Deletes every session whose `expires_at` has passed, consumed or not.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AttendanceError> {
        let res = bounded(
            self.settings.storage_timeout,
            "qr_session.purge_expired",
            Entity::delete_many()
                .filter(Column::ExpiresAt.lt(now))
                .exec(&self.db),
        )
        .await?;

        if res.rows_affected > 0 {
            tracing::info!(purged = res.rows_affected, "Purged expired attendance sessions");
        }
        Ok(res.rows_affected)
    }
}
