//! Runtime knobs for the attendance core, injected into every service.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use db::models::attendance_record::AttendanceStatus;
use std::fmt;
use std::sync::Arc;
use util::config::AppConfig;

/// Key material for attendance token integrity tags.
///
/// `Debug` is redacted so the secret never reaches logs.
#[derive(Clone)]
pub struct QrSecret(Arc<[u8]>);

impl QrSecret {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for QrSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QrSecret(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("QR signing secret must not be empty")]
    EmptySecret,
    #[error("class start '{0}' is not a HH:MM time")]
    InvalidClassStart(String),
    #[error("UTC offset of {0} minutes is out of range")]
    InvalidUtcOffset(i32),
    #[error("QR session duration must be at least one second, got {0}")]
    InvalidSessionDuration(i64),
    #[error("QR session cap of {cap} s is below the default lifetime of {default} s")]
    InvalidSessionCap { cap: i64, default: i64 },
}

#[derive(Debug, Clone)]
pub struct AttendanceSettings {
    pub secret: QrSecret,
    /// Default token lifetime in seconds.
    pub session_duration_seconds: i64,
    /// Longest lifetime a caller may request for a single token.
    pub max_session_duration_seconds: i64,
    pub class_start: NaiveTime,
    pub grace_period: Duration,
    /// Offset that defines the school's calendar day and wall clock.
    pub utc_offset: FixedOffset,
    /// Upper bound for any single storage call.
    pub storage_timeout: std::time::Duration,
}

impl AttendanceSettings {
    /// Defaults: 300 s tokens capped at one hour, class at 08:00 with 15 min grace, UTC, 3 s storage timeout.
    pub fn new(secret: QrSecret) -> Self {
        Self {
            secret,
            session_duration_seconds: 300,
            max_session_duration_seconds: 3600,
            class_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            grace_period: Duration::minutes(15),
            utc_offset: Utc.fix(),
            storage_timeout: std::time::Duration::from_secs(3),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, SettingsError> {
        if cfg.qr_signing_secret.trim().is_empty() {
            return Err(SettingsError::EmptySecret);
        }
        if cfg.qr_session_seconds < 1 {
            return Err(SettingsError::InvalidSessionDuration(cfg.qr_session_seconds));
        }
        if cfg.qr_max_session_seconds < cfg.qr_session_seconds {
            return Err(SettingsError::InvalidSessionCap {
                cap: cfg.qr_max_session_seconds,
                default: cfg.qr_session_seconds,
            });
        }
        let class_start = NaiveTime::parse_from_str(cfg.class_start.trim(), "%H:%M")
            .map_err(|_| SettingsError::InvalidClassStart(cfg.class_start.clone()))?;
        let utc_offset = FixedOffset::east_opt(cfg.utc_offset_minutes * 60)
            .ok_or(SettingsError::InvalidUtcOffset(cfg.utc_offset_minutes))?;

        Ok(Self {
            secret: QrSecret::new(cfg.qr_signing_secret.as_bytes()),
            session_duration_seconds: cfg.qr_session_seconds,
            max_session_duration_seconds: cfg.qr_max_session_seconds,
            class_start,
            grace_period: Duration::minutes(cfg.grace_period_minutes.max(0)),
            utc_offset,
            storage_timeout: std::time::Duration::from_millis(cfg.storage_timeout_ms.max(1)),
        })
    }

    /// Last wall-clock time that still counts as on time.
    pub fn late_threshold(&self) -> NaiveTime {
        self.class_start + self.grace_period
    }

    /// Calendar day `at` falls on, in the school's offset.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn status_for(&self, at: DateTime<Utc>) -> AttendanceStatus {
        if at.with_timezone(&self.utc_offset).time() <= self.late_threshold() {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }
}
