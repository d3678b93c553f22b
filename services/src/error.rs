use chrono::{DateTime, Utc};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use strum::Display;

/// Outcome codes surfaced to callers, both for success and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum ResultCode {
    Eligible,
    CheckedIn,
    CheckedOut,
    MalformedPayload,
    IntegrityFailure,
    SessionNotFound,
    SessionExpired,
    SessionAlreadyUsed,
    AlreadyMarkedToday,
    AlreadyCheckedIn,
    NoOpenSession,
    InvalidTimeOrder,
    UnknownSubject,
    InvalidRequest,
    PersistenceError,
}

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("attendance payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("attendance token failed its integrity check")]
    IntegrityFailure,

    #[error("attendance session not found")]
    SessionNotFound,

    #[error("attendance session expired at {expires_at}")]
    SessionExpired { expires_at: DateTime<Utc> },

    #[error("attendance session has already been used")]
    SessionAlreadyUsed { consumed_at: Option<DateTime<Utc>> },

    #[error("attendance already marked today at {time_in}")]
    AlreadyMarkedToday { time_in: DateTime<Utc> },

    #[error("already checked in at {time_in}")]
    AlreadyCheckedIn { time_in: DateTime<Utc> },

    #[error("no open attendance record to check out")]
    NoOpenSession,

    #[error("check-out at {time_out} precedes check-in at {time_in}")]
    InvalidTimeOrder {
        time_in: DateTime<Utc>,
        time_out: DateTime<Utc>,
    },

    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage unavailable: {0}")]
    Persistence(String),
}

impl AttendanceError {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::MalformedPayload(_) => ResultCode::MalformedPayload,
            Self::IntegrityFailure => ResultCode::IntegrityFailure,
            Self::SessionNotFound => ResultCode::SessionNotFound,
            Self::SessionExpired { .. } => ResultCode::SessionExpired,
            Self::SessionAlreadyUsed { .. } => ResultCode::SessionAlreadyUsed,
            Self::AlreadyMarkedToday { .. } => ResultCode::AlreadyMarkedToday,
            Self::AlreadyCheckedIn { .. } => ResultCode::AlreadyCheckedIn,
            Self::NoOpenSession => ResultCode::NoOpenSession,
            Self::InvalidTimeOrder { .. } => ResultCode::InvalidTimeOrder,
            Self::UnknownSubject(_) => ResultCode::UnknownSubject,
            Self::InvalidRequest(_) => ResultCode::InvalidRequest,
            Self::Persistence(_) => ResultCode::PersistenceError,
        }
    }

    /// Only storage failures are worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Tampering and replay attempts, logged apart for security monitoring.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::IntegrityFailure | Self::SessionAlreadyUsed { .. })
    }
}

impl From<DbErr> for AttendanceError {
    fn from(err: DbErr) -> Self {
        AttendanceError::Persistence(err.to_string())
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
