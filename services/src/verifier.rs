//! Token verification and the check-in orchestration built on it.
//!
//! A presented token walks decode → integrity → session lookup → expiry →
//! consumption → identity → same-day eligibility. The first failed predicate
//! is the outcome. Every call is written to the `attendance::audit` target.

use crate::attendance::AttendanceService;
use crate::directory::UserDirectory;
use crate::error::{AttendanceError, ResultCode};
use crate::qr_session::QrSessionService;
use crate::storage::bounded;
use crate::token::{self, AttendanceToken};
use chrono::{DateTime, Utc};
use db::models::attendance_record::Model as AttendanceRecord;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const CONSUME_ATTEMPTS: u32 = 3;
const CONSUME_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligible {
    pub subject_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct CheckInOutcome {
    pub record: AttendanceRecord,
    pub session_id: String,
    /// `false` when the record was written but the token could not be
    /// marked used. The same-day rule still blocks a second check-in.
    pub consumed: bool,
}

/// Caller-facing verdict for any verification or check-in attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub code: ResultCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
}

impl VerificationResult {
    fn base(success: bool, code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            success,
            code,
            message: message.into(),
            subject_id: None,
            session_id: None,
            expires_at: None,
            consumed_at: None,
            time_in: None,
            record: None,
        }
    }

    pub fn eligible(e: &Eligible) -> Self {
        Self {
            subject_id: Some(e.subject_id.clone()),
            session_id: Some(e.session_id.clone()),
            ..Self::base(true, ResultCode::Eligible, "Token is valid")
        }
    }

    pub fn checked_in(outcome: &CheckInOutcome) -> Self {
        Self {
            subject_id: Some(outcome.record.subject_id.clone()),
            session_id: Some(outcome.session_id.clone()),
            time_in: Some(outcome.record.time_in),
            record: Some(outcome.record.clone()),
            ..Self::base(true, ResultCode::CheckedIn, "Checked in")
        }
    }

    pub fn checked_out(record: &AttendanceRecord) -> Self {
        Self {
            subject_id: Some(record.subject_id.clone()),
            time_in: Some(record.time_in),
            record: Some(record.clone()),
            ..Self::base(true, ResultCode::CheckedOut, "Checked out")
        }
    }

    pub fn failure(err: &AttendanceError) -> Self {
        let message = match err {
            AttendanceError::Persistence(_) => {
                "Attendance storage is temporarily unavailable, please retry".to_owned()
            }
            other => other.to_string(),
        };
        let mut result = Self::base(false, err.code(), message);
        match err {
            AttendanceError::SessionExpired { expires_at } => result.expires_at = Some(*expires_at),
            AttendanceError::SessionAlreadyUsed { consumed_at } => result.consumed_at = *consumed_at,
            AttendanceError::AlreadyMarkedToday { time_in }
            | AttendanceError::AlreadyCheckedIn { time_in }
            | AttendanceError::InvalidTimeOrder { time_in, .. } => result.time_in = Some(*time_in),
            AttendanceError::UnknownSubject(subject_id) => result.subject_id = Some(subject_id.clone()),
            _ => {}
        }
        result
    }
}

#[derive(Clone)]
pub struct VerifierService {
    sessions: QrSessionService,
    ledger: AttendanceService,
    directory: Arc<dyn UserDirectory>,
}

impl VerifierService {
    pub fn new(
        sessions: QrSessionService,
        ledger: AttendanceService,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            directory,
        }
    }

    pub fn sessions(&self) -> &QrSessionService {
        &self.sessions
    }

    pub fn ledger(&self) -> &AttendanceService {
        &self.ledger
    }

    /// Runs every check without writing anything.
    pub async fn verify(
        &self,
        serialized: &str,
        origin_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Eligible, AttendanceError> {
        let (token, result) = match token::decode(serialized) {
            Ok(token) => {
                let result = self.evaluate(&token, now).await;
                (Some(token), result)
            }
            Err(err) => (None, Err(err)),
        };
        audit(token.as_ref(), &result, origin_ip);
        result
    }

    async fn evaluate(&self, token: &AttendanceToken, now: DateTime<Utc>) -> Result<Eligible, AttendanceError> {
        let settings = self.sessions.settings();
        if !token::verify_integrity(token, &settings.secret) {
            return Err(AttendanceError::IntegrityFailure);
        }

        let session = self
            .sessions
            .find(&token.session_id, &token.subject_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;
        if session.integrity_tag != token.integrity_tag || session.issued_at.timestamp() != token.issued_at {
            return Err(AttendanceError::IntegrityFailure);
        }
        if !session.is_live_at(now) {
            return Err(AttendanceError::SessionExpired {
                expires_at: session.expires_at,
            });
        }
        if session.consumed {
            return Err(AttendanceError::SessionAlreadyUsed {
                consumed_at: session.consumed_at,
            });
        }

        let entry = bounded(
            settings.storage_timeout,
            "directory.lookup",
            self.directory.lookup(&token.subject_id),
        )
        .await?;
        if !entry.exists {
            return Err(AttendanceError::UnknownSubject(token.subject_id.clone()));
        }

        if let Some(existing) = self
            .ledger
            .find_for_day(&token.subject_id, settings.local_date(now))
            .await?
        {
            return Err(AttendanceError::AlreadyMarkedToday {
                time_in: existing.time_in,
            });
        }

        Ok(Eligible {
            subject_id: token.subject_id.clone(),
            session_id: token.session_id.clone(),
        })
    }

    /// Verifies, checks in, then consumes the token.
    ///
    /// Consumption is retried on storage failures only; the check-in itself is
    /// never repeated.
    pub async fn check_in_with_token(
        &self,
        serialized: &str,
        origin_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome, AttendanceError> {
        let eligible = self.verify(serialized, origin_ip, now).await?;
        let record = self
            .ledger
            .check_in(&eligible.subject_id, now, Some(&eligible.session_id))
            .await?;
        let consumed = self.consume_with_retry(&eligible, now).await;

        Ok(CheckInOutcome {
            record,
            session_id: eligible.session_id,
            consumed,
        })
    }

    async fn consume_with_retry(&self, eligible: &Eligible, now: DateTime<Utc>) -> bool {
        let mut attempt = 1;
        loop {
            match self.sessions.mark_consumed(&eligible.session_id, now).await {
                Ok(true) => return true,
                Ok(false) => {
                    tracing::warn!(
                        subject_id = %eligible.subject_id,
                        session_id = %eligible.session_id,
                        "Token was consumed concurrently after check-in"
                    );
                    return false;
                }
                Err(err) if err.is_retryable() && attempt < CONSUME_ATTEMPTS => {
                    tracing::warn!(attempt, error = %err, "Retrying token consumption");
                    tokio::time::sleep(CONSUME_BACKOFF * 2u32.pow(attempt - 1)).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        subject_id = %eligible.subject_id,
                        session_id = %eligible.session_id,
                        error = %err,
                        "Checked in but could not mark token consumed"
                    );
                    return false;
                }
            }
        }
    }
}

fn audit(token: Option<&AttendanceToken>, result: &Result<Eligible, AttendanceError>, origin_ip: Option<&str>) {
    let subject_id = token.map(|t| t.subject_id.as_str()).unwrap_or("-");
    let session_id = token.map(|t| t.session_id.as_str()).unwrap_or("-");
    let ip = origin_ip.unwrap_or("-");

    match result {
        Ok(_) => tracing::info!(
            target: "attendance::audit",
            subject_id, session_id, ip,
            code = %ResultCode::Eligible,
            "Token verified"
        ),
        Err(err) if err.is_security_event() => tracing::error!(
            target: "attendance::audit",
            subject_id, session_id, ip,
            code = %err.code(),
            "Rejected token: {err}"
        ),
        Err(err) => tracing::warn!(
            target: "attendance::audit",
            subject_id, session_id, ip,
            code = %err.code(),
            "Rejected token: {err}"
        ),
    }
}
