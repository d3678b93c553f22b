//! Attendance ledger: the only writer of `attendance_records`.
//!
//! One open record per subject per calendar day is enforced by a partial
//! unique index; the pre-check here only gives a friendlier error in the
//! common case.

use crate::error::{AttendanceError, is_unique_violation};
use crate::notifier::{AttendanceEvent, EventType, Notifier, dispatch};
use crate::settings::AttendanceSettings;
use crate::storage::bounded;
use chrono::{DateTime, NaiveDate, Utc};
use db::models::attendance_record::{
    ActiveModel, AttendanceStatus, Column, Entity, Model as AttendanceRecord,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::Serialize;
use std::sync::Arc;

pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TodayStatus {
    NotCheckedIn,
    CheckedIn {
        time_in: DateTime<Utc>,
        status: AttendanceStatus,
    },
    CheckedOut {
        time_in: DateTime<Utc>,
        time_out: DateTime<Utc>,
        status: AttendanceStatus,
        duration_minutes: i64,
    },
}

/// Inclusive date range plus 1-based paging.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u64,
    pub per_page: u64,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            page: 1,
            per_page: 20,
        }
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    db: DatabaseConnection,
    settings: AttendanceSettings,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AttendanceService {
    pub fn new(db: DatabaseConnection, settings: AttendanceSettings) -> Self {
        Self {
            db,
            settings,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn for_day(subject_id: &str, date: NaiveDate) -> Select<Entity> {
        Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::AttendanceDate.eq(date))
    }

    async fn open_record(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        bounded(
            self.settings.storage_timeout,
            "attendance.open_record",
            Self::for_day(subject_id, date)
                .filter(Column::TimeOut.is_null())
                .one(&self.db),
        )
        .await
    }

    /// Latest record for `subject_id` on `date`, open or closed.
    pub async fn find_for_day(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        bounded(
            self.settings.storage_timeout,
            "attendance.find_for_day",
            Self::for_day(subject_id, date)
                .order_by_desc(Column::TimeIn)
                .order_by_desc(Column::Id)
                .one(&self.db),
        )
        .await
    }

    /// Opens a record at `at`. Status is fixed here and never recomputed.
    pub async fn check_in(
        &self,
        subject_id: &str,
        at: DateTime<Utc>,
        source_session_id: Option<&str>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let date = self.settings.local_date(at);
        if let Some(open) = self.open_record(subject_id, date).await? {
            return Err(AttendanceError::AlreadyCheckedIn { time_in: open.time_in });
        }

        let active = ActiveModel {
            subject_id: Set(subject_id.to_owned()),
            attendance_date: Set(date),
            time_in: Set(at),
            time_out: Set(None),
            status: Set(self.settings.status_for(at)),
            duration_minutes: Set(None),
            source_session_id: Set(source_session_id.map(str::to_owned)),
            ..Default::default()
        };

        let inserted = bounded(self.settings.storage_timeout, "attendance.check_in", async {
            match active.insert(&self.db).await {
                Ok(record) => Ok(Some(record)),
                Err(err) if is_unique_violation(&err) => Ok(None),
                Err(err) => Err(err),
            }
        })
        .await?;

        let Some(record) = inserted else {
            // Lost the race to a concurrent check-in for the same day.
            let time_in = self
                .open_record(subject_id, date)
                .await?
                .map(|r| r.time_in)
                .unwrap_or(at);
            return Err(AttendanceError::AlreadyCheckedIn { time_in });
        };

        tracing::info!(
            subject_id,
            record_id = record.id,
            status = %record.status,
            "Checked in"
        );
        self.notify(&record, EventType::CheckIn, at);
        Ok(record)
    }

    /// Closes today's open record. Duration is truncated to whole minutes.
    pub async fn check_out(
        &self,
        subject_id: &str,
        at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let date = self.settings.local_date(at);
        let open = self
            .open_record(subject_id, date)
            .await?
            .ok_or(AttendanceError::NoOpenSession)?;

        if at < open.time_in {
            tracing::error!(
                subject_id,
                record_id = open.id,
                time_in = %open.time_in,
                time_out = %at,
                "Rejected check-out before check-in"
            );
            return Err(AttendanceError::InvalidTimeOrder {
                time_in: open.time_in,
                time_out: at,
            });
        }
        let minutes = (at - open.time_in).num_minutes();

        let res = bounded(
            self.settings.storage_timeout,
            "attendance.check_out",
            Entity::update_many()
                .col_expr(Column::TimeOut, Expr::value(at))
                .col_expr(Column::DurationMinutes, Expr::value(minutes))
                .filter(Column::Id.eq(open.id))
                .filter(Column::TimeOut.is_null())
                .exec(&self.db),
        )
        .await?;
        if res.rows_affected != 1 {
            // Closed concurrently between the read and the update.
            return Err(AttendanceError::NoOpenSession);
        }

        let record = AttendanceRecord {
            time_out: Some(at),
            duration_minutes: Some(minutes),
            ..open
        };
        tracing::info!(subject_id, record_id = record.id, minutes, "Checked out");
        self.notify(&record, EventType::CheckOut, at);
        Ok(record)
    }

    pub async fn today_status(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TodayStatus, AttendanceError> {
        let record = self
            .find_for_day(subject_id, self.settings.local_date(now))
            .await?;

        Ok(match record {
            None => TodayStatus::NotCheckedIn,
            Some(r) => match (r.time_out, r.duration_minutes) {
                (Some(time_out), Some(duration_minutes)) => TodayStatus::CheckedOut {
                    time_in: r.time_in,
                    time_out,
                    status: r.status,
                    duration_minutes,
                },
                _ => TodayStatus::CheckedIn {
                    time_in: r.time_in,
                    status: r.status,
                },
            },
        })
    }

    /// Records most recent first, with the total count before paging.
    ///
    /// A page whose row offset cannot be represented is `InvalidRequest`.
    pub async fn history(
        &self,
        subject_id: &str,
        query: &HistoryQuery,
    ) -> Result<(Vec<AttendanceRecord>, u64), AttendanceError> {
        let mut select = Entity::find().filter(Column::SubjectId.eq(subject_id));
        if let Some(from) = query.from {
            select = select.filter(Column::AttendanceDate.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(Column::AttendanceDate.lte(to));
        }

        let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
        let page = query.page.max(1);
        // SQLite takes the row offset as a signed 64-bit integer.
        (page - 1)
            .checked_mul(per_page)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| AttendanceError::InvalidRequest(format!("page {page} is out of range")))?;

        let paginator = select
            .order_by_desc(Column::TimeIn)
            .order_by_desc(Column::Id)
            .paginate(&self.db, per_page);

        let limit = self.settings.storage_timeout;
        let total = bounded(limit, "attendance.history_count", paginator.num_items()).await?;
        let records = bounded(limit, "attendance.history", paginator.fetch_page(page - 1)).await?;
        Ok((records, total))
    }

    fn notify(&self, record: &AttendanceRecord, event_type: EventType, at: DateTime<Utc>) {
        if let Some(notifier) = &self.notifier {
            dispatch(
                notifier.clone(),
                AttendanceEvent {
                    subject_id: record.subject_id.clone(),
                    event_type,
                    at,
                    status: record.status,
                    duration_minutes: record.duration_minutes,
                },
            );
        }
    }
}
