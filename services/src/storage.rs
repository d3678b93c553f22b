use crate::error::AttendanceError;
use sea_orm::DbErr;
use std::future::Future;
use std::time::Duration;

/// Runs a storage call under `limit`.
///
/// Both a timeout and a database error surface as `Persistence`, the one
/// retryable failure.
pub async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, AttendanceError>
where
    F: Future<Output = Result<T, DbErr>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::error!(op, error = %err, "Storage call failed");
            Err(AttendanceError::from(err))
        }
        Err(_) => {
            tracing::error!(op, timeout_ms = limit.as_millis() as u64, "Storage call timed out");
            Err(AttendanceError::Persistence(format!(
                "{op} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}
