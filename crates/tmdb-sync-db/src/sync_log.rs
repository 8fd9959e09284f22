use chrono::NaiveDate;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Initialized,
    FetchingData,
    DataFetched,
    SyncingToDb,
    UpdatingPopularity,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Initialized => "initialized",
            SyncStatus::FetchingData => "fetching_data",
            SyncStatus::DataFetched => "data_fetched",
            SyncStatus::SyncingToDb => "syncing_to_db",
            SyncStatus::UpdatingPopularity => "updating_popularity",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    /// Whether transitioning from `self` to `next` is a legal edge in
    /// the sync-log state machine. `Failed` is reachable from any
    /// non-terminal state; every other edge follows the fixed forward
    /// sequence a single run walks through.
    pub fn can_advance_to(&self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        if matches!(next, Failed) {
            return !matches!(self, Success | Failed);
        }
        matches!(
            (self, next),
            (Initialized, FetchingData)
                | (FetchingData, DataFetched)
                | (DataFetched, SyncingToDb)
                | (SyncingToDb, UpdatingPopularity)
                | (SyncingToDb, Success)
                | (UpdatingPopularity, Success)
        )
    }
}

#[derive(Debug)]
pub struct SyncLog {
    pub id: i64,
    pub kind: String,
    pub status: SyncStatus,
    pub date: NaiveDate,
}

#[derive(Debug)]
pub enum SyncLogError {
    IllegalTransition { from: SyncStatus, to: SyncStatus },
    Db(DbError),
}

impl std::fmt::Display for SyncLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncLogError::IllegalTransition { from, to } => write!(
                f,
                "illegal sync-log transition from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            SyncLogError::Db(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SyncLogError {}

impl From<DbError> for SyncLogError {
    fn from(err: DbError) -> Self {
        SyncLogError::Db(err)
    }
}

/// Creates the initial `initialized` row for a kind's run on `date`.
pub async fn init(pool: &PgPool, kind: &str, date: NaiveDate) -> Result<SyncLog, SyncLogError> {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO sync_log (kind, status, date, updated_at) VALUES ($1, $2, $3, now()) RETURNING id",
    )
    .bind(kind)
    .bind(SyncStatus::Initialized.as_str())
    .bind(date)
    .fetch_one(pool)
    .await
    .map_err(DbError::from)?;

    Ok(SyncLog {
        id: row.0,
        kind: kind.to_string(),
        status: SyncStatus::Initialized,
        date,
    })
}

/// Moves `log` to `next`, rejecting any edge the state machine doesn't
/// allow so a bug in the driver can't silently corrupt the audit
/// trail.
pub async fn advance(pool: &PgPool, log: &mut SyncLog, next: SyncStatus) -> Result<(), SyncLogError> {
    if !log.status.can_advance_to(next) {
        return Err(SyncLogError::IllegalTransition {
            from: log.status,
            to: next,
        });
    }

    sqlx::query("UPDATE sync_log SET status = $1, updated_at = now() WHERE id = $2")
        .bind(next.as_str())
        .bind(log.id)
        .execute(pool)
        .await
        .map_err(DbError::from)?;

    log.status = next;
    Ok(())
}

/// Returns the most recent `success` row for a kind, used by the
/// changed-id fetcher to bound its window.
pub async fn last_success(pool: &PgPool, kind: &str) -> Result<Option<SyncLog>, DbError> {
    let row: Option<(i64, NaiveDate)> = sqlx::query_as(
        "SELECT id, date FROM sync_log WHERE kind = $1 AND status = 'success' ORDER BY date DESC LIMIT 1",
    )
    .bind(kind)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, date)| SyncLog {
        id,
        kind: kind.to_string(),
        status: SyncStatus::Success,
        date,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_legal() {
        assert!(SyncStatus::Initialized.can_advance_to(SyncStatus::FetchingData));
        assert!(SyncStatus::FetchingData.can_advance_to(SyncStatus::DataFetched));
        assert!(SyncStatus::SyncingToDb.can_advance_to(SyncStatus::Success));
        assert!(SyncStatus::SyncingToDb.can_advance_to(SyncStatus::UpdatingPopularity));
        assert!(SyncStatus::UpdatingPopularity.can_advance_to(SyncStatus::Success));
    }

    #[test]
    fn failed_reachable_from_any_non_terminal_state() {
        assert!(SyncStatus::Initialized.can_advance_to(SyncStatus::Failed));
        assert!(SyncStatus::DataFetched.can_advance_to(SyncStatus::Failed));
        assert!(!SyncStatus::Success.can_advance_to(SyncStatus::Failed));
        assert!(!SyncStatus::Failed.can_advance_to(SyncStatus::Failed));
    }

    #[test]
    fn cannot_skip_stages() {
        assert!(!SyncStatus::Initialized.can_advance_to(SyncStatus::SyncingToDb));
        assert!(!SyncStatus::DataFetched.can_advance_to(SyncStatus::Initialized));
    }
}
