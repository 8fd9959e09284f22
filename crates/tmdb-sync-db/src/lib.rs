//! Postgres-facing plumbing shared by the driver: the bulk loader
//! (staging-table COPY, upsert, referential delete-then-insert), the
//! reference-set cache used by the mappers, and the sync-log state
//! machine that bounds each run's incremental window.

pub mod loader;
pub mod reference_sets;
pub mod sync_log;

pub use loader::{load_batch, LoadReport, LoadTable};
pub use reference_sets::ReferenceSets;
pub use sync_log::{SyncLog, SyncStatus};

#[derive(Debug)]
pub enum DbError {
    Sql(sqlx::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Sql(err) => write!(f, "database error: {}", err),
            DbError::Io(err) => write!(f, "staging io error while loading: {}", err),
        }
    }
}

impl std::error::Error for DbError {}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sql(err)
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Sql(sqlx::Error::Migrate(Box::new(err)))
    }
}

/// Applies the workspace's versioned schema (`../../migrations` from this
/// crate) before the first run touches the database. Idempotent: sqlx
/// tracks applied versions in its own `_sqlx_migrations` table.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), DbError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
