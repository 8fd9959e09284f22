use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;
use tmdb_sync_db::DbError;
use tmdb_sync_export::{ChangesError, ExportError};
use tmdb_sync_http::{HttpError, RateLimitedClient};
use tmdb_sync_staging::StagingError;

/// Everything a driver run needs, built once at flow start and shared
/// read-only across every kind's `sync_kind` call (spec.md §9's
/// "pass global resources explicitly as a context value").
pub struct DriverContext {
    pub pool: PgPool,
    pub authenticated: Arc<RateLimitedClient>,
    /// Plain client for unauthenticated endpoints (the export dump
    /// lives on `files.tmdb.org`, not behind `api_key`).
    pub plain_http: reqwest::Client,
    pub base_url: String,
    pub export_base_url: String,
    pub staging_dir: PathBuf,
    pub default_language: String,
    pub extra_languages: Vec<String>,
    pub update_popularity: bool,
}

#[derive(Debug)]
pub enum DriverError {
    Http(HttpError),
    Db(DbError),
    SyncLog(tmdb_sync_db::sync_log::SyncLogError),
    Export(ExportError),
    Changes(ChangesError),
    Staging(StagingError),
    /// A `StagingFormatError`/fatal mapper condition per spec.md §7:
    /// the chunk's transaction never began.
    Fatal(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Http(err) => write!(f, "{}", err),
            DriverError::Db(err) => write!(f, "{}", err),
            DriverError::SyncLog(err) => write!(f, "{}", err),
            DriverError::Export(err) => write!(f, "{}", err),
            DriverError::Changes(err) => write!(f, "{}", err),
            DriverError::Staging(err) => write!(f, "{}", err),
            DriverError::Fatal(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<HttpError> for DriverError {
    fn from(err: HttpError) -> Self {
        DriverError::Http(err)
    }
}

impl From<DbError> for DriverError {
    fn from(err: DbError) -> Self {
        DriverError::Db(err)
    }
}

impl From<tmdb_sync_db::sync_log::SyncLogError> for DriverError {
    fn from(err: tmdb_sync_db::sync_log::SyncLogError) -> Self {
        DriverError::SyncLog(err)
    }
}

impl From<ExportError> for DriverError {
    fn from(err: ExportError) -> Self {
        DriverError::Export(err)
    }
}

impl From<ChangesError> for DriverError {
    fn from(err: ChangesError) -> Self {
        DriverError::Changes(err)
    }
}

impl From<StagingError> for DriverError {
    fn from(err: StagingError) -> Self {
        DriverError::Staging(err)
    }
}
