use sqlx::PgPool;
use std::collections::HashSet;
use tmdb_sync_registry::{config_for, Kind};

use crate::DbError;

/// Snapshot of every reference id currently in the database, loaded
/// once before mapping a batch of movies/series so the mapper can
/// drop or null out a foreign key that doesn't resolve (deleted
/// keyword, not-yet-synced company) instead of violating a constraint
/// at COPY time.
#[derive(Debug, Default)]
pub struct ReferenceSets {
    pub languages: HashSet<String>,
    pub countries: HashSet<String>,
    pub genres: HashSet<i64>,
    pub keywords: HashSet<i64>,
    pub collections: HashSet<i64>,
    pub companies: HashSet<i64>,
    pub networks: HashSet<i64>,
    pub persons: HashSet<i64>,
}

impl ReferenceSets {
    /// Loads only the reference sets a kind actually depends on
    /// (`deps` comes from that kind's [`tmdb_sync_registry::KindConfig`]),
    /// leaving the rest empty rather than issuing queries no mapper
    /// will consult.
    pub async fn load(pool: &PgPool, deps: &[Kind]) -> Result<Self, DbError> {
        let mut sets = ReferenceSets::default();

        for &dep in deps {
            let config = config_for(dep);
            match dep {
                Kind::Language => {
                    sets.languages = load_text_column(pool, config.table, config.id_column).await?;
                }
                Kind::Country => {
                    sets.countries = load_text_column(pool, config.table, config.id_column).await?;
                }
                Kind::Genre => {
                    sets.genres = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Keyword => {
                    sets.keywords = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Collection => {
                    sets.collections = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Company => {
                    sets.companies = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Network => {
                    sets.networks = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Person => {
                    sets.persons = load_int_column(pool, config.table, config.id_column).await?;
                }
                Kind::Movie | Kind::TvSeries => {}
            }
        }

        Ok(sets)
    }
}

async fn load_text_column(
    pool: &PgPool,
    table: &str,
    column: &str,
) -> Result<HashSet<String>, DbError> {
    let query = format!("SELECT {column} FROM {table}");
    let rows: Vec<(String,)> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(value,)| value).collect())
}

async fn load_int_column(pool: &PgPool, table: &str, column: &str) -> Result<HashSet<i64>, DbError> {
    let query = format!("SELECT {column} FROM {table}");
    let rows: Vec<(i64,)> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(value,)| value).collect())
}
