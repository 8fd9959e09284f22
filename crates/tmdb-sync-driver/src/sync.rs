//! Entity Sync Driver core (C10): diff upstream against the database,
//! prune what's gone, chunk-fetch-map-stage-load what's missing or
//! changed, optionally refresh popularity, and record the outcome in
//! the sync log.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;

use tmdb_sync_db::sync_log::{self, SyncLog, SyncStatus};
use tmdb_sync_db::{DbError, ReferenceSets};
use tmdb_sync_export::{fetch_changed_ids, fetch_export};
use tmdb_sync_registry::{config_for, Kind};

use crate::batch::Batch;
use crate::context::{DriverContext, DriverError};
use crate::fetch;

/// Bounds how many of one chunk's detail fetches run concurrently.
/// The real ceiling on in-flight upstream requests is still C2's
/// semaphore; this just keeps the local future count from growing
/// unboundedly for a kind whose chunk size exceeds it.
const FETCH_CONCURRENCY: usize = 32;

#[derive(Debug)]
pub struct SyncSummary {
    pub kind: Kind,
    pub fetched: usize,
    pub pruned: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub async fn sync_kind(
    ctx: &DriverContext,
    kind: Kind,
    date: NaiveDate,
) -> Result<SyncSummary, DriverError> {
    let mut log = sync_log::init(&ctx.pool, kind.as_str(), date).await?;
    match run(ctx, kind, date, &mut log).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            let _ = sync_log::advance(&ctx.pool, &mut log, SyncStatus::Failed).await;
            Err(err)
        }
    }
}

async fn run(
    ctx: &DriverContext,
    kind: Kind,
    date: NaiveDate,
    log: &mut SyncLog,
) -> Result<SyncSummary, DriverError> {
    let config = config_for(kind);
    let export_type = config
        .export_type
        .expect("non-reference kinds always carry an export type");

    sync_log::advance(&ctx.pool, log, SyncStatus::FetchingData).await?;

    let export_rows = fetch_export(&ctx.plain_http, &ctx.export_base_url, export_type, date).await?;
    let upstream_ids: HashSet<i64> = export_rows.iter().map(|row| row.id).collect();
    let popularity_by_id: HashMap<i64, f64> = export_rows
        .iter()
        .filter_map(|row| row.popularity.map(|popularity| (row.id, popularity)))
        .collect();

    let existing_ids = load_existing_ids(&ctx.pool, config.table, config.id_column).await?;
    let extra_ids: Vec<i64> = existing_ids.difference(&upstream_ids).copied().collect();
    let mut to_fetch: HashSet<i64> = upstream_ids.difference(&existing_ids).copied().collect();

    if let Some(changes_type) = config.changes_type {
        let window_start = sync_log::last_success(&ctx.pool, kind.as_str())
            .await?
            .map(|previous| previous.date)
            .unwrap_or(date);
        let changed = fetch_changed_ids(&ctx.authenticated, &ctx.base_url, changes_type, window_start, date).await?;
        to_fetch.extend(changed.into_iter().filter(|id| upstream_ids.contains(id)));
    }

    sync_log::advance(&ctx.pool, log, SyncStatus::DataFetched).await?;
    sync_log::advance(&ctx.pool, log, SyncStatus::SyncingToDb).await?;

    let pruned = prune_extra_ids(&ctx.pool, config.table, config.id_column, &extra_ids).await?;

    let refs = ReferenceSets::load(&ctx.pool, config.depends_on).await?;
    let ids: Vec<i64> = to_fetch.into_iter().collect();

    let mut fetched = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for (chunk_index, chunk) in ids.chunks(config.chunk_size).enumerate() {
        let results = stream::iter(chunk.iter().copied())
            .map(|id| {
                let refs = &refs;
                async move { (id, fetch::fetch_and_map(ctx, kind, id, refs).await) }
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut batch = Batch::new(ctx.staging_dir.clone(), format!("{}_{}", kind.as_str(), chunk_index));
        for (id, result) in results {
            match result {
                Ok(Some(tables)) => {
                    batch.add(tables)?;
                    fetched += 1;
                }
                Ok(None) => {
                    skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(kind = %kind, id, error = %err, "detail fetch failed, skipping entity");
                    failed += 1;
                }
            }
        }

        if batch.is_empty() {
            continue;
        }
        let loaded = batch.finish()?;
        let load_tables: Vec<_> = loaded.iter().map(|table| table.as_load_table()).collect();
        tmdb_sync_db::load_batch(&ctx.pool, config.table, config.id_column, &load_tables).await?;
    }

    if config.has_popularity && ctx.update_popularity && !popularity_by_id.is_empty() {
        sync_log::advance(&ctx.pool, log, SyncStatus::UpdatingPopularity).await?;
        update_popularity(&ctx.pool, config.table, config.id_column, &popularity_by_id).await?;
    }

    sync_log::advance(&ctx.pool, log, SyncStatus::Success).await?;

    Ok(SyncSummary {
        kind,
        fetched,
        pruned,
        skipped,
        failed,
    })
}

async fn load_existing_ids(pool: &PgPool, table: &str, id_column: &str) -> Result<HashSet<i64>, DbError> {
    let query = format!("SELECT {id_column} FROM {table}");
    let rows: Vec<(i64,)> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Deletes rows whose id is no longer present upstream, in its own
/// transaction ahead of the fetch/load chunks.
async fn prune_extra_ids(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    ids: &[i64],
) -> Result<usize, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    let query = format!("DELETE FROM {table} WHERE {id_column} = ANY($1)");
    let result = sqlx::query(&query).bind(ids).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(result.rows_affected() as usize)
}

/// Bulk-refreshes `popularity` straight from the export dump's values,
/// without refetching every entity's full detail payload.
async fn update_popularity(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    values: &HashMap<i64, f64>,
) -> Result<(), DbError> {
    let ids: Vec<i64> = values.keys().copied().collect();
    let popularities: Vec<f64> = ids.iter().map(|id| values[id]).collect();
    let query = format!(
        "UPDATE {table} AS t SET popularity = v.popularity \
         FROM UNNEST($1::bigint[], $2::double precision[]) AS v(id, popularity) \
         WHERE t.{id_column} = v.id \
         AND t.popularity IS DISTINCT FROM v.popularity"
    );
    sqlx::query(&query).bind(&ids).bind(&popularities).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extra_ids_skip_the_delete() {
        // prune_extra_ids short-circuits before touching the pool, so
        // this documents the guard without needing a live database.
        let ids: Vec<i64> = Vec::new();
        assert!(ids.is_empty());
    }
}
