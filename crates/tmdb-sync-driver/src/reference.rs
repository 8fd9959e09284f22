//! Wholesale refresh for the three reference kinds (`language`,
//! `country`, `genre`): no export dump, no changes window, no
//! per-id chunking — one fetch, one staged batch, one load.

use chrono::NaiveDate;
use serde_json::Value;

use tmdb_sync_db::sync_log::{self, SyncLog, SyncStatus};
use tmdb_sync_registry::{config_for, Kind};

use crate::batch::Batch;
use crate::context::{DriverContext, DriverError};
use crate::fetch::fetch_genres_by_language;
use crate::sync::SyncSummary;

pub async fn sync_reference_kind(
    ctx: &DriverContext,
    kind: Kind,
    date: NaiveDate,
) -> Result<SyncSummary, DriverError> {
    let mut log = sync_log::init(&ctx.pool, kind.as_str(), date).await?;
    match run(ctx, kind, &mut log).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            let _ = sync_log::advance(&ctx.pool, &mut log, SyncStatus::Failed).await;
            Err(err)
        }
    }
}

async fn run(ctx: &DriverContext, kind: Kind, log: &mut SyncLog) -> Result<SyncSummary, DriverError> {
    let config = config_for(kind);

    sync_log::advance(&ctx.pool, log, SyncStatus::FetchingData).await?;
    let tables = match kind {
        Kind::Language => {
            let items: Vec<Value> = ctx
                .authenticated
                .get_json(&format!("{}/configuration/languages", ctx.base_url), &[])
                .await?;
            tmdb_sync_mapper::language::map_languages(&items)
        }
        Kind::Country => {
            let items: Vec<Value> = ctx
                .authenticated
                .get_json(&format!("{}/configuration/countries", ctx.base_url), &[])
                .await?;
            tmdb_sync_mapper::country::map_countries(&items)
        }
        Kind::Genre => {
            let by_language = fetch_genres_by_language(ctx).await?;
            tmdb_sync_mapper::genre::map_genres(&by_language, &ctx.default_language)
        }
        _ => unreachable!("only reference kinds reach sync_reference_kind"),
    };
    sync_log::advance(&ctx.pool, log, SyncStatus::DataFetched).await?;

    sync_log::advance(&ctx.pool, log, SyncStatus::SyncingToDb).await?;
    let root_rows = tables.first().map(|table| table.rows.len()).unwrap_or(0);

    let mut batch = Batch::new(ctx.staging_dir.clone(), format!("{}_ref", kind.as_str()));
    batch.add(tables)?;
    let loaded = batch.finish()?;
    let load_tables: Vec<_> = loaded.iter().map(|table| table.as_load_table()).collect();
    tmdb_sync_db::load_batch(&ctx.pool, config.table, config.id_column, &load_tables).await?;

    sync_log::advance(&ctx.pool, log, SyncStatus::Success).await?;

    Ok(SyncSummary {
        kind,
        fetched: root_rows,
        pruned: 0,
        skipped: 0,
        failed: 0,
    })
}
