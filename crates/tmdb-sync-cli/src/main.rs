use std::env;
use std::error::Error;
use std::process;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use tmdb_sync_config::{init_logging, split_config_args, AppConfig};
use tmdb_sync_driver::{run_kind, DriverContext};
use tmdb_sync_http::{CredentialPool, RateLimitedClient};
use tmdb_sync_registry::{sync_order, Kind};

mod search;

/// One-shot run of the TMDB reconciliation pipeline: every kind in
/// dependency order by default, or a single kind via `--kind`.
#[derive(Debug, Parser)]
#[command(name = "tmdb-sync")]
struct Cli {
    /// Restrict this run to a single kind (e.g. `movie`, `tv_series`).
    #[arg(long)]
    kind: Option<String>,

    /// Override the run date (`YYYY-MM-DD`); defaults to today (UTC).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Refresh each row's `popularity` column from the detail payload
    /// even if `[run].update_popularity` in config.toml says otherwise.
    #[arg(long)]
    update_popularity: bool,

    /// Additional TMDB language to fetch translations for, beyond
    /// `tmdb.default_language`. Repeatable.
    #[arg(long = "extra-language")]
    extra_languages: Vec<String>,

    /// Run every kind as its own subprocess instead of sequentially
    /// in-process, so one kind's panic can't take down the rest.
    #[arg(long)]
    isolate_kinds: bool,

    /// Skip the search index projection (C11) after the database
    /// side of the run completes.
    #[arg(long)]
    no_search: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let (config_path, args) = split_config_args(env::args().skip(1))?;
    let cli = Cli::parse_from(std::iter::once("tmdb-sync".to_string()).chain(args));

    let mut app_config = AppConfig::load(config_path)?;
    let _log_guard = init_logging(&app_config.logging)?;

    if cli.update_popularity {
        app_config.run.update_popularity = true;
    }
    if !cli.extra_languages.is_empty() {
        app_config.run.extra_languages = cli.extra_languages.clone();
    }
    if cli.isolate_kinds {
        app_config.run.isolate_kinds = true;
    }
    if cli.no_search {
        app_config.run.enable_search = false;
    }

    run_async(app_config, cli).await
}

async fn run_async(app_config: AppConfig, cli: Cli) -> Result<(), Box<dyn Error>> {
    let date = cli
        .date
        .or(app_config.run.current_date)
        .unwrap_or_else(|| Utc::now().date_naive());

    let kinds = match &cli.kind {
        Some(name) => vec![parse_kind(name)?],
        None => sync_order(),
    };

    if app_config.run.isolate_kinds && cli.kind.is_none() {
        return run_isolated(&kinds, date, &app_config).await;
    }

    let ctx = build_context(&app_config).await?;
    tmdb_sync_db::run_migrations(&ctx.pool).await?;

    for kind in &kinds {
        if !kind_enabled(&app_config, *kind) {
            tracing::info!(kind = %kind, "kind disabled by configuration, skipping");
            continue;
        }
        tracing::info!(kind = %kind, date = %date, "starting sync");
        let summary = run_kind(&ctx, *kind, date).await?;
        tracing::info!(
            kind = %kind,
            fetched = summary.fetched,
            pruned = summary.pruned,
            skipped = summary.skipped,
            failed = summary.failed,
            "finished sync"
        );
        println!(
            "{}: fetched {}, pruned {}, skipped {}, failed {}",
            kind, summary.fetched, summary.pruned, summary.skipped, summary.failed
        );
    }

    if app_config.run.enable_search {
        if let Err(err) = search::sync_search_projections(&ctx.pool, &app_config).await {
            tracing::warn!(error = %err, "search projection failed");
        }
    }

    Ok(())
}

/// `--isolate-kinds`: re-invokes this same binary once per kind so a
/// crash in one kind's run can't abort the rest of the day's sync.
async fn run_isolated(
    kinds: &[Kind],
    date: NaiveDate,
    app_config: &AppConfig,
) -> Result<(), Box<dyn Error>> {
    let exe = env::current_exe()?;
    let mut failed_kinds = Vec::new();

    for kind in kinds {
        if !kind_enabled(app_config, *kind) {
            continue;
        }
        tracing::info!(kind = %kind, "spawning isolated subprocess");
        let status = tokio::process::Command::new(&exe)
            .arg("--kind")
            .arg(kind.as_str())
            .arg("--date")
            .arg(date.format("%Y-%m-%d").to_string())
            .arg("--no-search")
            .status()
            .await?;
        if !status.success() {
            tracing::warn!(kind = %kind, "isolated subprocess exited with failure");
            failed_kinds.push(kind.as_str());
        }
    }

    if app_config.run.enable_search {
        let ctx = build_context(app_config).await?;
        if let Err(err) = search::sync_search_projections(&ctx.pool, app_config).await {
            tracing::warn!(error = %err, "search projection failed");
        }
    }

    if !failed_kinds.is_empty() {
        return Err(format!("kinds failed: {}", failed_kinds.join(", ")).into());
    }
    Ok(())
}

async fn build_context(app_config: &AppConfig) -> Result<DriverContext, Box<dyn Error>> {
    let db_url = app_config.database.require_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(app_config.database.max_connections)
        .connect(&db_url)
        .await?;

    let api_keys = app_config.tmdb.require_api_keys()?.to_vec();
    let credentials = Arc::new(CredentialPool::new(api_keys)?);
    let authenticated = Arc::new(RateLimitedClient::new(
        credentials,
        app_config.tmdb.concurrency,
        app_config.tmdb.rate_limit_per_second,
        "tmdb-sync",
    )?);
    let plain_http = reqwest::Client::builder().user_agent("tmdb-sync").build()?;

    std::fs::create_dir_all(&app_config.run.staging_dir)?;

    Ok(DriverContext {
        pool,
        authenticated,
        plain_http,
        base_url: app_config.tmdb.base_url.clone(),
        export_base_url: app_config.tmdb.export_base_url.clone(),
        staging_dir: app_config.run.staging_dir.clone(),
        default_language: app_config.tmdb.default_language.clone(),
        extra_languages: app_config.run.extra_languages.clone(),
        update_popularity: app_config.run.update_popularity,
    })
}

fn kind_enabled(app_config: &AppConfig, kind: Kind) -> bool {
    match kind {
        Kind::Language => app_config.run.enable_language,
        Kind::Country => app_config.run.enable_country,
        Kind::Genre => app_config.run.enable_genre,
        Kind::Keyword => app_config.run.enable_keyword,
        Kind::Collection => app_config.run.enable_collection,
        Kind::Company => app_config.run.enable_company,
        Kind::Network => app_config.run.enable_network,
        Kind::Person => app_config.run.enable_person,
        Kind::Movie => app_config.run.enable_movie,
        Kind::TvSeries => app_config.run.enable_serie,
    }
}

fn parse_kind(name: &str) -> Result<Kind, Box<dyn Error>> {
    sync_order()
        .into_iter()
        .find(|kind| kind.as_str() == name)
        .ok_or_else(|| format!("unknown kind: {}", name).into())
}
