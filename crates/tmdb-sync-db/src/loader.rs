//! Bulk loader (C7): stages each table's CSV into a uniquely-named
//! temporary table via `COPY FROM STDIN`, then reconciles it into the
//! target table — an upsert for the batch's root table, a blanket
//! delete-then-insert for most child tables, and an anti-join carve-out
//! for seasons/episodes so rows referenced by external user activity
//! outlive an upstream removal.

use std::fs;
use std::path::Path;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::DbError;

/// Child tables whose delete phase must preserve rows that vanished
/// upstream but are still the parent of external user activity: only
/// rows absent from *this batch's* staging set, whose parent *is*
/// present, are removed. `parent_column` names the FK on the child
/// table; `parent_staged_table` names the sibling [`LoadTable`] (by
/// its `table` field) whose freshly-loaded ids bound the carve-out.
const CARVE_OUT_CHILDREN: &[(&str, &str, &str)] = &[
    ("tmdb_season", "serie_id", "tmdb_serie"),
    ("tmdb_episode", "season_id", "tmdb_season"),
];

/// Child tables scoped one level below the batch's primary table (a
/// season's translations/credits, an episode's credits): their delete
/// phase must reconcile against *that* staged parent's ids, not the
/// primary table's — a blanket delete scoped to `tmdb_serie`'s ids
/// would never match a `season_id`/`episode_id` column.
const NESTED_CHILDREN: &[(&str, &str, &str)] = &[
    ("tmdb_season_translation", "season_id", "tmdb_season"),
    ("tmdb_season_credit", "season_id", "tmdb_season"),
    ("tmdb_episode_credit", "episode_id", "tmdb_episode"),
];

/// One table's worth of staged rows, ready to be reconciled into the
/// database. Lives in this crate (rather than being the mapper's
/// `StagedTable` directly) so `tmdb-sync-db` need not depend on
/// `tmdb-sync-mapper` — the driver, which depends on both, builds
/// these from a `StagedTable` plus the `CsvFile` it was written to.
pub struct LoadTable<'a> {
    pub table: &'a str,
    pub columns: &'a [&'a str],
    pub conflict_key: &'a [&'a str],
    pub update_columns: &'a [&'a str],
    /// `None` for the batch's root/primary table and for tables (like
    /// role rows keyed by `credit_id`) that rely on a cascading
    /// foreign key rather than their own delete phase.
    pub parent_fk_column: Option<&'a str>,
    pub csv_path: &'a Path,
    pub row_count: usize,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub table_rows: Vec<(String, usize)>,
}

/// Commits one chunk's worth of staged tables in a single transaction.
/// `primary_table`/`primary_id_column` identify the batch's root table
/// (e.g. `tmdb_movie`/`id`) so child deletes can scope themselves to
/// "parent ids present in this batch". Staging CSVs are deleted
/// unconditionally once the transaction resolves, whether it commits
/// or rolls back.
pub async fn load_batch(
    pool: &PgPool,
    primary_table: &str,
    primary_id_column: &str,
    tables: &[LoadTable<'_>],
) -> Result<LoadReport, DbError> {
    let result = run_transaction(pool, primary_table, primary_id_column, tables).await;

    for table in tables {
        let _ = fs::remove_file(table.csv_path);
    }

    result
}

async fn run_transaction(
    pool: &PgPool,
    primary_table: &str,
    primary_id_column: &str,
    tables: &[LoadTable<'_>],
) -> Result<LoadReport, DbError> {
    let mut tx = pool.begin().await?;

    let mut temp_names = Vec::with_capacity(tables.len());
    for table in tables {
        let temp_name = format!("stg_{}_{}", table.table, Uuid::new_v4().simple());
        create_staging_table(&mut tx, table.table, &temp_name).await?;
        copy_into_staging(&mut tx, &temp_name, table.columns, table.csv_path).await?;
        temp_names.push(temp_name);
    }

    let mut report = LoadReport::default();

    for (table, temp_name) in tables.iter().zip(temp_names.iter()) {
        if table.table != primary_table {
            delete_existing_rows(&mut tx, table, &temp_names, tables, primary_table, primary_id_column)
                .await?;
        }
        upsert_from_staging(&mut tx, table, temp_name).await?;
        report.table_rows.push((table.table.to_string(), table.row_count));
    }

    tx.commit().await?;
    Ok(report)
}

async fn create_staging_table(
    tx: &mut Transaction<'_, Postgres>,
    target_table: &str,
    temp_name: &str,
) -> Result<(), DbError> {
    let sql = format!("CREATE TEMPORARY TABLE {temp_name} (LIKE {target_table} INCLUDING ALL) ON COMMIT DROP");
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

async fn copy_into_staging(
    tx: &mut Transaction<'_, Postgres>,
    temp_name: &str,
    columns: &[&str],
    csv_path: &Path,
) -> Result<(), DbError> {
    let data = fs::read(csv_path)?;
    let column_list = columns.join(", ");
    let sql = format!("COPY {temp_name} ({column_list}) FROM STDIN WITH (FORMAT csv, HEADER true)");
    let mut copy = tx.copy_in_raw(&sql).await?;
    copy.send(data).await?;
    copy.finish().await?;
    Ok(())
}

async fn delete_existing_rows(
    tx: &mut Transaction<'_, Postgres>,
    table: &LoadTable<'_>,
    temp_names: &[String],
    tables: &[LoadTable<'_>],
    primary_table: &str,
    primary_id_column: &str,
) -> Result<(), DbError> {
    if let Some((_, parent_column, parent_staged_table)) = CARVE_OUT_CHILDREN
        .iter()
        .find(|(name, _, _)| *name == table.table)
    {
        let own_temp = temp_name_for(table.table, tables, temp_names);
        let parent_temp = if *parent_staged_table == primary_table {
            temp_name_for(primary_table, tables, temp_names)
        } else {
            temp_name_for(parent_staged_table, tables, temp_names)
        };
        let sql = format!(
            "DELETE FROM {table} t WHERE t.{parent_column} IN (SELECT id FROM {parent_temp}) \
             AND t.id NOT IN (SELECT id FROM {own_temp})",
            table = table.table,
        );
        sqlx::query(&sql).execute(&mut **tx).await?;
        return Ok(());
    }

    if let Some((_, parent_column, parent_staged_table)) = NESTED_CHILDREN
        .iter()
        .find(|(name, _, _)| *name == table.table)
    {
        let parent_temp = temp_name_for(parent_staged_table, tables, temp_names);
        let sql = format!(
            "DELETE FROM {table} WHERE {parent_column} IN (SELECT id FROM {parent_temp})",
            table = table.table,
        );
        sqlx::query(&sql).execute(&mut **tx).await?;
        return Ok(());
    }

    let Some(parent_column) = table.parent_fk_column else {
        return Ok(());
    };

    let primary_temp = temp_name_for(primary_table, tables, temp_names);
    let sql = format!(
        "DELETE FROM {table} WHERE {parent_column} IN (SELECT {primary_id_column} FROM {primary_temp})",
        table = table.table,
    );
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

fn temp_name_for<'a>(table: &str, tables: &[LoadTable<'_>], temp_names: &'a [String]) -> &'a str {
    tables
        .iter()
        .position(|entry| entry.table == table)
        .map(|index| temp_names[index].as_str())
        .unwrap_or(table)
}

async fn upsert_from_staging(
    tx: &mut Transaction<'_, Postgres>,
    table: &LoadTable<'_>,
    temp_name: &str,
) -> Result<(), DbError> {
    let columns = table.columns.join(", ");
    let conflict_action = if table.update_columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments = table
            .update_columns
            .iter()
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {assignments}")
    };
    let conflict_key = table.conflict_key.join(", ");

    let sql = format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM {temp_name} \
         ON CONFLICT ({conflict_key}) {conflict_action}",
        target = table.table,
    );
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carve_out_children_name_their_parent_staged_table() {
        let season = CARVE_OUT_CHILDREN.iter().find(|(t, _, _)| *t == "tmdb_season").unwrap();
        assert_eq!(season.2, "tmdb_serie");
        let episode = CARVE_OUT_CHILDREN.iter().find(|(t, _, _)| *t == "tmdb_episode").unwrap();
        assert_eq!(episode.2, "tmdb_season");
    }

    #[test]
    fn nested_children_scope_against_their_own_parent_not_the_primary_table() {
        let season_credit = NESTED_CHILDREN.iter().find(|(t, _, _)| *t == "tmdb_season_credit").unwrap();
        assert_eq!(season_credit.2, "tmdb_season");
        let episode_credit = NESTED_CHILDREN.iter().find(|(t, _, _)| *t == "tmdb_episode_credit").unwrap();
        assert_eq!(episode_credit.2, "tmdb_episode");
    }

    #[test]
    fn temp_name_for_falls_back_to_table_name_when_absent() {
        let tables: Vec<LoadTable> = Vec::new();
        let temp_names: Vec<String> = Vec::new();
        assert_eq!(temp_name_for("tmdb_movie", &tables, &temp_names), "tmdb_movie");
    }
}
