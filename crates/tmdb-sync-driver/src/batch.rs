//! Accumulates one chunk's worth of [`StagedTable`]s — possibly from
//! many entities of the same kind — into a [`CsvFile`] per destination
//! table, then hands the loader owned [`LoadTable`] handles. Lives
//! here rather than in `tmdb-sync-staging`/`tmdb-sync-db` because it's
//! the one place in the workspace that needs both `StagedTable` and
//! `LoadTable`.

use std::collections::HashMap;
use std::path::PathBuf;

use tmdb_sync_db::loader::LoadTable;
use tmdb_sync_mapper::StagedTable;
use tmdb_sync_staging::{CsvFile, StagingError};

struct Entry {
    csv: CsvFile,
    columns: &'static [&'static str],
    conflict_key: &'static [&'static str],
    update_columns: &'static [&'static str],
    parent_fk_column: Option<&'static str>,
    row_count: usize,
}

/// One chunk's staging area: every table an entity kind touches gets
/// its own uniquely-named CSV file, appended to as each entity in the
/// chunk is mapped.
pub struct Batch {
    dir: PathBuf,
    prefix: String,
    order: Vec<&'static str>,
    entries: HashMap<&'static str, Entry>,
}

impl Batch {
    pub fn new(dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.into(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Appends one entity's staged rows. Every call for a given kind
    /// passes the same fixed list of table names (one mapper function
    /// always returns the same `StagedTable` set), so a table missing
    /// from the first entity never shows up for a later one.
    pub fn add(&mut self, tables: Vec<StagedTable>) -> Result<(), StagingError> {
        for table in tables {
            if !self.entries.contains_key(table.table) {
                let csv = CsvFile::new(
                    table.columns,
                    &self.dir,
                    &format!("{}_{}", self.prefix, table.table),
                )?;
                self.entries.insert(
                    table.table,
                    Entry {
                        csv,
                        columns: table.columns,
                        conflict_key: table.conflict_key,
                        update_columns: table.update_columns,
                        parent_fk_column: table.parent_fk_column,
                        row_count: 0,
                    },
                );
                self.order.push(table.table);
            }
            let entry = self.entries.get_mut(table.table).expect("just inserted");
            entry.csv.append(&table.rows)?;
            entry.row_count += table.rows.len();
        }
        Ok(())
    }

    /// True when every staged table across the whole batch is empty —
    /// the caller can skip the transaction entirely.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|entry| entry.row_count == 0)
    }

    /// Dedupes every table by its conflict key (last occurrence within
    /// the batch wins) and returns owned, loader-ready handles.
    pub fn finish(self) -> Result<Vec<LoadTableOwned>, StagingError> {
        let mut result = Vec::with_capacity(self.order.len());
        for table in self.order {
            let entry = self.entries.get(table).expect("registered in order");
            let key_positions: Vec<usize> = entry
                .conflict_key
                .iter()
                .filter_map(|key| entry.columns.iter().position(|column| column == key))
                .collect();
            entry.csv.dedup(&key_positions)?;
            result.push(LoadTableOwned {
                table,
                columns: entry.columns,
                conflict_key: entry.conflict_key,
                update_columns: entry.update_columns,
                parent_fk_column: entry.parent_fk_column,
                csv_path: entry.csv.path().to_path_buf(),
                row_count: entry.row_count,
            });
        }
        Ok(result)
    }
}

/// Owned counterpart of [`LoadTable`] (which borrows its CSV path),
/// kept alive for the duration of one `load_batch` call.
pub struct LoadTableOwned {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_key: &'static [&'static str],
    pub update_columns: &'static [&'static str],
    pub parent_fk_column: Option<&'static str>,
    pub csv_path: PathBuf,
    pub row_count: usize,
}

impl LoadTableOwned {
    pub fn as_load_table(&self) -> LoadTable<'_> {
        LoadTable {
            table: self.table,
            columns: self.columns,
            conflict_key: self.conflict_key,
            update_columns: self.update_columns,
            parent_fk_column: self.parent_fk_column,
            csv_path: self.csv_path.as_path(),
            row_count: self.row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn accumulates_rows_across_two_adds() {
        let dir = tempdir().unwrap();
        let mut batch = Batch::new(dir.path().to_path_buf(), "chunk0");
        let table = |rows| StagedTable {
            table: "tmdb_genre",
            columns: &["id"],
            conflict_key: &["id"],
            update_columns: &[],
            parent_fk_column: None,
            rows,
        };
        batch.add(vec![table(vec![vec!["1".to_string()]])]).unwrap();
        batch.add(vec![table(vec![vec!["2".to_string()]])]).unwrap();
        assert!(!batch.is_empty());
        let tables = batch.finish().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count, 2);
    }

    #[test]
    fn empty_batch_reports_empty() {
        let dir = tempdir().unwrap();
        let mut batch = Batch::new(dir.path().to_path_buf(), "chunk0");
        batch
            .add(vec![StagedTable {
                table: "tmdb_genre",
                columns: &["id"],
                conflict_key: &["id"],
                update_columns: &[],
                parent_fk_column: None,
                rows: Vec::new(),
            }])
            .unwrap();
        assert!(batch.is_empty());
    }
}
