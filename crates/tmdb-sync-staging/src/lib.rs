//! Row-staging buffer: a CSV file that entity rows are appended to
//! before being bulk-loaded into Postgres via `COPY FROM STDIN`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StagingError {
    Io(io::Error),
    Csv(csv::Error),
    EmptyColumns,
}

impl std::fmt::Display for StagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StagingError::Io(err) => write!(f, "staging io error: {}", err),
            StagingError::Csv(err) => write!(f, "staging csv error: {}", err),
            StagingError::EmptyColumns => write!(f, "columns must not be empty"),
        }
    }
}

impl std::error::Error for StagingError {}

impl From<io::Error> for StagingError {
    fn from(err: io::Error) -> Self {
        StagingError::Io(err)
    }
}

impl From<csv::Error> for StagingError {
    fn from(err: csv::Error) -> Self {
        StagingError::Csv(err)
    }
}

/// A uniquely-named CSV staging file for one entity/table within a sync
/// run. Rows are appended incrementally as upstream pages are mapped,
/// then the whole file is streamed into a Postgres temp table via
/// `COPY FROM STDIN`.
pub struct CsvFile {
    columns: Vec<String>,
    path: PathBuf,
}

impl CsvFile {
    pub fn new(
        columns: &[&str],
        dir: &Path,
        prefix: &str,
    ) -> Result<Self, StagingError> {
        if columns.is_empty() {
            return Err(StagingError::EmptyColumns);
        }
        fs::create_dir_all(dir)?;

        let file_name = format!("{}_{}.csv", prefix, uuid::Uuid::new_v4().simple());
        let path = dir.join(file_name);

        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&columns)?;
        writer.flush()?;

        Ok(Self { columns, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Appends one row per entry in `rows`. Each row must have the same
    /// length and ordering as `columns`.
    pub fn append(&self, rows: &[Vec<String>]) -> Result<(), StagingError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(fs::OpenOptions::new().append(true).open(&self.path)?);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Rewrites the file keeping only the last occurrence of each
    /// distinct key, where the key is built from the given zero-indexed
    /// column positions. Mirrors the upstream "last write wins"
    /// semantics for rows that share a conflict key within one batch.
    pub fn dedup(&self, key_columns: &[usize]) -> Result<(), StagingError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&self.path)?;
        let header = reader.headers()?.clone();

        let mut ordered_keys: Vec<String> = Vec::new();
        let mut by_key: std::collections::HashMap<String, csv::StringRecord> =
            std::collections::HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        for record in reader.records() {
            let record = record?;
            let key = key_columns
                .iter()
                .map(|&idx| record.get(idx).unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\u{1f}");
            if seen.insert(key.clone()) {
                ordered_keys.push(key.clone());
            } else {
                ordered_keys.retain(|existing| existing != &key);
                ordered_keys.push(key.clone());
            }
            by_key.insert(key, record);
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&header)?;
        for key in ordered_keys {
            if let Some(record) = by_key.get(&key) {
                writer.write_record(record)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn is_empty(&self) -> Result<bool, StagingError> {
        Ok(fs::metadata(&self.path)?.len() == self.header_byte_len())
    }

    fn header_byte_len(&self) -> u64 {
        let mut buf = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            let _ = writer.write_record(&self.columns);
            let _ = writer.flush();
        }
        buf.len() as u64
    }

    pub fn delete(&self) -> Result<(), StagingError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_back_rows() {
        let dir = tempdir().unwrap();
        let csv_file = CsvFile::new(&["id", "name"], dir.path(), "genre").unwrap();
        assert!(csv_file.is_empty().unwrap());

        csv_file
            .append(&[vec!["1".to_string(), "Action".to_string()]])
            .unwrap();
        assert!(!csv_file.is_empty().unwrap());

        let contents = fs::read_to_string(csv_file.path()).unwrap();
        assert!(contents.contains("Action"));
    }

    #[test]
    fn dedup_keeps_last_occurrence() {
        let dir = tempdir().unwrap();
        let csv_file = CsvFile::new(&["id", "name"], dir.path(), "genre").unwrap();
        csv_file
            .append(&[
                vec!["1".to_string(), "Old".to_string()],
                vec!["2".to_string(), "Kept".to_string()],
                vec!["1".to_string(), "New".to_string()],
            ])
            .unwrap();

        csv_file.dedup(&[0]).unwrap();

        let contents = fs::read_to_string(csv_file.path()).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "id,name");
        assert_eq!(lines.next().unwrap(), "2,Kept");
        assert_eq!(lines.next().unwrap(), "1,New");
        assert!(lines.next().is_none());
    }

    #[test]
    fn rejects_empty_column_list() {
        let dir = tempdir().unwrap();
        assert!(CsvFile::new(&[], dir.path(), "x").is_err());
    }
}
