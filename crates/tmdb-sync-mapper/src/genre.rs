use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;

/// `genres_by_language` pairs each configured language code with the
/// merged movie+tv genre list fetched in that language; the default
/// language's ids define the canonical genre row set.
pub fn map_genres(genres_by_language: &[(String, Vec<Value>)], default_language: &str) -> Vec<StagedTable> {
    let mut genre_rows = Vec::new();
    let mut translation_rows = Vec::new();

    for (language, genres) in genres_by_language {
        for genre in genres {
            let id = field(genre, "id");
            if id.is_empty() {
                continue;
            }
            if language == default_language {
                genre_rows.push(vec![id.clone()]);
            }
            translation_rows.push(vec![id, field(genre, "name"), language.clone()]);
        }
    }

    vec![
        StagedTable {
            table: "tmdb_genre",
            columns: &["id"],
            conflict_key: &["id"],
            update_columns: &[],
            parent_fk_column: None,
            rows: genre_rows,
        },
        StagedTable {
            table: "tmdb_genre_translation",
            columns: &["genre_id", "name", "language"],
            conflict_key: &["genre_id", "language"],
            update_columns: &["name"],
            parent_fk_column: Some("genre_id"),
            rows: translation_rows,
        },
    ]
}
