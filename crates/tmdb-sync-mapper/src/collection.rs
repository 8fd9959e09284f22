use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;

/// `details_by_language` holds one full collection-detail payload per
/// configured language, keyed the same as the upstream config's
/// language code, so a single collection id produces one root row
/// (from the default language) plus one translation row per language.
pub fn map_collection(
    details_by_language: &[(String, Value)],
    default_language: &str,
) -> Vec<StagedTable> {
    let mut collection_row = Vec::new();
    let mut translation_rows = Vec::new();

    for (language, detail) in details_by_language {
        if language == default_language {
            collection_row.push(vec![field(detail, "id"), field(detail, "backdrop_path")]);
        }
        translation_rows.push(vec![
            field(detail, "id"),
            field(detail, "overview"),
            field(detail, "poster_path"),
            field(detail, "name"),
            language.clone(),
        ]);
    }

    vec![
        StagedTable {
            table: "tmdb_collection",
            columns: &["id", "backdrop_path"],
            conflict_key: &["id"],
            update_columns: &["backdrop_path"],
            parent_fk_column: None,
            rows: collection_row,
        },
        StagedTable {
            table: "tmdb_collection_translation",
            columns: &["collection_id", "overview", "poster_path", "name", "language"],
            conflict_key: &["collection_id", "language"],
            update_columns: &["overview", "poster_path", "name"],
            parent_fk_column: Some("collection_id"),
            rows: translation_rows,
        },
    ]
}
