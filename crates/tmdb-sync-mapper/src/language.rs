use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;

/// Maps TMDB's `configuration/languages` list, which carries both the
/// iso code and its default English name in one payload — unlike most
/// other reference kinds there is no extra-language translation pass,
/// since the upstream endpoint itself is not localizable.
pub fn map_languages(items: &[Value]) -> Vec<StagedTable> {
    let mut language_rows = Vec::new();
    let mut translation_rows = Vec::new();

    for item in items {
        let code = field(item, "iso_639_1");
        if code.is_empty() {
            continue;
        }
        language_rows.push(vec![code.clone(), field(item, "name")]);
        translation_rows.push(vec![code, field(item, "english_name"), "en-US".to_string()]);
    }

    vec![
        StagedTable {
            table: "tmdb_language",
            columns: &["iso_639_1", "name_in_native_language"],
            conflict_key: &["iso_639_1"],
            update_columns: &["name_in_native_language"],
            parent_fk_column: None,
            rows: language_rows,
        },
        StagedTable {
            table: "tmdb_language_translation",
            columns: &["iso_639_1", "name", "language"],
            conflict_key: &["iso_639_1", "language"],
            update_columns: &["name"],
            parent_fk_column: Some("iso_639_1"),
            rows: translation_rows,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skips_entries_missing_an_iso_code() {
        let items = vec![json!({"name": "x"}), json!({"iso_639_1": "fr", "name": "Francais", "english_name": "French"})];
        let tables = map_languages(&items);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[0].rows[0], vec!["fr".to_string(), "Francais".to_string()]);
    }
}
