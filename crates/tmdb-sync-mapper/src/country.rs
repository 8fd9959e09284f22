use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;

pub fn map_countries(items: &[Value]) -> Vec<StagedTable> {
    let mut rows = Vec::new();
    for item in items {
        let code = field(item, "iso_3166_1");
        if code.is_empty() {
            continue;
        }
        rows.push(vec![code, field(item, "english_name")]);
    }

    vec![StagedTable {
        table: "tmdb_country",
        columns: &["iso_3166_1", "name"],
        conflict_key: &["iso_3166_1"],
        update_columns: &["name"],
        parent_fk_column: None,
        rows,
    }]
}
