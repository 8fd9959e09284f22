use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;

pub fn map_keywords(items: &[Value]) -> Vec<StagedTable> {
    let rows = items
        .iter()
        .map(|item| vec![field(item, "id"), field(item, "name")])
        .collect();

    vec![StagedTable {
        table: "tmdb_keyword",
        columns: &["id", "name"],
        conflict_key: &["id"],
        update_columns: &["name"],
        parent_fk_column: None,
        rows,
    }]
}
