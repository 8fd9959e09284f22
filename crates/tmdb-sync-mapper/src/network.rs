use crate::nullify::field;
use crate::staged::StagedTable;
use serde_json::Value;
use tmdb_sync_db::reference_sets::ReferenceSets;

pub fn map_network(detail: &Value, refs: &ReferenceSets) -> Vec<StagedTable> {
    let origin_country = field(detail, "origin_country");
    let origin_country = if refs.countries.contains(origin_country.as_str()) {
        origin_country
    } else {
        String::new()
    };

    let row = vec![
        field(detail, "id"),
        field(detail, "name"),
        field(detail, "headquarters"),
        field(detail, "homepage"),
        field(detail, "logo_path"),
        origin_country,
    ];

    vec![StagedTable {
        table: "tmdb_network",
        columns: &["id", "name", "headquarters", "homepage", "logo_path", "origin_country"],
        conflict_key: &["id"],
        update_columns: &["name", "headquarters", "homepage", "logo_path", "origin_country"],
        parent_fk_column: None,
        rows: vec![row],
    }]
}
