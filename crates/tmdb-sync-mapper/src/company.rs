use crate::nullify::{field, nested_id};
use crate::staged::StagedTable;
use serde_json::Value;
use tmdb_sync_db::reference_sets::ReferenceSets;

const COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "headquarters",
    "homepage",
    "logo_path",
    "origin_country",
    "parent_company",
];
const UPDATE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "headquarters",
    "homepage",
    "logo_path",
    "origin_country",
    "parent_company",
];

pub fn map_company(detail: &Value, refs: &ReferenceSets) -> Vec<StagedTable> {
    let origin_country = field(detail, "origin_country");
    let origin_country = if refs.countries.contains(origin_country.as_str()) {
        origin_country
    } else {
        String::new()
    };

    let row = vec![
        field(detail, "id"),
        field(detail, "name"),
        field(detail, "description"),
        field(detail, "headquarters"),
        field(detail, "homepage"),
        field(detail, "logo_path"),
        origin_country,
        nested_id(detail, "parent_company"),
    ];

    vec![StagedTable {
        table: "tmdb_company",
        columns: COLUMNS,
        conflict_key: &["id"],
        update_columns: UPDATE_COLUMNS,
        parent_fk_column: None,
        rows: vec![row],
    }]
}
