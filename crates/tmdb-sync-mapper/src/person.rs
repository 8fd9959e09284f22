use crate::nullify::{bool_field, field, nullify};
use crate::staged::StagedTable;
use serde_json::Value;

const PERSON_COLUMNS: &[&str] = &[
    "id",
    "adult",
    "birthday",
    "deathday",
    "gender",
    "homepage",
    "imdb_id",
    "known_for_department",
    "name",
    "place_of_birth",
    "popularity",
];
const PERSON_UPDATE: &[&str] = &[
    "adult",
    "birthday",
    "deathday",
    "gender",
    "homepage",
    "imdb_id",
    "known_for_department",
    "name",
    "place_of_birth",
    "popularity",
];

pub fn map_person(detail: &Value) -> Vec<StagedTable> {
    let person_id = field(detail, "id");

    let person_row = vec![
        person_id.clone(),
        bool_field(detail, "adult"),
        field(detail, "birthday"),
        field(detail, "deathday"),
        field(detail, "gender"),
        field(detail, "homepage"),
        field(detail, "imdb_id"),
        field(detail, "known_for_department"),
        field(detail, "name"),
        field(detail, "place_of_birth"),
        field(detail, "popularity"),
    ];

    let mut translations = Vec::new();
    if let Some(items) = detail
        .get("translations")
        .and_then(|t| t.get("translations"))
        .and_then(Value::as_array)
    {
        for translation in items {
            let biography = nullify(translation.get("data").and_then(|d| d.get("biography")));
            if biography.is_empty() {
                continue;
            }
            translations.push(vec![
                person_id.clone(),
                biography,
                field(translation, "iso_639_1"),
                field(translation, "iso_3166_1"),
            ]);
        }
    }

    let mut external_ids = Vec::new();
    if let Some(obj) = detail.get("external_ids").and_then(Value::as_object) {
        for (source, value) in obj {
            let rendered = nullify(Some(value));
            if rendered.is_empty() {
                continue;
            }
            external_ids.push(vec![
                person_id.clone(),
                source.trim_end_matches("_id").to_string(),
                rendered,
            ]);
        }
    }

    let mut also_known_as = Vec::new();
    if let Some(items) = detail.get("also_known_as").and_then(Value::as_array) {
        for name in items {
            if let Some(name) = name.as_str() {
                if !name.is_empty() {
                    also_known_as.push(vec![person_id.clone(), name.to_string()]);
                }
            }
        }
    }

    let mut images = Vec::new();
    if let Some(items) = detail
        .get("images")
        .and_then(|i| i.get("profiles"))
        .and_then(Value::as_array)
    {
        for image in items {
            images.push(vec![
                person_id.clone(),
                field(image, "file_path"),
                field(image, "aspect_ratio"),
                field(image, "height"),
                field(image, "width"),
                field(image, "vote_average"),
                field(image, "vote_count"),
            ]);
        }
    }

    vec![
        StagedTable {
            table: "tmdb_person",
            columns: PERSON_COLUMNS,
            conflict_key: &["id"],
            update_columns: PERSON_UPDATE,
            parent_fk_column: None,
            rows: vec![person_row],
        },
        StagedTable {
            table: "tmdb_person_translation",
            columns: &["person_id", "biography", "iso_639_1", "iso_3166_1"],
            conflict_key: &["person_id", "iso_639_1", "iso_3166_1"],
            update_columns: &["biography"],
            parent_fk_column: Some("person_id"),
            rows: translations,
        },
        StagedTable {
            table: "tmdb_person_external_id",
            columns: &["person_id", "source", "value"],
            conflict_key: &["person_id", "source"],
            update_columns: &["value"],
            parent_fk_column: Some("person_id"),
            rows: external_ids,
        },
        StagedTable {
            table: "tmdb_person_also_known_as",
            columns: &["person_id", "name"],
            conflict_key: &["person_id", "name"],
            update_columns: &[],
            parent_fk_column: Some("person_id"),
            rows: also_known_as,
        },
        StagedTable {
            table: "tmdb_person_image",
            columns: &[
                "person_id",
                "file_path",
                "aspect_ratio",
                "height",
                "width",
                "vote_average",
                "vote_count",
            ],
            conflict_key: &["person_id", "file_path"],
            update_columns: &["aspect_ratio", "height", "width", "vote_average", "vote_count"],
            parent_fk_column: Some("person_id"),
            rows: images,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn external_ids_strip_id_suffix_and_skip_empty() {
        let detail = json!({
            "id": 1,
            "external_ids": {"imdb_id": "nm123", "facebook_id": ""}
        });
        let tables = map_person(&detail);
        let ext = tables.iter().find(|t| t.table == "tmdb_person_external_id").unwrap();
        assert_eq!(ext.rows.len(), 1);
        assert_eq!(ext.rows[0][1], "imdb");
    }
}
