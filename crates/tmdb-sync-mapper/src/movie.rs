use crate::nullify::{bool_field, field, nested_id, nullify};
use crate::staged::StagedTable;
use serde_json::Value;
use tmdb_sync_db::reference_sets::ReferenceSets;

const MOVIE_COLUMNS: &[&str] = &[
    "id",
    "adult",
    "budget",
    "original_language",
    "original_title",
    "popularity",
    "revenue",
    "status",
    "vote_average",
    "vote_count",
    "belongs_to_collection",
];
const MOVIE_CONFLICT: &[&str] = &["id"];
const MOVIE_UPDATE: &[&str] = &[
    "adult",
    "budget",
    "original_language",
    "original_title",
    "popularity",
    "revenue",
    "status",
    "vote_average",
    "vote_count",
    "belongs_to_collection",
];

const TRANSLATION_COLUMNS: &[&str] = &["movie_id", "iso_639_1", "title", "overview", "runtime"];
const GENRE_COLUMNS: &[&str] = &["movie_id", "genre_id"];
const KEYWORD_COLUMNS: &[&str] = &["movie_id", "keyword_id"];
const PRODUCTION_COMPANY_COLUMNS: &[&str] = &["movie_id", "company_id"];
const ORIGIN_COUNTRY_COLUMNS: &[&str] = &["movie_id", "iso_3166_1"];
const CREDIT_COLUMNS: &[&str] = &["id", "movie_id", "person_id", "department", "job"];
const ROLE_COLUMNS: &[&str] = &["credit_id", "character", "role_order"];
const EXTERNAL_ID_COLUMNS: &[&str] = &["movie_id", "source", "value"];
const RELEASE_DATE_COLUMNS: &[&str] = &[
    "movie_id",
    "iso_3166_1",
    "release_date",
    "certification",
    "iso_639_1",
    "release_type",
];
const ALTERNATIVE_TITLE_COLUMNS: &[&str] = &["movie_id", "iso_3166_1", "title", "title_type"];
const IMAGE_COLUMNS: &[&str] = &[
    "movie_id",
    "file_path",
    "image_type",
    "aspect_ratio",
    "height",
    "width",
    "vote_average",
    "vote_count",
    "iso_639_1",
];
const PRODUCTION_COUNTRY_COLUMNS: &[&str] = &["movie_id", "iso_3166_1"];
const SPOKEN_LANGUAGE_COLUMNS: &[&str] = &["movie_id", "iso_639_1"];
const VIDEO_COLUMNS: &[&str] = &[
    "id",
    "movie_id",
    "iso_639_1",
    "iso_3166_1",
    "name",
    "key",
    "site",
    "size",
    "video_type",
    "official",
    "published_at",
];

/// Maps one fully-fetched movie detail payload (append_to_response:
/// alternative_titles, credits, external_ids, images, keywords,
/// release_dates, translations, videos) into one staged table per
/// destination table.
pub fn map_movie(detail: &Value, refs: &ReferenceSets) -> Vec<StagedTable> {
    let movie_id = field(detail, "id");

    let mut movie_row = vec![
        movie_id.clone(),
        bool_field(detail, "adult"),
        field(detail, "budget"),
        field(detail, "original_language"),
        field(detail, "original_title"),
        field(detail, "popularity"),
        field(detail, "revenue"),
        field(detail, "status"),
        field(detail, "vote_average"),
        field(detail, "vote_count"),
        String::new(),
    ];
    let collection_id = nested_id(detail, "belongs_to_collection");
    if !collection_id.is_empty() && refs.collections.contains(&parse_i64(&collection_id)) {
        movie_row[10] = collection_id;
    }

    let mut translations = Vec::new();
    if let Some(items) = detail
        .get("translations")
        .and_then(|t| t.get("translations"))
        .and_then(Value::as_array)
    {
        for translation in items {
            let data = translation.get("data").cloned().unwrap_or(Value::Null);
            let title = nullify(data.get("title"));
            let overview = nullify(data.get("overview"));
            let runtime = nullify(data.get("runtime"));
            if title.is_empty() && overview.is_empty() {
                continue;
            }
            translations.push(vec![
                movie_id.clone(),
                field(translation, "iso_639_1"),
                title,
                overview,
                runtime,
            ]);
        }
    }

    let mut genres = Vec::new();
    if let Some(items) = detail.get("genres").and_then(Value::as_array) {
        for genre in items {
            let genre_id = field(genre, "id");
            if refs.genres.contains(&parse_i64(&genre_id)) {
                genres.push(vec![movie_id.clone(), genre_id]);
            }
        }
    }

    let mut keywords = Vec::new();
    if let Some(items) = detail
        .get("keywords")
        .and_then(|k| k.get("keywords"))
        .and_then(Value::as_array)
    {
        for keyword in items {
            let keyword_id = field(keyword, "id");
            if refs.keywords.contains(&parse_i64(&keyword_id)) {
                keywords.push(vec![movie_id.clone(), keyword_id]);
            }
        }
    }

    let mut production_companies = Vec::new();
    if let Some(items) = detail.get("production_companies").and_then(Value::as_array) {
        for company in items {
            let company_id = field(company, "id");
            if refs.companies.contains(&parse_i64(&company_id)) {
                production_companies.push(vec![movie_id.clone(), company_id]);
            }
        }
    }

    let mut origin_countries = Vec::new();
    if let Some(items) = detail.get("origin_country").and_then(Value::as_array) {
        for country in items {
            if let Some(code) = country.as_str() {
                if refs.countries.contains(code) {
                    origin_countries.push(vec![movie_id.clone(), code.to_string()]);
                }
            }
        }
    }

    let (credits, roles) = map_credits(detail, &movie_id, refs);

    let mut external_ids = Vec::new();
    if let Some(obj) = detail.get("external_ids").and_then(Value::as_object) {
        for (source, value) in obj {
            let rendered = nullify(Some(value));
            if rendered.is_empty() {
                continue;
            }
            external_ids.push(vec![
                movie_id.clone(),
                source.trim_end_matches("_id").to_string(),
                rendered,
            ]);
        }
    }

    let mut release_dates = Vec::new();
    if let Some(results) = detail
        .get("release_dates")
        .and_then(|r| r.get("results"))
        .and_then(Value::as_array)
    {
        for entry in results {
            let country = field(entry, "iso_3166_1");
            if !refs.countries.contains(country.as_str()) {
                continue;
            }
            if let Some(dates) = entry.get("release_dates").and_then(Value::as_array) {
                for release in dates {
                    let language = field(release, "iso_639_1");
                    let language = if refs.languages.contains(language.as_str()) {
                        language
                    } else {
                        String::new()
                    };
                    release_dates.push(vec![
                        movie_id.clone(),
                        country.clone(),
                        field(release, "release_date"),
                        field(release, "certification"),
                        language,
                        field(release, "type"),
                    ]);
                }
            }
        }
    }

    let mut alternative_titles = Vec::new();
    if let Some(items) = detail
        .get("alternative_titles")
        .and_then(|t| t.get("titles"))
        .and_then(Value::as_array)
    {
        for title in items {
            let title_text = field(title, "title");
            if title_text.is_empty() {
                continue;
            }
            alternative_titles.push(vec![
                movie_id.clone(),
                field(title, "iso_3166_1"),
                title_text,
                nullify(title.get("type")),
            ]);
        }
    }

    let mut images = Vec::new();
    if let Some(obj) = detail.get("images").and_then(Value::as_object) {
        for image_type in ["backdrop", "poster", "logo"] {
            if let Some(items) = obj.get(format!("{image_type}s").as_str()).and_then(Value::as_array) {
                for image in items {
                    images.push(vec![
                        movie_id.clone(),
                        field(image, "file_path"),
                        image_type.to_string(),
                        field(image, "aspect_ratio"),
                        field(image, "height"),
                        field(image, "width"),
                        field(image, "vote_average"),
                        field(image, "vote_count"),
                        field(image, "iso_639_1"),
                    ]);
                }
            }
        }
    }

    let mut production_countries = Vec::new();
    if let Some(items) = detail.get("production_countries").and_then(Value::as_array) {
        for country in items {
            let code = field(country, "iso_3166_1");
            if refs.countries.contains(code.as_str()) {
                production_countries.push(vec![movie_id.clone(), code]);
            }
        }
    }

    let mut spoken_languages = Vec::new();
    if let Some(items) = detail.get("spoken_languages").and_then(Value::as_array) {
        for language in items {
            let code = field(language, "iso_639_1");
            if refs.languages.contains(code.as_str()) {
                spoken_languages.push(vec![movie_id.clone(), code]);
            }
        }
    }

    let mut videos = Vec::new();
    if let Some(items) = detail
        .get("videos")
        .and_then(|v| v.get("results"))
        .and_then(Value::as_array)
    {
        for video in items {
            videos.push(vec![
                field(video, "id"),
                movie_id.clone(),
                field(video, "iso_639_1"),
                field(video, "iso_3166_1"),
                field(video, "name"),
                field(video, "key"),
                field(video, "site"),
                field(video, "size"),
                field(video, "type"),
                bool_field(video, "official"),
                field(video, "published_at"),
            ]);
        }
    }

    vec![
        StagedTable {
            table: "tmdb_movie",
            columns: MOVIE_COLUMNS,
            conflict_key: MOVIE_CONFLICT,
            update_columns: MOVIE_UPDATE,
            parent_fk_column: None,
            rows: vec![movie_row],
        },
        StagedTable {
            table: "tmdb_movie_translation",
            columns: TRANSLATION_COLUMNS,
            conflict_key: &["movie_id", "iso_639_1"],
            update_columns: &["title", "overview", "runtime"],
            parent_fk_column: Some("movie_id"),
            rows: translations,
        },
        StagedTable {
            table: "tmdb_movie_genre",
            columns: GENRE_COLUMNS,
            conflict_key: &["movie_id", "genre_id"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: genres,
        },
        StagedTable {
            table: "tmdb_movie_keyword",
            columns: KEYWORD_COLUMNS,
            conflict_key: &["movie_id", "keyword_id"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: keywords,
        },
        StagedTable {
            table: "tmdb_movie_production_company",
            columns: PRODUCTION_COMPANY_COLUMNS,
            conflict_key: &["movie_id", "company_id"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: production_companies,
        },
        StagedTable {
            table: "tmdb_movie_origin_country",
            columns: ORIGIN_COUNTRY_COLUMNS,
            conflict_key: &["movie_id", "iso_3166_1"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: origin_countries,
        },
        StagedTable {
            table: "tmdb_movie_credit",
            columns: CREDIT_COLUMNS,
            conflict_key: &["id"],
            update_columns: &["department", "job"],
            parent_fk_column: Some("movie_id"),
            rows: credits,
        },
        StagedTable {
            table: "tmdb_movie_role",
            columns: ROLE_COLUMNS,
            conflict_key: &["credit_id"],
            update_columns: &["character", "role_order"],
            parent_fk_column: None,
            rows: roles,
        },
        StagedTable {
            table: "tmdb_movie_external_id",
            columns: EXTERNAL_ID_COLUMNS,
            conflict_key: &["movie_id", "source"],
            update_columns: &["value"],
            parent_fk_column: Some("movie_id"),
            rows: external_ids,
        },
        StagedTable {
            table: "tmdb_movie_release_date",
            columns: RELEASE_DATE_COLUMNS,
            conflict_key: &["movie_id", "iso_3166_1", "release_date", "release_type"],
            update_columns: &["certification", "iso_639_1"],
            parent_fk_column: Some("movie_id"),
            rows: release_dates,
        },
        StagedTable {
            table: "tmdb_movie_alternative_title",
            columns: ALTERNATIVE_TITLE_COLUMNS,
            conflict_key: &["movie_id", "iso_3166_1", "title"],
            update_columns: &["title_type"],
            parent_fk_column: Some("movie_id"),
            rows: alternative_titles,
        },
        StagedTable {
            table: "tmdb_movie_image",
            columns: IMAGE_COLUMNS,
            conflict_key: &["movie_id", "file_path"],
            update_columns: &[
                "image_type",
                "aspect_ratio",
                "height",
                "width",
                "vote_average",
                "vote_count",
                "iso_639_1",
            ],
            parent_fk_column: Some("movie_id"),
            rows: images,
        },
        StagedTable {
            table: "tmdb_movie_production_country",
            columns: PRODUCTION_COUNTRY_COLUMNS,
            conflict_key: &["movie_id", "iso_3166_1"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: production_countries,
        },
        StagedTable {
            table: "tmdb_movie_spoken_language",
            columns: SPOKEN_LANGUAGE_COLUMNS,
            conflict_key: &["movie_id", "iso_639_1"],
            update_columns: &[],
            parent_fk_column: Some("movie_id"),
            rows: spoken_languages,
        },
        StagedTable {
            table: "tmdb_movie_video",
            columns: VIDEO_COLUMNS,
            conflict_key: &["id"],
            update_columns: &[
                "iso_639_1",
                "iso_3166_1",
                "name",
                "key",
                "site",
                "size",
                "video_type",
                "official",
                "published_at",
            ],
            parent_fk_column: Some("movie_id"),
            rows: videos,
        },
    ]
}

fn map_credits(
    detail: &Value,
    movie_id: &str,
    refs: &ReferenceSets,
) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    let mut credits = Vec::new();
    let mut roles = Vec::new();

    let empty = Vec::new();
    let cast = detail
        .get("credits")
        .and_then(|c| c.get("cast"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let crew = detail
        .get("credits")
        .and_then(|c| c.get("crew"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    for credit in cast.iter().chain(crew.iter()) {
        let person_id = field(credit, "id");
        if !refs.persons.contains(&parse_i64(&person_id)) {
            continue;
        }
        let credit_id = field(credit, "credit_id");
        let department = credit
            .get("department")
            .and_then(Value::as_str)
            .unwrap_or("Acting")
            .to_string();
        let job = credit
            .get("job")
            .and_then(Value::as_str)
            .unwrap_or("Actor")
            .to_string();
        credits.push(vec![
            credit_id.clone(),
            movie_id.to_string(),
            person_id,
            department,
            job,
        ]);

        if credit.get("character").is_some() {
            roles.push(vec![
                credit_id,
                field(credit, "character"),
                field(credit, "order"),
            ]);
        }
    }

    (credits, roles)
}

fn parse_i64(value: &str) -> i64 {
    value.parse().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn empty_refs() -> ReferenceSets {
        ReferenceSets {
            languages: HashSet::new(),
            countries: HashSet::new(),
            genres: HashSet::new(),
            keywords: HashSet::new(),
            collections: HashSet::new(),
            companies: HashSet::new(),
            networks: HashSet::new(),
            persons: HashSet::new(),
        }
    }

    #[test]
    fn movie_row_nulls_collection_not_in_reference_set() {
        let detail = json!({
            "id": 42,
            "adult": false,
            "belongs_to_collection": {"id": 7},
        });
        let refs = empty_refs();
        let tables = map_movie(&detail, &refs);
        let movie_table = &tables[0];
        assert_eq!(movie_table.rows[0][10], "");
    }

    #[test]
    fn movie_row_keeps_collection_present_in_reference_set() {
        let detail = json!({
            "id": 42,
            "belongs_to_collection": {"id": 7},
        });
        let mut refs = empty_refs();
        refs.collections.insert(7);
        let tables = map_movie(&detail, &refs);
        assert_eq!(tables[0].rows[0][10], "7");
    }

    #[test]
    fn credit_without_character_skips_role_row() {
        let detail = json!({
            "id": 1,
            "credits": {
                "cast": [],
                "crew": [{"id": 9, "credit_id": "abc", "department": "Directing", "job": "Director"}]
            }
        });
        let mut refs = empty_refs();
        refs.persons.insert(9);
        let tables = map_movie(&detail, &refs);
        let credits_table = tables.iter().find(|t| t.table == "tmdb_movie_credit").unwrap();
        let roles_table = tables.iter().find(|t| t.table == "tmdb_movie_role").unwrap();
        assert_eq!(credits_table.rows.len(), 1);
        assert!(roles_table.rows.is_empty());
    }

    #[test]
    fn credit_for_unknown_person_is_dropped() {
        let detail = json!({
            "id": 1,
            "credits": {"cast": [{"id": 5, "credit_id": "x", "character": "Hero"}], "crew": []}
        });
        let refs = empty_refs();
        let tables = map_movie(&detail, &refs);
        let credits_table = tables.iter().find(|t| t.table == "tmdb_movie_credit").unwrap();
        assert!(credits_table.rows.is_empty());
    }
}
