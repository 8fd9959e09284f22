use std::collections::HashSet;

use crate::nullify::{array_literal, bool_field, field, nullify};
use crate::staged::StagedTable;
use serde_json::Value;
use tmdb_sync_db::reference_sets::ReferenceSets;

const ALTERNATIVE_TITLE_COLUMNS: &[&str] = &["serie_id", "iso_3166_1", "title", "title_type"];
const CONTENT_RATING_COLUMNS: &[&str] = &["serie_id", "iso_3166_1", "rating", "descriptors"];
const IMAGE_COLUMNS: &[&str] = &[
    "serie_id",
    "file_path",
    "image_type",
    "aspect_ratio",
    "height",
    "width",
    "vote_average",
    "vote_count",
    "iso_639_1",
];
const ORIGIN_COUNTRY_COLUMNS: &[&str] = &["serie_id", "iso_3166_1"];
const PRODUCTION_COUNTRY_COLUMNS: &[&str] = &["serie_id", "iso_3166_1"];
const SPOKEN_LANGUAGE_COLUMNS: &[&str] = &["serie_id", "iso_639_1"];
const VIDEO_COLUMNS: &[&str] = &[
    "id",
    "serie_id",
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
const EXTERNAL_ID_COLUMNS: &[&str] = &["serie_id", "source", "value"];
const SEASON_TRANSLATION_COLUMNS: &[&str] = &["season_id", "iso_639_1", "name", "overview"];
const SEASON_CREDIT_COLUMNS: &[&str] = &["credit_id", "season_id", "role_order"];
const EPISODE_CREDIT_COLUMNS: &[&str] = &["credit_id", "episode_id"];

const SERIE_COLUMNS: &[&str] = &[
    "id",
    "adult",
    "in_production",
    "original_language",
    "original_name",
    "popularity",
    "status",
    "vote_average",
    "vote_count",
];
const SERIE_UPDATE: &[&str] = &[
    "adult",
    "in_production",
    "original_language",
    "original_name",
    "popularity",
    "status",
    "vote_average",
    "vote_count",
];

/// Maps a TV series detail payload. Seasons carry their nested
/// episodes inline on `detail["seasons"][i]["episodes"]`, merged in by
/// the driver from a per-season detail fetch before mapping — the
/// series detail endpoint alone does not return episode rows.
pub fn map_tv_series(detail: &Value, refs: &ReferenceSets) -> Vec<StagedTable> {
    let series_id = field(detail, "id");

    let series_row = vec![
        series_id.clone(),
        bool_field(detail, "adult"),
        bool_field(detail, "in_production"),
        field(detail, "original_language"),
        field(detail, "original_name"),
        field(detail, "popularity"),
        field(detail, "status"),
        field(detail, "vote_average"),
        field(detail, "vote_count"),
    ];

    let mut translations = Vec::new();
    if let Some(items) = detail
        .get("translations")
        .and_then(|t| t.get("translations"))
        .and_then(Value::as_array)
    {
        for translation in items {
            let data = translation.get("data").cloned().unwrap_or(Value::Null);
            let name = nullify(data.get("name"));
            let overview = nullify(data.get("overview"));
            if name.is_empty() && overview.is_empty() {
                continue;
            }
            translations.push(vec![
                series_id.clone(),
                field(translation, "iso_639_1"),
                name,
                overview,
            ]);
        }
    }

    let mut genres = Vec::new();
    if let Some(items) = detail.get("genres").and_then(Value::as_array) {
        for genre in items {
            let genre_id = field(genre, "id");
            if refs.genres.contains(&parse_i64(&genre_id)) {
                genres.push(vec![series_id.clone(), genre_id]);
            }
        }
    }

    let mut keywords = Vec::new();
    if let Some(items) = detail
        .get("keywords")
        .and_then(|k| k.get("results"))
        .and_then(Value::as_array)
    {
        for keyword in items {
            let keyword_id = field(keyword, "id");
            if refs.keywords.contains(&parse_i64(&keyword_id)) {
                keywords.push(vec![series_id.clone(), keyword_id]);
            }
        }
    }

    let mut networks = Vec::new();
    if let Some(items) = detail.get("networks").and_then(Value::as_array) {
        for network in items {
            let network_id = field(network, "id");
            if refs.networks.contains(&parse_i64(&network_id)) {
                networks.push(vec![series_id.clone(), network_id]);
            }
        }
    }

    let mut production_companies = Vec::new();
    if let Some(items) = detail.get("production_companies").and_then(Value::as_array) {
        for company in items {
            let company_id = field(company, "id");
            if refs.companies.contains(&parse_i64(&company_id)) {
                production_companies.push(vec![series_id.clone(), company_id]);
            }
        }
    }

    let (credits, roles) = map_credits(detail, &series_id, refs);
    let credit_ids: HashSet<String> = credits.iter().map(|row| row[0].clone()).collect();
    let (seasons, episodes, season_translations, season_credits, episode_credits) =
        map_seasons(detail, &series_id, &credit_ids);

    let mut alternative_titles = Vec::new();
    if let Some(items) = detail
        .get("alternative_titles")
        .and_then(|t| t.get("results"))
        .and_then(Value::as_array)
    {
        for title in items {
            let title_text = field(title, "title");
            if title_text.is_empty() {
                continue;
            }
            alternative_titles.push(vec![
                series_id.clone(),
                field(title, "iso_3166_1"),
                title_text,
                nullify(title.get("type")),
            ]);
        }
    }

    let mut content_ratings = Vec::new();
    if let Some(items) = detail
        .get("content_ratings")
        .and_then(|c| c.get("results"))
        .and_then(Value::as_array)
    {
        for rating in items {
            let descriptors = rating
                .get("descriptors")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            content_ratings.push(vec![
                series_id.clone(),
                field(rating, "iso_3166_1"),
                field(rating, "rating"),
                if descriptors.is_empty() {
                    String::new()
                } else {
                    array_literal(&descriptors)
                },
            ]);
        }
    }

    let mut images = Vec::new();
    if let Some(obj) = detail.get("images").and_then(Value::as_object) {
        for image_type in ["backdrop", "poster", "logo"] {
            if let Some(items) = obj.get(format!("{image_type}s").as_str()).and_then(Value::as_array) {
                for image in items {
                    images.push(vec![
                        series_id.clone(),
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

    let mut origin_countries = Vec::new();
    if let Some(items) = detail.get("origin_country").and_then(Value::as_array) {
        for country in items {
            if let Some(code) = country.as_str() {
                if refs.countries.contains(code) {
                    origin_countries.push(vec![series_id.clone(), code.to_string()]);
                }
            }
        }
    }

    let mut production_countries = Vec::new();
    if let Some(items) = detail.get("production_countries").and_then(Value::as_array) {
        for country in items {
            let code = field(country, "iso_3166_1");
            if refs.countries.contains(code.as_str()) {
                production_countries.push(vec![series_id.clone(), code]);
            }
        }
    }

    let mut spoken_languages = Vec::new();
    if let Some(items) = detail.get("spoken_languages").and_then(Value::as_array) {
        for language in items {
            let code = field(language, "iso_639_1");
            if refs.languages.contains(code.as_str()) {
                spoken_languages.push(vec![series_id.clone(), code]);
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
                series_id.clone(),
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

    let mut external_ids = Vec::new();
    if let Some(obj) = detail.get("external_ids").and_then(Value::as_object) {
        for (source, value) in obj {
            let rendered = nullify(Some(value));
            if rendered.is_empty() {
                continue;
            }
            external_ids.push(vec![
                series_id.clone(),
                source.trim_end_matches("_id").to_string(),
                rendered,
            ]);
        }
    }

    vec![
        StagedTable {
            table: "tmdb_serie",
            columns: SERIE_COLUMNS,
            conflict_key: &["id"],
            update_columns: SERIE_UPDATE,
            parent_fk_column: None,
            rows: vec![series_row],
        },
        StagedTable {
            table: "tmdb_serie_translation",
            columns: &["serie_id", "iso_639_1", "name", "overview"],
            conflict_key: &["serie_id", "iso_639_1"],
            update_columns: &["name", "overview"],
            parent_fk_column: Some("serie_id"),
            rows: translations,
        },
        StagedTable {
            table: "tmdb_serie_genre",
            columns: &["serie_id", "genre_id"],
            conflict_key: &["serie_id", "genre_id"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: genres,
        },
        StagedTable {
            table: "tmdb_serie_keyword",
            columns: &["serie_id", "keyword_id"],
            conflict_key: &["serie_id", "keyword_id"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: keywords,
        },
        StagedTable {
            table: "tmdb_serie_network",
            columns: &["serie_id", "network_id"],
            conflict_key: &["serie_id", "network_id"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: networks,
        },
        StagedTable {
            table: "tmdb_serie_production_company",
            columns: &["serie_id", "company_id"],
            conflict_key: &["serie_id", "company_id"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: production_companies,
        },
        StagedTable {
            table: "tmdb_serie_credit",
            columns: &["id", "serie_id", "person_id", "department", "job"],
            conflict_key: &["id"],
            update_columns: &["department", "job"],
            parent_fk_column: Some("serie_id"),
            rows: credits,
        },
        StagedTable {
            table: "tmdb_serie_role",
            columns: &["credit_id", "character", "role_order"],
            conflict_key: &["credit_id"],
            update_columns: &["character", "role_order"],
            parent_fk_column: None,
            rows: roles,
        },
        StagedTable {
            table: "tmdb_season",
            columns: &["id", "serie_id", "season_number", "name", "overview", "air_date"],
            conflict_key: &["id"],
            update_columns: &["name", "overview", "air_date"],
            parent_fk_column: Some("serie_id"),
            rows: seasons,
        },
        StagedTable {
            table: "tmdb_episode",
            columns: &[
                "id",
                "season_id",
                "episode_number",
                "name",
                "overview",
                "air_date",
                "runtime",
                "vote_average",
            ],
            conflict_key: &["id"],
            update_columns: &["name", "overview", "air_date", "runtime", "vote_average"],
            parent_fk_column: Some("season_id"),
            rows: episodes,
        },
        StagedTable {
            table: "tmdb_serie_alternative_title",
            columns: ALTERNATIVE_TITLE_COLUMNS,
            conflict_key: &["serie_id", "iso_3166_1", "title"],
            update_columns: &["title_type"],
            parent_fk_column: Some("serie_id"),
            rows: alternative_titles,
        },
        StagedTable {
            table: "tmdb_serie_content_rating",
            columns: CONTENT_RATING_COLUMNS,
            conflict_key: &["serie_id", "iso_3166_1"],
            update_columns: &["rating", "descriptors"],
            parent_fk_column: Some("serie_id"),
            rows: content_ratings,
        },
        StagedTable {
            table: "tmdb_serie_image",
            columns: IMAGE_COLUMNS,
            conflict_key: &["serie_id", "file_path"],
            update_columns: &[
                "image_type",
                "aspect_ratio",
                "height",
                "width",
                "vote_average",
                "vote_count",
                "iso_639_1",
            ],
            parent_fk_column: Some("serie_id"),
            rows: images,
        },
        StagedTable {
            table: "tmdb_serie_origin_country",
            columns: ORIGIN_COUNTRY_COLUMNS,
            conflict_key: &["serie_id", "iso_3166_1"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: origin_countries,
        },
        StagedTable {
            table: "tmdb_serie_production_country",
            columns: PRODUCTION_COUNTRY_COLUMNS,
            conflict_key: &["serie_id", "iso_3166_1"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: production_countries,
        },
        StagedTable {
            table: "tmdb_serie_spoken_language",
            columns: SPOKEN_LANGUAGE_COLUMNS,
            conflict_key: &["serie_id", "iso_639_1"],
            update_columns: &[],
            parent_fk_column: Some("serie_id"),
            rows: spoken_languages,
        },
        StagedTable {
            table: "tmdb_serie_video",
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
            parent_fk_column: Some("serie_id"),
            rows: videos,
        },
        StagedTable {
            table: "tmdb_serie_external_id",
            columns: EXTERNAL_ID_COLUMNS,
            conflict_key: &["serie_id", "source"],
            update_columns: &["value"],
            parent_fk_column: Some("serie_id"),
            rows: external_ids,
        },
        StagedTable {
            table: "tmdb_season_translation",
            columns: SEASON_TRANSLATION_COLUMNS,
            conflict_key: &["season_id", "iso_639_1"],
            update_columns: &["name", "overview"],
            parent_fk_column: Some("season_id"),
            rows: season_translations,
        },
        StagedTable {
            table: "tmdb_season_credit",
            columns: SEASON_CREDIT_COLUMNS,
            conflict_key: &["credit_id", "season_id"],
            update_columns: &["role_order"],
            parent_fk_column: Some("season_id"),
            rows: season_credits,
        },
        StagedTable {
            table: "tmdb_episode_credit",
            columns: EPISODE_CREDIT_COLUMNS,
            conflict_key: &["credit_id", "episode_id"],
            update_columns: &[],
            parent_fk_column: Some("episode_id"),
            rows: episode_credits,
        },
    ]
}

type SeasonTables = (
    Vec<Vec<String>>,
    Vec<Vec<String>>,
    Vec<Vec<String>>,
    Vec<Vec<String>>,
    Vec<Vec<String>>,
);

/// Maps seasons, their nested episodes, and the season/episode-scoped
/// translations and credits. `known_credit_ids` is the set of credit
/// ids the top-level cast/crew pass kept (a person not in
/// `ReferenceSets.persons` never gets a credit row, so any season or
/// episode crediting them is dropped too).
fn map_seasons(detail: &Value, series_id: &str, known_credit_ids: &HashSet<String>) -> SeasonTables {
    let mut seasons = Vec::new();
    let mut episodes = Vec::new();
    let mut season_translations = Vec::new();
    let mut season_credits = Vec::new();
    let mut episode_credits = Vec::new();

    if let Some(items) = detail.get("seasons").and_then(Value::as_array) {
        for season in items {
            let season_id = field(season, "id");
            seasons.push(vec![
                season_id.clone(),
                series_id.to_string(),
                field(season, "season_number"),
                field(season, "name"),
                field(season, "overview"),
                field(season, "air_date"),
            ]);

            if let Some(translations) = season
                .get("translations")
                .and_then(|t| t.get("translations"))
                .and_then(Value::as_array)
            {
                for translation in translations {
                    let data = translation.get("data").cloned().unwrap_or(Value::Null);
                    let name = nullify(data.get("name"));
                    let overview = nullify(data.get("overview"));
                    if name.is_empty() && overview.is_empty() {
                        continue;
                    }
                    season_translations.push(vec![
                        season_id.clone(),
                        field(translation, "iso_639_1"),
                        name,
                        overview,
                    ]);
                }
            }

            let empty = Vec::new();
            let season_cast = season
                .get("credits")
                .and_then(|c| c.get("cast"))
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            let season_crew = season
                .get("credits")
                .and_then(|c| c.get("crew"))
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            for credit in season_cast.iter().chain(season_crew.iter()) {
                let credit_id = field(credit, "credit_id");
                if !known_credit_ids.contains(&credit_id) {
                    continue;
                }
                season_credits.push(vec![credit_id, season_id.clone(), field(credit, "order")]);
            }

            if let Some(eps) = season.get("episodes").and_then(Value::as_array) {
                for episode in eps {
                    let episode_id = field(episode, "id");
                    episodes.push(vec![
                        episode_id.clone(),
                        season_id.clone(),
                        field(episode, "episode_number"),
                        field(episode, "name"),
                        field(episode, "overview"),
                        field(episode, "air_date"),
                        field(episode, "runtime"),
                        field(episode, "vote_average"),
                    ]);

                    let guest_stars = episode.get("guest_stars").and_then(Value::as_array).unwrap_or(&empty);
                    let crew = episode.get("crew").and_then(Value::as_array).unwrap_or(&empty);
                    for credit in guest_stars.iter().chain(crew.iter()) {
                        let credit_id = field(credit, "credit_id");
                        if !known_credit_ids.contains(&credit_id) {
                            continue;
                        }
                        episode_credits.push(vec![credit_id, episode_id.clone()]);
                    }
                }
            }
        }
    }

    (seasons, episodes, season_translations, season_credits, episode_credits)
}

fn map_credits(
    detail: &Value,
    series_id: &str,
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
            series_id.to_string(),
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
    fn episodes_nest_under_their_season() {
        let detail = json!({
            "id": 1,
            "seasons": [
                {"id": 10, "season_number": 1, "episodes": [
                    {"id": 100, "episode_number": 1}
                ]}
            ]
        });
        let refs = empty_refs();
        let tables = map_tv_series(&detail, &refs);
        let episodes = tables.iter().find(|t| t.table == "tmdb_episode").unwrap();
        assert_eq!(episodes.rows.len(), 1);
        assert_eq!(episodes.rows[0][1], "10");
    }

    #[test]
    fn network_not_in_reference_set_is_dropped() {
        let detail = json!({"id": 1, "networks": [{"id": 5}]});
        let refs = empty_refs();
        let tables = map_tv_series(&detail, &refs);
        let networks = tables.iter().find(|t| t.table == "tmdb_serie_network").unwrap();
        assert!(networks.rows.is_empty());
    }
}
