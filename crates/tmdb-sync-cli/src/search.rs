use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use tmdb_sync_config::AppConfig;
use tmdb_sync_search::{sync_collection, CollectionSchema, CollectionSpec, FieldSchema, SearchClient, SearchError};

const BATCH_SIZE: usize = 10_000;

const MOVIE_QUERY: &str = r#"
SELECT
    m.id,
    m.original_title,
    m.popularity,
    COALESCE(g.genre_ids, '{}') AS genre_ids,
    rt.runtime,
    rel.release_ts,
    COALESCE(titles.titles, '{}') AS titles
FROM tmdb_movie m
LEFT JOIN LATERAL (
    SELECT ARRAY_REMOVE(ARRAY_AGG(DISTINCT btrim(t.title)), NULL) AS titles
    FROM tmdb_movie_translation t
    WHERE t.movie_id = m.id AND t.title IS NOT NULL AND btrim(t.title) <> ''
) titles ON TRUE
LEFT JOIN LATERAL (
    SELECT t.runtime
    FROM tmdb_movie_translation t
    WHERE t.movie_id = m.id AND t.runtime IS NOT NULL AND t.runtime > 0
    ORDER BY (t.iso_639_1 = m.original_language) DESC, t.iso_639_1
    LIMIT 1
) rt ON TRUE
LEFT JOIN LATERAL (
    SELECT EXTRACT(EPOCH FROM r.release_date)::bigint AS release_ts
    FROM tmdb_movie_release_date r
    WHERE r.movie_id = m.id AND r.release_type IN ('2', '3')
    ORDER BY r.release_date ASC
    LIMIT 1
) rel ON TRUE
LEFT JOIN LATERAL (
    SELECT ARRAY_AGG(DISTINCT mg.genre_id) AS genre_ids
    FROM tmdb_movie_genre mg
    WHERE mg.movie_id = m.id
) g ON TRUE
ORDER BY m.id
"#;

const TV_SERIES_QUERY: &str = r#"
SELECT
    s.id,
    s.original_name,
    s.popularity,
    COALESCE(g.genre_ids, '{}') AS genre_ids,
    eps.number_of_episodes,
    eps.number_of_seasons,
    s.vote_average,
    s.vote_count,
    s.status,
    air.first_air_ts,
    air.last_air_ts,
    COALESCE(names.names, '{}') AS names
FROM tmdb_serie s
LEFT JOIN LATERAL (
    SELECT ARRAY_REMOVE(ARRAY_AGG(DISTINCT btrim(t.name)), NULL) AS names
    FROM tmdb_serie_translation t
    WHERE t.serie_id = s.id AND t.name IS NOT NULL AND btrim(t.name) <> ''
) names ON TRUE
LEFT JOIN LATERAL (
    SELECT ARRAY_AGG(DISTINCT sg.genre_id) AS genre_ids
    FROM tmdb_serie_genre sg
    WHERE sg.serie_id = s.id
) g ON TRUE
LEFT JOIN LATERAL (
    SELECT
        COUNT(DISTINCT e.id) AS number_of_episodes,
        COUNT(DISTINCT se.id) AS number_of_seasons
    FROM tmdb_season se
    LEFT JOIN tmdb_episode e ON e.season_id = se.id
    WHERE se.serie_id = s.id
) eps ON TRUE
LEFT JOIN LATERAL (
    SELECT
        EXTRACT(EPOCH FROM MIN(se.air_date))::bigint AS first_air_ts,
        EXTRACT(EPOCH FROM MAX(se.air_date))::bigint AS last_air_ts
    FROM tmdb_season se
    WHERE se.serie_id = s.id
) air ON TRUE
ORDER BY s.id
"#;

/// Runs the search projection (C11) for the two collections movies and
/// tv series are exposed as, after the database side of a run commits.
pub async fn sync_search_projections(pool: &PgPool, app_config: &AppConfig) -> Result<(), SearchError> {
    let base_url = match &app_config.search.base_url {
        Some(url) => url.clone(),
        None => {
            tracing::info!("no search.base_url configured, skipping search projection");
            return Ok(());
        }
    };
    let api_key = app_config.search.api_key.clone().unwrap_or_default();
    let client = SearchClient::new(base_url, api_key)?;

    let movie_report = sync_collection(pool, &client, movies_spec()).await?;
    tracing::info!(
        collection = %movie_report.collection,
        upserted = movie_report.upserted,
        deleted = movie_report.deleted,
        "search projection finished"
    );

    let tv_series_report = sync_collection(pool, &client, tv_series_spec()).await?;
    tracing::info!(
        collection = %tv_series_report.collection,
        upserted = tv_series_report.upserted,
        deleted = tv_series_report.deleted,
        "search projection finished"
    );

    Ok(())
}

fn movies_spec() -> CollectionSpec<'static> {
    let schema = CollectionSchema {
        name: "movies".to_string(),
        fields: vec![
            string_field("id"),
            string_field("original_title"),
            facet_field("titles"),
            float_field("popularity"),
            facet_int_field("genre_ids"),
            optional_int_field("runtime"),
            optional_int_field("release_date"),
        ],
        default_sorting_field: "popularity".to_string(),
    };

    CollectionSpec {
        schema,
        select_sql: MOVIE_QUERY,
        batch_size: BATCH_SIZE,
        mapper: Box::new(map_movie),
    }
}

fn tv_series_spec() -> CollectionSpec<'static> {
    let schema = CollectionSchema {
        name: "tv_series".to_string(),
        fields: vec![
            string_field("id"),
            string_field("original_name"),
            facet_field("names"),
            float_field("popularity"),
            facet_int_field("genre_ids"),
            optional_int_field("number_of_episodes"),
            optional_int_field("number_of_seasons"),
            optional_float_field("vote_average"),
            optional_int_field("vote_count"),
            optional_string_field("status"),
            optional_int_field("first_air_date"),
            optional_int_field("last_air_date"),
        ],
        default_sorting_field: "popularity".to_string(),
    };

    CollectionSpec {
        schema,
        select_sql: TV_SERIES_QUERY,
        batch_size: BATCH_SIZE,
        mapper: Box::new(map_tv_series),
    }
}

fn map_movie(row: &PgRow) -> (String, serde_json::Value) {
    let id: i64 = row.get("id");
    let original_title: Option<String> = row.get("original_title");
    let popularity: Option<f64> = row.get("popularity");
    let genre_ids: Vec<i64> = row.get("genre_ids");
    let runtime: Option<i32> = row.get("runtime");
    let release_ts: Option<i64> = row.get("release_ts");
    let mut titles: Vec<String> = row.get("titles");

    let original_title = original_title.unwrap_or_default();
    if !original_title.trim().is_empty() && !titles.iter().any(|t| t == original_title.trim()) {
        titles.push(original_title.trim().to_string());
    }

    let mut document = serde_json::json!({
        "id": id.to_string(),
        "original_title": original_title,
        "titles": titles,
        "popularity": popularity.unwrap_or(0.0),
        "genre_ids": genre_ids,
    });
    if let Some(runtime) = runtime {
        document["runtime"] = serde_json::json!(runtime);
    }
    if let Some(release_ts) = release_ts {
        document["release_date"] = serde_json::json!(release_ts);
    }

    (id.to_string(), document)
}

fn map_tv_series(row: &PgRow) -> (String, serde_json::Value) {
    let id: i64 = row.get("id");
    let original_name: Option<String> = row.get("original_name");
    let popularity: Option<f64> = row.get("popularity");
    let genre_ids: Vec<i64> = row.get("genre_ids");
    let number_of_episodes: Option<i64> = row.get("number_of_episodes");
    let number_of_seasons: Option<i64> = row.get("number_of_seasons");
    let vote_average: Option<f64> = row.get("vote_average");
    let vote_count: Option<i64> = row.get("vote_count");
    let status: Option<String> = row.get("status");
    let first_air_ts: Option<i64> = row.get("first_air_ts");
    let last_air_ts: Option<i64> = row.get("last_air_ts");
    let mut names: Vec<String> = row.get("names");

    let original_name = original_name.unwrap_or_default();
    if !original_name.trim().is_empty() && !names.iter().any(|n| n == original_name.trim()) {
        names.push(original_name.trim().to_string());
    }

    let mut document = serde_json::json!({
        "id": id.to_string(),
        "original_name": original_name,
        "names": names,
        "popularity": popularity.unwrap_or(0.0),
        "genre_ids": genre_ids,
    });
    if let Some(value) = number_of_episodes {
        document["number_of_episodes"] = serde_json::json!(value);
    }
    if let Some(value) = number_of_seasons {
        document["number_of_seasons"] = serde_json::json!(value);
    }
    if let Some(value) = vote_average {
        document["vote_average"] = serde_json::json!(value);
    }
    if let Some(value) = vote_count {
        document["vote_count"] = serde_json::json!(value);
    }
    if let Some(value) = status {
        document["status"] = serde_json::json!(value);
    }
    if let Some(value) = first_air_ts {
        document["first_air_date"] = serde_json::json!(value);
    }
    if let Some(value) = last_air_ts {
        document["last_air_date"] = serde_json::json!(value);
    }

    (id.to_string(), document)
}

fn string_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "string".to_string(), optional: false, facet: false }
}

fn optional_string_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "string".to_string(), optional: true, facet: false }
}

fn facet_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "string[]".to_string(), optional: false, facet: true }
}

fn facet_int_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "int64[]".to_string(), optional: false, facet: true }
}

fn float_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "float".to_string(), optional: false, facet: false }
}

fn optional_float_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "float".to_string(), optional: true, facet: false }
}

fn optional_int_field(name: &str) -> FieldSchema {
    FieldSchema { name: name.to_string(), field_type: "int64".to_string(), optional: true, facet: false }
}
