//! Per-kind detail fetch + mapper dispatch: the one place that knows
//! which upstream endpoint and `append_to_response` string each kind
//! needs, and which reference kinds require a pass per configured
//! language before their mapper can run.

use serde::Deserialize;
use serde_json::Value;

use tmdb_sync_db::ReferenceSets;
use tmdb_sync_http::HttpError;
use tmdb_sync_mapper::StagedTable;
use tmdb_sync_registry::Kind;

use crate::context::DriverContext;

const MOVIE_APPEND: &str =
    "alternative_titles,credits,external_ids,images,keywords,release_dates,translations,videos";
const TV_APPEND: &str = "alternative_titles,aggregate_credits,external_ids,images,keywords,\
     content_ratings,translations,videos";
const PERSON_APPEND: &str = "translations,external_ids,images";
const COLLECTION_APPEND: &str = "translations";
const SEASON_APPEND: &str = "credits,translations";

/// Fetches and maps one entity. `Ok(None)` means the entity was
/// fetched but excluded by an adult-content flag — the caller treats
/// it as "nothing to stage" rather than an error.
pub async fn fetch_and_map(
    ctx: &DriverContext,
    kind: Kind,
    id: i64,
    refs: &ReferenceSets,
) -> Result<Option<Vec<StagedTable>>, HttpError> {
    match kind {
        Kind::Keyword => {
            let detail: Value = ctx
                .authenticated
                .get_json(&format!("{}/keyword/{}", ctx.base_url, id), &[])
                .await?;
            Ok(Some(tmdb_sync_mapper::keyword::map_keywords(&[detail])))
        }
        Kind::Collection => {
            let mut details = Vec::new();
            for language in languages(ctx) {
                let detail: Value = ctx
                    .authenticated
                    .get_json(
                        &format!("{}/collection/{}", ctx.base_url, id),
                        &[
                            ("language", language.clone()),
                            ("append_to_response", COLLECTION_APPEND.to_string()),
                        ],
                    )
                    .await?;
                details.push((language, detail));
            }
            Ok(Some(tmdb_sync_mapper::collection::map_collection(
                &details,
                &ctx.default_language,
            )))
        }
        Kind::Company => {
            let detail: Value = ctx
                .authenticated
                .get_json(&format!("{}/company/{}", ctx.base_url, id), &[])
                .await?;
            Ok(Some(tmdb_sync_mapper::company::map_company(&detail, refs)))
        }
        Kind::Network => {
            let detail: Value = ctx
                .authenticated
                .get_json(&format!("{}/network/{}", ctx.base_url, id), &[])
                .await?;
            Ok(Some(tmdb_sync_mapper::network::map_network(&detail, refs)))
        }
        Kind::Person => {
            let detail: Value = ctx
                .authenticated
                .get_json(
                    &format!("{}/person/{}", ctx.base_url, id),
                    &[("append_to_response", PERSON_APPEND.to_string())],
                )
                .await?;
            if is_adult(&detail) {
                return Ok(None);
            }
            Ok(Some(tmdb_sync_mapper::person::map_person(&detail)))
        }
        Kind::Movie => {
            let detail: Value = ctx
                .authenticated
                .get_json(
                    &format!("{}/movie/{}", ctx.base_url, id),
                    &[("append_to_response", MOVIE_APPEND.to_string())],
                )
                .await?;
            if is_adult(&detail) {
                return Ok(None);
            }
            Ok(Some(tmdb_sync_mapper::movie::map_movie(&detail, refs)))
        }
        Kind::TvSeries => {
            let mut detail: Value = ctx
                .authenticated
                .get_json(
                    &format!("{}/tv/{}", ctx.base_url, id),
                    &[("append_to_response", TV_APPEND.to_string())],
                )
                .await?;
            if is_adult(&detail) {
                return Ok(None);
            }
            fill_season_episodes(ctx, id, &mut detail).await?;
            Ok(Some(tmdb_sync_mapper::tv_series::map_tv_series(
                &detail, refs,
            )))
        }
        Kind::Language | Kind::Country | Kind::Genre => {
            unreachable!("reference kinds are synced wholesale, not per id")
        }
    }
}

/// The series detail endpoint lists seasons but not their episodes;
/// one extra fetch per season merges `episodes` onto each season
/// object so `map_tv_series` sees them nested the way it expects.
async fn fill_season_episodes(
    ctx: &DriverContext,
    series_id: i64,
    detail: &mut Value,
) -> Result<(), HttpError> {
    let Some(seasons) = detail.get("seasons").and_then(Value::as_array).cloned() else {
        return Ok(());
    };

    let mut filled = Vec::with_capacity(seasons.len());
    for mut season in seasons {
        let season_number = season.get("season_number").and_then(Value::as_i64).unwrap_or(0);
        let season_detail: Value = ctx
            .authenticated
            .get_json(
                &format!("{}/tv/{}/season/{}", ctx.base_url, series_id, season_number),
                &[("append_to_response", SEASON_APPEND.to_string())],
            )
            .await?;
        if let Some(object) = season.as_object_mut() {
            if let Some(episodes) = season_detail.get("episodes").cloned() {
                object.insert("episodes".to_string(), episodes);
            }
            if let Some(credits) = season_detail.get("credits").cloned() {
                object.insert("credits".to_string(), credits);
            }
            if let Some(translations) = season_detail.get("translations").cloned() {
                object.insert("translations".to_string(), translations);
            }
        }
        filled.push(season);
    }

    if let Some(object) = detail.as_object_mut() {
        object.insert("seasons".to_string(), Value::Array(filled));
    }
    Ok(())
}

fn is_adult(detail: &Value) -> bool {
    detail.get("adult").and_then(Value::as_bool).unwrap_or(false)
}

fn languages(ctx: &DriverContext) -> Vec<String> {
    let mut languages = vec![ctx.default_language.clone()];
    for language in &ctx.extra_languages {
        if !languages.contains(language) {
            languages.push(language.clone());
        }
    }
    languages
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenreList {
    pub genres: Vec<Value>,
}

/// Fetches every configured language's movie+tv genre list, merged
/// into one per-language set, for `reference::sync_reference_kind`.
pub(crate) async fn fetch_genres_by_language(
    ctx: &DriverContext,
) -> Result<Vec<(String, Vec<Value>)>, HttpError> {
    let mut by_language = Vec::new();
    for language in languages(ctx) {
        let movie: GenreList = ctx
            .authenticated
            .get_json(
                &format!("{}/genre/movie/list", ctx.base_url),
                &[("language", language.clone())],
            )
            .await?;
        let tv: GenreList = ctx
            .authenticated
            .get_json(
                &format!("{}/genre/tv/list", ctx.base_url),
                &[("language", language.clone())],
            )
            .await?;
        let mut merged = movie.genres;
        for genre in tv.genres {
            let already_present = merged
                .iter()
                .any(|existing| existing.get("id") == genre.get("id"));
            if !already_present {
                merged.push(genre);
            }
        }
        by_language.push((language, merged));
    }
    Ok(by_language)
}
