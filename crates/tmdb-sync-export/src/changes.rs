use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Deserialize;
use tmdb_sync_http::{HttpError, RateLimitedClient};

#[derive(Debug)]
pub enum ChangesError {
    Http(HttpError),
}

impl fmt::Display for ChangesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangesError::Http(err) => write!(f, "changed-id fetch error: {}", err),
        }
    }
}

impl std::error::Error for ChangesError {}

impl From<HttpError> for ChangesError {
    fn from(err: HttpError) -> Self {
        ChangesError::Http(err)
    }
}

#[derive(Debug, Deserialize)]
struct ChangesPage {
    results: Vec<ChangeEntry>,
    total_pages: u32,
    total_results: u32,
}

#[derive(Debug, Deserialize)]
struct ChangeEntry {
    id: i64,
}

/// Pages `GET /{changes_type}/changes?start_date=..&end_date=..&page=N`
/// and returns the union of ids reported across every page. The first
/// page is fetched alone to learn `total_pages`; the rest fan out
/// through the same [`RateLimitedClient`] every other upstream call
/// goes through, so this still respects the global concurrency cap and
/// token bucket.
pub async fn fetch_changed_ids(
    client: &RateLimitedClient,
    base_url: &str,
    changes_type: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashSet<i64>, ChangesError> {
    let url = format!("{}/{}/changes", base_url.trim_end_matches('/'), changes_type);
    let start_str = start.format("%Y-%m-%d").to_string();
    let end_str = end.format("%Y-%m-%d").to_string();

    let first: ChangesPage = client
        .get_json(
            &url,
            &[
                ("start_date", start_str.clone()),
                ("end_date", end_str.clone()),
                ("page", "1".to_string()),
            ],
        )
        .await?;

    let mut ids: HashSet<i64> = first.results.iter().map(|entry| entry.id).collect();
    let total_pages = first.total_pages.max(1);

    if total_pages > 1 {
        let fetches = (2..=total_pages).map(|page| {
            let url = url.clone();
            let start_str = start_str.clone();
            let end_str = end_str.clone();
            async move {
                client
                    .get_json::<ChangesPage>(
                        &url,
                        &[
                            ("start_date", start_str),
                            ("end_date", end_str),
                            ("page", page.to_string()),
                        ],
                    )
                    .await
            }
        });

        for result in join_all(fetches).await {
            match result {
                Ok(page) => ids.extend(page.results.iter().map(|entry| entry.id)),
                Err(err) => {
                    tracing::warn!(error = %err, changes_type, "changed-id page fetch failed, skipping");
                }
            }
        }
    }

    if ids.len() as u32 != first.total_results {
        tracing::warn!(
            changes_type,
            reported = first.total_results,
            collected = ids.len(),
            "changed-id count does not match total_results; upstream dedupes across pages"
        );
    }

    Ok(ids)
}
