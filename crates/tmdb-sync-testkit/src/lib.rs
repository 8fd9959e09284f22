//! Shared fixtures for crates that exercise the upstream HTTP surface
//! or the on-disk staging area in their tests: a [`wiremock`] server
//! pre-seeded with export/changes/detail responses, and a scratch
//! directory for staging CSVs.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Starts a [`MockServer`] standing in for both `api.themoviedb.org`
/// and `files.tmdb.org` — callers point both `tmdb.base_url` and
/// `tmdb.export_base_url` at its `.uri()`.
pub async fn start_server() -> MockServer {
    MockServer::start().await
}

/// Gzips `body` (one JSON object per line) the way the real export
/// dump is served, so [`tmdb_sync_export`]-style parsers can be
/// exercised against it unmodified.
pub fn gzip_ndjson(lines: &[Value]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        let _ = writeln!(encoder, "{}", line);
    }
    encoder.finish().expect("gzip encode never fails for an in-memory buffer")
}

/// Mounts a daily export dump at the path the real client requests:
/// `/{export_type}_ids_{MM_DD_YYYY}.json.gz`.
pub async fn mount_export(
    server: &MockServer,
    export_type: &str,
    date: &str,
    rows: &[Value],
) {
    let body = gzip_ndjson(rows);
    Mock::given(method("GET"))
        .and(path(format!("/{}_ids_{}.json.gz", export_type, date)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Mounts a single page of a changes listing at `/{changes_type}/changes`.
pub async fn mount_changes_page(
    server: &MockServer,
    changes_type: &str,
    page: u32,
    body: Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/changes", changes_type)))
        .and(wiremock::matchers::query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a detail payload at `/{entity_type}/{id}`.
pub async fn mount_detail(server: &MockServer, entity_type: &str, id: i64, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", entity_type, id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A fresh, empty staging directory, torn down when the returned
/// [`tempfile::TempDir`] drops at the end of a test.
pub fn staging_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temporary staging directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mounts_an_export_dump_servable_over_http() {
        let server = start_server().await;
        mount_export(
            &server,
            "movie",
            "01_01_2026",
            &[serde_json::json!({"id": 1, "popularity": 3.2})],
        )
        .await;

        let response = reqwest::get(format!("{}/movie_ids_01_01_2026.json.gz", server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[test]
    fn gzip_ndjson_round_trips_through_flate2() {
        let body = gzip_ndjson(&[serde_json::json!({"id": 1})]);
        let mut decoder = flate2::read::GzDecoder::new(body.as_slice());
        let mut decoded = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut decoded).unwrap();
        assert_eq!(decoded.trim(), "{\"id\":1}");
    }
}
