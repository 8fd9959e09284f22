use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

use crate::schema::CollectionSchema;

#[derive(Debug)]
pub enum SearchError {
    Network(reqwest::Error),
    Upstream(StatusCode),
    Decode(serde_json::Error),
    Database(sqlx::Error),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Network(err) => write!(f, "network error: {}", err),
            SearchError::Upstream(status) => write!(f, "search index returned {}", status),
            SearchError::Decode(err) => write!(f, "could not decode search index response: {}", err),
            SearchError::Database(err) => write!(f, "database error while syncing search index: {}", err),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err)
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Decode(err)
    }
}

impl From<sqlx::Error> for SearchError {
    fn from(err: sqlx::Error) -> Self {
        SearchError::Database(err)
    }
}

/// Thin HTTP/JSON wrapper around the search index's collection API.
/// Treats the index purely as an HTTP boundary: no client SDK, just
/// `reqwest` calls against its REST surface.
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-TYPESENSE-API-KEY", &self.api_key)
    }

    /// `None` when the collection does not exist yet.
    pub async fn get_collection_schema(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionSchema>, SearchError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{}", collection))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream(status));
        }
        Ok(Some(response.json::<CollectionSchema>().await?))
    }

    pub async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), SearchError> {
        let response = self
            .request(reqwest::Method::POST, "/collections")
            .json(schema)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream(status));
        }
        Ok(())
    }

    pub async fn delete_collection(&self, collection: &str) -> Result<(), SearchError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/collections/{}", collection))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(SearchError::Upstream(status));
        }
        Ok(())
    }

    /// Bulk upserts `documents` via the NDJSON import endpoint.
    pub async fn import_documents(
        &self,
        collection: &str,
        documents: &[Value],
    ) -> Result<(), SearchError> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for document in documents {
            body.push_str(&serde_json::to_string(document)?);
            body.push('\n');
        }
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/documents/import", collection),
            )
            .query(&[("action", "upsert")])
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream(status));
        }
        Ok(())
    }

    /// Dumps every document id currently in the collection, for the
    /// stale-document reconciliation pass.
    pub async fn export_ids(&self, collection: &str) -> Result<Vec<String>, SearchError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}/documents/export", collection),
            )
            .query(&[("include_fields", "id")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream(status));
        }
        let body = response.text().await?;
        let mut ids = Vec::new();
        for line in body.lines() {
            if line.is_empty() {
                continue;
            }
            let document: Value = serde_json::from_str(line)?;
            if let Some(id) = document.get("id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    pub async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = format!("id:[{}]", ids.join(","));
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/collections/{}/documents", collection),
            )
            .query(&[("filter_by", filter.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream(status));
        }
        Ok(())
    }
}
