use std::collections::HashSet;

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use crate::client::{SearchClient, SearchError};
use crate::schema::CollectionSchema;

/// Everything [`sync_collection`] needs to project one database query
/// into one search collection: the schema to reconcile, the query that
/// produces the rows, and how to turn a row into a document.
pub struct CollectionSpec<'a> {
    pub schema: CollectionSchema,
    pub select_sql: &'a str,
    pub batch_size: usize,
    pub mapper: Box<dyn Fn(&PgRow) -> (String, Value) + Send + Sync + 'a>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub collection: String,
    pub schema_recreated: bool,
    pub upserted: usize,
    pub deleted: usize,
}

/// Runs the full reconcile cycle for one collection: recreate the
/// remote schema if it drifted, stream every row of `spec.select_sql`
/// into upsert batches, then delete whatever the index still holds
/// that the database no longer produced.
pub async fn sync_collection(
    pool: &PgPool,
    search: &SearchClient,
    spec: CollectionSpec<'_>,
) -> Result<SyncReport, SearchError> {
    let collection = spec.schema.name.clone();
    let schema_recreated = reconcile_schema(search, &spec.schema).await?;

    let (upserted, db_ids) = sync_data(pool, search, &collection, &spec).await?;
    let deleted = delete_stale(search, &collection, &db_ids).await?;

    Ok(SyncReport {
        collection,
        schema_recreated,
        upserted,
        deleted,
    })
}

async fn reconcile_schema(search: &SearchClient, schema: &CollectionSchema) -> Result<bool, SearchError> {
    match search.get_collection_schema(&schema.name).await? {
        Some(remote) if schema.matches(&remote) => {
            tracing::info!(collection = %schema.name, "search schema up to date");
            Ok(false)
        }
        Some(_) => {
            tracing::info!(collection = %schema.name, "search schema drifted, recreating collection");
            search.delete_collection(&schema.name).await?;
            search.create_collection(schema).await?;
            Ok(true)
        }
        None => {
            tracing::info!(collection = %schema.name, "search collection missing, creating");
            search.create_collection(schema).await?;
            Ok(true)
        }
    }
}

async fn sync_data(
    pool: &PgPool,
    search: &SearchClient,
    collection: &str,
    spec: &CollectionSpec<'_>,
) -> Result<(usize, HashSet<String>), SearchError> {
    let mut rows = sqlx::query(spec.select_sql).fetch(pool);

    let mut db_ids = HashSet::new();
    let mut documents = Vec::with_capacity(spec.batch_size);
    let mut upserted = 0usize;

    loop {
        let next = rows.try_next().await?;
        match next {
            Some(row) => {
                let (id, document) = (spec.mapper)(&row);
                db_ids.insert(id);
                documents.push(document);
                if documents.len() >= spec.batch_size {
                    upserted += flush(search, collection, &mut documents).await?;
                }
            }
            None => break,
        }
    }
    upserted += flush(search, collection, &mut documents).await?;

    tracing::info!(collection, upserted, "finished upserting documents");
    Ok((upserted, db_ids))
}

async fn flush(search: &SearchClient, collection: &str, documents: &mut Vec<Value>) -> Result<usize, SearchError> {
    if documents.is_empty() {
        return Ok(0);
    }
    search.import_documents(collection, documents).await?;
    let count = documents.len();
    documents.clear();
    Ok(count)
}

async fn delete_stale(
    search: &SearchClient,
    collection: &str,
    db_ids: &HashSet<String>,
) -> Result<usize, SearchError> {
    let remote_ids = match search.export_ids(collection).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(collection, error = %err, "could not export search ids, skipping deletion");
            return Ok(0);
        }
    };

    let stale: Vec<String> = remote_ids
        .into_iter()
        .filter(|id| !db_ids.contains(id))
        .collect();

    if stale.is_empty() {
        tracing::info!(collection, "no stale documents to delete");
        return Ok(0);
    }

    tracing::info!(collection, count = stale.len(), "deleting stale documents");
    for chunk in stale.chunks(10_000) {
        search.delete_by_ids(collection, chunk).await?;
    }
    Ok(stale.len())
}
