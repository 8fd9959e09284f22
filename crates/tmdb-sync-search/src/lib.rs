//! Search Projection (C11): a thin HTTP/JSON client for the search
//! index plus the schema-reconcile / bulk-sync / stale-delete cycle
//! that keeps it in step with the database after every run.

pub mod client;
pub mod schema;
pub mod sync;

pub use client::{SearchClient, SearchError};
pub use schema::{CollectionSchema, FieldSchema};
pub use sync::{sync_collection, CollectionSpec, SyncReport};
