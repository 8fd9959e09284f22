//! Entity Sync Driver (C10): orchestrates the diff -> fetch -> map ->
//! stage -> load cycle for one entity kind on one date, driving every
//! other component (C1-C9) in the order spec.md §4.10 lays out.

mod batch;
pub mod context;
pub mod fetch;
pub mod reference;
pub mod sync;

pub use context::{DriverContext, DriverError};
pub use sync::{sync_kind, SyncSummary};

use tmdb_sync_registry::Kind;

/// Runs one kind end to end: the reference-kind wholesale refresh for
/// `language`/`country`/`genre`, or the full diff-driven reconciliation
/// for every other kind.
pub async fn run_kind(
    ctx: &DriverContext,
    kind: Kind,
    date: chrono::NaiveDate,
) -> Result<SyncSummary, DriverError> {
    match kind {
        Kind::Language | Kind::Country | Kind::Genre => {
            reference::sync_reference_kind(ctx, kind, date).await
        }
        _ => sync::sync_kind(ctx, kind, date).await,
    }
}
