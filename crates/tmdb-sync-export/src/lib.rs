//! Two ways of discovering upstream ids without walking every detail
//! endpoint: the daily gzipped id/popularity export dump (C3) and the
//! paginated "what changed in this date window" endpoint (C4).

pub mod changes;
pub mod export;

pub use changes::{fetch_changed_ids, ChangesError};
pub use export::{fetch_export, ExportError, ExportRow};
