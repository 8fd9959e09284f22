//! Pure mapping functions from upstream JSON payloads to staged rows,
//! one module per entity kind. Every function is a total function of
//! its inputs plus the currently-loaded reference sets: no I/O, no
//! upstream calls, nothing that can't be unit tested in isolation.

pub mod collection;
pub mod company;
pub mod country;
pub mod genre;
pub mod keyword;
pub mod language;
pub mod movie;
pub mod network;
pub mod nullify;
pub mod person;
pub mod staged;
pub mod tv_series;

pub use staged::StagedTable;
