//! Shared HTTP plumbing for talking to the upstream metadata API: a
//! rotating credential pool and a concurrency/rate limited client built
//! on top of it.

pub mod client;
pub mod credentials;

pub use client::{HttpError, RateLimitedClient};
pub use credentials::CredentialPool;
