//! # TrackRelay Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - PostgreSQL store access with transient-error retries
//! - The partner API client and its bearer token cache
//! - Configuration loading and logging initialization
//! - The polling worker that drives sync cycles
//!
//! ## Architecture
//! - Implements traits defined in `trackrelay-core`
//! - Depends on `trackrelay-common`, `trackrelay-domain` and `trackrelay-core`
//! - Contains all "impure" code (I/O, network, database)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod partner;
pub mod sync;

// Re-export commonly used items
pub use database::{PostgresLocationStore, StoreError, StoreExecutor, StorePool, StoreRetry};
pub use errors::InfraError;
pub use http::{HttpClient, HttpError};
pub use observability::{init_logging, LoggingGuard};
pub use partner::{CachedToken, PartnerAuthenticator, PartnerClient, PartnerError, TokenCache};
pub use sync::{RelayWorker, RelayWorkerConfig};
