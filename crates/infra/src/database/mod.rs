//! Database implementations
//!
//! PostgreSQL access through a `deadpool-postgres` pool. Every statement runs
//! under [`StoreRetry`], which retries connection-level failures with a fixed
//! delay and surfaces everything else immediately.

pub mod errors;
pub mod executor;
pub mod location_repository;
pub mod pool;
pub mod values;

pub use errors::StoreError;
pub use executor::{StoreExecutor, StoreRetry, TransientStoreErrors};
pub use location_repository::PostgresLocationStore;
pub use pool::StorePool;
