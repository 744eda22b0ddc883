//! Background synchronization
//!
//! The relay worker owns the polling loop; each tick runs one
//! `SyncService` cycle.

pub mod relay_worker;

pub use relay_worker::{run, RelayWorker, RelayWorkerConfig};
