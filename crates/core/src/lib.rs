//! # TrackRelay Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the store and the partner API
//! - The record mapper (pending record to partner payload)
//! - The per-cycle synchronization service
//!
//! ## Architecture Principles
//! - Only depends on `trackrelay-common` and `trackrelay-domain`
//! - No database or HTTP code
//! - All external dependencies via traits

pub mod mapping;
pub mod sync;

pub use mapping::{map_to_payload, MappingContext, RecordMapper};
pub use sync::ports::{LocationStore, PayloadDispatcher};
pub use sync::{CycleReport, SyncService};
