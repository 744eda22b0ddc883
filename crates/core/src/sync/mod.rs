//! Store-to-partner synchronization

pub mod ports;
pub mod service;

pub use ports::{LocationStore, PayloadDispatcher};
pub use service::{CycleReport, SyncService};
