//! Pending record to partner payload transformation

pub mod events;
pub mod mapper;

pub use events::{describe_event, EVENT_CATALOG};
pub use mapper::{map_to_payload, MappingContext, RecordMapper};
