//! Domain types and models
//!
//! - [`record`]: location fixes as read from the store
//! - [`payload`]: the partner's wire schema
//! - [`status`]: delivery lifecycle and outcomes

pub mod payload;
pub mod record;
pub mod status;

pub use payload::{DispatchPayload, EventPayload, Numeric};
pub use record::{PendingRecord, RawScalar, TelemetryExtras};
pub use status::{DeliveryOutcome, DeliveryStatus};
