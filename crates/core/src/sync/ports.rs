//! Port interfaces for sync operations

use async_trait::async_trait;
use trackrelay_domain::{DeliveryOutcome, DispatchPayload, PendingRecord, Result};

/// Source of pending location records and sink for delivery outcomes
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Fetch up to `limit` eligible records, oldest fix first
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<PendingRecord>>;

    /// Persist the outcome of one delivery attempt
    async fn mark_delivery(&self, location_id: i64, outcome: &DeliveryOutcome) -> Result<()>;
}

/// Partner API delivery
#[async_trait]
pub trait PayloadDispatcher: Send + Sync {
    /// Deliver one payload and return the serialized partner response
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<String>;
}
