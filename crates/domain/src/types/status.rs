//! Delivery lifecycle

use serde::{Deserialize, Serialize};

use crate::constants::{STATUS_CODE_FAILED, STATUS_CODE_SENT};
use crate::errors::{truncate_detail, RelayError};
use crate::impl_domain_status_conversions;

/// Delivery status of a location record.
///
/// Persisted as a nullable numeric code: `NULL` for never attempted, `1` for
/// sent and `6` for failed. `Pending` and `Failed` records are both eligible
/// for (re)delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl_domain_status_conversions!(DeliveryStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});

impl DeliveryStatus {
    /// Column value for this status.
    pub fn code(self) -> Option<i16> {
        match self {
            Self::Pending => None,
            Self::Sent => Some(STATUS_CODE_SENT),
            Self::Failed => Some(STATUS_CODE_FAILED),
        }
    }

    /// Decode a column value. Unknown codes yield `None`.
    pub fn from_code(code: Option<i16>) -> Option<Self> {
        match code {
            None => Some(Self::Pending),
            Some(STATUS_CODE_SENT) => Some(Self::Sent),
            Some(STATUS_CODE_FAILED) => Some(Self::Failed),
            Some(_) => None,
        }
    }

    /// Whether a record in this status is selected for delivery.
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// Result of one delivery attempt, as written back to the store.
///
/// Only [`DeliveryOutcome::sent`] and [`DeliveryOutcome::failed`] build one, so
/// the status is never [`DeliveryStatus::Pending`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    status: DeliveryStatus,
    detail: String,
}

impl DeliveryOutcome {
    /// Successful delivery carrying the serialized partner response.
    pub fn sent(response_body: impl Into<String>) -> Self {
        Self { status: DeliveryStatus::Sent, detail: truncate_detail(response_body.into()) }
    }

    /// Failed delivery carrying the rendered error.
    pub fn failed(error: &RelayError) -> Self {
        Self { status: DeliveryStatus::Failed, detail: error.failure_detail() }
    }

    /// Status written back: sent or failed.
    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Partner response body or rendered error, already truncated.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Numeric column value of the outcome status.
    pub fn status_code(&self) -> i16 {
        match self.status {
            DeliveryStatus::Sent => STATUS_CODE_SENT,
            DeliveryStatus::Failed | DeliveryStatus::Pending => STATUS_CODE_FAILED,
        }
    }
}
