//! Conversions from external infrastructure errors into domain errors.

use trackrelay_domain::RelayError;

use crate::database::StoreError;
use crate::http::HttpError;
use crate::partner::PartnerError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RelayError);

impl From<InfraError> for RelayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RelayError> for InfraError {
    fn from(value: RelayError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRelayError {
    fn into_relay(self) -> RelayError;
}

/* -------------------------------------------------------------------------- */
/* StoreError → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for StoreError {
    fn into_relay(self) -> RelayError {
        match self {
            StoreError::Build(message) => RelayError::Config(format!("database pool: {message}")),
            other => RelayError::Database(other.to_string()),
        }
    }
}

impl From<StoreError> for InfraError {
    fn from(value: StoreError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* HttpError → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for HttpError {
    fn into_relay(self) -> RelayError {
        if self.is_timeout() {
            return RelayError::Timeout(self.to_string());
        }
        match self {
            HttpError::Transport(err) if err.is_connect() => {
                RelayError::Network(format!("HTTP connection failure: {err}"))
            }
            HttpError::Transport(err) if err.is_builder() => {
                RelayError::Config(format!("invalid HTTP request: {err}"))
            }
            other => RelayError::Network(other.to_string()),
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* PartnerError → RelayError */
/* -------------------------------------------------------------------------- */

impl From<PartnerError> for InfraError {
    fn from(value: PartnerError) -> Self {
        InfraError(value.into())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
