//! Partner-specific error types

use thiserror::Error;
use trackrelay_domain::RelayError;

use crate::http::HttpError;

/// Partner operation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PartnerError {
    #[error("{0}")]
    Auth(String),

    #[error("partner responded with HTTP {status}")]
    Rejected { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Config(String),
}

impl PartnerError {
    /// True when the partner rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401, .. })
    }
}

impl From<HttpError> for PartnerError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<PartnerError> for RelayError {
    fn from(err: PartnerError) -> Self {
        match err {
            PartnerError::Auth(msg) => Self::Auth(msg),
            PartnerError::Rejected { status, body } => Self::Delivery { status, body },
            PartnerError::Timeout(msg) => Self::Timeout(msg),
            PartnerError::Network(msg) => Self::Network(msg),
            PartnerError::Config(msg) => Self::Config(msg),
        }
    }
}
