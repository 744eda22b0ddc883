//! Store errors and transient-failure classification

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Errors raised by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to decode column '{column}': {message}")]
    Decode { column: &'static str, message: String },

    #[error("failed to build connection pool: {0}")]
    Build(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Classification of errors that may succeed when retried
pub trait Transient {
    /// True when the failure is a lost, refused or unresponsive connection.
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Postgres(err) | Self::Pool(PoolError::Backend(err)) => is_transient_postgres(err),
            Self::Timeout(_) | Self::Pool(PoolError::Timeout(_)) => true,
            Self::Pool(_) | Self::Decode { .. } | Self::Build(_) => false,
        }
    }
}

/// Server-reported states that mean the connection itself is gone.
const TRANSIENT_SQLSTATES: &[SqlState] = &[
    SqlState::CONNECTION_EXCEPTION,
    SqlState::CONNECTION_FAILURE,
    SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION,
    SqlState::ADMIN_SHUTDOWN,
];

fn is_transient_postgres(err: &tokio_postgres::Error) -> bool {
    if err.is_closed() {
        return true;
    }
    if let Some(code) = err.code() {
        return TRANSIENT_SQLSTATES.contains(code);
    }
    is_transient_chain(err)
}

/// Walk the source chain looking for a connection-level I/O failure.
pub(crate) fn is_transient_chain(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return is_transient_io_kind(io_err.kind());
        }
        current = e.source();
    }
    false
}

/// I/O error kinds meaning the connection was refused or lost.
pub fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("wrapped: {source}")]
    struct Wrapper {
        source: io::Error,
    }

    #[test]
    fn connection_kinds_are_transient() {
        assert!(is_transient_io_kind(io::ErrorKind::ConnectionRefused));
        assert!(is_transient_io_kind(io::ErrorKind::ConnectionReset));
        assert!(is_transient_io_kind(io::ErrorKind::UnexpectedEof));
        assert!(!is_transient_io_kind(io::ErrorKind::PermissionDenied));
        assert!(!is_transient_io_kind(io::ErrorKind::InvalidData));
    }

    #[test]
    fn chain_walk_finds_nested_io_error() {
        let err = Wrapper { source: io::Error::from(io::ErrorKind::ConnectionRefused) };
        assert!(is_transient_chain(&err));

        let fatal = Wrapper { source: io::Error::from(io::ErrorKind::PermissionDenied) };
        assert!(!is_transient_chain(&fatal));
    }

    #[test]
    fn decode_and_build_errors_are_fatal() {
        let decode = StoreError::Decode { column: "latitude", message: "bad".into() };
        assert!(!decode.is_transient());
        assert!(!StoreError::Build("no host".into()).is_transient());
        assert!(!StoreError::Pool(PoolError::Closed).is_transient());
    }

    #[test]
    fn timeouts_are_transient() {
        assert!(StoreError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(StoreError::Pool(PoolError::Timeout(deadpool_postgres::TimeoutType::Create))
            .is_transient());
        assert!(StoreError::Pool(PoolError::Timeout(deadpool_postgres::TimeoutType::Wait))
            .is_transient());
    }

    #[test]
    fn transient_sqlstates_cover_connection_loss() {
        assert!(TRANSIENT_SQLSTATES.contains(&SqlState::ADMIN_SHUTDOWN));
        assert!(!TRANSIENT_SQLSTATES.contains(&SqlState::UNIQUE_VIOLATION));
    }
}
