//! Retry-wrapped statement execution

use std::fmt;
use std::future::Future;
use std::time::Duration;

use deadpool_postgres::Pool;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{instrument, warn};
use trackrelay_common::{RetryConfig, RetryDecision, RetryExecutor, RetryPolicy};

use super::errors::{StoreError, Transient};

/// Retry policy that only retries connection-level failures
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientStoreErrors;

impl<E: Transient> RetryPolicy<E> for TransientStoreErrors {
    fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Fixed-delay retry budget applied to each store call independently
#[derive(Debug, Clone)]
pub struct StoreRetry {
    executor: RetryExecutor<TransientStoreErrors>,
}

impl StoreRetry {
    /// Retry transient failures up to `max_retries` times, `delay` apart.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            executor: RetryExecutor::new(
                RetryConfig::fixed(max_retries, delay),
                TransientStoreErrors,
            ),
        }
    }

    /// Run `operation` with a fresh retry budget.
    ///
    /// # Errors
    /// Returns the last error once it is non-transient or the budget is spent.
    pub async fn run<F, Fut, T, E>(&self, operation: &'static str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        self.executor.execute(op).await.map_err(|err| {
            let attempts = err.attempts();
            let source = err.into_source();
            if attempts > 1 {
                warn!(operation, attempts, error = %source, "Store call failed after retries");
            }
            source
        })
    }
}

/// Bound one attempt (checkout plus statement) by `limit`.
async fn bounded<T, Fut>(limit: Duration, attempt: Fut) -> Result<T, StoreError>
where
    Fut: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, attempt).await.unwrap_or_else(|_| Err(StoreError::Timeout(limit)))
}

/// Pooled statement executor with per-call retries
#[derive(Clone)]
pub struct StoreExecutor {
    pool: Pool,
    retry: StoreRetry,
    statement_timeout: Duration,
}

impl StoreExecutor {
    /// Each attempt of a call, checkout included, must finish within
    /// `statement_timeout`; an elapsed attempt counts as transient.
    pub fn new(pool: Pool, retry: StoreRetry, statement_timeout: Duration) -> Self {
        Self { pool, retry, statement_timeout }
    }

    /// Run a row-returning statement.
    ///
    /// # Errors
    /// Returns [`StoreError`] once retries are exhausted or on a fatal error.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn query(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        let (pool, limit) = (&self.pool, self.statement_timeout);
        self.retry
            .run("query", move || {
                bounded(limit, async move {
                    let client = pool.get().await?;
                    Ok(client.query(statement, params).await?)
                })
            })
            .await
    }

    /// Run a statement and return the number of affected rows.
    ///
    /// # Errors
    /// Returns [`StoreError`] once retries are exhausted or on a fatal error.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, StoreError> {
        let (pool, limit) = (&self.pool, self.statement_timeout);
        self.retry
            .run("execute", move || {
                bounded(limit, async move {
                    let client = pool.get().await?;
                    Ok(client.execute(statement, params).await?)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use tokio::time::Instant;
    use trackrelay_domain::{DatabaseConfig, ZoneSetting};

    use super::*;
    use crate::database::pool::StorePool;

    #[derive(Debug, Clone, PartialEq)]
    enum FakeStoreError {
        ConnectionRefused,
        SyntaxError,
    }

    impl fmt::Display for FakeStoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::ConnectionRefused => write!(f, "connection refused"),
                Self::SyntaxError => write!(f, "syntax error at or near \"SELEC\""),
            }
        }
    }

    impl Transient for FakeStoreError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::ConnectionRefused)
        }
    }

    fn failing_then_ok(
        calls: &Arc<AtomicU32>,
        failures: u32,
        error: FakeStoreError,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str, FakeStoreError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures { Err(error.clone()) } else { Ok("rows") })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refused_twice_then_succeeds_after_two_delays() {
        let retry = StoreRetry::new(5, Duration::from_millis(5000));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = retry
            .run("query", failing_then_ok(&calls, 2, FakeStoreError::ConnectionRefused))
            .await;

        assert_eq!(result, Ok("rows"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_returns_last_error() {
        let retry = StoreRetry::new(3, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = retry
            .run("execute", failing_then_ok(&calls, 10, FakeStoreError::ConnectionRefused))
            .await;

        assert_eq!(result, Err(FakeStoreError::ConnectionRefused));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_errors_fail_immediately() {
        let retry = StoreRetry::new(5, Duration::from_millis(5000));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result =
            retry.run("query", failing_then_ok(&calls, 1, FakeStoreError::SyntaxError)).await;

        assert_eq!(result, Err(FakeStoreError::SyntaxError));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn each_call_gets_a_fresh_budget() {
        let retry = StoreRetry::new(1, Duration::from_millis(10));
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let a = retry.run("query", failing_then_ok(&first, 1, FakeStoreError::ConnectionRefused));
        assert_eq!(a.await, Ok("rows"));

        let b = retry.run("query", failing_then_ok(&second, 1, FakeStoreError::ConnectionRefused));
        assert_eq!(b.await, Ok("rows"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_attempt_becomes_a_transient_timeout() {
        let started = Instant::now();

        let result: Result<(), StoreError> =
            bounded(Duration::from_millis(250), std::future::pending()).await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == Duration::from_millis(250)));
        assert!(err.is_transient());
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn unresponsive_server_is_abandoned_after_each_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let config = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port,
            name: "tracking".to_string(),
            user: "relay".to_string(),
            password: "secret".to_string(),
            pool_size: 2,
            timezone: ZoneSetting::UTC,
            connect_timeout_ms: 10_000,
            statement_timeout_ms: 200,
        };
        let pool = StorePool::new(&config).expect("pool");
        let executor = StoreExecutor::new(
            pool.inner().clone(),
            StoreRetry::new(1, Duration::from_millis(10)),
            config.statement_timeout(),
        );

        let err = tokio::time::timeout(Duration::from_secs(5), executor.query("SELECT 1", &[]))
            .await
            .expect("query must give up on its own")
            .unwrap_err();

        assert!(matches!(err, StoreError::Timeout(_)), "got {err:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
