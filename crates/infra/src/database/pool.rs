//! PostgreSQL connection pool

use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use tokio_postgres::NoTls;
use tracing::{debug, info};
use trackrelay_domain::DatabaseConfig;

use super::errors::StoreError;

/// Bounded connection pool.
///
/// Callers wait for a free connection when the pool is exhausted, up to the
/// statement timeout. Opening a connection is bounded by the connect timeout,
/// and the server cancels statements that outlive the statement timeout.
#[derive(Clone)]
pub struct StorePool {
    pool: Pool,
}

impl StorePool {
    /// Build the pool. No connection is opened until first use.
    ///
    /// # Errors
    /// Returns [`StoreError::Build`] when the configuration is rejected.
    pub fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.name.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.connect_timeout = Some(config.connect_timeout());
        cfg.options = Some(format!("-c statement_timeout={}", config.statement_timeout_ms));
        cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
        cfg.pool = Some(PoolConfig {
            timeouts: Timeouts {
                wait: Some(config.statement_timeout()),
                create: Some(config.connect_timeout()),
                recycle: Some(config.connect_timeout()),
            },
            ..PoolConfig::new(config.pool_size)
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Build(e.to_string()))?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            pool_size = config.pool_size,
            connect_timeout_ms = config.connect_timeout_ms,
            statement_timeout_ms = config.statement_timeout_ms,
            "PostgreSQL pool created"
        );
        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    ///
    /// # Errors
    /// Returns the pool or driver error when no connection can be used.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("PostgreSQL connection successful");
        Ok(())
    }

    /// Close the pool; pending and future `get` calls fail.
    pub fn close(&self) {
        self.pool.close();
        info!("PostgreSQL pool closed");
    }

    /// Underlying pool handle.
    pub fn inner(&self) -> &Pool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use deadpool_postgres::PoolError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use trackrelay_domain::ZoneSetting;

    use super::*;
    use crate::database::errors::Transient;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "tracking".to_string(),
            user: "relay".to_string(),
            password: "secret".to_string(),
            pool_size: 3,
            timezone: ZoneSetting::UTC,
            connect_timeout_ms: 5_000,
            statement_timeout_ms: 30_000,
        }
    }

    fn local_config(port: u16, connect_timeout_ms: u64) -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_ms,
            statement_timeout_ms: connect_timeout_ms,
            ..config()
        }
    }

    /// `ErrorResponse` for a rejected password (SQLSTATE 28P01).
    fn auth_failure_message() -> Vec<u8> {
        let mut fields = Vec::new();
        let parts = [(b'S', "FATAL"), (b'C', "28P01"), (b'M', "password authentication failed")];
        for (tag, value) in parts {
            fields.push(tag);
            fields.extend_from_slice(value.as_bytes());
            fields.push(0);
        }
        fields.push(0);

        let mut message = vec![b'E'];
        message.extend_from_slice(&u32::try_from(fields.len() + 4).unwrap().to_be_bytes());
        message.extend_from_slice(&fields);
        message
    }

    #[tokio::test]
    async fn pool_is_built_lazily_with_configured_size_and_timeouts() {
        let pool = StorePool::new(&config()).expect("pool");

        let status = pool.inner().status();
        assert_eq!(status.max_size, 3);
        assert_eq!(status.size, 0);

        let timeouts = pool.inner().timeouts();
        assert_eq!(timeouts.wait, Some(Duration::from_secs(30)));
        assert_eq!(timeouts.create, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn closed_pool_rejects_checkouts() {
        let pool = StorePool::new(&config()).expect("pool");
        pool.close();

        let err = pool.ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Pool(PoolError::Closed)));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let pool = StorePool::new(&local_config(port, 2_000)).expect("pool");
        let err = pool.ping().await.unwrap_err();

        assert!(matches!(err, StoreError::Pool(PoolError::Backend(_))), "got {err:?}");
        assert!(err.is_transient(), "refused connection should be retried: {err}");
    }

    #[tokio::test]
    async fn silent_server_times_out_as_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let pool = StorePool::new(&local_config(port, 200)).expect("pool");
        let err = tokio::time::timeout(Duration::from_secs(5), pool.ping())
            .await
            .expect("ping must give up on its own")
            .unwrap_err();

        assert!(matches!(err, StoreError::Pool(PoolError::Timeout(_))), "got {err:?}");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn rejected_login_is_not_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut startup = [0_u8; 1024];
                let _ = socket.read(&mut startup).await;
                let _ = socket.write_all(&auth_failure_message()).await;
            }
        });

        let pool = StorePool::new(&local_config(port, 2_000)).expect("pool");
        let err = pool.ping().await.unwrap_err();

        match &err {
            StoreError::Pool(PoolError::Backend(inner)) => {
                assert_eq!(inner.code(), Some(&tokio_postgres::error::SqlState::INVALID_PASSWORD));
            }
            other => panic!("expected a backend error, got {other:?}"),
        }
        assert!(!err.is_transient());
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
