//! Worker context - dependency wiring

use std::sync::Arc;

use anyhow::Context as _;
use trackrelay_common::{Clock, SystemClock};
use trackrelay_core::{MappingContext, RecordMapper, SyncService};
use trackrelay_domain::Config;
use trackrelay_infra::partner::{PartnerAuthenticator, PartnerClient, TokenCache};
use trackrelay_infra::{HttpClient, PostgresLocationStore, StoreExecutor, StorePool, StoreRetry};

const USER_AGENT: &str = concat!("trackrelay/", env!("CARGO_PKG_VERSION"));

/// Everything the polling loop needs, built once at startup.
pub struct WorkerContext {
    pub config: Config,
    pub pool: StorePool,
    pub service: Arc<SyncService>,
}

impl WorkerContext {
    /// Build the pool, partner client and sync service from `config`.
    ///
    /// No connection is opened here.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let pool = StorePool::new(&config.database).context("building PostgreSQL pool")?;
        let retry = StoreRetry::new(config.sync.max_db_retries, config.sync.db_retry_delay());
        let store = PostgresLocationStore::new(
            StoreExecutor::new(pool.inner().clone(), retry, config.database.statement_timeout()),
            config.database.timezone,
        );

        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building HTTP client")?;
        let authenticator = PartnerAuthenticator::new(http.clone(), &config.partner)
            .context("configuring partner authentication")?;
        let tokens = Arc::new(TokenCache::new(
            Arc::new(authenticator),
            Arc::clone(&clock),
            config.partner.token_lifetime(),
            config.partner.token_margin(),
        ));
        let partner = PartnerClient::new(http, &config.partner, tokens)
            .context("configuring partner client")?;

        let mapper = RecordMapper::new(MappingContext {
            client_id: config.partner.client_id,
            timezone: config.sync.report_timezone,
        });
        let service = SyncService::new(Arc::new(store), Arc::new(partner), mapper)
            .with_clock(clock)
            .with_page_size(config.sync.page_size);

        Ok(Self { config, pool, service: Arc::new(service) })
    }
}
