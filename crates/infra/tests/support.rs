//! Shared fixtures for infra integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex as TokioMutex;
use trackrelay_common::{Clock, SystemClock};
use trackrelay_core::LocationStore;
use trackrelay_domain::{
    DeliveryOutcome, PartnerConfig, PendingRecord, RawScalar, RelayError, Result as DomainResult,
};
use trackrelay_infra::partner::{PartnerAuthenticator, PartnerClient, TokenCache};
use trackrelay_infra::HttpClient;

/// Store double that applies the same eligibility and ordering rules as the
/// PostgreSQL query.
#[derive(Default)]
pub struct InMemoryLocationStore {
    records: TokioMutex<Vec<PendingRecord>>,
    details: TokioMutex<HashMap<i64, String>>,
}

impl InMemoryLocationStore {
    pub fn with_records(records: Vec<PendingRecord>) -> Self {
        Self { records: TokioMutex::new(records), ..Self::default() }
    }

    pub async fn record(&self, location_id: i64) -> Option<PendingRecord> {
        self.records.lock().await.iter().find(|r| r.location_id == location_id).cloned()
    }

    pub async fn detail(&self, location_id: i64) -> Option<String> {
        self.details.lock().await.get(&location_id).cloned()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn fetch_pending(&self, limit: u32) -> DomainResult<Vec<PendingRecord>> {
        let mut eligible: Vec<_> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.delivery_status.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by_key(|r| r.fix_time);
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn mark_delivery(&self, location_id: i64, outcome: &DeliveryOutcome) -> DomainResult<()> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.location_id == location_id)
            .ok_or_else(|| RelayError::Database(format!("location {location_id} not found")))?;
        record.delivery_status = outcome.status();
        self.details.lock().await.insert(location_id, outcome.detail().to_string());
        Ok(())
    }
}

pub fn partner_config(base_url: &str) -> PartnerConfig {
    PartnerConfig {
        base_url: base_url.to_string(),
        client_id: 77,
        username: "relay".to_string(),
        password: "s3cret".to_string(),
        auth_timeout_ms: 2000,
        delivery_timeout_ms: 2000,
        token_lifetime_secs: 3600,
        token_margin_secs: 30,
    }
}

/// Partner client wired against `base_url`, plus its token cache.
pub fn partner_client(base_url: &str, clock: Arc<dyn Clock>) -> (PartnerClient, Arc<TokenCache>) {
    let config = partner_config(base_url);
    let http = HttpClient::builder().base_backoff(Duration::from_millis(5)).build().unwrap();
    let auth = PartnerAuthenticator::new(http.clone(), &config).unwrap();
    let tokens = Arc::new(TokenCache::new(
        Arc::new(auth),
        clock,
        config.token_lifetime(),
        config.token_margin(),
    ));
    let client = PartnerClient::new(http, &config, Arc::clone(&tokens)).unwrap();
    (client, tokens)
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

pub fn fix(location_id: i64, plate: &str, minute: u32) -> PendingRecord {
    PendingRecord {
        location_id,
        device_id: Some(RawScalar::Int(860_000 + location_id)),
        plate: Some(plate.to_string()),
        fix_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()),
        latitude: Some(RawScalar::from("-33.4489")),
        longitude: Some(RawScalar::Float(-70.6693)),
        speed_kmh: Some(RawScalar::Int(42)),
        ..PendingRecord::default()
    }
}
