//! Process-wide bearer token cache
//!
//! Holds at most one token. Readers clone the current `Arc` under a read
//! lock; refreshes are serialized by a separate mutex so concurrent callers
//! that find the token missing or expired trigger a single exchange.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use trackrelay_common::Clock;

use super::auth::CredentialExchange;
use super::errors::PartnerError;

/// Token string plus the instant it stops being used.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Token `value`, usable until `expires_at` (margin already applied).
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { value: value.into(), expires_at }
    }

    /// Bearer token sent in the `Authorization` header.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// First instant at which the token is no longer used.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True strictly before [`CachedToken::expires_at`].
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shared token cache in front of a [`CredentialExchange`].
pub struct TokenCache {
    exchange: Arc<dyn CredentialExchange>,
    clock: Arc<dyn Clock>,
    nominal_lifetime: Duration,
    margin: Duration,
    current: RwLock<Option<Arc<CachedToken>>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    /// `nominal_lifetime` applies when the partner announces no lifetime;
    /// `margin` is subtracted from every lifetime.
    pub fn new(
        exchange: Arc<dyn CredentialExchange>,
        clock: Arc<dyn Clock>,
        nominal_lifetime: Duration,
        margin: Duration,
    ) -> Self {
        Self {
            exchange,
            clock,
            nominal_lifetime,
            margin,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Return a valid token, exchanging credentials when none is cached, the
    /// cached one has expired, or `force_refresh` is set.
    ///
    /// # Errors
    /// Returns [`PartnerError::Auth`] when the exchange fails. The cache is
    /// left as it was.
    #[instrument(level = "debug", skip(self))]
    pub async fn ensure_token(
        &self,
        force_refresh: bool,
    ) -> Result<Arc<CachedToken>, PartnerError> {
        let snapshot = self.current.read().await.clone();
        if !force_refresh {
            if let Some(token) = snapshot.as_ref().filter(|t| t.is_valid_at(self.clock.now_utc())) {
                return Ok(Arc::clone(token));
            }
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while this one waited.
        if let Some(token) = self.current.read().await.as_ref() {
            let replaced = !snapshot.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, token));
            if (replaced || !force_refresh) && token.is_valid_at(self.clock.now_utc()) {
                return Ok(Arc::clone(token));
            }
        }

        let issued = self.exchange.exchange().await?;
        let now = self.clock.now_utc();
        let lifetime = issued
            .expires_in
            .filter(|secs| *secs > 0)
            .map_or(self.nominal_lifetime, Duration::from_secs);

        let expires_at = match lifetime.checked_sub(self.margin).filter(|d| !d.is_zero()) {
            Some(valid_for) => chrono::Duration::from_std(valid_for)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => {
                warn!(
                    lifetime_secs = lifetime.as_secs(),
                    margin_secs = self.margin.as_secs(),
                    "Token lifetime does not exceed the safety margin; token expires immediately"
                );
                now
            }
        };

        let token = Arc::new(CachedToken::new(issued.token, expires_at));
        *self.current.write().await = Some(Arc::clone(&token));
        info!(expires_at = %expires_at, "Partner token refreshed");
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        if self.current.write().await.take().is_some() {
            info!("Partner token invalidated");
        }
    }

    /// Currently cached token, valid or not.
    pub async fn current(&self) -> Option<Arc<CachedToken>> {
        self.current.read().await.clone()
    }
}
