//! Delivery client for the partner insert endpoint

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use trackrelay_core::PayloadDispatcher;
use trackrelay_domain::constants::DELIVERY_ENDPOINT;
use trackrelay_domain::{DispatchPayload, PartnerConfig, RelayError, Result as DomainResult};
use url::Url;

use super::auth::endpoint_url;
use super::errors::PartnerError;
use super::token_cache::TokenCache;
use crate::errors::InfraError;
use crate::http::{HttpClient, HttpError};

/// Posts payloads with the cached bearer token.
///
/// A 401 drops the cached token so the next delivery re-authenticates; the
/// rejected payload itself is not resent.
pub struct PartnerClient {
    http: HttpClient,
    delivery_url: Url,
    tokens: Arc<TokenCache>,
    timeout: Duration,
}

impl PartnerClient {
    /// # Errors
    /// Returns [`PartnerError::Config`] when the base URL is invalid.
    pub fn new(
        http: HttpClient,
        config: &PartnerConfig,
        tokens: Arc<TokenCache>,
    ) -> Result<Self, PartnerError> {
        Ok(Self {
            http,
            delivery_url: endpoint_url(&config.base_url, DELIVERY_ENDPOINT)?,
            tokens,
            timeout: config.delivery_timeout(),
        })
    }

    /// Deliver one payload and return the normalized response body.
    ///
    /// # Errors
    /// - [`PartnerError::Auth`] when no token can be obtained
    /// - [`PartnerError::Rejected`] on a non-2xx response
    /// - [`PartnerError::Timeout`] or [`PartnerError::Network`] on transport failure
    pub async fn send(&self, payload: &DispatchPayload) -> Result<String, PartnerError> {
        let token = self.tokens.ensure_token(false).await?;

        let request = self
            .http
            .request(Method::POST, self.delivery_url.clone())
            .bearer_auth(token.value())
            .timeout(self.timeout)
            .json(payload);

        let response = self.http.send(request).await?;
        let status = response.status();
        let body = response.text().await.map_err(HttpError::from)?;

        if status.is_success() {
            debug!(status = status.as_u16(), "Partner accepted payload");
            return Ok(normalize_body(&body));
        }

        let err = PartnerError::Rejected { status: status.as_u16(), body };
        if err.is_unauthorized() {
            warn!("Partner rejected the bearer token; re-authenticating on next delivery");
            self.tokens.invalidate().await;
        }
        Err(err)
    }
}

#[async_trait]
impl PayloadDispatcher for PartnerClient {
    async fn dispatch(&self, payload: &DispatchPayload) -> DomainResult<String> {
        self.send(payload).await.map_err(|err| RelayError::from(InfraError::from(err)))
    }
}

/// Serialized form of a success body: compact JSON when it parses, otherwise
/// the text as a JSON string.
fn normalize_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => Value::String(body.to_string()).to_string(),
    }
}
