//! Credential exchange against the partner auth endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use trackrelay_domain::constants::{AUTH_ENDPOINT, TOKEN_FIELD_CANDIDATES};
use trackrelay_domain::PartnerConfig;
use url::Url;

use super::errors::PartnerError;
use crate::http::HttpClient;

/// Token returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime announced by the partner, in seconds
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of fresh bearer tokens
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Exchange the configured credentials for a token.
    async fn exchange(&self) -> Result<IssuedToken, PartnerError>;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    id_cliente_externo: i64,
    nombre_usuario: &'a str,
    password_usuario: &'a str,
}

/// Exchanges client id, username and password at `POST {base}/api/auth`.
pub struct PartnerAuthenticator {
    http: HttpClient,
    auth_url: Url,
    client_id: i64,
    username: String,
    password: String,
    timeout: Duration,
}

impl PartnerAuthenticator {
    /// # Errors
    /// Returns [`PartnerError::Config`] when the base URL is invalid.
    pub fn new(http: HttpClient, config: &PartnerConfig) -> Result<Self, PartnerError> {
        Ok(Self {
            http,
            auth_url: endpoint_url(&config.base_url, AUTH_ENDPOINT)?,
            client_id: config.client_id,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.auth_timeout(),
        })
    }
}

#[async_trait]
impl CredentialExchange for PartnerAuthenticator {
    async fn exchange(&self) -> Result<IssuedToken, PartnerError> {
        let body = AuthRequest {
            id_cliente_externo: self.client_id,
            nombre_usuario: &self.username,
            password_usuario: &self.password,
        };
        let request = self
            .http
            .request(Method::POST, self.auth_url.clone())
            .timeout(self.timeout)
            .json(&body);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| PartnerError::Auth(format!("authentication request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                PartnerError::Auth(format!("failed to read authentication response: {e}"))
            })?;

        if !status.is_success() {
            return Err(PartnerError::Auth(format!(
                "authentication rejected with HTTP {}: {text}",
                status.as_u16()
            )));
        }

        let issued = parse_token_response(&text)?;
        debug!(expires_in = ?issued.expires_in, "Partner issued a token");
        Ok(issued)
    }
}

/// Extract the token from an auth response body.
///
/// The first non-empty string among the known token fields wins; `expires_in`
/// is accepted as a number or a numeric string.
pub(crate) fn parse_token_response(body: &str) -> Result<IssuedToken, PartnerError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PartnerError::Auth(format!("authentication response is not JSON: {e}")))?;

    let token = TOKEN_FIELD_CANDIDATES
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .find(|token| !token.is_empty())
        .ok_or_else(|| PartnerError::Auth("no token in authentication response".into()))?;

    let expires_in = value.get("expires_in").and_then(|raw| match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    Ok(IssuedToken { token: token.to_string(), expires_in })
}

/// Join an endpoint path onto the configured base URL, keeping any base path.
pub(crate) fn endpoint_url(base: &str, path: &str) -> Result<Url, PartnerError> {
    let joined = format!("{}{path}", base.trim().trim_end_matches('/'));
    Url::parse(&joined)
        .map_err(|e| PartnerError::Config(format!("invalid partner URL {joined}: {e}")))
}
