use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use thiserror::Error;
use tracing::debug;
use trackrelay_common::resilience::policies::PredicateRetry;
use trackrelay_common::{RetryConfig, RetryError, RetryExecutor};

/// Transport-level failures surfaced by [`HttpClient`].
#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("request body cannot be cloned; buffer the body to enable retries")]
    UncloneableBody,
}

impl HttpError {
    /// True when the request exceeded its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

type ConnectRetry = PredicateRetry<fn(&HttpError, u32) -> bool>;

/// HTTP client with built-in connect retries and timeout support.
///
/// Only failures to establish a connection are retried: the request never
/// reached the server, so resending it cannot duplicate a delivery. Responses,
/// including 5xx, are returned to the caller as-is.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryExecutor<ConnectRetry>,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with retry semantics.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HttpError> {
        let request = builder.build()?;
        if request.try_clone().is_none() {
            return Err(HttpError::UncloneableBody);
        }

        let client = &self.client;
        let template = &request;
        self.retry
            .execute(move || {
                let attempt = template.try_clone();
                async move {
                    let request = attempt.ok_or(HttpError::UncloneableBody)?;
                    execute_once(client, request).await
                }
            })
            .await
            .map_err(RetryError::into_source)
    }
}

async fn execute_once(client: &ReqwestClient, request: Request) -> Result<Response, HttpError> {
    let method = request.method().clone();
    let url = request.url().clone();
    debug!(%method, %url, "sending HTTP request");

    match client.execute(request).await {
        Ok(response) => {
            debug!(%method, %url, status = %response.status(), "received HTTP response");
            Ok(response)
        }
        Err(err) => {
            debug!(%method, %url, error = %err, "HTTP request failed");
            Err(err.into())
        }
    }
}

fn is_connect_failure(err: &HttpError, _attempt: u32) -> bool {
    matches!(err, HttpError::Transport(inner) if inner.is_connect())
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    /// Default timeout for requests that do not set their own.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// First delay between connect retries; later delays double up to 16x.
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// `User-Agent` sent with every request.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns [`HttpError::Transport`] when the TLS backend cannot be set up.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build()?;
        let config = RetryConfig::exponential(
            self.max_attempts.saturating_sub(1),
            self.base_backoff,
            self.base_backoff.saturating_mul(16),
        );
        let policy: ConnectRetry =
            PredicateRetry::new(is_connect_failure as fn(&HttpError, u32) -> bool);

        Ok(HttpClient { client, retry: RetryExecutor::new(config, policy) })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_with_defaults() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .max_attempts(3)
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let response = client
            .send(client.request(Method::POST, server.uri()).body("{}"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn does_not_retry_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let response = client
            .send(client.request(Method::POST, server.uri()).body("{}"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_connection_refused_then_gives_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{addr}");

        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("http client");

        let result = client.send(client.request(Method::GET, &url)).await;
        match result {
            Err(HttpError::Transport(err)) => assert!(err.is_connect()),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn per_request_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let result = client
            .send(client.request(Method::GET, server.uri()).timeout(Duration::from_millis(50)))
            .await;

        assert!(result.as_ref().is_err_and(HttpError::is_timeout), "got {result:?}");
    }

    #[tokio::test]
    async fn configured_user_agent_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("user-agent", "trackrelay/test"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().user_agent("trackrelay/test").build().expect("client");
        let response = client
            .send(client.request(Method::POST, server.uri()).body("{}"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
