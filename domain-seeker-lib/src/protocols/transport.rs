//! HTTP transport used by the resolver.
//!
//! The resolver only needs two primitives: a HEAD request that does not
//! follow redirects, and a GET returning JSON for the IANA TLD check. They
//! sit behind the `RdapTransport` trait so the resolver can be driven by
//! scripted transports in tests.

use crate::error::DomainSeekerError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION};
use std::fmt;
use std::time::Duration;

/// Media type requested from RDAP servers.
pub const RDAP_ACCEPT: &str = "application/rdap+json";

/// Status code and redirect target of a HEAD response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub location: Option<String>,
}

impl HeadResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            location: None,
        }
    }

    pub fn redirect<L: Into<String>>(location: L) -> Self {
        Self {
            status: 302,
            location: Some(location.into()),
        }
    }
}

/// Failure to get any response at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connect(String),
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Timeout(msg) | Self::Connect(msg) | Self::Other(msg) => msg,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(msg) => write!(f, "request timed out: {}", msg),
            Self::Connect(msg) => write!(f, "connection failed: {}", msg),
            Self::Other(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Network seam of the resolver.
///
/// Implementations must not follow redirects on `head`.
#[allow(async_fn_in_trait)]
pub trait RdapTransport {
    /// Issue a HEAD request and report status plus `Location`.
    async fn head(&self, url: &str) -> Result<HeadResponse, TransportError>;

    /// Issue a GET request; the body is parsed as JSON when the status is 200.
    async fn get_json(
        &self,
        url: &str,
    ) -> Result<(u16, Option<serde_json::Value>), TransportError>;

    /// Release pooled connections. Requests after `close` fail.
    fn close(&mut self) {}
}

/// reqwest-backed transport.
pub struct HttpTransport {
    /// None once closed
    client: Option<reqwest::Client>,
}

impl HttpTransport {
    /// Build a client with RDAP headers, the given timeout and redirects disabled.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, DomainSeekerError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(RDAP_ACCEPT));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                DomainSeekerError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&reqwest::Client, TransportError> {
        self.client
            .as_ref()
            .ok_or_else(|| TransportError::Other("transport already closed".to_string()))
    }
}

impl RdapTransport for HttpTransport {
    async fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
        let response = self.client()?.head(url).send().await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        Ok(HeadResponse {
            status: response.status().as_u16(),
            location,
        })
    }

    async fn get_json(
        &self,
        url: &str,
    ) -> Result<(u16, Option<serde_json::Value>), TransportError> {
        let response = self.client()?.get(url).send().await?;
        let status = response.status().as_u16();

        if status != 200 {
            return Ok((status, None));
        }

        // A body that is not JSON still counts as a 200
        let json = response.json::<serde_json::Value>().await.ok();
        Ok((status, json))
    }

    fn close(&mut self) {
        self.client = None;
    }
}
