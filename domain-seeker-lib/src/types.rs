//! Core data types for domain availability scanning.
//!
//! This module defines the candidate, probe result, route and statistics
//! types shared by the generator, the resolver and the scan orchestrator,
//! together with the runtime `ScanConfig`.

use crate::error::DomainSeekerError;
use crate::protocols::registry::{GENERIC_REGISTRY_URL, IANA_RDAP_URL};
use crate::utils::{host_of, validate_candidate};
use chrono::{DateTime, Local};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A validated, normalized (lowercase) domain base name without TLD.
///
/// Only `[a-z0-9-]`, no leading or trailing hyphen, 1 to 63 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CandidateBase(String);

impl CandidateBase {
    /// Trim, lowercase and validate a raw value.
    pub fn parse(raw: &str) -> Result<Self, DomainSeekerError> {
        let normalized = raw.trim().to_lowercase();
        validate_candidate(&normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join with a TLD (which carries its own leading dot).
    pub fn with_tld(&self, tld: &str) -> String {
        format!("{}{}", self.0, tld)
    }
}

impl fmt::Display for CandidateBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CandidateBase {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Tri-state availability of a probed domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Registered,
    Indeterminate,
}

/// Classification of a single probe.
///
/// The HTTP status table is fixed: 200/401 registered, 404 available,
/// 429 rate limited, 403/500/503 transient server errors, anything else
/// unknown. The remaining kinds describe outcomes that never produced a
/// usable status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Available,
    Registered,
    RateLimited,
    Forbidden,
    ServerError,
    ServiceUnavailable,
    /// The generic registry knows no RDAP service for the TLD (404 without redirect)
    NoRdapService,
    UnknownStatusCode,
    /// The generic registry answered 302 without a usable `Location`
    RedirectError,
    Timeout,
    ConnectionError,
    RequestError,
    InvalidDomain,
}

impl StatusKind {
    /// Map an HTTP status code through the fixed classification table.
    pub fn from_status_code(code: u16) -> Self {
        match code {
            200 | 401 => Self::Registered,
            404 => Self::Available,
            429 => Self::RateLimited,
            403 => Self::Forbidden,
            500 => Self::ServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::UnknownStatusCode,
        }
    }

    /// The only place availability is derived from.
    pub fn availability(self) -> Availability {
        match self {
            Self::Available => Availability::Available,
            Self::Registered => Availability::Registered,
            _ => Availability::Indeterminate,
        }
    }

    /// Server-side errors that are expected to clear up on their own.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Forbidden | Self::ServerError | Self::ServiceUnavailable
        )
    }

    /// Which statistics bucket a result with this kind lands in.
    pub fn outcome(self) -> Outcome {
        match self {
            Self::Available => Outcome::Available,
            Self::Registered => Outcome::Registered,
            Self::RateLimited => Outcome::RateLimited,
            _ => Outcome::Errored,
        }
    }

    /// Stable machine-readable name (matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Registered => "registered",
            Self::RateLimited => "rate_limited",
            Self::Forbidden => "forbidden",
            Self::ServerError => "server_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::NoRdapService => "no_rdap_service",
            Self::UnknownStatusCode => "unknown_status_code",
            Self::RedirectError => "redirect_error",
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection_error",
            Self::RequestError => "request_error",
            Self::InvalidDomain => "invalid_domain",
        }
    }

    /// Human-readable label used in console output and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Registered => "Registered",
            Self::RateLimited => "Rate limited (retry later)",
            Self::Forbidden => "Access denied by server",
            Self::ServerError => "Server error (retry later)",
            Self::ServiceUnavailable => "Service unavailable (retry later)",
            Self::NoRdapService => "No known RDAP service for TLD",
            Self::UnknownStatusCode => "Unknown status code",
            Self::RedirectError => "Redirect error",
            Self::Timeout => "Timed out",
            Self::ConnectionError => "Connection error",
            Self::RequestError => "Request error",
            Self::InvalidDomain => "Invalid domain",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four mutually exclusive statistics buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Available,
    Registered,
    RateLimited,
    Errored,
}

/// Identifies a rate-limited endpoint group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "host")]
pub enum RouteKey {
    /// A specific RDAP server, keyed by host name
    Direct(String),
    /// The shared generic-registry bootstrap service
    GenericRegistry,
}

impl RouteKey {
    /// Key for the server behind a URL (falls back to the raw URL if it has no host).
    pub fn for_url(url: &str) -> Self {
        Self::Direct(host_of(url).unwrap_or_else(|| url.to_string()))
    }

    /// Parse a configuration key: `generic` or a host name.
    pub fn from_config_key(key: &str) -> Self {
        let key = key.trim().to_lowercase();
        match key.as_str() {
            "generic" | "generic_registry" | "rdap.org" => Self::GenericRegistry,
            _ => Self::Direct(key),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKey::Direct(host) => write!(f, "direct:{}", host),
            RouteKey::GenericRegistry => write!(f, "generic"),
        }
    }
}

/// Result of probing one fully qualified domain.
///
/// Availability is not stored: it is always derived from `status`, and
/// serialized next to it.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// The domain that was probed (e.g., "example.ch")
    pub domain: String,

    /// TLD of the domain (e.g., ".ch")
    pub tld: String,

    /// Classification of the final response or failure
    pub status: StatusKind,

    /// HTTP status code of the response that was classified
    pub raw_code: Option<u16>,

    /// Wall-clock latency of the successful attempt, in milliseconds
    pub latency_ms: Option<u64>,

    /// Endpoint group that produced the classified response
    pub route_used: Option<RouteKey>,

    /// Target of a followed generic-registry redirect
    pub redirect_url: Option<String>,

    /// Diagnostic message for anything that is not a clean classification
    pub error: Option<String>,

    /// When the probe finished
    pub checked_at: DateTime<Local>,
}

impl ProbeResult {
    pub fn new<D: Into<String>, T: Into<String>>(domain: D, tld: T, status: StatusKind) -> Self {
        Self {
            domain: domain.into(),
            tld: tld.into(),
            status,
            raw_code: None,
            latency_ms: None,
            route_used: None,
            redirect_url: None,
            error: None,
            checked_at: Local::now(),
        }
    }

    pub fn availability(&self) -> Availability {
        self.status.availability()
    }

    pub fn is_available(&self) -> bool {
        self.availability() == Availability::Available
    }
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProbeResult", 10)?;
        state.serialize_field("domain", &self.domain)?;
        state.serialize_field("tld", &self.tld)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("availability", &self.availability())?;
        serialize_optional(&mut state, "raw_code", &self.raw_code)?;
        serialize_optional(&mut state, "latency_ms", &self.latency_ms)?;
        serialize_optional(&mut state, "route_used", &self.route_used)?;
        serialize_optional(&mut state, "redirect_url", &self.redirect_url)?;
        serialize_optional(&mut state, "error", &self.error)?;
        state.serialize_field("checked_at", &self.checked_at)?;
        state.end()
    }
}

/// Absent optional fields are left out of the output.
fn serialize_optional<S: SerializeStruct, V: Serialize>(
    state: &mut S,
    key: &'static str,
    value: &Option<V>,
) -> Result<(), S::Error> {
    match value {
        Some(value) => state.serialize_field(key, value),
        None => state.skip_field(key),
    }
}

/// Per-TLD counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TldStats {
    pub tld: String,
    pub checked: u64,
    pub available: u64,
}

impl TldStats {
    /// Share of checked domains that were available, in percent.
    pub fn availability_pct(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            self.available as f64 / self.checked as f64 * 100.0
        }
    }
}

/// Scan counters.
///
/// Every recorded result bumps `checked` and exactly one of the four
/// outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub checked: u64,
    pub available: u64,
    pub registered: u64,
    pub rate_limited: u64,
    pub errored: u64,
    /// Breakdown in configured TLD order
    pub per_tld: Vec<TldStats>,
}

impl ScanStats {
    pub fn new(tlds: &[String]) -> Self {
        Self {
            per_tld: tlds
                .iter()
                .map(|tld| TldStats {
                    tld: tld.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &ProbeResult) {
        self.checked += 1;
        match result.status.outcome() {
            Outcome::Available => self.available += 1,
            Outcome::Registered => self.registered += 1,
            Outcome::RateLimited => self.rate_limited += 1,
            Outcome::Errored => self.errored += 1,
        }

        if let Some(tld_stats) = self.per_tld.iter_mut().find(|s| s.tld == result.tld) {
            tld_stats.checked += 1;
            if result.is_available() {
                tld_stats.available += 1;
            }
        }
    }

    pub fn tld(&self, tld: &str) -> Option<&TldStats> {
        self.per_tld.iter().find(|s| s.tld == tld)
    }
}

/// Configuration options for a scan session.
///
/// Built with sensible defaults and adjusted with the `with_*` methods; the
/// CLI layers file, environment and flag values on top.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// TLD specs to probe for every candidate, in order (each starts with '.')
    /// Default: [".com", ".org", ".net"]
    pub tlds: Vec<String>,

    /// Pause after every probe
    /// Default: 1 second
    pub delay: Duration,

    /// Retries per route on timeout or connection failure
    /// Default: 2
    pub max_retries: u32,

    /// Use a TLD's direct RDAP server instead of the generic registry when known
    /// Default: true
    pub prefer_direct: bool,

    /// Timeout for each HTTP request
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Minimum spacing between two requests to the same route
    /// Default: 1 second
    pub min_interval: Duration,

    /// Per-route overrides of `min_interval`
    pub route_intervals: HashMap<RouteKey, Duration>,

    /// How often the orchestrator reports progress
    /// Default: 5 seconds
    pub progress_interval: Duration,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Generic registry URL template (`{domain}` is substituted)
    pub generic_registry_url: String,

    /// IANA RDAP URL template used for the TLD support check
    pub iana_url: String,

    /// Additional or overriding direct servers, TLD -> URL
    pub direct_servers: HashMap<String, String>,

    /// Run the IANA TLD support check for TLDs without a direct server
    /// Default: false
    pub verify_tlds: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tlds: vec![".com".to_string(), ".org".to_string(), ".net".to_string()],
            delay: Duration::from_secs(1),
            max_retries: 2,
            prefer_direct: true,
            request_timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
            route_intervals: HashMap::new(),
            progress_interval: Duration::from_secs(5),
            user_agent: format!("DomainSeeker/{}", env!("CARGO_PKG_VERSION")),
            generic_registry_url: GENERIC_REGISTRY_URL.to_string(),
            iana_url: IANA_RDAP_URL.to_string(),
            direct_servers: HashMap::new(),
            verify_tlds: false,
        }
    }
}

impl ScanConfig {
    /// Set the TLD list to probe.
    pub fn with_tlds(mut self, tlds: Vec<String>) -> Self {
        self.tlds = tlds;
        self
    }

    /// Set the pause after every probe.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the retry budget per route.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enable or disable direct servers for known TLDs.
    pub fn with_prefer_direct(mut self, enabled: bool) -> Self {
        self.prefer_direct = enabled;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default spacing between requests to one route.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Override the spacing for a single route.
    pub fn with_route_interval(mut self, key: RouteKey, interval: Duration) -> Self {
        self.route_intervals.insert(key, interval);
        self
    }

    /// Set how often progress snapshots are emitted.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Register (or replace) the direct server for a TLD.
    pub fn with_direct_server<T: Into<String>, U: Into<String>>(mut self, tld: T, url: U) -> Self {
        self.direct_servers.insert(tld.into(), url.into());
        self
    }

    /// Replace the generic registry URL template.
    pub fn with_generic_registry<U: Into<String>>(mut self, url: U) -> Self {
        self.generic_registry_url = url.into();
        self
    }

    /// Enable the IANA TLD support check at session start.
    pub fn with_verify_tlds(mut self, enabled: bool) -> Self {
        self.verify_tlds = enabled;
        self
    }
}
