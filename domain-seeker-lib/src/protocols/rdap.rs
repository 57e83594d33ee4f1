//! RDAP resolver.
//!
//! Given a fully qualified domain, the resolver picks a route (a direct
//! RDAP server or the generic registry), waits out the route's rate limit,
//! sends a HEAD request and classifies the status code. Timeouts and
//! connection failures are retried on the same route; a direct route that
//! keeps failing falls back to the generic registry once. Every call ends
//! in a classified `ProbeResult`.

use crate::error::DomainSeekerError;
use crate::protocols::rate_limit::RateLimitState;
use crate::protocols::registry::ServerRegistry;
use crate::protocols::transport::{HeadResponse, HttpTransport, RdapTransport, TransportError};
use crate::types::{ProbeResult, RouteKey, ScanConfig, StatusKind};
use crate::utils::{extract_tld, is_valid_fqdn, normalize_tld, resolve_location};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fixed pause between two attempts on the same route.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where a probe is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The TLD's own RDAP server
    Direct { url: String },
    /// The generic registry, which may redirect to the authoritative server
    GenericRegistry { url: String },
}

impl Route {
    pub fn url(&self) -> &str {
        match self {
            Route::Direct { url } | Route::GenericRegistry { url } => url,
        }
    }

    pub fn key(&self) -> RouteKey {
        match self {
            Route::Direct { url } => RouteKey::for_url(url),
            Route::GenericRegistry { .. } => RouteKey::GenericRegistry,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Route::Direct { .. })
    }
}

/// Outcome of the IANA TLD support check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TldSupportStatus {
    /// IANA knows the TLD and lists an RDAP service for it
    HasRdap,
    /// IANA knows the TLD but lists no RDAP service
    Exists,
    NotFound,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TldSupport {
    pub exists: bool,
    pub has_rdap: bool,
    pub status: TldSupportStatus,
}

impl TldSupport {
    fn from_status(status: TldSupportStatus) -> Self {
        Self {
            exists: matches!(status, TldSupportStatus::Exists | TldSupportStatus::HasRdap),
            has_rdap: status == TldSupportStatus::HasRdap,
            status,
        }
    }
}

/// Whether an IANA TLD document links to an RDAP service.
pub fn has_rdap_link(json: &serde_json::Value) -> bool {
    json.get("links")
        .and_then(|links| links.as_array())
        .map(|links| {
            links.iter().any(|link| {
                link.get("rel").and_then(|r| r.as_str()) == Some("related")
                    && link
                        .get("href")
                        .and_then(|h| h.as_str())
                        .is_some_and(|href| href.contains("rdap"))
            })
        })
        .unwrap_or(false)
}

/// A classified response for one route.
struct Classified {
    status: StatusKind,
    raw_code: Option<u16>,
    route_used: RouteKey,
    redirect_url: Option<String>,
    error: Option<String>,
    /// Time spent on the wire, rate-limit waits excluded
    latency: Duration,
}

/// A route attempt that got no usable response.
struct RouteFailure {
    error: TransportError,
    /// Set when the failure happened while following a redirect
    redirect_url: Option<String>,
}

impl RouteFailure {
    fn status(&self) -> StatusKind {
        match self.error {
            TransportError::Timeout(_) => StatusKind::Timeout,
            TransportError::Connect(_) => StatusKind::ConnectionError,
            TransportError::Other(_) => StatusKind::RequestError,
        }
    }
}

/// RDAP resolver owning its transport and rate-limit state.
pub struct RdapResolver<T = HttpTransport> {
    transport: T,
    registry: ServerRegistry,
    rate_limits: RateLimitState,
    max_retries: u32,
    prefer_direct: bool,
    retry_delay: Duration,
    tld_support: HashMap<String, TldSupport>,
}

impl RdapResolver<HttpTransport> {
    /// Resolver backed by a real HTTP client.
    pub fn new(config: &ScanConfig) -> Result<Self, DomainSeekerError> {
        let transport = HttpTransport::new(&config.user_agent, config.request_timeout)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: RdapTransport> RdapResolver<T> {
    /// Resolver using a caller-supplied transport.
    pub fn with_transport(config: &ScanConfig, transport: T) -> Self {
        Self {
            transport,
            registry: ServerRegistry::from_config(config),
            rate_limits: RateLimitState::new(config.min_interval)
                .with_overrides(config.route_intervals.clone()),
            max_retries: config.max_retries,
            prefer_direct: config.prefer_direct,
            retry_delay: RETRY_DELAY,
            tld_support: HashMap::new(),
        }
    }

    /// Pick the first route for a domain.
    pub fn select_route(&self, domain: &str, tld: &str) -> Route {
        if self.prefer_direct {
            if let Some(url) = self.registry.direct_url(tld, domain) {
                return Route::Direct { url };
            }
        }
        Route::GenericRegistry {
            url: self.registry.generic_url(domain),
        }
    }

    /// TLD of a bare domain: the longest suffix with a direct server, else the last label.
    pub fn tld_of(&self, domain: &str) -> String {
        let domain = domain.trim().to_lowercase();
        self.registry
            .direct_tlds()
            .into_iter()
            .filter(|tld| domain.len() > tld.len() && domain.ends_with(tld.as_str()))
            .max_by_key(|tld| tld.len())
            .or_else(|| extract_tld(&domain))
            .unwrap_or_default()
    }

    /// Check a domain whose TLD is derived with [`RdapResolver::tld_of`].
    pub async fn check_domain(&mut self, domain: &str) -> ProbeResult {
        let tld = self.tld_of(domain);
        self.check_fqdn(domain, &tld).await
    }

    /// Check `domain`, which was built from a candidate and the configured `tld`.
    ///
    /// The TLD picks the route and labels the result, so multi-label TLDs such
    /// as `.co.uk` reach their direct server. Never fails: transport problems
    /// that survive retries and fallback are reported through the result's
    /// status kind.
    pub async fn check_fqdn(&mut self, domain: &str, tld: &str) -> ProbeResult {
        let domain = domain.trim().to_lowercase();
        let tld = tld.trim().to_lowercase();

        if !is_valid_fqdn(&domain) {
            warn!(domain = %domain, "Invalid domain format, not probing");
            let mut result = ProbeResult::new(domain, tld, StatusKind::InvalidDomain);
            result.error = Some("invalid domain format".to_string());
            return result;
        }

        let mut route = self.select_route(&domain, &tld);

        loop {
            let mut attempt: u32 = 0;

            let failure = loop {
                match self.probe_route(&route, &domain).await {
                    Ok(classified) => {
                        let mut result = ProbeResult::new(domain, tld, classified.status);
                        result.raw_code = classified.raw_code;
                        result.latency_ms = Some(classified.latency.as_millis() as u64);
                        result.route_used = Some(classified.route_used);
                        result.redirect_url = classified.redirect_url;
                        result.error = classified.error;
                        debug!(
                            domain = %result.domain,
                            status = %result.status,
                            raw_code = ?result.raw_code,
                            "Probe classified"
                        );
                        return result;
                    }
                    Err(failure) if failure.error.is_retryable() && attempt < self.max_retries => {
                        attempt += 1;
                        warn!(
                            domain = %domain,
                            route = %route.key(),
                            attempt,
                            max_retries = self.max_retries,
                            error = %failure.error,
                            "Probe failed, retrying"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(failure) => break failure,
                }
            };

            // Only a direct route falls back, and only once: the next route is generic
            if route.is_direct() {
                warn!(
                    domain = %domain,
                    route = %route.key(),
                    error = %failure.error,
                    "Direct server failed, falling back to generic registry"
                );
                route = Route::GenericRegistry {
                    url: self.registry.generic_url(&domain),
                };
                continue;
            }

            warn!(domain = %domain, error = %failure.error, "Probe failed on every route");
            let mut result = ProbeResult::new(domain, tld, failure.status());
            result.route_used = Some(route.key());
            result.redirect_url = failure.redirect_url;
            result.error = Some(failure.error.to_string());
            return result;
        }
    }

    /// One physical attempt on `route`, plus the single redirect hop for the generic registry.
    async fn probe_route(&mut self, route: &Route, domain: &str) -> Result<Classified, RouteFailure> {
        let key = route.key();
        let (response, latency) = self
            .send_head(key.clone(), route.url())
            .await
            .map_err(|error| RouteFailure {
                error,
                redirect_url: None,
            })?;

        if route.is_direct() {
            return Ok(classify(response, key, latency));
        }

        match response.status {
            302 => {
                let target = response
                    .location
                    .as_deref()
                    .and_then(|location| resolve_location(route.url(), location));

                let Some(target) = target else {
                    return Ok(Classified {
                        status: StatusKind::RedirectError,
                        raw_code: Some(302),
                        route_used: key,
                        redirect_url: None,
                        error: Some("redirect without usable Location header".to_string()),
                        latency,
                    });
                };

                debug!(domain, target = %target, "Following generic registry redirect");
                let target_key = RouteKey::for_url(&target);
                let (followed, followed_latency) = self
                    .send_head(target_key.clone(), &target)
                    .await
                    .map_err(|error| RouteFailure {
                        error,
                        redirect_url: Some(target.clone()),
                    })?;

                let mut classified = classify(followed, target_key, latency + followed_latency);
                classified.redirect_url = Some(target);
                Ok(classified)
            }
            404 => Ok(Classified {
                status: StatusKind::NoRdapService,
                raw_code: Some(404),
                route_used: key,
                redirect_url: None,
                error: Some("generic registry knows no RDAP service for this TLD".to_string()),
                latency,
            }),
            _ => Ok(classify(response, key, latency)),
        }
    }

    /// Rate-limited HEAD request, timed from the moment the route is free.
    /// The route's timestamp is updated when the guard drops.
    async fn send_head(
        &mut self,
        key: RouteKey,
        url: &str,
    ) -> Result<(HeadResponse, Duration), TransportError> {
        let _guard = self.rate_limits.acquire(key).await;
        debug!(url, "HEAD");
        let started = Instant::now();
        let response = self.transport.head(url).await?;
        Ok((response, started.elapsed()))
    }

    /// Ask IANA whether a TLD exists and has an RDAP service.
    ///
    /// Answers are cached per TLD; failed checks are not.
    pub async fn check_tld_support(&mut self, tld: &str) -> TldSupport {
        let tld = normalize_tld(tld);
        if let Some(cached) = self.tld_support.get(&tld) {
            return *cached;
        }

        let url = self.registry.iana_url(&tld);
        let response = {
            let _guard = self.rate_limits.acquire(RouteKey::for_url(&url)).await;
            self.transport.get_json(&url).await
        };

        let support = match response {
            Ok((200, json)) => {
                if json.as_ref().is_some_and(has_rdap_link) {
                    TldSupport::from_status(TldSupportStatus::HasRdap)
                } else {
                    TldSupport::from_status(TldSupportStatus::Exists)
                }
            }
            Ok((code, _)) => {
                debug!(tld = %tld, code, "IANA does not know TLD");
                TldSupport::from_status(TldSupportStatus::NotFound)
            }
            Err(e) => {
                debug!(tld = %tld, error = %e, "IANA TLD check failed");
                return TldSupport::from_status(TldSupportStatus::Error);
            }
        };

        self.tld_support.insert(tld, support);
        support
    }

    /// TLDs answered by a direct server.
    pub fn supported_tlds(&self) -> Vec<String> {
        self.registry.direct_tlds()
    }

    /// Whether a TLD has a direct server (regardless of `prefer_direct`).
    pub fn has_direct_server(&self, tld: &str) -> bool {
        self.registry.has_direct(tld)
    }

    pub fn rate_limits(&self) -> &RateLimitState {
        &self.rate_limits
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Shut down the transport. Consumes the resolver, so it happens once.
    pub fn close(mut self) {
        self.transport.close();
        info!("RDAP resolver closed");
    }
}

fn classify(response: HeadResponse, route_used: RouteKey, latency: Duration) -> Classified {
    let status = StatusKind::from_status_code(response.status);
    let error = match status {
        StatusKind::UnknownStatusCode => Some(format!("unexpected HTTP status {}", response.status)),
        kind if kind.is_transient() => Some(format!("server answered HTTP {}", response.status)),
        _ => None,
    };

    Classified {
        status,
        raw_code: Some(response.status),
        route_used,
        redirect_url: None,
        error,
        latency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Transport answering from a script of (url, outcome) pairs.
    #[derive(Default)]
    struct ScriptedTransport {
        script: RefCell<VecDeque<Result<HeadResponse, TransportError>>>,
        calls: RefCell<Vec<(String, Instant)>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HeadResponse, TransportError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                ..Default::default()
            }
        }

        fn urls(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|(url, _)| url.clone()).collect()
        }
    }

    impl RdapTransport for ScriptedTransport {
        async fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
            self.calls.borrow_mut().push((url.to_string(), Instant::now()));
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
        }

        async fn get_json(
            &self,
            _url: &str,
        ) -> Result<(u16, Option<serde_json::Value>), TransportError> {
            Ok((
                200,
                Some(serde_json::json!({
                    "links": [{"rel": "related", "href": "https://rdap.nic.example/"}]
                })),
            ))
        }
    }

    fn timeout() -> Result<HeadResponse, TransportError> {
        Err(TransportError::Timeout("deadline elapsed".into()))
    }

    fn resolver(script: Vec<Result<HeadResponse, TransportError>>) -> RdapResolver<ScriptedTransport> {
        RdapResolver::with_transport(&ScanConfig::default(), ScriptedTransport::new(script))
    }

    #[test]
    fn test_route_selection() {
        let r = resolver(vec![]);
        assert_eq!(
            r.select_route("test.ch", ".ch"),
            Route::Direct {
                url: "https://rdap.nic.ch/domain/test.ch".to_string()
            }
        );
        assert!(!r.select_route("test.com", ".com").is_direct());

        let r = RdapResolver::with_transport(
            &ScanConfig::default().with_prefer_direct(false),
            ScriptedTransport::default(),
        );
        assert!(!r.select_route("test.ch", ".ch").is_direct());
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_classification() {
        let mut r = resolver(vec![Ok(HeadResponse::new(404))]);
        let result = r.check_domain("free-name.ch").await;

        assert_eq!(result.status, StatusKind::Available);
        assert!(result.is_available());
        assert_eq!(result.raw_code, Some(404));
        assert_eq!(
            result.route_used,
            Some(RouteKey::Direct("rdap.nic.ch".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_404_is_no_rdap_service() {
        let mut r = resolver(vec![Ok(HeadResponse::new(404))]);
        let result = r.check_domain("something.zz").await;

        assert_eq!(result.status, StatusKind::NoRdapService);
        assert!(!result.is_available());
        assert_eq!(result.route_used, Some(RouteKey::GenericRegistry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_followed_once() {
        let mut r = resolver(vec![
            Ok(HeadResponse::redirect("https://rdap.verisign.com/com/v1/domain/google.com")),
            Ok(HeadResponse::new(200)),
        ]);
        let result = r.check_domain("google.com").await;

        assert_eq!(result.status, StatusKind::Registered);
        assert_eq!(
            result.route_used,
            Some(RouteKey::Direct("rdap.verisign.com".to_string()))
        );
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_chain_not_followed() {
        let mut r = resolver(vec![
            Ok(HeadResponse::redirect("https://a.example/domain/x.com")),
            Ok(HeadResponse::redirect("https://b.example/domain/x.com")),
        ]);
        let result = r.check_domain("x.com").await;

        assert_eq!(result.status, StatusKind::UnknownStatusCode);
        assert_eq!(result.raw_code, Some(302));
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_without_location() {
        let mut r = resolver(vec![Ok(HeadResponse {
            status: 302,
            location: None,
        })]);
        let result = r.check_domain("x.com").await;
        assert_eq!(result.status, StatusKind::RedirectError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let mut r = resolver(vec![timeout(), Ok(HeadResponse::new(200))]);
        let start = Instant::now();
        let result = r.check_domain("taken.de").await;

        assert_eq!(result.status, StatusKind::Registered);
        assert!(start.elapsed() >= RETRY_DELAY);
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_exactly_once() {
        // 3 direct attempts, then 3 generic attempts, all timing out
        let mut r = resolver((0..6).map(|_| timeout()).collect());
        let result = r.check_domain("slow.ch").await;

        assert_eq!(result.status, StatusKind::Timeout);
        assert_eq!(result.route_used, Some(RouteKey::GenericRegistry));

        let urls = r.transport().urls();
        assert_eq!(urls.len(), 6);
        assert!(urls[..3].iter().all(|u| u.starts_with("https://rdap.nic.ch/")));
        assert!(urls[3..].iter().all(|u| u.starts_with("https://rdap.org/")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_escalation_without_prefer_direct() {
        let config = ScanConfig::default().with_prefer_direct(false).with_max_retries(1);
        let mut r = RdapResolver::with_transport(
            &config,
            ScriptedTransport::new(vec![timeout(), timeout(), Ok(HeadResponse::new(404))]),
        );
        let result = r.check_domain("slow.ch").await;

        assert_eq!(result.status, StatusKind::Timeout);
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_falls_back_without_retry() {
        let mut r = resolver(vec![
            Err(TransportError::Other("tls handshake".into())),
            Ok(HeadResponse::new(404)),
        ]);
        let result = r.check_domain("name.de").await;

        assert_eq!(result.status, StatusKind::NoRdapService);
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spacing_per_route() {
        let mut r = resolver(vec![
            Ok(HeadResponse::new(404)),
            Ok(HeadResponse::new(404)),
            Ok(HeadResponse::new(404)),
        ]);
        r.check_domain("a.ch").await;
        r.check_domain("a.com").await;
        r.check_domain("b.li").await;

        let calls = r.transport().calls.borrow();
        // .ch and .li share rdap.nic.ch
        assert!(calls[2].1 - calls[0].1 >= Duration::from_secs(1));
        // the generic route is independent of rdap.nic.ch
        assert_eq!(calls[1].1, calls[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_label_tld_reaches_direct_server() {
        let config = ScanConfig::default()
            .with_direct_server(".co.uk", "https://rdap.example-uk.test/domain/{domain}");
        let mut r = RdapResolver::with_transport(
            &config,
            ScriptedTransport::new(vec![Ok(HeadResponse::new(404))]),
        );
        let result = r.check_fqdn("abc.co.uk", ".co.uk").await;

        assert_eq!(result.tld, ".co.uk");
        assert_eq!(result.status, StatusKind::Available);
        assert_eq!(
            result.route_used,
            Some(RouteKey::Direct("rdap.example-uk.test".to_string()))
        );
        assert_eq!(
            r.transport().urls(),
            vec!["https://rdap.example-uk.test/domain/abc.co.uk".to_string()]
        );
    }

    #[test]
    fn test_tld_of_prefers_longest_direct_suffix() {
        let config = ScanConfig::default()
            .with_direct_server(".co.uk", "https://rdap.example-uk.test/domain/{domain}");
        let r = RdapResolver::with_transport(&config, ScriptedTransport::default());

        assert_eq!(r.tld_of("abc.co.uk"), ".co.uk");
        assert_eq!(r.tld_of("abc.uk"), ".uk");
        assert_eq!(r.tld_of("Name.CH"), ".ch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_excludes_rate_limit_wait() {
        let mut r = resolver(vec![Ok(HeadResponse::new(200)), Ok(HeadResponse::new(200))]);
        let first = r.check_domain("one.ch").await;
        let second = r.check_domain("two.ch").await;

        // the second request waited a full interval for rdap.nic.ch
        let calls = r.transport().calls.borrow();
        assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(1));
        assert_eq!(first.latency_ms, Some(0));
        assert_eq!(second.latency_ms, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_domain_not_probed() {
        let mut r = resolver(vec![]);
        let result = r.check_domain("-bad.com").await;
        assert_eq!(result.status, StatusKind::InvalidDomain);
        assert!(r.transport().urls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tld_support_is_cached() {
        let mut r = resolver(vec![]);
        let support = r.check_tld_support("dev").await;
        assert!(support.exists);
        assert!(support.has_rdap);
        assert_eq!(r.check_tld_support(".dev").await, support);
    }

    #[test]
    fn test_has_rdap_link() {
        let json = serde_json::json!({
            "links": [
                {"rel": "self", "href": "https://rdap.iana.org/domain/dev"},
                {"rel": "related", "href": "https://pubapi.registry.google/rdap/"}
            ]
        });
        assert!(has_rdap_link(&json));
        assert!(!has_rdap_link(&serde_json::json!({"links": []})));
        assert!(!has_rdap_link(&serde_json::json!({})));
    }
}
