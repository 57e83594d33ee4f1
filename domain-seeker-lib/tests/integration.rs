// domain-seeker-lib/tests/integration.rs

//! Integration tests for domain-seeker-lib: full scans against stub transports

use domain_seeker_lib::{
    DomainSeekerError, DomainSource, HeadResponse, InterruptFlag, ProbeResult, RdapResolver,
    RdapTransport, RouteKey, ScanConfig, ScanObserver, ScanReport, ScanSession, ScanStats,
    ScanStatus, StatusKind, TransportError,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

/// Answers HEAD requests from a per-URL table; unknown URLs time out.
#[derive(Clone, Default)]
struct StubTransport {
    responses: Rc<RefCell<HashMap<String, Vec<Result<HeadResponse, TransportError>>>>>,
    calls: Rc<RefCell<Vec<(String, Instant)>>>,
    closed: Rc<Cell<u32>>,
}

impl StubTransport {
    fn respond(self, url: &str, response: Result<HeadResponse, TransportError>) -> Self {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push(response);
        self
    }

    fn status(self, url: &str, status: u16) -> Self {
        self.respond(url, Ok(HeadResponse::new(status)))
    }

    fn calls_to(&self, prefix: &str) -> Vec<Instant> {
        self.calls
            .borrow()
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .map(|(_, at)| *at)
            .collect()
    }
}

impl RdapTransport for StubTransport {
    async fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
        self.calls.borrow_mut().push((url.to_string(), Instant::now()));
        let mut responses = self.responses.borrow_mut();
        match responses.get_mut(url) {
            // The last scripted response repeats forever
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(TransportError::Timeout(format!("no route to {}", url))),
        }
    }

    async fn get_json(
        &self,
        _url: &str,
    ) -> Result<(u16, Option<serde_json::Value>), TransportError> {
        Ok((404, None))
    }

    fn close(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}

#[derive(Clone, Default)]
struct CountingObserver {
    results: Rc<RefCell<Vec<ProbeResult>>>,
    finished: Rc<Cell<u32>>,
    interrupt_after: Option<(usize, InterruptFlag)>,
}

impl ScanObserver for CountingObserver {
    fn on_result(&self, result: &ProbeResult, _stats: &ScanStats) {
        self.results.borrow_mut().push(result.clone());
        if let Some((limit, flag)) = &self.interrupt_after {
            if self.results.borrow().len() >= *limit {
                flag.trigger();
            }
        }
    }

    fn on_finish(&self, _report: &ScanReport) {
        self.finished.set(self.finished.get() + 1);
    }
}

fn scan_config(tlds: &[&str]) -> ScanConfig {
    ScanConfig::default()
        .with_tlds(tlds.iter().map(|t| t.to_string()).collect())
        .with_delay(Duration::ZERO)
}

fn session(config: ScanConfig, transport: StubTransport) -> ScanSession<StubTransport> {
    let resolver = RdapResolver::with_transport(&config, transport);
    ScanSession::with_resolver(config, resolver)
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_generic_404_is_not_available() {
    let transport = StubTransport::default()
        .status("https://rdap.org/domain/google.com", 200)
        .status("https://rdap.org/domain/zzqxvwkplm123unlikely.com", 404);
    let observer = CountingObserver::default();

    let outcome = session(scan_config(&[".com"]), transport.clone())
        .with_observer(observer.clone())
        .run(DomainSource::callback("inline", || vec!["google", "zzqxvwkplm123unlikely"]))
        .await;

    // Generic-registry 404 means "no RDAP service", not "available"
    let stats = &outcome.report.stats;
    assert_eq!(stats.checked, 2);
    assert_eq!(stats.registered, 1);
    assert_eq!(stats.available, 0);
    assert_eq!(stats.errored, 1);
    assert!(outcome.report.discovered.is_empty());
    assert_eq!(observer.results.borrow()[1].status, StatusKind::NoRdapService);
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_scan_finds_unregistered_domain() {
    let config = scan_config(&[".com"])
        .with_direct_server(".com", "https://rdap.verisign.com/com/v1/domain/{domain}");
    let transport = StubTransport::default()
        .status("https://rdap.verisign.com/com/v1/domain/google.com", 200)
        .status("https://rdap.verisign.com/com/v1/domain/zzqxvwkplm123unlikely.com", 404);

    let outcome = session(config, transport)
        .run(DomainSource::callback("inline", || vec!["google", "zzqxvwkplm123unlikely"]))
        .await;

    assert_eq!(outcome.status(), ScanStatus::Completed);
    let stats = &outcome.report.stats;
    assert_eq!(stats.checked, 2);
    assert_eq!(stats.available, 1);
    assert_eq!(stats.registered, 1);

    let found: Vec<_> = outcome.report.discovered.iter().map(|d| d.domain.clone()).collect();
    assert_eq!(found, vec!["zzqxvwkplm123unlikely.com".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_multi_label_tld_scan_uses_direct_server() {
    let config = scan_config(&[".co.uk"])
        .with_direct_server(".co.uk", "https://rdap.example-uk.test/domain/{domain}");
    let transport = StubTransport::default()
        .status("https://rdap.example-uk.test/domain/abc.co.uk", 404);

    let outcome = session(config, transport.clone())
        .run(DomainSource::callback("inline", || vec!["abc"]))
        .await;

    let stats = &outcome.report.stats;
    assert_eq!(stats.available, 1);
    assert_eq!(stats.errored, 0);
    let row = stats.tld(".co.uk").unwrap();
    assert_eq!(row.checked, 1);
    assert_eq!(row.available, 1);

    let found = &outcome.report.discovered[0];
    assert_eq!(found.domain, "abc.co.uk");
    assert_eq!(found.tld, ".co.uk");
    assert_eq!(transport.calls_to("https://rdap.example-uk.test/").len(), 1);
    assert!(transport.calls_to("https://rdap.org/").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_redirect_matches_direct_probe() {
    let target = "https://rdap.nic.io/domain/example.io";

    for status in [200, 401, 404, 429, 500, 503, 418] {
        let via_generic = StubTransport::default()
            .respond(
                "https://rdap.org/domain/example.io",
                Ok(HeadResponse::redirect(target)),
            )
            .status(target, status);
        let mut resolver = RdapResolver::with_transport(&ScanConfig::default(), via_generic);
        let redirected = resolver.check_domain("example.io").await;

        let direct = StubTransport::default().status(target, status);
        let config = ScanConfig::default()
            .with_direct_server(".io", "https://rdap.nic.io/domain/{domain}");
        let mut resolver = RdapResolver::with_transport(&config, direct);
        let probed = resolver.check_domain("example.io").await;

        assert_eq!(redirected.status, probed.status, "status {}", status);
        assert_eq!(redirected.availability(), probed.availability());
        assert_eq!(redirected.route_used, probed.route_used);
        assert_eq!(redirected.redirect_url.as_deref(), Some(target));
    }
}

#[tokio::test(start_paused = true)]
async fn test_direct_timeouts_escalate_once() {
    // Every URL times out
    let transport = StubTransport::default();
    let config = ScanConfig::default().with_max_retries(2);
    let mut resolver = RdapResolver::with_transport(&config, transport.clone());

    let result = resolver.check_domain("slow.de").await;

    assert_eq!(result.status, StatusKind::Timeout);
    assert!(!result.is_available());
    assert_eq!(transport.calls_to("https://rdap.denic.de/").len(), 3);
    assert_eq!(transport.calls_to("https://rdap.org/").len(), 3);
    assert_eq!(transport.calls.borrow().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_failure_after_fallback() {
    let transport = StubTransport::default()
        .respond(
            "https://rdap.nic.ch/domain/flaky.ch",
            Err(TransportError::Connect("refused".into())),
        )
        .respond(
            "https://rdap.org/domain/flaky.ch",
            Ok(HeadResponse::redirect("https://rdap.nic.ch/domain/flaky.ch")),
        );
    let config = ScanConfig::default().with_max_retries(0);
    let mut resolver = RdapResolver::with_transport(&config, transport.clone());

    // The redirect points back at the failing server
    let result = resolver.check_domain("flaky.ch").await;
    assert_eq!(result.status, StatusKind::ConnectionError);
    assert_eq!(result.route_used, Some(RouteKey::GenericRegistry));
    assert!(result.redirect_url.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_same_route_probes_are_spaced() {
    let transport = StubTransport::default()
        .status("https://rdap.nic.ch/domain/alpha.ch", 404)
        .status("https://rdap.nic.ch/domain/alpha.li", 200)
        .status("https://rdap.nic.ch/domain/beta.ch", 404)
        .status("https://rdap.nic.ch/domain/beta.li", 404);
    let config = scan_config(&[".ch", ".li"]);

    let outcome = session(config, transport.clone())
        .run(DomainSource::callback("inline", || vec!["alpha", "beta"]))
        .await;
    assert_eq!(outcome.report.stats.available, 3);

    let calls = transport.calls_to("https://rdap.nic.ch/");
    assert_eq!(calls.len(), 4);
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_route_interval_override() {
    let transport = StubTransport::default()
        .status("https://rdap.org/domain/a.com", 404)
        .status("https://rdap.org/domain/b.com", 404);
    let config = scan_config(&[".com"])
        .with_route_interval(RouteKey::GenericRegistry, Duration::from_secs(4));

    session(config, transport.clone())
        .run(DomainSource::callback("inline", || vec!["a", "b"]))
        .await;

    let calls = transport.calls_to("https://rdap.org/");
    assert!(calls[1] - calls[0] >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_finalize_once_on_completion() {
    let transport = StubTransport::default().status("https://rdap.nic.ch/domain/one.ch", 404);
    let observer = CountingObserver::default();

    let outcome = session(scan_config(&[".ch"]), transport.clone())
        .with_observer(observer.clone())
        .run(DomainSource::callback("inline", || vec!["one"]))
        .await;

    assert_eq!(outcome.status(), ScanStatus::Completed);
    assert_eq!(observer.finished.get(), 1);
    assert_eq!(transport.closed.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_once_on_interrupt() {
    let transport = StubTransport::default()
        .status("https://rdap.nic.ch/domain/one.ch", 404)
        .status("https://rdap.nic.ch/domain/two.ch", 404);
    let flag = InterruptFlag::new();
    let observer = CountingObserver {
        interrupt_after: Some((1, flag.clone())),
        ..Default::default()
    };

    let outcome = session(scan_config(&[".ch", ".li"]), transport.clone())
        .with_interrupt(flag)
        .with_observer(observer.clone())
        .run(DomainSource::callback("inline", || vec!["one", "two"]))
        .await;

    assert_eq!(outcome.status(), ScanStatus::Interrupted);
    assert!(outcome.error.is_none());
    // Stopped before the second TLD of the first candidate
    let stats = &outcome.report.stats;
    assert_eq!(stats.checked, 1);
    assert_eq!(
        stats.available + stats.registered + stats.rate_limited + stats.errored,
        stats.checked
    );
    assert_eq!(outcome.report.discovered.len(), 1);
    assert_eq!(observer.finished.get(), 1);
    assert_eq!(transport.closed.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_once_on_generator_failure() {
    let transport = StubTransport::default().status("https://rdap.nic.ch/domain/good.ch", 404);
    let observer = CountingObserver::default();

    let source = DomainSource::fallible_callback("broken", || {
        vec![Ok("good"), Err("generator crashed"), Ok("unreached")]
    });
    let outcome = session(scan_config(&[".ch"]), transport.clone())
        .with_observer(observer.clone())
        .run(source)
        .await;

    assert_eq!(outcome.status(), ScanStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(DomainSeekerError::GeneratorExecution { .. })
    ));
    assert_eq!(outcome.report.stats.checked, 1);
    assert_eq!(outcome.report.discovered.len(), 1);
    assert_eq!(observer.finished.get(), 1);
    assert_eq!(transport.closed.get(), 1);
    assert!(outcome.report.render_text().contains("# Status: failed"));
}

#[tokio::test(start_paused = true)]
async fn test_scan_deduplicates_and_drops_invalid_candidates() {
    let transport = StubTransport::default().status("https://rdap.nic.ch/domain/dup.ch", 404);
    let observer = CountingObserver::default();

    let outcome = session(scan_config(&[".ch"]), transport)
        .with_observer(observer.clone())
        .run(DomainSource::callback("inline", || {
            vec![
                "dup".to_string(),
                "DUP".to_string(),
                " dup ".to_string(),
                "-dash".to_string(),
                "under_score".to_string(),
                "x".repeat(64),
            ]
        }))
        .await;

    assert_eq!(outcome.report.stats.checked, 1);
    let probed: Vec<_> = observer.results.borrow().iter().map(|r| r.domain.clone()).collect();
    assert_eq!(probed, vec!["dup.ch".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_counts_as_error() {
    let transport = StubTransport::default().status("https://rdap.denic.de/domain/odd.de", 418);
    let observer = CountingObserver::default();

    let outcome = session(scan_config(&[".de"]), transport)
        .with_observer(observer.clone())
        .run(DomainSource::callback("inline", || vec!["odd"]))
        .await;

    assert_eq!(outcome.report.stats.errored, 1);
    let result = &observer.results.borrow()[0];
    assert_eq!(result.status, StatusKind::UnknownStatusCode);
    assert_eq!(result.raw_code, Some(418));
}
