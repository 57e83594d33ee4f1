//! Scan orchestration.
//!
//! A `ScanSession` drives every candidate × TLD pair through the resolver,
//! keeps statistics and the list of available domains, reports progress to
//! an observer and produces a `ScanReport` at the end. `run` consumes the
//! session, so finalization happens exactly once whether the candidate
//! sequence ran out, the scan was interrupted or the source failed.

use crate::error::DomainSeekerError;
use crate::generate::DomainGenerator;
use crate::protocols::rdap::RdapResolver;
use crate::protocols::transport::{HttpTransport, RdapTransport};
use crate::report::{DiscoveredDomain, ScanReport, ScanStatus};
use crate::source::DomainSource;
use crate::types::{ProbeResult, ScanConfig, ScanStats};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Cloneable stop request, checked between probes.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a running scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub checked: u64,
    pub available: u64,
    pub registered: u64,
    pub rate_limited: u64,
    pub errored: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    fn new(stats: &ScanStats, elapsed: Duration) -> Self {
        Self {
            checked: stats.checked,
            available: stats.available,
            registered: stats.registered,
            rate_limited: stats.rate_limited,
            errored: stats.errored,
            elapsed,
        }
    }

    /// Checked domains per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.checked as f64 / secs
        } else {
            0.0
        }
    }
}

/// Receives scan events. Implementations must return quickly.
pub trait ScanObserver {
    fn on_start(&self, _tlds: &[String]) {}

    fn on_result(&self, _result: &ProbeResult, _stats: &ScanStats) {}

    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}

    fn on_finish(&self, _report: &ScanReport) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Report plus the error that ended a failed session.
#[derive(Debug)]
pub struct ScanOutcome {
    pub report: ScanReport,
    pub error: Option<DomainSeekerError>,
}

impl ScanOutcome {
    pub fn status(&self) -> ScanStatus {
        self.report.status
    }

    pub fn into_result(self) -> Result<ScanReport, DomainSeekerError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

/// Why the scan loop stopped without an error.
enum LoopExit {
    Exhausted,
    Interrupted,
}

/// One scan run: generator, resolver, statistics and result buffer.
pub struct ScanSession<T: RdapTransport = HttpTransport> {
    config: ScanConfig,
    generator: DomainGenerator,
    resolver: RdapResolver<T>,
    stats: ScanStats,
    discovered: Vec<DiscoveredDomain>,
    interrupt: InterruptFlag,
    observer: Box<dyn ScanObserver>,
}

impl ScanSession<HttpTransport> {
    /// Session with an HTTP-backed resolver.
    pub fn new(config: ScanConfig) -> Result<Self, DomainSeekerError> {
        let resolver = RdapResolver::new(&config)?;
        Ok(Self::with_resolver(config, resolver))
    }
}

impl<T: RdapTransport> ScanSession<T> {
    pub fn with_resolver(config: ScanConfig, resolver: RdapResolver<T>) -> Self {
        let stats = ScanStats::new(&config.tlds);
        Self {
            config,
            generator: DomainGenerator::new(),
            resolver,
            stats,
            discovered: Vec::new(),
            interrupt: InterruptFlag::new(),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_observer<O: ScanObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Handle that stops the scan at the next probe boundary.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Scan every candidate from `source` against the configured TLDs.
    pub async fn run(mut self, source: DomainSource) -> ScanOutcome {
        let started_at = Local::now();
        let started = Instant::now();

        info!(
            source = %source.describe(),
            tlds = %self.config.tlds.join(","),
            "Starting scan"
        );

        let (status, error) = match self.scan(source, started).await {
            Ok(LoopExit::Exhausted) => (ScanStatus::Completed, None),
            Ok(LoopExit::Interrupted) => (ScanStatus::Interrupted, None),
            Err(e) => (ScanStatus::Failed, Some(e)),
        };

        self.finalize(status, error, started_at, started.elapsed())
    }

    async fn prepare(&mut self) {
        for tld in &self.config.tlds {
            if self.resolver.has_direct_server(tld) && self.config.prefer_direct {
                continue;
            }
            warn!(tld = %tld, "No direct RDAP server for TLD, using generic registry");

            if self.config.verify_tlds {
                let support = self.resolver.check_tld_support(tld).await;
                if !support.has_rdap {
                    warn!(tld = %tld, status = ?support.status, "IANA lists no RDAP service for TLD");
                }
            }
        }
        self.observer.on_start(&self.config.tlds);
    }

    async fn scan(&mut self, source: DomainSource, started: Instant) -> Result<LoopExit, DomainSeekerError> {
        self.prepare().await;

        let Self {
            config,
            generator,
            resolver,
            stats,
            discovered,
            interrupt,
            observer,
        } = self;

        let mut last_progress = started;

        let mut candidates = generator.candidates(source)?;

        while let Some(candidate) = candidates.next_candidate().await {
            let candidate = candidate?;

            for tld in &config.tlds {
                if interrupt.is_set() {
                    warn!("Scan interrupted");
                    return Ok(LoopExit::Interrupted);
                }

                let result = resolver.check_fqdn(&candidate.with_tld(tld), tld).await;
                stats.record(&result);
                if result.is_available() {
                    info!(domain = %result.domain, "Available domain found");
                    discovered.push(DiscoveredDomain::from(&result));
                }
                observer.on_result(&result, stats);

                if !config.delay.is_zero() {
                    tokio::time::sleep(config.delay).await;
                }

                if last_progress.elapsed() >= config.progress_interval {
                    observer.on_progress(&ProgressSnapshot::new(stats, started.elapsed()));
                    last_progress = Instant::now();
                }
            }
        }

        Ok(LoopExit::Exhausted)
    }

    fn finalize(
        self,
        status: ScanStatus,
        error: Option<DomainSeekerError>,
        started_at: chrono::DateTime<Local>,
        elapsed: Duration,
    ) -> ScanOutcome {
        let Self {
            config,
            generator,
            resolver,
            stats,
            discovered,
            observer,
            ..
        } = self;

        resolver.close();

        if let Some(e) = &error {
            warn!(error = %e, "Scan failed");
        }

        let report = ScanReport::new(
            status,
            error.as_ref().map(|e| e.to_string()),
            started_at,
            elapsed,
            config.tlds,
            stats,
            discovered,
        );

        info!(
            status = status.as_str(),
            checked = report.stats.checked,
            available = report.stats.available,
            candidates = generator.generated_count(),
            invalid = generator.invalid_count(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Scan finished"
        );

        observer.on_finish(&report);
        ScanOutcome { report, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::transport::{HeadResponse, TransportError};
    use crate::types::StatusKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// 404 for domains containing "free", 200 for everything else.
    struct FixedTransport;

    impl RdapTransport for FixedTransport {
        async fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
            Ok(HeadResponse::new(if url.contains("free") { 404 } else { 200 }))
        }

        async fn get_json(
            &self,
            _url: &str,
        ) -> Result<(u16, Option<serde_json::Value>), TransportError> {
            Ok((404, None))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        results: Rc<RefCell<Vec<StatusKind>>>,
        progress: Rc<RefCell<u32>>,
        finished: Rc<RefCell<u32>>,
    }

    impl ScanObserver for Recorder {
        fn on_result(&self, result: &ProbeResult, _stats: &ScanStats) {
            self.results.borrow_mut().push(result.status);
        }

        fn on_progress(&self, _snapshot: &ProgressSnapshot) {
            *self.progress.borrow_mut() += 1;
        }

        fn on_finish(&self, _report: &ScanReport) {
            *self.finished.borrow_mut() += 1;
        }
    }

    fn session(config: ScanConfig) -> ScanSession<FixedTransport> {
        let resolver = RdapResolver::with_transport(&config, FixedTransport);
        ScanSession::with_resolver(config, resolver)
    }

    fn config() -> ScanConfig {
        ScanConfig::default()
            .with_tlds(vec![".ch".to_string(), ".de".to_string()])
            .with_delay(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_product_order() {
        let recorder = Recorder::default();
        let outcome = session(config())
            .with_observer(recorder.clone())
            .run(DomainSource::callback("t", || vec!["taken", "free"]))
            .await;

        assert_eq!(outcome.status(), ScanStatus::Completed);
        assert_eq!(
            *recorder.results.borrow(),
            vec![
                StatusKind::Registered,
                StatusKind::Registered,
                StatusKind::Available,
                StatusKind::Available
            ]
        );
        let found: Vec<_> = outcome.report.discovered.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(found, vec!["free.ch", "free.de"]);
        assert_eq!(*recorder.finished.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_before_start() {
        let recorder = Recorder::default();
        let scan = session(config()).with_observer(recorder.clone());
        scan.interrupt_flag().trigger();

        let outcome = scan.run(DomainSource::callback("t", || vec!["taken"])).await;
        assert_eq!(outcome.status(), ScanStatus::Interrupted);
        assert_eq!(outcome.report.stats.checked, 0);
        assert!(outcome.error.is_none());
        assert_eq!(*recorder.finished.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_still_finalizes() {
        let recorder = Recorder::default();
        let outcome = session(config())
            .with_observer(recorder.clone())
            .run(DomainSource::file("/no/such/candidates.txt"))
            .await;

        assert_eq!(outcome.status(), ScanStatus::Failed);
        assert!(matches!(outcome.error, Some(DomainSeekerError::NotFound { .. })));
        assert!(outcome.report.error.is_some());
        assert_eq!(*recorder.finished.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_emitted_on_interval() {
        let recorder = Recorder::default();
        let config = config()
            .with_delay(Duration::from_secs(2))
            .with_progress_interval(Duration::from_secs(5));
        session(config)
            .with_observer(recorder.clone())
            .run(DomainSource::callback("t", || vec!["a1", "a2", "a3"]))
            .await;

        // 6 probes, 2s apart: snapshots after 6s and after 12s
        assert_eq!(*recorder.progress.borrow(), 2);
    }

    #[test]
    fn test_snapshot_rate() {
        let snapshot = ProgressSnapshot {
            checked: 10,
            available: 1,
            registered: 9,
            rate_limited: 0,
            errored: 0,
            elapsed: Duration::from_secs(5),
        };
        assert!((snapshot.rate() - 2.0).abs() < f64::EPSILON);
    }
}
