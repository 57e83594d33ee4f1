//! Console display logic for the domain-seeker CLI.
//!
//! Result lines, the periodic progress block, the scan header and the final
//! summary. Everything here goes to stdout; logs go to stderr.

use console::{pad_str, style, Alignment};
use domain_seeker_lib::{
    Outcome, ProbeResult, ProgressSnapshot, ScanConfig, ScanObserver, ScanReport, ScanStats,
    ScanStatus,
};
use std::path::Path;

const DOMAIN_WIDTH: usize = 36;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header before the scan starts.
pub fn print_header(config: &ScanConfig, source: &str) {
    println!(
        "{} {}",
        style("domain-seeker").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
    );

    let meta_parts = [
        format!("TLDs: {}", config.tlds.join(", ")),
        format!("Source: {}", source),
        format!("Delay: {:.1}s", config.delay.as_secs_f64()),
        format!("Retries: {}", config.max_retries),
        format!(
            "Routes: {}",
            if config.prefer_direct { "direct first" } else { "generic only" }
        ),
    ];
    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Live results ─────────────────────────────────────────────────────────────

/// Prints scan events as they happen.
///
/// Available domains are always shown; other results only in verbose mode.
pub struct ConsoleObserver {
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ScanObserver for ConsoleObserver {
    fn on_result(&self, result: &ProbeResult, stats: &ScanStats) {
        let outcome = result.status.outcome();
        if outcome != Outcome::Available && !self.verbose {
            return;
        }

        let padded = pad_str(&result.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
        let counter = style(format!("[{}]", stats.checked)).dim();

        match outcome {
            Outcome::Available => println!(
                "  {} {}  {}",
                counter,
                style(&padded).white(),
                style("AVAILABLE").green().bold(),
            ),
            Outcome::Registered => println!(
                "  {} {}  {}",
                counter,
                style(&padded).white(),
                style("TAKEN").dim(),
            ),
            Outcome::RateLimited => println!(
                "  {} {}  {}  {}",
                counter,
                style(&padded).white(),
                style("RATE LIMITED").yellow(),
                style(brief_reason(result)).dim(),
            ),
            Outcome::Errored => println!(
                "  {} {}  {}  {}",
                counter,
                style(&padded).white(),
                style("ERROR").red(),
                style(brief_reason(result)).dim(),
            ),
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        println!(
            "  {} {} checked  {}  {}  {}  {}  {}  {:.2}/s",
            style("──").dim(),
            style(snapshot.checked).bold(),
            style("|").dim(),
            style(format!("{} available", snapshot.available)).green(),
            style(format!("{} rate limited", snapshot.rate_limited)).yellow(),
            style(format!("{} errors", snapshot.errored)).red(),
            style("|").dim(),
            snapshot.rate(),
        );
    }
}

/// Short reason for a non-available result, e.g. "(timeout)".
fn brief_reason(result: &ProbeResult) -> String {
    match result.raw_code {
        Some(code) => format!("({}, HTTP {})", result.status.as_str(), code),
        None => format!("({})", result.status.as_str()),
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary with per-TLD availability.
pub fn print_summary(report: &ScanReport, report_path: &Path) {
    let stats = &report.stats;

    println!();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!("  {}", status_header(report.status));
    if let Some(error) = &report.error {
        println!("  {}", style(error).red());
    }
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}  {}  {}",
        style(stats.checked).bold(),
        if stats.checked == 1 { "" } else { "s" },
        report.duration_secs,
        style("|").dim(),
        style(format!("{} available", stats.available)).green(),
        style("|").dim(),
        style(format!("{} taken", stats.registered)).dim(),
        style("|").dim(),
        style(format!("{} rate limited", stats.rate_limited)).yellow(),
        style("|").dim(),
        style(format!("{} errors", stats.errored)).red(),
    );

    for tld in &report.tld_breakdown {
        println!(
            "    {}  {} / {} available ({:.1}%)",
            style(pad_str(&tld.tld, 10, Alignment::Left, None)).cyan(),
            tld.available,
            tld.checked,
            tld.availability_pct,
        );
    }

    println!(
        "  {} {}",
        style("Report:").dim(),
        style(report_path.display()).underlined()
    );
}

fn status_header(status: ScanStatus) -> String {
    match status {
        ScanStatus::Completed => style("Scan completed").green().bold().to_string(),
        ScanStatus::Interrupted => style("Scan interrupted, partial results saved")
            .yellow()
            .bold()
            .to_string(),
        ScanStatus::Failed => style("Scan failed").red().bold().to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use domain_seeker_lib::StatusKind;

    #[test]
    fn test_brief_reason_with_code() {
        let mut result = ProbeResult::new("a.ch", ".ch", StatusKind::ServerError);
        result.raw_code = Some(500);
        assert_eq!(brief_reason(&result), "(server_error, HTTP 500)");
    }

    #[test]
    fn test_brief_reason_without_code() {
        let result = ProbeResult::new("a.ch", ".ch", StatusKind::Timeout);
        assert_eq!(brief_reason(&result), "(timeout)");
    }

    #[test]
    fn test_status_header_text() {
        console::set_colors_enabled(false);
        assert_eq!(status_header(ScanStatus::Completed), "Scan completed");
        assert!(status_header(ScanStatus::Interrupted).contains("partial results"));
    }
}
