//! Scan reports and the pointer log.
//!
//! A `ScanReport` is assembled once when a scan session finalizes. It can
//! be rendered as the plain-text report file or serialized to JSON. The
//! pointer log is an append-only JSON-lines file recording where each
//! report ended up.

use crate::error::DomainSeekerError;
use crate::types::{ProbeResult, ScanStats, StatusKind, TldStats};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a scan session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Completed,
    Interrupted,
    Failed,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }
}

/// An available domain found during the scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDomain {
    pub domain: String,
    pub tld: String,
    pub status: StatusKind,
    pub checked_at: DateTime<Local>,
}

impl From<&ProbeResult> for DiscoveredDomain {
    fn from(result: &ProbeResult) -> Self {
        Self {
            domain: result.domain.clone(),
            tld: result.tld.clone(),
            status: result.status,
            checked_at: result.checked_at,
        }
    }
}

/// Per-TLD line of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TldBreakdown {
    pub tld: String,
    pub checked: u64,
    pub available: u64,
    pub availability_pct: f64,
}

impl From<&TldStats> for TldBreakdown {
    fn from(stats: &TldStats) -> Self {
        Self {
            tld: stats.tld.clone(),
            checked: stats.checked,
            available: stats.available,
            availability_pct: stats.availability_pct(),
        }
    }
}

/// Final report of a scan session.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub status: ScanStatus,

    /// Message of the error that ended a failed session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,

    #[serde(skip)]
    pub duration: Duration,

    pub duration_secs: f64,
    pub tlds: Vec<String>,
    pub stats: ScanStats,
    pub tld_breakdown: Vec<TldBreakdown>,
    pub discovered: Vec<DiscoveredDomain>,
}

impl ScanReport {
    pub fn new(
        status: ScanStatus,
        error: Option<String>,
        started_at: DateTime<Local>,
        duration: Duration,
        tlds: Vec<String>,
        stats: ScanStats,
        discovered: Vec<DiscoveredDomain>,
    ) -> Self {
        let tld_breakdown = stats.per_tld.iter().map(TldBreakdown::from).collect();
        Self {
            status,
            error,
            started_at,
            finished_at: Local::now(),
            duration,
            duration_secs: duration.as_secs_f64(),
            tlds,
            stats,
            tld_breakdown,
            discovered,
        }
    }

    /// Checked domains per second.
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.stats.checked as f64 / secs
        } else {
            0.0
        }
    }

    pub fn to_json(&self) -> Result<String, DomainSeekerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text report: header, table of available domains, statistics.
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    /// Write the text report, creating parent directories as needed.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), DomainSeekerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainSeekerError::file_error(parent.display().to_string(), e.to_string()))?;
        }
        std::fs::write(path, self.render_text())
            .map_err(|e| DomainSeekerError::file_error(path.display().to_string(), e.to_string()))
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            out,
            "# Domain availability scan - {}",
            self.started_at.format(TIME_FORMAT)
        )?;
        writeln!(out, "# TLDs: {}", self.tlds.join(", "))?;
        writeln!(out, "# Status: {}", self.status.as_str())?;
        if let Some(error) = &self.error {
            writeln!(out, "# Error: {}", error)?;
        }
        writeln!(out)?;

        writeln!(out, "{:<40} | {:<12} | {:<12} | checked at", "domain", "status", "label")?;
        writeln!(out, "{}", "-".repeat(90))?;
        for found in &self.discovered {
            writeln!(
                out,
                "{:<40} | {:<12} | {:<12} | {}",
                found.domain,
                found.status.as_str(),
                found.status.label(),
                found.checked_at.format(TIME_FORMAT)
            )?;
        }
        if self.discovered.is_empty() {
            writeln!(out, "(no available domains found)")?;
        }

        let stats = &self.stats;
        writeln!(out)?;
        writeln!(out, "# --- Statistics ---")?;
        writeln!(out, "# Finished: {}", self.finished_at.format(TIME_FORMAT))?;
        writeln!(out, "# Checked: {}", stats.checked)?;
        writeln!(out, "# Available: {}", stats.available)?;
        writeln!(out, "# Registered: {}", stats.registered)?;
        writeln!(out, "# Rate limited: {}", stats.rate_limited)?;
        writeln!(out, "# Errors: {}", stats.errored)?;
        writeln!(out, "# Duration: {:.1}s", self.duration_secs)?;
        writeln!(out, "# Rate: {:.2} domains/s", self.rate())?;

        if !self.tld_breakdown.is_empty() {
            writeln!(out)?;
            writeln!(out, "# --- Per-TLD statistics ---")?;
            for tld in &self.tld_breakdown {
                writeln!(
                    out,
                    "# {}: checked {}, available {} ({:.1}%)",
                    tld.tld, tld.checked, tld.available, tld.availability_pct
                )?;
            }
        }

        Ok(())
    }
}

/// One pointer log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEntry {
    pub timestamp: DateTime<Local>,
    pub tlds: Vec<String>,
    pub location: String,
}

impl PointerEntry {
    pub fn new<L: Into<String>>(tlds: Vec<String>, location: L) -> Self {
        Self {
            timestamp: Local::now(),
            tlds,
            location: location.into(),
        }
    }
}

/// Append-only JSON-lines log of report locations.
#[derive(Debug, Clone)]
pub struct PointerLog {
    path: PathBuf,
}

impl PointerLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &PointerEntry) -> Result<(), DomainSeekerError> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.file_error(e))?;
        writeln!(file, "{}", line).map_err(|e| self.file_error(e))
    }

    /// All records, oldest first. A missing log reads as empty.
    pub fn read_all(&self) -> Result<Vec<PointerEntry>, DomainSeekerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path).map_err(|e| self.file_error(e))?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.file_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    fn file_error(&self, err: std::io::Error) -> DomainSeekerError {
        DomainSeekerError::file_error(self.path.display().to_string(), err.to_string())
    }
}
