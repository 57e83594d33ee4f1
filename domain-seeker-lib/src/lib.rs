//! # Domain Seeker Library
//!
//! Find unregistered domain names by probing RDAP servers.
//!
//! The library combines three pieces: a candidate generator that validates
//! and deduplicates base names from a file, a callback or an external
//! program; an RDAP resolver that rate limits, retries and falls back from
//! direct servers to the generic registry; and a scan session that drives
//! every candidate × TLD pair through the resolver and produces a report.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_seeker_lib::{DomainSource, ScanConfig, ScanSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::default().with_tlds(vec![".ch".to_string(), ".de".to_string()]);
//!     let session = ScanSession::new(config)?;
//!
//!     let report = session.run(DomainSource::file("domains.txt")).await.into_result()?;
//!     for found in &report.discovered {
//!         println!("{} is available", found.domain);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Per-route rate limiting**: each RDAP server is spaced independently
//! - **Retry and fallback**: timeouts retry, direct servers fall back to rdap.org once
//! - **Lazy candidates**: files and generator processes are streamed, not loaded
//! - **Always a report**: interrupted and failed scans still finalize

// Re-export main public API types and functions
// This makes them available as domain_seeker_lib::TypeName
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, FileConfig, OutputSection,
    SourceKind, SourceSection,
};
pub use error::DomainSeekerError;
pub use generate::{Candidates, DomainGenerator};
pub use protocols::{
    get_direct_server_map, HeadResponse, HttpTransport, RdapResolver, RdapTransport, Route,
    TldSupport, TldSupportStatus, TransportError,
};
pub use report::{DiscoveredDomain, PointerEntry, PointerLog, ScanReport, ScanStatus, TldBreakdown};
pub use scanner::{InterruptFlag, NoopObserver, ProgressSnapshot, ScanObserver, ScanOutcome, ScanSession};
pub use source::DomainSource;
pub use types::{
    Availability, CandidateBase, Outcome, ProbeResult, RouteKey, ScanConfig, ScanStats, StatusKind,
    TldStats,
};
pub use utils::{normalize_tld, validate_tld};

// Public modules
pub mod config;
pub mod generate;
pub mod protocols;
pub mod report;
pub mod scanner;
pub mod source;

// Internal modules
mod error;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DomainSeekerError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
