//! Candidate generation.
//!
//! The generator turns a `DomainSource` into a lazy, deduplicated sequence
//! of validated base names. Invalid values are dropped and counted, never
//! propagated; source failures (missing file, bad encoding, failing
//! producer) end the sequence with an error.
//!
//! # Examples
//!
//! ```
//! use domain_seeker_lib::{DomainGenerator, DomainSource};
//!
//! # tokio_test::block_on(async {
//! let mut generator = DomainGenerator::new();
//! let source = DomainSource::callback("inline", || vec!["Alpha", "alpha", "-bad", "beta"]);
//! let names: Vec<String> = generator
//!     .candidates(source)
//!     .unwrap()
//!     .try_collect()
//!     .await
//!     .unwrap()
//!     .iter()
//!     .map(|c| c.to_string())
//!     .collect();
//! assert_eq!(names, vec!["alpha", "beta"]);
//! assert_eq!(generator.invalid_count(), 1);
//! # });
//! ```

use crate::error::DomainSeekerError;
use crate::source::{DomainSource, RawValues};
use crate::types::CandidateBase;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Invalid values logged individually before the rest are summarized.
const INVALID_LOG_LIMIT: usize = 5;

/// Raw values between two progress lines.
const PROGRESS_EVERY: usize = 10_000;

/// Validating, deduplicating candidate generator.
///
/// Deduplication memory lives as long as the generator (across sources)
/// until `reset` is called.
#[derive(Debug, Default)]
pub struct DomainGenerator {
    seen: HashSet<String>,
    invalid: usize,
}

impl DomainGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates read from a text file.
    pub fn from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Candidates<'_>, DomainSeekerError> {
        self.candidates(DomainSource::file(path.as_ref()))
    }

    /// Candidates from a callback or external program.
    pub fn from_external_source(
        &mut self,
        source: DomainSource,
    ) -> Result<Candidates<'_>, DomainSeekerError> {
        self.candidates(source)
    }

    /// Open `source` and return its lazy candidate sequence.
    pub fn candidates(&mut self, source: DomainSource) -> Result<Candidates<'_>, DomainSeekerError> {
        let origin = source.describe();
        let raw = source.open().inspect_err(|e| {
            warn!(origin = %origin, error = %e, "Failed to open domain source");
        })?;
        info!(origin = %origin, "Loading candidates");

        Ok(Candidates {
            generator: self,
            raw,
            origin,
            processed: 0,
            valid: 0,
            invalid: 0,
            finished: false,
        })
    }

    /// Forget every value yielded so far.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.invalid = 0;
        tracing::debug!("Generator reset");
    }

    /// Unique valid candidates yielded since creation or the last reset.
    pub fn generated_count(&self) -> usize {
        self.seen.len()
    }

    /// Invalid raw values dropped since creation or the last reset.
    pub fn invalid_count(&self) -> usize {
        self.invalid
    }
}

/// Lazy candidate sequence borrowed from a `DomainGenerator`.
///
/// Yields each unique valid candidate once. After an error it is exhausted.
/// Values are pulled with `next_candidate`, which awaits file and process
/// reads instead of blocking the runtime.
pub struct Candidates<'a> {
    generator: &'a mut DomainGenerator,
    raw: RawValues,
    origin: String,
    processed: usize,
    valid: usize,
    invalid: usize,
    finished: bool,
}

impl Candidates<'_> {
    fn record_invalid(&mut self, value: &str, error: &DomainSeekerError) {
        self.invalid += 1;
        self.generator.invalid += 1;

        if self.invalid <= INVALID_LOG_LIMIT {
            warn!(origin = %self.origin, value, error = %error, "Skipping invalid candidate");
        } else if self.invalid == INVALID_LOG_LIMIT + 1 {
            warn!(origin = %self.origin, "More invalid candidates omitted");
        }
    }

    fn log_summary(&self) {
        info!(
            origin = %self.origin,
            processed = self.processed,
            valid = self.valid,
            invalid = self.invalid,
            "Candidate source exhausted"
        );
        if self.valid == 0 {
            warn!(origin = %self.origin, "Source produced no valid candidates");
        }
    }
}

impl Candidates<'_> {
    /// Next unique valid candidate; `None` once the source is exhausted.
    pub async fn next_candidate(&mut self) -> Option<Result<CandidateBase, DomainSeekerError>> {
        if self.finished {
            return None;
        }

        loop {
            let value = match self.raw.next_value().await {
                Some(Ok(value)) => value,
                Some(Err(e)) => {
                    self.finished = true;
                    warn!(origin = %self.origin, error = %e, "Domain source failed");
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    self.log_summary();
                    return None;
                }
            };

            self.processed += 1;
            if self.processed % PROGRESS_EVERY == 0 {
                info!(
                    origin = %self.origin,
                    processed = self.processed,
                    valid = self.valid,
                    "Processing candidates"
                );
            }

            match CandidateBase::parse(&value) {
                Ok(candidate) => {
                    if self.generator.seen.insert(candidate.as_str().to_string()) {
                        self.valid += 1;
                        return Some(Ok(candidate));
                    }
                }
                Err(e) => self.record_invalid(&value, &e),
            }
        }
    }

    /// Drain the sequence, stopping at the first source error.
    pub async fn try_collect(mut self) -> Result<Vec<CandidateBase>, DomainSeekerError> {
        let mut candidates = Vec::new();
        while let Some(candidate) = self.next_candidate().await {
            candidates.push(candidate?);
        }
        Ok(candidates)
    }
}
