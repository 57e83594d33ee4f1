//! Configuration file parsing and management.
//!
//! This module handles loading scan settings from TOML files and `DS_*`
//! environment variables, merging them with proper precedence rules and
//! applying the result to a `ScanConfig`.

use crate::error::DomainSeekerError;
use crate::source::DomainSource;
use crate::types::{RouteKey, ScanConfig};
use crate::utils::{normalize_tld, validate_tld};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Candidate file used when no source is configured.
pub const DEFAULT_DOMAINS_FILE: &str = "domains.txt";

/// Delays below this are accepted but likely to get rate limited.
const LOW_DELAY_WARNING: f64 = 0.1;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Scan loop settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanSection>,

    /// Resolver settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap: Option<RdapSection>,

    /// Where candidates come from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSection>,

    /// Report and pointer log locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSection>,
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScanSection {
    /// TLDs to probe (a missing leading dot is added)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlds: Option<Vec<String>>,

    /// Pause after every probe, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,

    /// Retries per route on timeout or connection failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Seconds between progress snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_interval: Option<f64>,
}

/// `[rdap]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RdapSection {
    /// Use direct servers for TLDs that have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_direct: Option<bool>,

    /// Request timeout (as string, e.g., "10s", "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Default minimum seconds between requests to one route
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_interval: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Generic registry URL template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_registry: Option<String>,

    /// Run the IANA TLD support check at session start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_tlds: Option<bool>,

    /// Per-route minimum interval in seconds, keyed by host or "generic"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervals: Option<HashMap<String, f64>>,

    /// Extra direct servers, keyed by TLD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, String>>,
}

/// Kind of candidate source selected in `[source]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// File if configured, then command, then `domains.txt`
    #[default]
    Auto,
    File,
    Generator,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,

    /// Candidate file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Generator command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl SourceSection {
    /// Turn the section into a concrete source.
    pub fn resolve(&self) -> Result<DomainSource, DomainSeekerError> {
        match self.kind.unwrap_or_default() {
            SourceKind::File => Ok(DomainSource::file(
                self.file.as_deref().unwrap_or(DEFAULT_DOMAINS_FILE),
            )),
            SourceKind::Generator => {
                let command = self.command.as_deref().ok_or_else(|| {
                    DomainSeekerError::config("source.kind = \"generator\" requires source.command")
                })?;
                DomainSource::parse_command(command)
            }
            SourceKind::Auto => {
                if let Some(file) = &self.file {
                    Ok(DomainSource::file(file))
                } else if let Some(command) = &self.command {
                    DomainSource::parse_command(command)
                } else if Path::new(DEFAULT_DOMAINS_FILE).exists() {
                    Ok(DomainSource::file(DEFAULT_DOMAINS_FILE))
                } else {
                    Err(DomainSeekerError::config(format!(
                        "No domain source given: pass --file or --generator, or create {}",
                        DEFAULT_DOMAINS_FILE
                    )))
                }
            }
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSection {
    /// Text report path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,

    /// Pointer log path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer_log: Option<String>,
}

impl FileConfig {
    /// Layer file settings on top of `config`.
    pub fn apply_to(&self, mut config: ScanConfig) -> Result<ScanConfig, DomainSeekerError> {
        if let Some(scan) = &self.scan {
            if let Some(tlds) = &scan.tlds {
                config.tlds = tlds.iter().map(|t| normalize_tld(t)).collect();
            }
            if let Some(delay) = scan.delay {
                config.delay = seconds(delay, "scan.delay")?;
            }
            if let Some(max_retries) = scan.max_retries {
                config.max_retries = max_retries;
            }
            if let Some(interval) = scan.progress_interval {
                config.progress_interval = seconds(interval, "scan.progress_interval")?;
            }
        }

        if let Some(rdap) = &self.rdap {
            if let Some(prefer_direct) = rdap.prefer_direct {
                config.prefer_direct = prefer_direct;
            }
            if let Some(timeout) = &rdap.timeout {
                config.request_timeout = parse_duration_string(timeout).ok_or_else(|| {
                    DomainSeekerError::config(format!("Invalid timeout format '{}'", timeout))
                })?;
            }
            if let Some(interval) = rdap.min_interval {
                config.min_interval = seconds(interval, "rdap.min_interval")?;
            }
            if let Some(user_agent) = &rdap.user_agent {
                config.user_agent = user_agent.clone();
            }
            if let Some(url) = &rdap.generic_registry {
                config.generic_registry_url = url.clone();
            }
            if let Some(verify) = rdap.verify_tlds {
                config.verify_tlds = verify;
            }
            if let Some(intervals) = &rdap.intervals {
                for (key, secs) in intervals {
                    let interval = seconds(*secs, &format!("rdap.intervals.{}", key))?;
                    config
                        .route_intervals
                        .insert(RouteKey::from_config_key(key), interval);
                }
            }
            if let Some(servers) = &rdap.servers {
                for (tld, url) in servers {
                    config.direct_servers.insert(normalize_tld(tld), url.clone());
                }
            }
        }

        Ok(config)
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were loaded
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainSeekerError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainSeekerError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainSeekerError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let mut config: FileConfig = toml::from_str(&content)?;
        self.normalize_config(&mut config);
        self.validate_config(&config)?;

        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG is lowest, then the home directory, then the current directory.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainSeekerError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        if self.verbose {
            for path in &loaded_files {
                info!(path = %path.display(), "Using configuration file");
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./domain-seeker.toml", "./.domain-seeker.toml"];

        candidates
            .iter()
            .map(|candidate| Path::new(*candidate))
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-seeker.toml", "domain-seeker.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-seeker").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            scan: match (lower.scan, higher.scan) {
                (Some(mut lower_scan), Some(higher_scan)) => {
                    if higher_scan.tlds.is_some() {
                        lower_scan.tlds = higher_scan.tlds;
                    }
                    if higher_scan.delay.is_some() {
                        lower_scan.delay = higher_scan.delay;
                    }
                    if higher_scan.max_retries.is_some() {
                        lower_scan.max_retries = higher_scan.max_retries;
                    }
                    if higher_scan.progress_interval.is_some() {
                        lower_scan.progress_interval = higher_scan.progress_interval;
                    }
                    Some(lower_scan)
                }
                (lower_scan, higher_scan) => higher_scan.or(lower_scan),
            },
            rdap: match (lower.rdap, higher.rdap) {
                (Some(mut lower_rdap), Some(higher_rdap)) => {
                    if higher_rdap.prefer_direct.is_some() {
                        lower_rdap.prefer_direct = higher_rdap.prefer_direct;
                    }
                    if higher_rdap.timeout.is_some() {
                        lower_rdap.timeout = higher_rdap.timeout;
                    }
                    if higher_rdap.min_interval.is_some() {
                        lower_rdap.min_interval = higher_rdap.min_interval;
                    }
                    if higher_rdap.user_agent.is_some() {
                        lower_rdap.user_agent = higher_rdap.user_agent;
                    }
                    if higher_rdap.generic_registry.is_some() {
                        lower_rdap.generic_registry = higher_rdap.generic_registry;
                    }
                    if higher_rdap.verify_tlds.is_some() {
                        lower_rdap.verify_tlds = higher_rdap.verify_tlds;
                    }
                    lower_rdap.intervals = merge_maps(lower_rdap.intervals, higher_rdap.intervals);
                    lower_rdap.servers = merge_maps(lower_rdap.servers, higher_rdap.servers);
                    Some(lower_rdap)
                }
                (lower_rdap, higher_rdap) => higher_rdap.or(lower_rdap),
            },
            // A source is chosen as a whole, never field by field
            source: higher.source.or(lower.source),
            output: match (lower.output, higher.output) {
                (Some(mut lower_output), Some(higher_output)) => {
                    if higher_output.report.is_some() {
                        lower_output.report = higher_output.report;
                    }
                    if higher_output.pointer_log.is_some() {
                        lower_output.pointer_log = higher_output.pointer_log;
                    }
                    Some(lower_output)
                }
                (lower_output, higher_output) => higher_output.or(lower_output),
            },
        }
    }

    /// Add missing leading dots to configured TLDs.
    fn normalize_config(&self, config: &mut FileConfig) {
        if let Some(tlds) = config.scan.as_mut().and_then(|scan| scan.tlds.as_mut()) {
            for tld in tlds.iter_mut() {
                let normalized = normalize_tld(tld);
                if normalized != *tld {
                    debug!(from = %tld, to = %normalized, "Normalized TLD");
                    *tld = normalized;
                }
            }
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainSeekerError> {
        if let Some(scan) = &config.scan {
            if let Some(tlds) = &scan.tlds {
                if tlds.is_empty() {
                    return Err(DomainSeekerError::config("scan.tlds cannot be empty"));
                }
                for tld in tlds {
                    validate_tld(tld)?;
                }
            }

            if let Some(delay) = scan.delay {
                if delay < 0.0 || !delay.is_finite() {
                    return Err(DomainSeekerError::config("scan.delay must be >= 0"));
                }
                if delay < LOW_DELAY_WARNING {
                    warn!(delay, "Very small delay, servers are likely to rate limit the scan");
                }
            }
        }

        if let Some(rdap) = &config.rdap {
            if let Some(timeout) = &rdap.timeout {
                if parse_duration_string(timeout).is_none() {
                    return Err(DomainSeekerError::config(format!(
                        "Invalid timeout format '{}'. Use format like '10s', '500ms', '1m'",
                        timeout
                    )));
                }
            }

            if let Some(servers) = &rdap.servers {
                for (tld, url) in servers {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(DomainSeekerError::config(format!(
                            "Server URL for '{}' must start with http:// or https://",
                            tld
                        )));
                    }
                }
            }
        }

        if let Some(source) = &config.source {
            if source.kind == Some(SourceKind::Generator) && source.command.is_none() {
                return Err(DomainSeekerError::config(
                    "source.kind = \"generator\" requires source.command",
                ));
            }
        }

        Ok(())
    }
}

fn merge_maps<V>(
    lower: Option<HashMap<String, V>>,
    higher: Option<HashMap<String, V>>,
) -> Option<HashMap<String, V>> {
    match (lower, higher) {
        (Some(mut lower_map), Some(higher_map)) => {
            lower_map.extend(higher_map);
            Some(lower_map)
        }
        (lower_map, higher_map) => higher_map.or(lower_map),
    }
}

fn seconds(value: f64, field: &str) -> Result<Duration, DomainSeekerError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| DomainSeekerError::config(format!("{} must be a non-negative number", field)))
}

/// Environment variable configuration.
///
/// Values set via `DS_*` variables; they override files and are overridden
/// by command-line flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub tlds: Option<Vec<String>>,
    pub delay: Option<Duration>,
    pub max_retries: Option<u32>,
    pub prefer_direct: Option<bool>,
    pub timeout: Option<Duration>,
}

impl EnvConfig {
    /// Parse variables through `lookup`. Invalid values are warned about and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = EnvConfig::default();

        // DS_TLDS - comma-separated TLD list
        if let Some(tld_str) = lookup("DS_TLDS") {
            let tlds: Vec<String> = tld_str
                .split(',')
                .map(normalize_tld)
                .filter(|t| t.len() > 1)
                .collect();
            match tlds.iter().find_map(|t| validate_tld(t).err()) {
                Some(e) => warn!(value = %tld_str, error = %e, "Ignoring invalid DS_TLDS"),
                None if !tlds.is_empty() => env_config.tlds = Some(tlds),
                None => {}
            }
        }

        // DS_DELAY - seconds after every probe
        if let Some(val) = lookup("DS_DELAY") {
            match val.trim().parse::<f64>().ok().and_then(|d| Duration::try_from_secs_f64(d).ok()) {
                Some(delay) => env_config.delay = Some(delay),
                None => warn!(value = %val, "Ignoring invalid DS_DELAY, must be a number >= 0"),
            }
        }

        // DS_MAX_RETRIES
        if let Some(val) = lookup("DS_MAX_RETRIES") {
            match val.trim().parse::<u32>() {
                Ok(retries) => env_config.max_retries = Some(retries),
                Err(_) => warn!(value = %val, "Ignoring invalid DS_MAX_RETRIES"),
            }
        }

        // DS_PREFER_DIRECT - true/false
        if let Some(val) = lookup("DS_PREFER_DIRECT") {
            match parse_bool(&val) {
                Some(flag) => env_config.prefer_direct = Some(flag),
                None => warn!(value = %val, "Ignoring invalid DS_PREFER_DIRECT, use true/false"),
            }
        }

        // DS_TIMEOUT - "10s", "500ms", "1m"
        if let Some(val) = lookup("DS_TIMEOUT") {
            match parse_duration_string(&val) {
                Some(timeout) => env_config.timeout = Some(timeout),
                None => warn!(value = %val, "Ignoring invalid DS_TIMEOUT, use format like '10s'"),
            }
        }

        env_config
    }

    /// Layer environment settings on top of `config`.
    pub fn apply_to(&self, mut config: ScanConfig) -> ScanConfig {
        if let Some(tlds) = &self.tlds {
            config.tlds = tlds.clone();
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(prefer_direct) = self.prefer_direct {
            config.prefer_direct = prefer_direct;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout = timeout;
        }
        config
    }
}

/// Load configuration from the process environment.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    let env_config = EnvConfig::from_lookup(|name| env::var(name).ok());
    if verbose && env_config != EnvConfig::default() {
        info!(?env_config, "Using DS_* environment overrides");
    }
    env_config
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration string like "500ms", "5s", "2m" or a bare number of seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    let (number, scale) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, 1.0)
    } else if let Some(m) = value.strip_suffix('m') {
        (m, 60.0)
    } else {
        (value.as_str(), 1.0)
    };

    let amount = number.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(amount * scale).ok()
}
