//! Domain Seeker CLI Application
//!
//! A command-line interface for finding unregistered domains with RDAP.
//! Parses arguments, layers config file, environment and flags, then hands
//! the scan to domain-seeker-lib and writes the report.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_seeker_lib::{
    load_env_config, parse_duration_string, validate_tld, ConfigManager, DomainGenerator,
    DomainSource, FileConfig, PointerEntry, PointerLog, ScanConfig, ScanReport, ScanSession,
    ScanStatus,
};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Pointer log used when neither `--pointer-log` nor the config names one
const DEFAULT_POINTER_LOG: &str = "reports/pointers.jsonl";

/// CLI arguments for domain-seeker
#[derive(Parser, Debug)]
#[command(name = "domain-seeker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(about = "Find unregistered domains by probing RDAP servers")]
#[command(
    long_about = "Find unregistered domains by probing RDAP servers.\n\nEvery candidate name is combined with every TLD and checked against the TLD's\nRDAP server, falling back to rdap.org. Available domains are written to a report."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// TLDs to scan (comma-separated or multiple -t flags), e.g. .ch,.de
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Candidates")]
    pub tlds: Option<Vec<String>>,

    /// Candidate file (one base name per line)
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Candidates")]
    pub file: Option<String>,

    /// External program printing one base name per line
    #[arg(short = 'g', long = "generator", value_name = "CMD", help_heading = "Candidates")]
    pub generator: Option<String>,

    /// Print every candidate × TLD pair without probing
    #[arg(long = "dry-run", help_heading = "Candidates")]
    pub dry_run: bool,

    /// Seconds to wait after every probe
    #[arg(
        short = 'd',
        long = "delay",
        value_name = "SECS",
        allow_negative_numbers = true,
        help_heading = "Probing"
    )]
    pub delay: Option<f64>,

    /// Retries per route on timeouts and connection failures
    #[arg(short = 'r', long = "max-retries", value_name = "N", help_heading = "Probing")]
    pub max_retries: Option<u32>,

    /// Request timeout, e.g. 10s, 500ms
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Probing")]
    pub timeout: Option<String>,

    /// Always use the generic registry, never direct RDAP servers
    #[arg(long = "no-direct", help_heading = "Probing")]
    pub no_direct: bool,

    /// Ask IANA at startup whether TLDs without a direct server have RDAP
    #[arg(long = "verify-tlds", help_heading = "Probing")]
    pub verify_tlds: bool,

    /// Report file path
    #[arg(short = 'o', long = "output", value_name = "FILE", help_heading = "Output")]
    pub output: Option<String>,

    /// Pointer log recording where each report was written
    #[arg(long = "pointer-log", value_name = "FILE", help_heading = "Output")]
    pub pointer_log: Option<String>,

    /// Print the final report as JSON instead of console output
    #[arg(short = 'j', long = "json", help_heading = "Output")]
    pub json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(short = 'c', long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging and a line for every probed domain
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.verbose);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so stdout stays clean for results.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.file.is_some() && args.generator.is_some() {
        return Err("Cannot specify both --file and --generator".to_string());
    }

    if let Some(tlds) = &args.tlds {
        if tlds.is_empty() {
            return Err("At least one TLD is required".to_string());
        }
        for tld in tlds {
            validate_tld(tld.trim()).map_err(|e| e.to_string())?;
        }
    }

    if let Some(delay) = args.delay {
        if !delay.is_finite() || delay < 0.0 {
            return Err(format!("Delay must be >= 0, got {}", delay));
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_duration_string(timeout).is_none() {
            return Err(format!("Invalid timeout format '{}'", timeout));
        }
    }

    if matches!(&args.generator, Some(cmd) if cmd.trim().is_empty()) {
        return Err("Generator command cannot be empty".to_string());
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (config, file_config) = build_config(&args)?;
    let source = resolve_source(&args, &file_config)?;

    if args.dry_run {
        return print_dry_run(&config, source).await;
    }

    let report_path = report_path(&args, &file_config);
    let pointer_log = PointerLog::new(
        args.pointer_log
            .clone()
            .or_else(|| file_config.output.as_ref().and_then(|o| o.pointer_log.clone()))
            .unwrap_or_else(|| DEFAULT_POINTER_LOG.to_string()),
    );

    if !args.json {
        ui::print_header(&config, &source.describe());
    }

    let session = ScanSession::new(config)?;
    let interrupt = session.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current probe");
            interrupt.trigger();
        }
    });

    let session = if args.json {
        session
    } else {
        session.with_observer(ui::ConsoleObserver::new(args.verbose))
    };

    let outcome = session.run(source).await;
    let report_path = report_path.unwrap_or_else(|| default_report_path(&outcome.report));

    // The report is written whatever the outcome; a scan error is surfaced afterwards
    outcome.report.write_to(&report_path)?;
    pointer_log.append(&PointerEntry::new(
        outcome.report.tlds.clone(),
        report_path.display().to_string(),
    ))?;
    info!(
        report = %report_path.display(),
        pointer_log = %pointer_log.path().display(),
        "Report written"
    );

    if args.json {
        println!("{}", outcome.report.to_json()?);
    } else {
        ui::print_summary(&outcome.report, &report_path);
    }

    if outcome.status() == ScanStatus::Interrupted {
        info!("Scan interrupted, partial results saved");
    }

    outcome.into_result()?;
    Ok(())
}

/// Build the scan configuration: defaults < config file < DS_* env < CLI flags.
fn build_config(args: &Args) -> Result<(ScanConfig, FileConfig), Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let file_config = if let Some(explicit_config_path) = &args.config {
        info!(path = %explicit_config_path, "Using explicit config file (CLI --config)");
        config_manager
            .load_file(explicit_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", explicit_config_path, e))?
    } else if let Ok(env_config_path) = std::env::var("DS_CONFIG") {
        info!(path = %env_config_path, "Using explicit config file (DS_CONFIG env var)");
        config_manager
            .load_file(&env_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", env_config_path, e))?
    } else {
        config_manager.discover_and_load()?
    };

    let config = file_config.apply_to(ScanConfig::default())?;
    let config = load_env_config(args.verbose).apply_to(config);
    let config = apply_cli_args_to_config(config, args)?;

    Ok((config, file_config))
}

/// Apply CLI arguments to config (highest precedence).
///
/// Boolean flags only override when passed, so an absent flag never undoes
/// a config file or environment setting.
fn apply_cli_args_to_config(
    mut config: ScanConfig,
    args: &Args,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    if let Some(tlds) = &args.tlds {
        config.tlds = tlds.iter().map(|t| t.trim().to_lowercase()).collect();
    }
    if let Some(delay) = args.delay {
        config.delay = Duration::try_from_secs_f64(delay)?;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(timeout) = &args.timeout {
        config.request_timeout = parse_duration_string(timeout)
            .ok_or_else(|| format!("Invalid timeout format '{}'", timeout))?;
    }
    if args.no_direct {
        config.prefer_direct = false;
    }
    if args.verify_tlds {
        config.verify_tlds = true;
    }

    if config.tlds.is_empty() {
        return Err("No TLDs configured".into());
    }

    Ok(config)
}

/// Candidate source: CLI flags first, then the `[source]` section.
fn resolve_source(
    args: &Args,
    file_config: &FileConfig,
) -> Result<DomainSource, Box<dyn std::error::Error>> {
    if let Some(file) = &args.file {
        return Ok(DomainSource::file(file));
    }
    if let Some(command) = &args.generator {
        return Ok(DomainSource::parse_command(command)?);
    }

    Ok(file_config.source.clone().unwrap_or_default().resolve()?)
}

fn report_path(args: &Args, file_config: &FileConfig) -> Option<PathBuf> {
    args.output
        .clone()
        .or_else(|| file_config.output.as_ref().and_then(|o| o.report.clone()))
        .map(PathBuf::from)
}

fn default_report_path(report: &ScanReport) -> PathBuf {
    PathBuf::from(format!(
        "reports/domain_scan_{}.txt",
        report.started_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Print the candidate × TLD cross product, one domain per line.
async fn print_dry_run(
    config: &ScanConfig,
    source: DomainSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut generator = DomainGenerator::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    {
        let mut candidates = generator.candidates(source)?;
        while let Some(candidate) = candidates.next_candidate().await {
            let candidate = candidate?;
            for tld in &config.tlds {
                writeln!(out, "{}", candidate.with_tld(tld))?;
            }
        }
    }
    out.flush()?;

    info!(
        candidates = generator.generated_count(),
        invalid = generator.invalid_count(),
        tlds = config.tlds.len(),
        "Dry run finished"
    );
    Ok(())
}
