use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use poolwatch::alerts::{NotificationSink, SlackWebhook};
use poolwatch::collectors::LogTailer;
use poolwatch::config::Config;
use poolwatch::error::ConfigError;
use poolwatch::Watcher;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command-line arguments for the access log watcher
#[derive(Parser)]
#[command(
    name = "poolwatch",
    about = "Blue/green deployment watcher - failover and error-rate alerts from nginx access logs",
    long_about = "Follows an nginx access log, detects when traffic moves between the blue and \
                  green pools, tracks the 5xx rate over the most recent requests, and posts \
                  rate-limited alerts to a Slack incoming webhook."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format); environment variables override it"
    )]
    config: Option<PathBuf>,

    /// Access log to follow
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Access log path (overrides LOG_FILE and the config file)"
    )]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output, including every parsed request (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        // Missing config files fall back to defaults in load_config
        if let Some(ref config_path) = self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        // A log file that doesn't exist yet is waited for
        if let Some(ref log_path) = self.log_file {
            if log_path.is_dir() {
                return Err(format!(
                    "Log path is a directory, not a file: {}",
                    log_path.display()
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from file, environment and command line
///
/// A missing or invalid file falls back to defaults. Environment variables
/// override the file and `--log-file` overrides both.
///
/// # Errors
///
/// Returns `ConfigError` if an environment value cannot be parsed or the
/// final configuration is invalid.
fn load_config(
    config_path: Option<&Path>,
    log_file: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let base = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(_)) => {
                    warn!(
                        "Configuration file '{}' not found or unreadable, using defaults",
                        path.display()
                    );
                    Config::default()
                }
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration due to invalid config file");
                    Config::default()
                }
            }
        }
        None => Config::default(),
    };

    let mut config = base.with_overrides(lookup)?;
    if let Some(path) = log_file {
        config.log_file = path.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

/// Build the webhook sink, `None` when no endpoint is configured
fn build_sink(config: &Config) -> anyhow::Result<Option<Box<dyn NotificationSink>>> {
    match config.webhook_endpoint() {
        Some(url) => {
            let webhook = SlackWebhook::new(url, config.webhook_timeout())
                .context("Failed to create webhook client")?;
            Ok(Some(Box::new(webhook)))
        }
        None => Ok(None),
    }
}

fn log_banner(config: &Config) {
    let rule = "=".repeat(60);
    info!("{}", rule);
    info!("DEPLOYMENT WATCHER STARTING");
    info!("{}", rule);
    info!("Owner: {}", config.deployment_owner);
    info!("Environment: {}", config.environment_name);
    info!("Log file: {}", config.log_file.display());
    info!(
        "Slack webhook: {}",
        if config.webhook_endpoint().is_some() {
            "✓ configured"
        } else {
            "✗ NOT SET"
        }
    );
    info!("Error threshold: {:.1}%", config.error_rate_threshold);
    info!("Window size: {}", config.window_size);
    info!("Alert cooldown: {}s", config.alert_cooldown_seconds);
    info!("Maintenance mode: {}", config.maintenance_mode);
    info!("{}", rule);
}

/// Run the watcher until interrupted or the log source fails
fn run(config: Config, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let sink = build_sink(&config)?;
    let mut watcher = Watcher::from_config(&config, sink)?;
    let tailer = LogTailer::new(&config.log_file, config.poll_interval(), running);

    let result = watcher
        .run(tailer)
        .with_context(|| format!("Failed reading {}", config.log_file.display()));
    watcher.stats().log_summary();
    result
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match load_config(cli.config.as_deref(), cli.log_file.as_deref(), |key| {
        std::env::var(key).ok()
    }) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    log_banner(&config);

    // Set up signal handling for graceful shutdown (SIGINT, SIGTERM)
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        info!("👋 Shutting down watcher...");
        handler_flag.store(false, Ordering::SeqCst);
    })
    .expect("Error setting signal handler for graceful shutdown");

    if let Err(e) = run(config, running) {
        error!("💥 Error: {:#}", e);
        std::process::exit(1);
    }

    info!("Watcher stopped");
}
