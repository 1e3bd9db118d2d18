// # puffd - Puff Daemon
//
// This is a thin integration layer. All monitoring logic lives in puff-core.
//
// The puffd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the file sources, WHOIS probe and dispatcher into a MonitorEngine
// 4. Running the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Monitor
// - `PUFF_CONFIG_DIR`: Directory holding `list.yml` and `whois.yml` (default `./data`)
// - `PUFF_QUERY_FREQUENCY_SECONDS`: Seconds between cycles (default 300)
// - `PUFF_PROBE_TIMEOUT_SECS`: Per-probe deadline (default 10)
// - `PUFF_NOTICE_THRESHOLD`: Consecutive observations before the final notice (default 3)
// - `PUFF_MAX_CONCURRENT_PROBES`: WHOIS queries in flight (default 16)
// - `PUFF_STATUS_PATH`: Write a JSON status snapshot here after every cycle (optional)
// - `PUFF_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ### Mail
// - `PUFF_SMTP_SERVER`: SMTP host; notifications are only logged when unset
// - `PUFF_SMTP_PORT`: 25 (plain), 465 (TLS) or other (STARTTLS); default 587
// - `PUFF_SMTP_USERNAME` / `PUFF_SMTP_PASSWORD`: Login
// - `PUFF_RECIPIENT_EMAIL`: Notification recipient
//
// ## Example
//
// ```bash
// export PUFF_CONFIG_DIR=/var/lib/puff
// export PUFF_QUERY_FREQUENCY_SECONDS=600
// export PUFF_SMTP_SERVER=smtp.example.com
// export PUFF_SMTP_USERNAME=puff@example.com
// export PUFF_SMTP_PASSWORD=secret
// export PUFF_RECIPIENT_EMAIL=me@example.com
//
// puffd
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use puff_core::traits::NotificationDispatcher;
use puff_core::{
    FileSources, LogDispatcher, MonitorConfig, MonitorEngine, MonitorEvent, Scheduler,
    StatusStore,
};
use puff_whois::WhoisProbe;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for letting the in-flight cycle finish on shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PuffExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PuffExitCode> for ExitCode {
    fn from(code: PuffExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    config_dir: PathBuf,
    monitor: MonitorConfig,
    status_path: Option<PathBuf>,
    log_level: String,
    #[cfg(feature = "smtp")]
    smtp: Option<puff_notifier_smtp::SmtpConfig>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let monitor = MonitorConfig::new()
            .with_interval_secs(parse_var(&var, "PUFF_QUERY_FREQUENCY_SECONDS", 300)?)
            .with_probe_timeout_secs(parse_var(&var, "PUFF_PROBE_TIMEOUT_SECS", 10)?)
            .with_notice_threshold(parse_var(&var, "PUFF_NOTICE_THRESHOLD", 3)?)
            .with_max_concurrent_probes(parse_var(&var, "PUFF_MAX_CONCURRENT_PROBES", 16)?);

        Ok(Self {
            config_dir: var("PUFF_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            monitor,
            status_path: var("PUFF_STATUS_PATH").map(PathBuf::from),
            log_level: var("PUFF_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            #[cfg(feature = "smtp")]
            smtp: puff_notifier_smtp::SmtpConfig::from_lookup(&lookup)
                .context("Invalid SMTP settings")?,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.monitor
            .validate()
            .context("Invalid monitor settings")?;

        if self.config_dir.as_os_str().is_empty() {
            anyhow::bail!("PUFF_CONFIG_DIR cannot be empty");
        }

        if let Some(path) = &self.status_path
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "PUFF_STATUS_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        log_level(&self.log_level)?;
        Ok(())
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "PUFF_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return PuffExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return PuffExitCode::ConfigError.into();
    }

    // Initialize tracing
    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PuffExitCode::ConfigError.into();
    }

    info!("Starting puffd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PuffExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let daemon = match start_daemon(&config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return PuffExitCode::ConfigError;
            }
        };

        match run_until_shutdown(daemon).await {
            Ok(()) => PuffExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                PuffExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Running daemon components
struct Daemon {
    scheduler: Scheduler,
    exporter: tokio::task::JoinHandle<()>,
}

/// Wire everything together and start the scheduler
async fn start_daemon(config: &Config) -> Result<Daemon> {
    let sources = Arc::new(
        FileSources::open(&config.config_dir)
            .await
            .with_context(|| format!("Failed to open {}", config.config_dir.display()))?,
    );
    info!("Using configuration directory {}", config.config_dir.display());

    let dispatcher = build_dispatcher(config)?;
    let store = StatusStore::new();

    let (engine, event_rx) = MonitorEngine::new(
        Arc::new(WhoisProbe::new()),
        dispatcher,
        sources.clone(),
        sources,
        store.clone(),
        config.monitor.clone(),
    )?;

    let exporter = tokio::spawn(consume_events(event_rx, store, config.status_path.clone()));

    let scheduler = Scheduler::new(Arc::new(engine));
    scheduler
        .start(config.monitor.interval())
        .await
        .context("Failed to load domain list or WHOIS servers")?;

    info!(
        "Monitoring every {}s (probe timeout {}s, notice threshold {})",
        config.monitor.interval_secs, config.monitor.probe_timeout_secs, config.monitor.notice_threshold
    );

    Ok(Daemon {
        scheduler,
        exporter,
    })
}

#[cfg(feature = "smtp")]
fn build_dispatcher(config: &Config) -> Result<Arc<dyn NotificationDispatcher>> {
    match &config.smtp {
        Some(smtp) => {
            info!("Sending notifications to {} via {}:{}", smtp.recipient, smtp.server, smtp.port);
            Ok(Arc::new(puff_notifier_smtp::SmtpDispatcher::new(smtp.clone())?))
        }
        None => {
            warn!("PUFF_SMTP_SERVER not set, notifications will only be logged");
            Ok(Arc::new(LogDispatcher::new()))
        }
    }
}

#[cfg(not(feature = "smtp"))]
fn build_dispatcher(_config: &Config) -> Result<Arc<dyn NotificationDispatcher>> {
    warn!("Built without SMTP support, notifications will only be logged");
    Ok(Arc::new(LogDispatcher::new()))
}

/// Log monitor events and export the status snapshot after every cycle
async fn consume_events(
    mut event_rx: mpsc::Receiver<MonitorEvent>,
    store: StatusStore,
    status_path: Option<PathBuf>,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            MonitorEvent::CycleCompleted { report } => {
                debug!("Cycle report: {:?}", report);
                if let Some(path) = &status_path {
                    let snapshot = store.snapshot().await;
                    if let Err(e) = puff_core::store::write_snapshot(path, &snapshot).await {
                        warn!("Failed to write status snapshot to {}: {}", path.display(), e);
                    }
                }
            }
            MonitorEvent::DeliveryFailed { count, error } => {
                warn!("{} notification(s) will be retried next cycle: {}", count, error);
            }
            other => debug!("Monitor event: {:?}", other),
        }
    }
}

/// Wait for a shutdown signal, then stop the scheduler gracefully
async fn run_until_shutdown(daemon: Daemon) -> Result<()> {
    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    let Daemon {
        scheduler,
        exporter,
    } = daemon;

    tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler.stop())
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))??;

    // Dropping the last engine handle closes the event channel.
    drop(scheduler);
    if let Err(e) = exporter.await {
        warn!("Event consumer ended abnormally: {}", e);
    }

    info!("Daemon stopped");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.config_dir, PathBuf::from("./data"));
        assert_eq!(config.monitor, MonitorConfig::default());
        assert_eq!(config.status_path, None);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn monitor_settings_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("PUFF_QUERY_FREQUENCY_SECONDS", "60"),
            ("PUFF_PROBE_TIMEOUT_SECS", "5"),
            ("PUFF_NOTICE_THRESHOLD", "1"),
            ("PUFF_MAX_CONCURRENT_PROBES", "4"),
            ("PUFF_CONFIG_DIR", "/tmp/puff"),
        ]))
        .unwrap();

        assert_eq!(config.monitor.interval(), Duration::from_secs(60));
        assert_eq!(config.monitor.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.monitor.notice_threshold, 1);
        assert_eq!(config.monitor.max_concurrent_probes, 4);
        assert_eq!(config.config_dir, PathBuf::from("/tmp/puff"));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("PUFF_QUERY_FREQUENCY_SECONDS", "5m")])).unwrap_err();
        assert!(err.to_string().contains("PUFF_QUERY_FREQUENCY_SECONDS"));
    }

    #[test]
    fn zero_values_fail_validation() {
        let config = Config::from_lookup(lookup(&[("PUFF_NOTICE_THRESHOLD", "0")])).unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_lookup(lookup(&[("PUFF_QUERY_FREQUENCY_SECONDS", "0")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let config = Config::from_lookup(lookup(&[("PUFF_LOG_LEVEL", "verbose")])).unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_lookup(lookup(&[("PUFF_LOG_LEVEL", "DEBUG")])).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_status_directory_fails_validation() {
        let config = Config::from_lookup(lookup(&[(
            "PUFF_STATUS_PATH",
            "/nonexistent-puff-dir/status.json",
        )]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "smtp")]
    #[test]
    fn smtp_is_optional() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.smtp.is_none());

        let config = Config::from_lookup(lookup(&[
            ("PUFF_SMTP_SERVER", "smtp.example.com"),
            ("PUFF_SMTP_USERNAME", "puff@example.com"),
            ("PUFF_RECIPIENT_EMAIL", "me@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.smtp.unwrap().port, 587);
    }
}
