// # ddnsd - DDNS Daemon
//
// The ddnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Loading the provider credentials (fatal on failure, before any request)
// 3. Wiring the DynDNS2 updater and the systemd restarter into the engine
// 4. Running the engine until a fatal error or a signal
//
// Update, recovery and retry logic lives in ddns-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Provider
// - `DDNS_HOSTNAME`: Record to keep updated (required)
// - `DDNS_UPDATE_URL`: DynDNS2 endpoint (default: Google Domains)
// - `DDNS_CREDENTIALS_PATH`: JSON credentials file (default: ~/.credentials/dnscreds)
// - `DDNS_HTTP_TIMEOUT_SECS`: Request timeout (default: 10)
// - `DDNS_CA_BUNDLE`: Extra PEM certificates to trust
// - `DDNS_TLS_INSECURE`: Skip certificate verification (default: false)
//
// ### Network recovery
// - `DDNS_RELOAD_COMMAND`: Run before the restart, failure ignored
// - `DDNS_RESTART_COMMAND`: Restarts networking
// - `DDNS_RESTART_TIMEOUT_SECS`: Upper bound per command (default: 60)
//
// ### Engine
// - `DDNS_UPDATE_INTERVAL_SECS`: Seconds between updates (default: 180)
// - `DDNS_STARTUP_FAILURE`: `exit` or `continue` (default: continue)
// - `DDNS_POST_RESTART_FAILURE`: `exit` or `continue` (default: exit)
//
// ### Diagnostics
// - `DDNS_DEBUG_ADDR`: Loopback address for `/debug/vars` (disabled if unset)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DDNS_HOSTNAME=home.example.net
// export DDNS_DEBUG_ADDR=127.0.0.1:6060
//
// ddnsd
// ```

mod debug;

use anyhow::Result;
use ddns_core::credentials::default_credentials_path;
use ddns_core::traits::{DnsUpdaterFactory, NetworkRestarterFactory};
use ddns_core::{Credentials, DdnsConfig, DdnsEngine, EngineEvent, EngineStats, FailurePolicy};
use ddns_provider_dyndns::{DynDnsFactory, TrustPool};
use ddns_restart_systemd::SystemdFactory;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

use crate::debug::SharedStats;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
/// - 3: Terminated by a signal the daemon does not expect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure (including credentials)
    ConfigError = 1,
    /// Runtime error (engine stopped on a fatal failure)
    RuntimeError = 2,
    /// Unexpected signal
    UnexpectedSignal = 3,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    ddns: DdnsConfig,
    debug_addr: Option<SocketAddr>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hostname = get("DDNS_HOSTNAME").unwrap_or_default();
        let credentials_path = match get("DDNS_CREDENTIALS_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_credentials_path()?,
        };

        let mut ddns = DdnsConfig::new(credentials_path, hostname.trim());

        if let Some(url) = get("DDNS_UPDATE_URL") {
            ddns.provider.update_url = url;
        }
        if let Some(secs) = parse_number(&get, "DDNS_HTTP_TIMEOUT_SECS")? {
            ddns.provider.timeout_secs = secs;
        }
        ddns.provider.tls.ca_bundle = get("DDNS_CA_BUNDLE").map(PathBuf::from);
        if let Some(insecure) = get("DDNS_TLS_INSECURE") {
            ddns.provider.tls.verify_certificates = !parse_bool("DDNS_TLS_INSECURE", &insecure)?;
        }

        if let Some(command) = lookup("DDNS_RELOAD_COMMAND") {
            ddns.restart.reload_command = split_command(&command);
        }
        if let Some(command) = lookup("DDNS_RESTART_COMMAND") {
            ddns.restart.restart_command = split_command(&command);
        }
        if let Some(secs) = parse_number(&get, "DDNS_RESTART_TIMEOUT_SECS")? {
            ddns.restart.timeout_secs = secs;
        }

        if let Some(secs) = parse_number(&get, "DDNS_UPDATE_INTERVAL_SECS")? {
            ddns.engine.update_interval_secs = secs;
        }
        if let Some(policy) = get("DDNS_STARTUP_FAILURE") {
            ddns.engine.startup_failure = policy.parse::<FailurePolicy>()?;
        }
        if let Some(policy) = get("DDNS_POST_RESTART_FAILURE") {
            ddns.engine.post_restart_failure = policy.parse::<FailurePolicy>()?;
        }

        let debug_addr = match get("DDNS_DEBUG_ADDR") {
            Some(addr) => Some(addr.trim().parse::<SocketAddr>().map_err(|e| {
                anyhow::anyhow!("DDNS_DEBUG_ADDR '{}' is not a socket address: {}", addr, e)
            })?),
            None => None,
        };

        Ok(Self {
            ddns,
            debug_addr,
            log_level: get("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks run before logging is initialized, so nothing here touches
    /// the network or the credentials file.
    fn validate(&self) -> Result<()> {
        let provider = &self.ddns.provider;

        if provider.hostname.is_empty() {
            anyhow::bail!(
                "DDNS_HOSTNAME is required. \
                Set it via: export DDNS_HOSTNAME=home.example.net"
            );
        }
        validate_domain_name(&provider.hostname)?;

        if !provider.update_url.starts_with("https://") && !provider.update_url.starts_with("http://")
        {
            anyhow::bail!(
                "DDNS_UPDATE_URL must use HTTP or HTTPS scheme. Got: {}",
                provider.update_url
            );
        }

        // Credentials travel in the Authorization header
        if provider.update_url.starts_with("http://") {
            eprintln!(
                "WARNING: DDNS_UPDATE_URL uses HTTP (not HTTPS). \
                Credentials will be sent in clear text."
            );
        }

        check_range(
            "DDNS_UPDATE_INTERVAL_SECS",
            self.ddns.engine.update_interval_secs,
            10..=86_400,
        )?;
        check_range("DDNS_HTTP_TIMEOUT_SECS", provider.timeout_secs, 1..=120)?;
        check_range(
            "DDNS_RESTART_TIMEOUT_SECS",
            self.ddns.restart.timeout_secs,
            1..=600,
        )?;

        if self.ddns.restart.restart_command.is_empty() {
            anyhow::bail!("DDNS_RESTART_COMMAND cannot be empty");
        }

        if let Some(addr) = self.debug_addr
            && !addr.ip().is_loopback()
        {
            anyhow::bail!(
                "DDNS_DEBUG_ADDR must be a loopback address (127.0.0.1 or ::1). Got: {}",
                addr
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.ddns.validate()?;

        Ok(())
    }
}

fn parse_number(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds. Got: {}", key, raw))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, raw),
    }
}

fn check_range(key: &str, value: u64, range: std::ops::RangeInclusive<u64>) -> Result<()> {
    if !range.contains(&value) {
        anyhow::bail!(
            "{} must be between {} and {}. Got: {}",
            key,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(())
}

/// Split a command line on whitespace (no shell quoting)
fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Validate that a string is a valid host name
///
/// Basic RFC 1035 checks; catches typos, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.len() > 253 {
        anyhow::bail!(
            "DDNS_HOSTNAME too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("DDNS_HOSTNAME has an empty label: '{}'", domain);
        }
        if label.len() > 63 {
            anyhow::bail!(
                "DDNS_HOSTNAME label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "DDNS_HOSTNAME label contains invalid characters: '{}'. \
                Valid: letters, digits and hyphen.",
                label
            );
        }
        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "DDNS_HOSTNAME label cannot start or end with hyphen: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");
    info!(
        "Updating {} via {} every {}s",
        config.ddns.provider.hostname,
        config.ddns.provider.update_url,
        config.ddns.engine.update_interval_secs
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(run_daemon(config));

    // A file read abandoned on a signal may still hold a blocking thread
    rt.shutdown_timeout(Duration::from_secs(1));
    info!("ddnsd exiting with code {}", code as u8);

    code.into()
}

/// Run the daemon until the engine stops or a signal arrives
async fn run_daemon(config: Config) -> DdnsExitCode {
    let mut signals = match Signals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::RuntimeError;
        }
    };

    let built = tokio::select! {
        built = build_engine(&config) => built,
        received = signals.recv() => return exit_for_signal(received),
    };

    let (engine, events) = match built {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let stats: SharedStats = Arc::new(RwLock::new(EngineStats::new()));
    tokio::spawn(collect_stats(events, stats.clone()));

    if let Some(addr) = config.debug_addr {
        debug::spawn(addr, stats).await;
    }

    // Dropping the engine future on a signal abandons the in-flight request
    // and kills a running restart command.
    tokio::select! {
        result = engine.run() => match result {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Engine stopped: {}", e);
                DdnsExitCode::RuntimeError
            }
        },
        received = signals.recv() => exit_for_signal(received),
    }
}

fn exit_for_signal(received: Received) -> DdnsExitCode {
    match received {
        Received::Shutdown(name) => {
            info!("Received shutdown signal: {}", name);
            DdnsExitCode::CleanShutdown
        }
        Received::Unexpected(name) => {
            warn!("Received unexpected signal: {}", name);
            DdnsExitCode::UnexpectedSignal
        }
    }
}

/// Load credentials and assemble the engine
///
/// Credentials are loaded first: a missing or malformed file stops
/// startup before any client is built or request is sent.
async fn build_engine(config: &Config) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let ddns = &config.ddns;

    info!("Loading credentials from {}", ddns.credentials_path.display());
    let credentials = Credentials::load(&ddns.credentials_path).await?;
    info!(
        "Loaded credentials for {} from {}",
        credentials.username(),
        ddns.credentials_path.display()
    );

    let pool = match &ddns.provider.tls.ca_bundle {
        Some(path) => {
            let pool = TrustPool::from_pem_file(path).await?;
            info!(
                "Trusting {} extra certificate(s) from {}",
                pool.extra_certificates(),
                path.display()
            );
            pool
        }
        None => TrustPool::bundled(),
    };

    let updater = DynDnsFactory::new(pool).create(&ddns.provider, &credentials)?;
    let restarter = SystemdFactory.create(&ddns.restart)?;
    info!(
        "Using {} updater and {} restarter",
        updater.provider_name(),
        restarter.restarter_name()
    );

    let (engine, events) = DdnsEngine::new(updater, restarter, ddns.engine.clone())?;
    Ok((engine, events))
}

/// Fold engine events into the shared statistics
async fn collect_stats(mut events: mpsc::Receiver<EngineEvent>, stats: SharedStats) {
    while let Some(event) = events.recv().await {
        stats.write().await.record(&event);
    }
}

/// Signal that ended the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Received {
    /// SIGINT, SIGTERM or SIGQUIT
    Shutdown(&'static str),
    /// Any other handled signal (SIGHUP)
    Unexpected(&'static str),
}

/// Installed signal handlers
///
/// Handlers are installed before the credentials are read, so a signal
/// at any point after configuration exits through the normal path.
#[cfg(unix)]
struct Signals {
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
    hangup: Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        let install = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| anyhow::anyhow!("Failed to setup {} handler: {}", name, e))
        };

        Ok(Self {
            interrupt: install(SignalKind::interrupt(), "SIGINT")?,
            terminate: install(SignalKind::terminate(), "SIGTERM")?,
            quit: install(SignalKind::quit(), "SIGQUIT")?,
            hangup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    async fn recv(&mut self) -> Received {
        tokio::select! {
            _ = self.interrupt.recv() => Received::Shutdown("SIGINT"),
            _ = self.terminate.recv() => Received::Shutdown("SIGTERM"),
            _ = self.quit.recv() => Received::Shutdown("SIGQUIT"),
            _ = self.hangup.recv() => Received::Unexpected("SIGHUP"),
        }
    }
}

/// Fallback for non-Unix platforms (CTRL-C only)
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Received {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Received::Shutdown("CTRL-C"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
