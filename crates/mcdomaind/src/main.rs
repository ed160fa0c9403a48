// # mcdomaind - DomainOwner Reconciliation Daemon
//
// This is a THIN integration layer. All reconciliation, trigger and retry
// logic lives in mcdomain-core; configuration is via environment variables
// only.
//
// The mcdomaind daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the object store through the trigger registry
// 4. Replaying every watched object through the reconciliation engine
//
// The daemon exits once every DomainOwner has been reconciled, or earlier on
// SIGTERM/SIGINT.
//
// ## Configuration
//
// ### Object Store
// - `MCDOMAIN_STORE_TYPE`: Type of object store (file, memory)
// - `MCDOMAIN_STORE_PATH`: Path to the snapshot file (for file store)
//
// ### Reconciler
// - `MCDOMAIN_GATEWAY_SUFFIX`: Suffix for derived gateway addresses
//
// ### Engine
// - `MCDOMAIN_MAX_RETRIES`: Retries after a failed reconciliation
// - `MCDOMAIN_INITIAL_BACKOFF_MS`: Delay before the first retry
// - `MCDOMAIN_MAX_BACKOFF_MS`: Upper bound on any retry delay
//
// ### Logging
// - `MCDOMAIN_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export MCDOMAIN_STORE_TYPE=file
// export MCDOMAIN_STORE_PATH=/var/lib/mcdomain/objects.json
// export MCDOMAIN_GATEWAY_SUFFIX=xcc.test
//
// mcdomaind
// ```

use anyhow::{Context, Result};
use mcdomain_core::{
    EngineEvent, McdomainConfig, ObjectStore, ReconcileEngine, RetryPolicy, StoreConfig,
    TriggerRegistry, WatchEvent,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum McdomainExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<McdomainExitCode> for ExitCode {
    fn from(code: McdomainExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    store_type: String,
    store_path: Option<String>,
    gateway_suffix: Option<String>,
    max_retries: Option<usize>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("MCDOMAIN_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("MCDOMAIN_STORE_PATH").ok(),
            gateway_suffix: env::var("MCDOMAIN_GATEWAY_SUFFIX").ok(),
            max_retries: parse_var("MCDOMAIN_MAX_RETRIES")?,
            initial_backoff_ms: parse_var("MCDOMAIN_INITIAL_BACKOFF_MS")?,
            max_backoff_ms: parse_var("MCDOMAIN_MAX_BACKOFF_MS")?,
            log_level: env::var("MCDOMAIN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Semantic checks on the suffix and retry policy are left to
    /// `McdomainConfig::validate()`; this covers what only the daemon knows.
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "MCDOMAIN_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            match self.store_path.as_deref() {
                None => anyhow::bail!(
                    "MCDOMAIN_STORE_PATH is required when MCDOMAIN_STORE_TYPE=file. \
                    Set it via: export MCDOMAIN_STORE_PATH=/var/lib/mcdomain/objects.json"
                ),
                Some("") => anyhow::bail!(
                    "MCDOMAIN_STORE_PATH cannot be empty when MCDOMAIN_STORE_TYPE=file"
                ),
                Some(_) => {}
            }
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            anyhow::bail!(
                "MCDOMAIN_MAX_RETRIES must be between 0 and 10. Got: {}",
                max_retries
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MCDOMAIN_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn store_config(&self) -> StoreConfig {
        match (self.store_type.as_str(), &self.store_path) {
            ("file", Some(path)) => StoreConfig::File { path: path.clone() },
            _ => StoreConfig::Memory,
        }
    }

    /// Build the core configuration, falling back to core defaults
    fn core_config(&self) -> Result<McdomainConfig> {
        let mut config = McdomainConfig::new();
        config.store = self.store_config();

        if let Some(suffix) = &self.gateway_suffix {
            config.reconciler.gateway_suffix = suffix.clone();
        }

        let defaults = RetryPolicy::default();
        config.engine.retry = RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff_ms: self.initial_backoff_ms.unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            multiplier: defaults.multiplier,
        };

        config.validate().context("Invalid mcdomain configuration")?;
        Ok(config)
    }
}

/// Parse an optional numeric environment variable
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer. Got: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return McdomainExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return McdomainExitCode::ConfigError.into();
    }

    let core_config = match config.core_config() {
        Ok(core) => core,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return McdomainExitCode::ConfigError.into();
        }
    };

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
        return McdomainExitCode::ConfigError.into();
    }

    info!("Starting mcdomaind daemon");
    info!(
        "Store: {}, gateway suffix: {}",
        core_config.store.type_name(),
        core_config.reconciler.gateway_suffix
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return McdomainExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(core_config).await {
            error!("Daemon error: {:#}", e);
            McdomainExitCode::RuntimeError
        } else {
            McdomainExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: McdomainConfig) -> Result<()> {
    let registry = Arc::new(TriggerRegistry::with_defaults());

    let store = registry
        .create_store(&config.store)
        .await
        .context("Failed to open object store")?;

    // Replay every watched object as an applied event
    let mut replay = Vec::new();
    for kind in registry.watched_kinds() {
        let objects = store
            .list(kind)
            .await
            .with_context(|| format!("Failed to list {} objects", kind))?;
        info!("Loaded {} {} object(s)", objects.len(), kind);
        replay.extend(objects.into_iter().map(WatchEvent::Applied));
    }

    let (engine, event_rx) = ReconcileEngine::new(store, registry, config)?;
    let monitor = tokio::spawn(log_engine_events(event_rx));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => {
                warn!("Signal handling unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    let run_result = engine
        .run_with_shutdown(tokio_stream::iter(replay), Some(shutdown_rx))
        .await;
    signals.abort();

    // Dropping the engine closes the event channel and ends the monitor
    drop(engine);
    let failures = monitor.await.context("Engine event monitor panicked")?;

    run_result?;
    if failures > 0 {
        anyhow::bail!("{} trigger(s) or reconciliation(s) failed", failures);
    }

    info!("Shutting down daemon");
    Ok(())
}

/// Log engine events until the channel closes; returns the failure count
async fn log_engine_events(mut rx: mpsc::Receiver<EngineEvent>) -> usize {
    let mut failures = 0;
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::Started { declarations } => {
                info!("Engine started, {} DomainOwner(s) declared", declarations)
            }
            EngineEvent::ReconcileSucceeded {
                key,
                persisted,
                deleted,
            } => info!(
                "Reconciled {} ({} persisted, {} deleted)",
                key, persisted, deleted
            ),
            EngineEvent::ReconcileSkipped { key, reason } => info!("Skipped {}: {}", key, reason),
            EngineEvent::ReconcileFailed {
                key,
                error,
                attempts,
            } => {
                failures += 1;
                error!(
                    "Reconciliation of {} failed after {} attempt(s): {}",
                    key, attempts, error
                );
            }
            EngineEvent::TriggerFailed {
                key,
                error,
                attempts,
            } => {
                failures += 1;
                error!(
                    "Could not map {} to DomainOwners after {} attempt(s): {}",
                    key, attempts, error
                );
            }
            EngineEvent::Stopped { reason } => info!("Engine stopped: {}", reason),
        }
    }
    failures
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

    fn config() -> Config {
        Config {
            store_type: "file".to_string(),
            store_path: Some("objects.json".to_string()),
            gateway_suffix: None,
            max_retries: None,
            initial_backoff_ms: None,
            max_backoff_ms: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_defaults_build_core_config() {
        let config = config();
        assert!(config.validate().is_ok());

        let core = config.core_config().unwrap();
        assert_eq!(
            core.store,
            StoreConfig::File {
                path: "objects.json".to_string()
            }
        );
        assert_eq!(core.reconciler.gateway_suffix, "xcc.test");
        assert_eq!(core.engine.retry, RetryPolicy::default());
    }

    #[test]
    fn test_file_store_requires_path() {
        let mut config = config();
        config.store_path = None;
        assert!(config.validate().is_err());

        config.store_path = Some(String::new());
        assert!(config.validate().is_err());

        config.store_type = "memory".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_config(), StoreConfig::Memory);
    }

    #[test]
    fn test_rejects_unknown_values() {
        let mut config = config();
        config.store_type = "etcd".to_string();
        assert!(config.validate().is_err());

        let mut config = self::config();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = self::config();
        config.max_retries = Some(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_core_validation_applies_to_overrides() {
        let mut config = config();
        config.gateway_suffix = Some(".bad.".to_string());
        assert!(config.core_config().is_err());

        let mut config = self::config();
        config.initial_backoff_ms = Some(1_000);
        config.max_backoff_ms = Some(10);
        assert!(config.core_config().is_err());

        let mut config = self::config();
        config.gateway_suffix = Some("mesh.example".to_string());
        config.max_retries = Some(0);
        let core = config.core_config().unwrap();
        assert_eq!(core.reconciler.gateway_suffix, "mesh.example");
        assert_eq!(core.engine.retry.max_retries, 0);
    }
}
