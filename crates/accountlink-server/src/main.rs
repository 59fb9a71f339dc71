use std::time::Duration;

use accountlink_auth::{Clock, ConsumedTokenLedger};
use accountlink_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use accountlink_server::{AppState, observability, router};
use anyhow::Context;
use clap::Parser;

/// Interval between sweeps of expired consumed-token entries.
const LEDGER_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Parser)]
#[command(name = "accountlink-server", version, about = "Account action token service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<String>,
}

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From ACCOUNTLINK_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (accountlink.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (ACCOUNTLINK_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    // Initialize tracing early with the default level
    observability::init_tracing();

    let cli = Cli::parse();
    let (config_path, source) = resolve_config_path(cli.config);

    let cfg = match load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH),
        source = %source,
        "Configuration loaded"
    );
    observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(cfg).await {
        eprintln!("Server error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: accountlink_server::AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&cfg).context("service initialization failed")?;

    spawn_ledger_cleanup(state.clone());

    let addr = cfg.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        addr = %addr,
        single_use = state.verifier.is_single_use(),
        mail_transport = ?cfg.mailer.transport,
        "AccountLink server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn spawn_ledger_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LEDGER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match state.ledger.cleanup_expired(state.clock.now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired consumed-token entries removed"),
                Err(e) => tracing::warn!(error = %e, "Consumed-token cleanup failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: ACCOUNTLINK_CONFIG
/// 3. Default: accountlink.toml (optional)
fn resolve_config_path(cli: Option<String>) -> (Option<String>, ConfigSource) {
    if let Some(path) = cli {
        return (Some(path), ConfigSource::CliArgument);
    }

    if let Ok(path) = std::env::var("ACCOUNTLINK_CONFIG")
        && !path.is_empty()
    {
        return (Some(path), ConfigSource::EnvironmentVariable);
    }

    (None, ConfigSource::Default)
}
