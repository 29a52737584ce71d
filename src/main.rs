use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use doorman::admission::{spawn_sweeper, AdmissionGate};
use doorman::clock::{Clock, SystemClock};
use doorman::config::{DoormanConfig, LogFormat, LoggingConfig};
use doorman::events::{DecisionTally, FanoutSink, TracingSink};
use doorman::grpc::AdmissionServer;

/// Admission control gate with sliding-window rate limiting.
#[derive(Debug, Parser)]
#[command(name = "doorman", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the gRPC listen address
    #[arg(long)]
    grpc_addr: Option<SocketAddr>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DoormanConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.grpc_addr {
        config.server.grpc_addr = addr;
    }

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_tracing(&config.logging);

    info!("Starting Doorman admission gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Configuration file loaded");
    }

    let gate_config = config.admission.gate_config();
    info!(
        grpc_addr = %config.server.grpc_addr,
        time_window_secs = gate_config.time_window.as_secs(),
        max_requests = gate_config.max_requests_per_window,
        blacklist_after = gate_config.blacklist_after_violations,
        blacklist_secs = gate_config.blacklist_duration.as_secs(),
        "Configuration loaded"
    );

    let gate = Arc::new(AdmissionGate::new(gate_config));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let tally = Arc::new(DecisionTally::new());
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink::new()))
        .with(tally.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = config
        .admission
        .sweep_interval()
        .map(|every| spawn_sweeper(gate.clone(), clock.clone(), every, shutdown_rx.clone()));

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let server = AdmissionServer::new(config.server.grpc_addr, gate, clock, Arc::new(sink));

    let mut server_shutdown = shutdown_rx;
    server
        .serve_with_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    let totals = tally.snapshot();
    info!(
        allowed = totals.allowed,
        rate_limited = totals.rate_limited,
        blocked = totals.blocked,
        "Doorman admission gate stopped"
    );
    Ok(())
}

/// Initialize tracing; `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
