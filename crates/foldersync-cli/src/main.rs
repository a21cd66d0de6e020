//! foldersync - one-way periodic folder mirror
//!
//! Keeps a replica directory identical to a source directory by running a
//! sync cycle every INTERVAL seconds until interrupted. Every applied
//! operation is recorded in the log file and echoed to the console.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use foldersync_audit::{AuditLogger, ConsoleLogSink, FanOutSink, FileLogSink};
use foldersync_core::config::Config;
use foldersync_core::ports::ILogSink;
use foldersync_sync::clock::SystemClock;
use foldersync_sync::engine::SyncEngine;
use foldersync_sync::filesystem::LocalFileSystemAdapter;
use foldersync_sync::scanner::TreeScanner;
use foldersync_sync::scheduler::{StopReason, SyncScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod args;

use args::Cli;

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// A handler that cannot be installed is reported and left pending, so the
/// other one still works.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Wiring
// ============================================================================

/// Builds the operation log: the file, plus the console unless `quiet`
fn open_log_sink(config: &Config, quiet: bool) -> Result<Arc<dyn ILogSink>> {
    let path = config
        .logging
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("logging.file is required"))?;
    let file = FileLogSink::open(path)
        .with_context(|| format!("Cannot write log file {}", path.display()))?;

    if quiet {
        return Ok(Arc::new(file));
    }
    let sinks: Vec<Arc<dyn ILogSink>> = vec![Arc::new(file), Arc::new(ConsoleLogSink)];
    Ok(Arc::new(FanOutSink::new(sinks)))
}

fn build_engine(config: &Config, sink: Arc<dyn ILogSink>) -> Result<SyncEngine> {
    let source = config
        .sync
        .source
        .clone()
        .ok_or_else(|| anyhow!("sync.source is required"))?;
    let replica = config
        .sync
        .replica
        .clone()
        .ok_or_else(|| anyhow!("sync.replica is required"))?;

    let scanner = TreeScanner::new(config.sync.case_sensitivity, config.sync.symlinks);
    Ok(SyncEngine::new(
        source,
        replica,
        Arc::new(LocalFileSystemAdapter::new()),
        AuditLogger::new(sink, config.logging.format),
    )
    .with_scanner(scanner)
    .with_compare_mode(config.sync.compare))
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base = cli.load_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive(&base.logging.level)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.resolve(base) {
        Ok(config) => config,
        Err(errors) => {
            for e in &errors {
                eprintln!("\u{2717} Error: {}", e);
            }
            return Err(anyhow!("invalid configuration ({} error(s))", errors.len()));
        }
    };

    let sink = open_log_sink(&config, cli.quiet)?;
    let engine = build_engine(&config, sink)?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let mut scheduler = SyncScheduler::new(
        engine,
        Arc::new(SystemClock),
        Duration::from_secs(config.sync.interval_secs),
        shutdown_token,
    );
    if cli.once {
        scheduler = scheduler.with_max_cycles(1);
    }

    match scheduler.run().await {
        Ok(StopReason::Cancelled) => {
            info!(cycles = scheduler.cycles_run(), "foldersync shut down gracefully");
            Ok(())
        }
        Ok(StopReason::CycleLimitReached) => Ok(()),
        Err(e) => {
            error!(error = %e, "foldersync exiting with error");
            Err(e.into())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
