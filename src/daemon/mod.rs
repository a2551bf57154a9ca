//! Daemon mode: attach the monitor and serve the control channel
//!
//! Startup order is attach (mailbox + notification source), then expose the
//! control socket. Shutdown reverses it: detach (unregister source, cancel the
//! outstanding wait), then remove the socket.

pub mod config;
pub mod ipc;
pub mod logging;

use crate::daemon::config::DaemonConfiguration;
use crate::daemon::ipc::IpcServer;
use crate::daemon::logging::{DaemonLogger, LogLevel};
use crate::lifecycle::Monitor;
use crate::mailbox::MailboxStats;
use crate::source::{NotificationProvider, PollingProvider};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::signal;

/// Run the daemon with the process table polling source until a shutdown signal
pub async fn run_daemon(config: DaemonConfiguration, config_source: Option<&Path>) -> Result<()> {
    let provider = PollingProvider::new(config.polling_duration());
    run_daemon_with_provider(config, config_source, Box::new(provider), shutdown_signal()).await
}

/// Run the daemon with an explicit notification provider until `shutdown` resolves
pub async fn run_daemon_with_provider(
    config: DaemonConfiguration,
    config_source: Option<&Path>,
    provider: Box<dyn NotificationProvider>,
    shutdown: impl std::future::Future<Output = &'static str>,
) -> Result<()> {
    let logger = DaemonLogger::new(LogLevel::from_filter(&config.daemon.log_level));

    let monitor = Monitor::attach(provider).context("Failed to attach process monitor")?;

    let mut server = match IpcServer::bind(&config.daemon.socket_path) {
        Ok(server) => server,
        Err(e) => {
            // Unwind the attach before surfacing the error
            detach_monitor(monitor).await?;
            return Err(e.context("Failed to expose control channel"));
        }
    };

    logger.log_startup(config_source, server.socket_path(), std::process::id());

    let dispatcher = monitor.dispatcher();
    let (reason, served) = tokio::select! {
        result = server.serve(dispatcher, logger.clone()) => ("control server ended", result),
        reason = shutdown => (reason, Ok(())),
    };
    if let Err(e) = &served {
        logger.log_error(&format!("{:#}", e), Some("control server"));
    }

    let stats = detach_monitor(monitor).await?;
    server.stop()?;
    logger.log_shutdown(reason, &stats);

    served
}

/// Detach off the async workers; unregistering a source may join a thread
async fn detach_monitor(mut monitor: Monitor) -> Result<MailboxStats> {
    tokio::task::spawn_blocking(move || {
        monitor.detach();
        monitor.stats()
    })
    .await
    .context("Failed to detach process monitor")
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() -> &'static str {
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => "Received interrupt signal",
        _ = terminate => "Received terminate signal",
    }
}
