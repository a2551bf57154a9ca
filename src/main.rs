#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use cli::{Commands, ConsumerArgs};
use procgate::client::ControlClient;
use procgate::constants::{WATCH_BACKOFF_INITIAL_MS, WATCH_BACKOFF_MAX_MS};
use procgate::daemon::{self, config::DaemonConfiguration, logging};
use procgate::error::ControlError;
use procgate::models::{Decision, ProcessEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn main() -> Result<()> {
    let cli = cli::parse_args();

    match cli.command {
        Commands::Run {
            config,
            socket,
            interval,
        } => run(config, socket, interval),
        Commands::Wait(args) => {
            logging::init_backend("warn")?;
            client_runtime()?.block_on(wait(args))
        }
        Commands::Watch(args) => {
            logging::init_backend("warn")?;
            client_runtime()?.block_on(watch(args))
        }
        Commands::Decide {
            pid,
            verdict,
            socket,
        } => {
            logging::init_backend("warn")?;
            client_runtime()?.block_on(decide(&socket, Decision::new(pid, verdict.into())))
        }
    }
}

fn run(config_path: Option<PathBuf>, socket: Option<PathBuf>, interval: Option<f64>) -> Result<()> {
    let config = DaemonConfiguration::load_or_default(config_path.as_deref())?
        .with_overrides(socket, interval)?;
    logging::init_backend(&config.daemon.log_level)?;

    if !nix::unistd::geteuid().is_root() {
        log::warn!("not running as root; process image paths of other users may be unavailable");
    }

    // Report which file the settings came from, if any
    let config_source = config_path.or_else(|| {
        DaemonConfiguration::default_config_path()
            .ok()
            .filter(|path| path.exists())
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(daemon::run_daemon(config, config_source.as_deref()))
}

fn client_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

async fn wait(args: ConsumerArgs) -> Result<()> {
    let mut client = ControlClient::connect(&args.socket).await?;
    let event = client.wait_for_next_event().await??;
    print_event(&event, args.json)
}

async fn watch(args: ConsumerArgs) -> Result<()> {
    let mut client = ControlClient::connect(&args.socket).await?;
    let mut backoff = Duration::from_millis(WATCH_BACKOFF_INITIAL_MS);

    loop {
        let outcome = tokio::select! {
            outcome = client.wait_for_next_event() => outcome?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        match outcome {
            Ok(event) => {
                backoff = Duration::from_millis(WATCH_BACKOFF_INITIAL_MS);
                print_event(&event, args.json)?;
            }
            Err(ControlError::Busy) => {
                log::warn!("another consumer is waiting; retrying in {:?}", backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_millis(WATCH_BACKOFF_MAX_MS));
            }
            Err(ControlError::Cancelled) => {
                eprintln!("Monitor detached, stopping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn decide(socket: &Path, decision: Decision) -> Result<()> {
    let mut client = ControlClient::connect(socket).await?;
    let accepted = client.submit_decision(decision).await??;
    println!(
        "Decision acknowledged: pid {} -> {}",
        accepted.process_id, accepted.verdict
    );
    Ok(())
}

fn print_event(event: &ProcessEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if event.image_path.is_empty() {
        println!("pid {} (parent {}) <unknown image>", event.process_id, event.parent_process_id);
    } else {
        println!(
            "pid {} (parent {}) {}",
            event.process_id, event.parent_process_id, event.image_path
        );
    }
    Ok(())
}
