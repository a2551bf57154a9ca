//! CLI argument parsing and validation module
//!
//! Handles the command-line interface using clap derive:
//! - `run` starts the daemon
//! - `wait` and `watch` consume process events
//! - `decide` submits a verdict

use clap::{Args, Parser, Subcommand, ValueEnum};
use procgate::constants::DEFAULT_SOCKET_PATH;
use procgate::models::Verdict;
use std::path::PathBuf;

const VERSION: &str = concat!(env!("PROCGATE_VERSION"), " (", env!("GIT_HASH"), ")");

#[derive(Debug, Parser)]
#[command(name = "procgate", version = VERSION)]
#[command(about = "Hand every new process launch to a user-space decision service")]
#[command(
    long_about = "Watches process creation and hands each new process, one at a time, to a single \
                  decision service waiting on the control socket. Launches that happen while no \
                  consumer is waiting are dropped."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Attach the process monitor and serve the control socket until interrupted
    Run {
        /// Configuration file (defaults to the per-user config directory)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Control socket path, overrides the configuration file
        #[arg(short, long, value_name = "PATH")]
        socket: Option<PathBuf>,
        /// Process table polling interval in seconds (0.1-300.0)
        #[arg(short, long, value_name = "SECS")]
        interval: Option<f64>,
    },
    /// Wait for the next process creation and print it
    Wait(ConsumerArgs),
    /// Print process creations until the monitor detaches
    Watch(ConsumerArgs),
    /// Submit a verdict for a process
    Decide {
        /// Process the verdict applies to
        #[arg(long, value_name = "PID")]
        pid: u64,
        #[arg(long, value_enum)]
        verdict: VerdictArg,
        #[arg(short, long, value_name = "PATH", default_value = DEFAULT_SOCKET_PATH)]
        socket: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct ConsumerArgs {
    /// Control socket path
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Output events as JSON lines
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VerdictArg {
    Allow,
    Block,
}

impl From<VerdictArg> for Verdict {
    fn from(arg: VerdictArg) -> Self {
        match arg {
            VerdictArg::Allow => Verdict::Allow,
            VerdictArg::Block => Verdict::Block,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_decide_parses_verdict() {
        let cli =
            Cli::try_parse_from(["procgate", "decide", "--pid", "42", "--verdict", "block"])
                .unwrap();
        match cli.command {
            Commands::Decide { pid, verdict, socket } => {
                assert_eq!(pid, 42);
                assert_eq!(Verdict::from(verdict), Verdict::Block);
                assert_eq!(socket, PathBuf::from(DEFAULT_SOCKET_PATH));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_verdict_rejected() {
        let args = ["procgate", "decide", "--pid", "1", "--verdict", "maybe"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_run_overrides_are_optional() {
        let cli = Cli::try_parse_from(["procgate", "run", "--interval", "2.5"]).unwrap();
        match cli.command {
            Commands::Run { config, socket, interval } => {
                assert!(config.is_none());
                assert!(socket.is_none());
                assert_eq!(interval, Some(2.5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
