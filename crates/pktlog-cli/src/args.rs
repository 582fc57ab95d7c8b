//! Command-line argument parsing

use crate::commands::Command;
use clap::{Parser, ValueEnum};

/// pktlog - packet relay with selective logging
///
/// Relays every client to a remote endpoint and logs the packets whose type
/// matches the configured filter. Everything else is counted and reported
/// periodically as hidden packets.
#[derive(Parser, Debug)]
#[command(name = "pktlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format for logs
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Log file path
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<String>,

    /// Only log errors and skip the banner
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// Compact format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_verbose() {
        let args = Args::parse_from(["pktlog", "-v"]);
        assert_eq!(args.verbose, 1);

        let args = Args::parse_from(["pktlog", "-vvv"]);
        assert_eq!(args.verbose, 3);
    }

    #[test]
    fn test_default_is_run() {
        let args = Args::parse_from(["pktlog"]);
        assert!(args.command.is_none());
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(!args.quiet);
    }

    #[test]
    fn test_run_config_path() {
        let args = Args::parse_from(["pktlog", "run", "-c", "relay.toml", "--log-format", "json"]);
        match args.command {
            Some(Command::Run(run)) => assert_eq!(run.config, PathBuf::from("relay.toml")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
