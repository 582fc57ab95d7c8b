//! CLI commands

pub mod completions;
pub mod config;
pub mod run;

use clap::Subcommand;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay (main command)
    Run(run::RunArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}
