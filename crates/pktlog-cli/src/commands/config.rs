//! Config command - configuration management

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use pktlog_core::Config;
use std::path::PathBuf;
use tracing::info;

use super::DEFAULT_CONFIG_FILE;

const PROJECT_NAME: &str = "pktlog";

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Config file to show (default: detect)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with default values
    Generate {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Config file to validate
        file: PathBuf,
    },

    /// Show config file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show { file } => show_config(file),
        ConfigAction::Generate { output, force } => generate_config(output, force),
        ConfigAction::Validate { file } => validate_config(file),
        ConfigAction::Paths => show_paths(),
    }
}

fn show_config(file: Option<PathBuf>) -> Result<()> {
    let config = match file.or_else(find_config_file) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    let toml_str = config.to_toml().context("Failed to serialize config")?;
    println!("{}", toml_str);
    Ok(())
}

fn generate_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let toml_str = Config::default()
        .to_toml()
        .context("Failed to serialize config")?;

    let content = format!(
        "# pktlog configuration\n\
         # remote_address must be set before running.\n\
         # Report delays are in milliseconds; 0 or less disables the report.\n\n\
         {}",
        toml_str
    );

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    info!("Generated config file: {:?}", output);
    println!("Configuration file generated: {}", output.display());

    Ok(())
}

fn validate_config(file: PathBuf) -> Result<()> {
    let config = Config::load(&file)
        .with_context(|| format!("Failed to load config from {:?}", file))?;

    config
        .validate()
        .context("Configuration validation failed")?;

    let settings = config.observation();
    println!("✓ Configuration is valid");
    println!("  Listen: {}", config.connection.local_address);
    println!("  Remote: {}", config.connection.remote_address);
    println!("  Logged packet types: {:?}", settings.filter_entries);
    println!("  Receive report: {}", settings.receive_cadence);
    println!("  Send report: {}", settings.send_cadence);
    println!("  Auto reload: {}", settings.auto_reload);

    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Configuration file search paths:");
    println!();
    println!("  1. ./{}", DEFAULT_CONFIG_FILE);
    println!("  2. ./{}.toml", PROJECT_NAME);

    if let Some(dirs) = directories::ProjectDirs::from("", "", PROJECT_NAME) {
        println!("  3. {}", dirs.config_dir().join(DEFAULT_CONFIG_FILE).display());
    }

    Ok(())
}

fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from(DEFAULT_CONFIG_FILE),
        PathBuf::from(format!("{PROJECT_NAME}.toml")),
    ];

    if let Some(path) = candidates.into_iter().find(|path| path.exists()) {
        return Some(path);
    }

    directories::ProjectDirs::from("", "", PROJECT_NAME)
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
        .filter(|path| path.exists())
}
