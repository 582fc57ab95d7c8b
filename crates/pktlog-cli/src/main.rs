//! pktlog CLI
//!
//! Packet relay with selective, live-reconfigurable packet logging.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;
use commands::Command;

fn main() -> Result<()> {
    let args = Args::parse();

    // Kept alive so buffered file output is flushed on exit
    let _log_guard = logging::init(&args)?;

    let result = run(args);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Command::Run(run_args)) => {
            if !args.quiet {
                print_banner();
            }
            commands::run::execute(run_args)
        }
        Some(Command::Config(config_args)) => commands::config::execute(config_args),
        Some(Command::Completions(comp_args)) => commands::completions::execute(comp_args),
        None => {
            if !args.quiet {
                print_banner();
            }
            commands::run::execute(commands::run::RunArgs::default())
        }
    }
}

fn print_banner() {
    use colored::Colorize;

    let title = format!("pktlog v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("{}", "╔═══════════════════════════════════════════════╗".cyan());
    println!(
        "{}{}{}",
        "║  ".cyan(),
        format!("{title:<45}").green().bold(),
        "║".cyan()
    );
    println!(
        "{}{}{}",
        "║  ".cyan(),
        format!("{:<45}", "Packet relay with selective logging").white(),
        "║".cyan()
    );
    println!("{}", "╚═══════════════════════════════════════════════╝".cyan());
    println!();
}
