//! codelens - CLI entry point

mod commands;

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use codelens::analyzer::StopSignal;
use codelens::cli::{CacheCommands, Cli, Commands, ConfigCommands};

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--debug` and `--quiet` pick the level.
fn init_logging(debug: bool, quiet: bool) {
    let default = if debug {
        "codelens=debug"
    } else if quiet {
        "codelens=warn"
    } else {
        "codelens=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// Stop scheduling new files on Ctrl-C. A second Ctrl-C exits immediately.
fn install_interrupt_handler(stop: &StopSignal) {
    let stop = stop.clone();
    let result = ctrlc::set_handler(move || {
        if stop.is_stopped() {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted: finishing in-flight files (Ctrl-C again to abort)");
        stop.stop();
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Analyze(args) => {
            let stop = StopSignal::new();
            install_interrupt_handler(&stop);
            let summary = commands::analyze::handle(config_path, &args, cli.quiet, stop)?;
            print!("{}", summary);
            if summary.has_failures() {
                Ok(ExitCode::from(1))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Commands::Cache(cmd) => {
            match cmd {
                CacheCommands::Status => commands::cache::handle_status(config_path)?,
                CacheCommands::Clear => commands::cache::handle_clear(config_path)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(cmd) => {
            match cmd {
                ConfigCommands::Show => commands::config::handle_show(config_path)?,
                ConfigCommands::Init => commands::config::handle_init(config_path)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    // A missing .env is normal
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.debug, cli.quiet);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
