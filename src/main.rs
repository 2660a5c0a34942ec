use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::{path::PathBuf, process::exit};

use premedia_update::{
    UpdateDecision, UpdateError, UpdateOutcome, Updater, UpdaterConfig,
    handoff::{DetachedHelper, HelperLauncher},
    logging,
    prompt::{AutoConfirm, ConsolePrompt, Prompt},
};

#[derive(Parser)]
#[command(name = "premedia_update", version, about = "Check for and install Premedia updates")]
struct Cli {
    /// Config file (defaults to premedia_update.toml beside the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether a newer version is available
    Check,
    /// Download, verify and install the latest version
    Update {
        /// Accept optional updates without asking
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("premedia_update error: {:#}", err);
            exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = UpdaterConfig::load_or_default(cli.config.as_deref())?;
    let _logger = logging::init_logging(&config.log_dir(), "premedia_update", &config.log_level)?;
    config.validate()?;
    info!("Current version: {}", config.current_version);

    match cli.command {
        Command::Check => {
            let updater = Updater::new(config, ConsolePrompt, DetachedHelper);
            match updater.check() {
                Ok((_, decision)) => {
                    println!("{}", describe(&decision));
                    Ok(0)
                }
                Err(e) => Ok(report(&e)),
            }
        }
        Command::Update { yes: true } => run_update(Updater::new(config, AutoConfirm, DetachedHelper)),
        Command::Update { yes: false } => {
            run_update(Updater::new(config, ConsolePrompt, DetachedHelper))
        }
    }
}

fn run_update<P: Prompt, H: HelperLauncher>(updater: Updater<P, H>) -> Result<i32> {
    match updater.run() {
        Ok(UpdateOutcome::HandedOff { version, .. }) => {
            println!("Installing Premedia {}; the application will restart.", version);
            info!("Update launched, shutting down current client");
            Ok(0)
        }
        Ok(UpdateOutcome::UpToDate) => {
            println!("Premedia is up to date.");
            Ok(0)
        }
        Ok(UpdateOutcome::Declined(version)) => {
            println!("Update to {} skipped.", version);
            Ok(0)
        }
        Ok(UpdateOutcome::Cancelled) => {
            println!("Update cancelled.");
            Ok(0)
        }
        Err(e) => Ok(report(&e)),
    }
}

fn describe(decision: &UpdateDecision) -> String {
    match decision {
        UpdateDecision::UpToDate => "Premedia is up to date.".to_string(),
        UpdateDecision::OptionalAvailable(v) => format!("Premedia {} is available.", v),
        UpdateDecision::MandatoryAvailable(v) => format!("Premedia {} is available and required.", v),
        UpdateDecision::Unsupported(p) => format!("No Premedia build is published for '{}'.", p),
    }
}

fn report(err: &UpdateError) -> i32 {
    eprintln!("Update failed ({}): {}", err.kind(), err);
    if err.is_recoverable() {
        eprintln!("The installed version was left unchanged.");
    }
    1
}
