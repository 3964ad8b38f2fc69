//! simcat console terminal
//!
//! Runs a session registry whose collaborators print to stdout, and drives
//! it from commands read on stdin. Useful for replaying modem traces.
//!
//! # Usage
//!
//! ```bash
//! simcat
//! simcat -c config/cat.yaml
//! simcat -c config/cat.yaml -l debug
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use simcat_common::{init_logging, init_logging_with_filter, CatConfig, LogLevel};
use simcat_terminal::app::{
    load_and_validate_cat_config, parse_console_command, ConsoleCollaborators, ConsoleCommand,
    CONSOLE_HELP,
};
use simcat_terminal::{NoIconLoader, SessionRegistry, SlotCollaborators, SlotHandle};

/// simcat - SIM Application Toolkit terminal console
#[derive(Parser, Debug)]
#[command(name = "simcat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the CAT configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Log filter, overriding the configured level
    #[arg(short = 'l', long = "log", value_name = "FILTER")]
    log_filter: Option<String>,

    /// Number of card slots, overriding the configuration
    #[arg(short = 's', long = "slots", value_name = "NUM")]
    slots: Option<usize>,
}

fn load_config(args: &Args) -> Result<CatConfig> {
    let mut config = match &args.config_file {
        Some(path) => load_and_validate_cat_config(path)
            .with_context(|| format!("Failed to load configuration file: {path}"))?,
        None => CatConfig::default(),
    };
    if let Some(slots) = args.slots {
        config.slot_count = slots;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("simcat: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match &args.log_filter {
        Some(filter) => init_logging_with_filter(filter),
        None => match config.log_level.parse::<LogLevel>() {
            Ok(level) => init_logging(level),
            Err(_) => init_logging_with_filter(&config.log_level),
        },
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("simcat failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: CatConfig) -> Result<()> {
    let consoles: Vec<Arc<ConsoleCollaborators>> = (0..config.slot_count)
        .map(|slot| Arc::new(ConsoleCollaborators::new(slot)))
        .collect();

    let factory_consoles = consoles.clone();
    let registry = SessionRegistry::new(config, move |slot: usize| {
        let console = factory_consoles[slot].clone();
        SlotCollaborators::new(console.clone(), console, Arc::new(NoIconLoader))
    })
    .context("Failed to start session registry")?;

    info!(slots = registry.slot_count(), "simcat ready, type 'help' for commands");

    let mut active = registry.slot(0)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let command = match parse_console_command(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{CONSOLE_HELP}"),
            ConsoleCommand::Slot(slot) => match registry.slot(slot) {
                Ok(handle) => active = handle,
                Err(e) => warn!("{}", e),
            },
            command => {
                let console = &consoles[active.slot()];
                if let Err(e) = execute(&active, console, command).await {
                    warn!("{:#}", e);
                }
            }
        }
    }

    registry.shutdown().await?;
    Ok(())
}

async fn execute(
    slot: &SlotHandle,
    console: &ConsoleCollaborators,
    command: ConsoleCommand,
) -> Result<()> {
    match command {
        ConsoleCommand::Envelope(hex) => slot.submit_envelope(hex).await?,
        ConsoleCommand::EventNotify(hex) => slot.submit_event_notify(hex).await?,
        ConsoleCommand::SessionEnd => slot.submit_session_end().await?,
        ConsoleCommand::CallSetup => slot.submit_call_setup_event().await?,
        ConsoleCommand::Card { present } => slot.submit_card_state(present).await?,
        ConsoleCommand::Respond(spec) => match console.build_response(&spec) {
            Some(resp) => slot.submit_response(resp).await?,
            None => warn!("No command to respond to"),
        },
        ConsoleCommand::Menu { item, help } => {
            slot.submit_response(console.menu_selection(item, help))
                .await?
        }
        ConsoleCommand::Event { code, payload } => {
            slot.submit_response(ConsoleCollaborators::event_download(code, payload))
                .await?
        }
        ConsoleCommand::Status => {
            let snapshot = slot.session_snapshot().await?;
            println!("[{}] {:?}", slot.slot(), snapshot);
        }
        ConsoleCommand::Slot(_) | ConsoleCommand::Help | ConsoleCommand::Quit => {}
    }
    Ok(())
}
