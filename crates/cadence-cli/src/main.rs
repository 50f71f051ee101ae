use anyhow::{Context, Result};
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(cli::Cli::parse()).await {
        handle_error(e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Quiet by default so log lines don't mix with command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: cli::Cli) -> Result<()> {
    let config = config::Config::new().context("Failed to load configuration")?;
    let core = config.core_config()?;
    tracing::debug!(?config, "Configuration loaded");

    let db_pool = db::establish_connection_with_timeout(&config.database_path, config.busy_timeout()).await?;
    let repository = SqliteRepository::new(db_pool, core.clone());

    match cli.command {
        cli::Commands::Add(command) => {
            commands::add::add_task(&repository, command, config.owner_id, &core).await
        }
        cli::Commands::List(command) => {
            commands::list::list_tasks(&repository, command, config.owner_id, &core).await
        }
        cli::Commands::Show(command) => commands::show::show_task(&repository, command, &core).await,
        cli::Commands::Edit(command) => commands::edit::edit_task(&repository, command, &core).await,
        cli::Commands::Do(command) => commands::r#do::do_task(&repository, command, &core).await,
        cli::Commands::Reopen(command) => commands::reopen::reopen_task(&repository, command).await,
        cli::Commands::Delete(command) => commands::delete::delete_task(&repository, command).await,
        cli::Commands::Subtask(command) => {
            commands::subtask::subtask_command(&repository, command, &core).await
        }
        cli::Commands::Recur(command) => {
            commands::recurrence::recurrence_command(&repository, command, &core).await
        }
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} Not found: {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(items) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, name) in items {
                    eprintln!("  {} ({})", id.yellow(), name);
                }
            }
            CoreError::Validation(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::Conflict(_) => {
                eprintln!(
                    "{} The task was changed by another process. Please try again.",
                    "Error:".style(error_style)
                );
            }
            _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
