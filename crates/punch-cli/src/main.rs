//! Punch CLI - Punch in and out of billable work sessions
//!
//! Thin command layer over `punch-core`.

mod cli;
mod commands;
mod editor;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use punch_core::SessionId;

use crate::cli::{ClientCommands, Cli, Commands, DeleteCommands, EditCommands, PunchArgs};
use crate::commands::client::{run_client_add, run_client_delete, run_client_edit, run_client_list};
use crate::commands::common::{load_config, resolve_db_path, Context};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete_session;
use crate::commands::edit::{run_edit_session, EditSelection};
use crate::commands::punch::{run_end, run_start, run_toggle};
use crate::commands::report::run_report;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "punch=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need neither config nor database
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path, &config)?;
    let ctx = Context::open(config, &db_path)?;

    match cli.command {
        Some(Commands::Start { time, args }) => run_start(&ctx, time.as_deref(), &args)?,
        Some(Commands::End { time, args }) => run_end(&ctx, time.as_deref(), &args)?,
        Some(Commands::Toggle { args }) => run_toggle(&ctx, &args)?,
        Some(Commands::Sync {
            remote,
            pull_only,
            yes,
        }) => run_sync(&ctx, remote.as_deref(), pull_only, yes)?,
        Some(Commands::Edit {
            command:
                EditCommands::Session {
                    id,
                    date,
                    all,
                    client,
                    yes,
                },
        }) => {
            let selection = match (id, date, all) {
                (Some(id), _, _) => EditSelection::Id(SessionId::new(id)),
                (None, Some(date), _) => EditSelection::Date(date),
                (None, None, true) => EditSelection::All,
                (None, None, false) => EditSelection::LatestToday(client),
            };
            run_edit_session(&ctx, selection, yes)?;
        }
        Some(Commands::Delete {
            command: DeleteCommands::Session { id },
        }) => run_delete_session(&ctx, SessionId::new(id))?,
        Some(Commands::Client { command }) => match command {
            ClientCommands::Add {
                name,
                rate,
                currency,
            } => run_client_add(&ctx, &name, rate, currency.as_deref())?,
            ClientCommands::List { json } => run_client_list(&ctx, json)?,
            ClientCommands::Edit {
                name,
                rate,
                currency,
            } => run_client_edit(&ctx, &name, rate, currency.as_deref())?,
            ClientCommands::Delete { name, yes } => run_client_delete(&ctx, &name, yes)?,
        },
        Some(Commands::Report(args)) => run_report(&ctx, &args)?,
        Some(Commands::Completions { .. }) => {}
        None => run_toggle(&ctx, &PunchArgs::default())?,
    }

    Ok(())
}
