use std::fmt::Write as _;

use punch_core::db::{ClientRepository, SessionStore};
use punch_core::sync::ConfirmDeletion;
use punch_core::{Client, Error};
use serde::Serialize;

use crate::commands::common::Context;
use crate::editor::TerminalConfirm;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ClientListItem {
    pub name: String,
    pub rate: u32,
    pub currency: String,
}

pub fn run_client_add(
    ctx: &Context,
    name: &str,
    rate: u32,
    currency: Option<&str>,
) -> Result<(), CliError> {
    let currency = currency.unwrap_or(ctx.config.settings.default_currency.as_str());
    let client = ctx.clients().create(&Client::new(name, rate, currency))?;
    println!("Added client {} ({} {}/h)", client.name, client.rate, client.currency);
    Ok(())
}

pub fn run_client_list(ctx: &Context, as_json: bool) -> Result<(), CliError> {
    let clients = ctx.clients().list()?;

    if as_json {
        let items = clients
            .iter()
            .map(|client| ClientListItem {
                name: client.name.clone(),
                rate: client.rate,
                currency: client.currency.clone(),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if clients.is_empty() {
        println!("No clients registered.");
    } else {
        print!("{}", format_client_lines(&clients));
    }
    Ok(())
}

pub fn format_client_lines(clients: &[Client]) -> String {
    let width = clients
        .iter()
        .map(|client| client.name.len())
        .max()
        .unwrap_or_default();

    clients.iter().fold(String::new(), |mut output, client| {
        let _ = writeln!(
            output,
            "{:<width$}  {:>6} {}",
            client.name, client.rate, client.currency
        );
        output
    })
}

pub fn run_client_edit(
    ctx: &Context,
    name: &str,
    rate: Option<u32>,
    currency: Option<&str>,
) -> Result<(), CliError> {
    let repo = ctx.clients();
    let mut client = repo
        .get(name)?
        .ok_or_else(|| CliError::UnknownClient(name.to_string()))?;

    if let Some(rate) = rate {
        client.rate = rate;
    }
    if let Some(currency) = currency {
        client.currency = currency.trim().to_uppercase();
    }

    repo.update(&client)?;
    println!("Updated client {}", client.name);
    Ok(())
}

pub fn run_client_delete(ctx: &Context, name: &str, assume_yes: bool) -> Result<(), CliError> {
    delete_client(ctx, name, &mut TerminalConfirm::new(assume_yes))
}

/// Delete a client; its sessions go with it once `confirm` approves.
pub fn delete_client(
    ctx: &Context,
    name: &str,
    confirm: &mut dyn ConfirmDeletion,
) -> Result<(), CliError> {
    let repo = ctx.clients();
    let client = repo
        .get(name)?
        .ok_or_else(|| CliError::UnknownClient(name.to_string()))?;

    let sessions = ctx
        .sessions()
        .get_all()?
        .into_iter()
        .filter(|session| session.client.same_name(&client.name))
        .collect::<Vec<_>>();

    if !sessions.is_empty() && !confirm.confirm_deletion(&sessions)? {
        return Err(Error::InvalidInput(format!(
            "client '{}' still has {} session(s)",
            client.name,
            sessions.len()
        ))
        .into());
    }

    repo.delete(&client.name)?;
    println!("Deleted client {} and {} session(s)", client.name, sessions.len());
    Ok(())
}
