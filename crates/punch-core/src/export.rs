//! Session report rendering: table, CSV and JSON.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::models::{format_delta, Session};
use crate::util::{format_timestamp, DATE_FORMAT, TIME_FORMAT};

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    Table,
    Csv,
    FullCsv,
    Json,
}

/// Serializable session representation used in JSON exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSession {
    pub id: Option<u32>,
    pub client: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: String,
    pub earnings: Option<f64>,
    pub currency: String,
    pub note: String,
}

#[must_use]
pub fn session_to_export_item(session: &Session) -> ExportSession {
    ExportSession {
        id: session.id.map(crate::models::SessionId::get),
        client: session.client.name.clone(),
        start: format_timestamp(session.start),
        end: session.end.map(format_timestamp),
        duration: session.duration(),
        earnings: session.earnings(),
        currency: session.client.currency.clone(),
        note: session.note.clone(),
    }
}

/// Totals for one client across a set of sessions
#[derive(Debug, Clone, PartialEq)]
pub struct ClientTotal {
    pub client: String,
    pub sessions: usize,
    pub duration: TimeDelta,
    pub earnings: f64,
    pub currency: String,
}

/// Sum closed sessions per client (case-insensitive), ordered by name.
#[must_use]
pub fn totals_by_client(sessions: &[Session]) -> Vec<ClientTotal> {
    let mut totals: BTreeMap<String, ClientTotal> = BTreeMap::new();

    for session in sessions {
        let Some(elapsed) = session.elapsed() else {
            continue;
        };
        let total = totals
            .entry(session.client.name.to_lowercase())
            .or_insert_with(|| ClientTotal {
                client: session.client.name.clone(),
                sessions: 0,
                duration: TimeDelta::zero(),
                earnings: 0.0,
                currency: session.client.currency.clone(),
            });
        total.sessions += 1;
        total.duration += elapsed;
        total.earnings += session.earnings().unwrap_or_default();
    }

    totals.into_values().collect()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `client,date,duration`, one row per session
#[must_use]
pub fn render_summary_csv(sessions: &[Session]) -> String {
    let mut output = String::from("client,date,duration\n");
    for session in sessions {
        let _ = writeln!(
            output,
            "{},{},{}",
            csv_field(&session.client.name),
            session.start.format(DATE_FORMAT),
            session.duration()
        );
    }
    output
}

/// One row per session with times, hours, earnings and note
#[must_use]
pub fn render_full_csv(sessions: &[Session]) -> String {
    let mut output =
        String::from("client,date,start_time,end_time,hours,earnings,currency,note\n");
    for session in sessions {
        let end = session
            .end
            .map_or_else(|| "N/A".to_string(), |end| end.format(TIME_FORMAT).to_string());
        let earnings = session
            .earnings()
            .map_or_else(|| "N/A".to_string(), |earnings| format!("{earnings:.2}"));

        let _ = writeln!(
            output,
            "{},{},{},{},{},{},{},{}",
            csv_field(&session.client.name),
            session.start.format(DATE_FORMAT),
            session.start.format(TIME_FORMAT),
            end,
            session.duration(),
            earnings,
            csv_field(&session.client.currency),
            csv_field(&session.note)
        );
    }
    output
}

/// Render sessions as pretty-printed JSON.
pub fn render_json_export(sessions: &[Session]) -> serde_json::Result<String> {
    let items = sessions
        .iter()
        .map(session_to_export_item)
        .collect::<Vec<ExportSession>>();
    serde_json::to_string_pretty(&items)
}

/// Human-readable listing followed by per-client totals.
#[must_use]
pub fn render_table(sessions: &[Session], verbose: bool) -> String {
    let mut output = String::new();

    for session in sessions {
        let id = session.id.map(|id| id.to_string()).unwrap_or_default();
        let end = session
            .end
            .map_or_else(|| "running".to_string(), |end| end.format(TIME_FORMAT).to_string());
        let _ = write!(
            output,
            "{id:>5}  {}  {}-{}  {:>8}  {}",
            session.start.format(DATE_FORMAT),
            session.start.format(TIME_FORMAT),
            end,
            session.duration(),
            session.client.name
        );
        if verbose && !session.note.is_empty() {
            let _ = write!(output, "  {}", session.note.replace('\n', " "));
        }
        output.push('\n');
    }

    let totals = totals_by_client(sessions);
    if !totals.is_empty() && !sessions.is_empty() {
        output.push('\n');
    }
    for total in totals {
        let _ = writeln!(
            output,
            "{}\t{}\t{:.2} {}",
            total.client,
            format_delta(total.duration),
            total.earnings,
            total.currency
        );
    }
    output
}

/// Render sessions in the requested format.
pub fn render_sessions(
    sessions: &[Session],
    format: ExportFormat,
    verbose: bool,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Table => Ok(render_table(sessions, verbose)),
        ExportFormat::Csv => Ok(render_summary_csv(sessions)),
        ExportFormat::FullCsv => Ok(render_full_csv(sessions)),
        ExportFormat::Json => render_json_export(sessions),
    }
}
