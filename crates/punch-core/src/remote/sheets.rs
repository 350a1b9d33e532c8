//! Google Sheets mirror over the v4 `values` REST API.
//!
//! The first row holds column headers; configured header names decide where
//! each field lives. Data rows are addressed by their index in the values
//! grid (header included), so row `n` lives on sheet line `n + 1`.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{RemoteMirror, RemoteRow, RowHandle};
use crate::config::{SheetColumns, SpreadsheetRemoteConfig};
use crate::error::{Error, Result};
use crate::models::{Client, Session, SessionId};
use crate::util::{normalize_text_option, TIME_FORMAT};

const SHEET_DATE_FORMAT: &str = "%d/%m/%Y";
const SHEET_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const MIN_ROW_CELLS: usize = 4;
// `USER_ENTERED` would turn a note starting with `=` into a formula
const VALUE_INPUT_OPTION: &str = "RAW";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Id,
    Client,
    Date,
    StartTime,
    EndTime,
    TotalTime,
    Note,
}

const FIELDS: [Field; 7] = [
    Field::Id,
    Field::Client,
    Field::Date,
    Field::StartTime,
    Field::EndTime,
    Field::TotalTime,
    Field::Note,
];

impl Field {
    fn header(self, columns: &SheetColumns) -> &str {
        match self {
            Self::Id => &columns.id,
            Self::Client => &columns.client,
            Self::Date => &columns.date,
            Self::StartTime => &columns.start_time,
            Self::EndTime => &columns.end_time,
            Self::TotalTime => &columns.total_time,
            Self::Note => &columns.note,
        }
    }
}

/// Header name → column index for the fields present on the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    indices: HashMap<Field, usize>,
    width: usize,
}

impl ColumnMap {
    fn from_header(header: &[String], columns: &SheetColumns) -> Result<Self> {
        let mut indices = HashMap::new();
        for field in FIELDS {
            let name = field.header(columns).trim();
            if name.is_empty() {
                continue;
            }
            if let Some(index) = header
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(name))
            {
                indices.insert(field, index);
            }
        }

        for required in [Field::Client, Field::Date, Field::StartTime] {
            if !indices.contains_key(&required) {
                return Err(Error::Remote(format!(
                    "sheet header is missing the '{}' column",
                    required.header(columns)
                )));
            }
        }

        let width = indices.values().max().map_or(0, |max| max + 1);
        Ok(Self { indices, width })
    }

    fn raw_cell<'r>(&self, row: &'r [String], field: Field) -> &'r str {
        self.indices
            .get(&field)
            .and_then(|&index| row.get(index))
            .map_or("", String::as_str)
    }

    fn cell<'r>(&self, row: &'r [String], field: Field) -> &'r str {
        self.raw_cell(row, field).trim()
    }

    fn parse_row(&self, row: &[String]) -> std::result::Result<Session, String> {
        let id = match self.cell(row, Field::Id) {
            "" => None,
            raw => Some(
                raw.parse::<SessionId>()
                    .map_err(|_| format!("invalid id '{raw}'"))?,
            ),
        };

        let client = self.cell(row, Field::Client);
        if client.is_empty() {
            return Err("missing client".to_string());
        }

        let date_raw = self.cell(row, Field::Date);
        let date = NaiveDate::parse_from_str(date_raw, SHEET_DATE_FORMAT)
            .map_err(|_| format!("invalid date '{date_raw}'"))?;

        let start_raw = self.cell(row, Field::StartTime);
        let start = NaiveTime::parse_from_str(start_raw, TIME_FORMAT)
            .map(|time| date.and_time(time))
            .map_err(|_| format!("invalid start time '{start_raw}'"))?;

        let end = match self.cell(row, Field::EndTime) {
            "" => None,
            raw => Some(parse_end(date, raw).ok_or_else(|| format!("invalid end time '{raw}'"))?),
        };

        Ok(Session {
            id,
            client: Client::named(client),
            start,
            end,
            note: self.raw_cell(row, Field::Note).to_string(),
        })
    }

    fn render_row(&self, session: &Session) -> Vec<String> {
        let mut row = vec![String::new(); self.width];
        for (field, &index) in &self.indices {
            row[index] = render_field(*field, session);
        }
        row
    }
}

fn parse_end(date: NaiveDate, raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, SHEET_TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveTime::parse_from_str(raw, TIME_FORMAT)
                .ok()
                .map(|time| date.and_time(time))
        })
}

fn render_field(field: Field, session: &Session) -> String {
    match field {
        Field::Id => session.id.map(|id| id.to_string()).unwrap_or_default(),
        Field::Client => session.client.name.clone(),
        Field::Date => session.start.format(SHEET_DATE_FORMAT).to_string(),
        Field::StartTime => session.start.format(TIME_FORMAT).to_string(),
        Field::EndTime => match session.end {
            None => String::new(),
            Some(end) if end.date() == session.start.date() => end.format(TIME_FORMAT).to_string(),
            Some(end) => end.format(SHEET_TIMESTAMP_FORMAT).to_string(),
        },
        Field::TotalTime => session
            .elapsed()
            .map(crate::models::format_delta)
            .unwrap_or_default(),
        Field::Note => session.note.clone(),
    }
}

fn set_raw_input(url: &mut Url) {
    url.query_pairs_mut()
        .append_pair("valueInputOption", VALUE_INPUT_OPTION);
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Spreadsheet column letter for a zero-based index (`0 → A`, `26 → AA`)
fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(ApiErrorBody {
        error: Some(detail),
    }) = serde_json::from_str::<ApiErrorBody>(body)
    {
        if let Some(message) = detail.message.or(detail.status) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(Error::Remote(parse_api_error(status, &body)))
}

/// Spreadsheet-backed mirror
pub struct SheetsRemote {
    http: HttpClient,
    token: String,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    columns: SheetColumns,
    layout: Option<ColumnMap>,
}

impl fmt::Debug for SheetsRemote {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SheetsRemote")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .finish_non_exhaustive()
    }
}

impl SheetsRemote {
    /// Build a client; the bearer token is read from `config.token_env`.
    pub fn new(config: &SpreadsheetRemoteConfig) -> Result<Self> {
        let token = normalize_text_option(std::env::var(&config.token_env).ok()).ok_or_else(|| {
            Error::Config(format!(
                "environment variable {} must hold a Sheets API access token",
                config.token_env
            ))
        })?;

        Ok(Self {
            http: HttpClient::builder().build()?,
            token,
            base_url: config.api_base_url(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            columns: config.columns.clone(),
            layout: None,
        })
    }

    fn quoted_sheet(&self) -> String {
        format!("'{}'", self.sheet_name.replace('\'', "''"))
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| Error::Config(format!("invalid api_base_url: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("api_base_url cannot be a base".into()))?
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    fn fetch(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range, "")?;
        let response = self.http.get(url).bearer_auth(&self.token).send()?;
        let body: ValueRange = check_status(response)?.json()?;
        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    fn layout(&mut self) -> Result<ColumnMap> {
        if let Some(layout) = &self.layout {
            return Ok(layout.clone());
        }
        let header = self
            .fetch(&format!("{}!1:1", self.quoted_sheet()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        let layout = ColumnMap::from_header(&header, &self.columns)?;
        self.layout = Some(layout.clone());
        Ok(layout)
    }
}

impl RemoteMirror for SheetsRemote {
    fn read_all(&mut self) -> Result<Vec<RemoteRow>> {
        let grid = self.fetch(&self.quoted_sheet())?;
        let Some(header) = grid.first() else {
            return Err(Error::Remote(format!("sheet '{}' has no header row", self.sheet_name)));
        };
        let layout = ColumnMap::from_header(header, &self.columns)?;

        let mut rows = Vec::new();
        for (index, row) in grid.iter().enumerate().skip(1) {
            if row.len() < MIN_ROW_CELLS {
                continue;
            }
            match layout.parse_row(row) {
                Ok(session) => rows.push(RemoteRow {
                    session,
                    handle: RowHandle(index),
                }),
                Err(reason) => tracing::warn!("Skipping sheet line {}: {}", index + 1, reason),
            }
        }

        self.layout = Some(layout);
        Ok(rows)
    }

    fn append(&mut self, session: &Session) -> Result<()> {
        let layout = self.layout()?;
        let mut url = self.values_url(&self.quoted_sheet(), ":append")?;
        set_raw_input(&mut url);
        url.query_pairs_mut()
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": [layout.render_row(session)] }))
            .send()?;
        check_status(response)?;
        Ok(())
    }

    fn overwrite(&mut self, handle: RowHandle, session: &Session) -> Result<()> {
        let layout = self.layout()?;
        let line = handle.0 + 1;
        let last = column_letter(layout.width.saturating_sub(1));
        let range = format!("{}!A{line}:{last}{line}", self.quoted_sheet());

        let mut url = self.values_url(&range, "")?;
        set_raw_input(&mut url);

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&json!({ "range": range, "values": [layout.render_row(session)] }))
            .send()?;
        check_status(response)?;
        Ok(())
    }
}
