//! Line-oriented merge document format.
//!
//! Each session is a block of `key: value` lines terminated by a `---`
//! separator line:
//!
//! ```text
//! id: 12
//! client: Acme
//! date: 2024-03-01
//! start_time: 09:00:00
//! end_time: 17:00:00
//! note: fixed the build
//! ---
//! ```
//!
//! `end_time` is `N/A` for open sessions and a full timestamp when the
//! session ends on a later date. Lines starting with `#` are comments.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};
use crate::models::{Client, Session, SessionId};
use crate::util::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};

/// Line separating session blocks
pub const SEPARATOR: &str = "---";

const OPEN_END: &str = "N/A";
const MARKER_PREFIXES: [&str; 3] = ["<<<<<<<", "=======", ">>>>>>>"];

/// Serialize sessions to the merge document format, in the given order.
pub fn serialize_sessions(sessions: &[Session]) -> String {
    let mut out = String::new();
    for session in sessions {
        out.push_str(&serialize_session(session));
    }
    out
}

fn serialize_session(session: &Session) -> String {
    let id = session.id.map(|id| id.to_string()).unwrap_or_default();
    let end = match session.end {
        None => OPEN_END.to_string(),
        Some(end) if end.date() == session.start.date() => end.format(TIME_FORMAT).to_string(),
        Some(end) => end.format(TIMESTAMP_FORMAT).to_string(),
    };

    format!(
        "id: {id}\nclient: {}\ndate: {}\nstart_time: {}\nend_time: {end}\nnote: {}\n{SEPARATOR}\n",
        session.client.name,
        session.start.format(DATE_FORMAT),
        session.start.format(TIME_FORMAT),
        escape_note(&session.note),
    )
}

fn escape_note(note: &str) -> String {
    note.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn unescape_note(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Default)]
struct BlockBuilder {
    first_line: usize,
    id: Option<String>,
    client: Option<String>,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    note: Option<String>,
}

impl BlockBuilder {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.client.is_none()
            && self.date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.note.is_none()
    }

    fn set(&mut self, line: usize, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            "id" => &mut self.id,
            "client" => &mut self.client,
            "date" => &mut self.date,
            "start_time" => &mut self.start_time,
            "end_time" => &mut self.end_time,
            "note" => &mut self.note,
            other => return Err(parse_error(line, format!("unknown key '{other}'"))),
        };
        if slot.is_some() {
            return Err(parse_error(line, format!("duplicate key '{key}'")));
        }
        *slot = Some(value.to_string());
        Ok(())
    }

    fn build(self) -> Result<Session> {
        let line = self.first_line;

        let id = match self.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<SessionId>()
                    .map_err(|_| parse_error(line, format!("invalid id '{raw}'")))?,
            ),
        };

        let client = required(self.client, line, "client")?;
        let date_raw = required(self.date, line, "date")?;
        let date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT)
            .map_err(|_| parse_error(line, format!("invalid date '{date_raw}'")))?;
        let start_raw = required(self.start_time, line, "start_time")?;
        let start = parse_time_on(date, &start_raw)
            .ok_or_else(|| parse_error(line, format!("invalid start_time '{start_raw}'")))?;

        let end = match self.end_time.as_deref().map(str::trim) {
            None | Some(OPEN_END) => None,
            Some(raw) => Some(
                parse_end(date, raw)
                    .ok_or_else(|| parse_error(line, format!("invalid end_time '{raw}'")))?,
            ),
        };
        if let Some(end) = end {
            if end < start {
                return Err(parse_error(line, "end_time must not be before start_time"));
            }
        }

        Ok(Session {
            id,
            client: Client::named(client),
            start,
            end,
            note: self.note.as_deref().map(unescape_note).unwrap_or_default(),
        })
    }
}

fn required(value: Option<String>, line: usize, key: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| parse_error(line, format!("missing '{key}'")))
}

fn parse_time_on(date: NaiveDate, raw: &str) -> Option<NaiveDateTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .ok()
        .map(|time| date.and_time(time))
}

fn parse_end(date: NaiveDate, raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| parse_time_on(date, raw))
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::MergeParse {
        line,
        message: message.into(),
    }
}

/// Parse a merge document back into sessions.
///
/// Any malformed record fails the whole document.
pub fn parse_sessions(text: &str) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();
    let mut block = BlockBuilder::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        // Values keep their trailing whitespace; only classification trims
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let trimmed = line.trim();

        if MARKER_PREFIXES.iter().any(|marker| trimmed.starts_with(marker)) {
            return Err(parse_error(line_no, "unresolved conflict marker"));
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == SEPARATOR {
            let finished = std::mem::take(&mut block);
            if !finished.is_empty() {
                sessions.push(finished.build()?);
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(parse_error(line_no, format!("expected 'key: value', got '{trimmed}'")));
        };
        if block.is_empty() {
            block.first_line = line_no;
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        block.set(line_no, key.trim(), value)?;
    }

    if !block.is_empty() {
        sessions.push(block.build()?);
    }
    Ok(sessions)
}
