//! JSON file mirror

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{RemoteMirror, RemoteRow, RowHandle};
use crate::error::{Error, Result};
use crate::models::{Client, Session, SessionId};
use crate::util::{format_timestamp, parse_timestamp};

/// A mirror stored as a JSON array of rows; a missing file is an empty mirror
#[derive(Debug, Clone)]
pub struct FileRemote {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct FileRow {
    #[serde(default)]
    id: Option<u32>,
    client: String,
    start: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    note: String,
}

impl From<&Session> for FileRow {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.map(SessionId::get),
            client: session.client.name.clone(),
            start: format_timestamp(session.start),
            end: session.end.map(format_timestamp),
            note: session.note.clone(),
        }
    }
}

impl FileRow {
    fn into_session(self, index: usize) -> Result<Session> {
        let invalid = |field: &str, value: &str| {
            Error::Remote(format!("row {index}: invalid {field} '{value}'"))
        };

        let start = parse_timestamp(&self.start).ok_or_else(|| invalid("start", &self.start))?;
        let end = match self.end.as_deref() {
            None => None,
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| invalid("end", raw))?),
        };

        Ok(Session {
            id: self.id.map(SessionId::new),
            client: Client::named(self.client),
            start,
            end,
            note: self.note,
        })
    }
}

impl FileRemote {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<FileRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn store(&self, rows: &[FileRow]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(rows)?)?;
        Ok(())
    }
}

impl RemoteMirror for FileRemote {
    fn read_all(&mut self) -> Result<Vec<RemoteRow>> {
        self.load()?
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                Ok(RemoteRow {
                    session: row.into_session(index)?,
                    handle: RowHandle(index),
                })
            })
            .collect()
    }

    fn append(&mut self, session: &Session) -> Result<()> {
        let mut rows = self.load()?;
        rows.push(FileRow::from(session));
        self.store(&rows)
    }

    fn overwrite(&mut self, handle: RowHandle, session: &Session) -> Result<()> {
        let mut rows = self.load()?;
        let row = rows
            .get_mut(handle.0)
            .ok_or_else(|| Error::Remote(format!("row {handle} does not exist")))?;
        *row = FileRow::from(session);
        self.store(&rows)
    }
}
