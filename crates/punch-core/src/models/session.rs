//! Session model

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Client;
use crate::util::truncate_to_seconds;

/// Stable identifier assigned by the store of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for SessionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// One contiguous billable work interval for a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Absent until the store of record assigns one
    pub id: Option<SessionId>,
    /// Billing party
    pub client: Client,
    /// Local wall-clock start
    pub start: NaiveDateTime,
    /// Local wall-clock end; absent while the session is running
    pub end: Option<NaiveDateTime>,
    /// Free-text annotation
    pub note: String,
}

impl Session {
    /// Create a new open session starting at `start`
    pub fn open(client: Client, start: NaiveDateTime, note: impl Into<String>) -> Self {
        Self {
            id: None,
            client,
            start: truncate_to_seconds(start),
            end: None,
            note: note.into(),
        }
    }

    /// Builder-style id assignment
    #[must_use]
    pub const fn with_id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder-style end assignment
    #[must_use]
    pub fn with_end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(truncate_to_seconds(end));
        self
    }

    /// Whether the session is still running
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Same client by case-insensitive name
    #[must_use]
    pub fn same_client(&self, other: &Self) -> bool {
        self.client.same_name(&other.client.name)
    }

    /// Id, start, end, client name and note all match
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        self.id == other.id
            && self.start == other.start
            && self.end == other.end
            && self.same_client(other)
            && self.note == other.note
    }

    /// Same client and same start at second precision.
    ///
    /// Fallback identity when no id is available on one side.
    #[must_use]
    pub fn is_similar(&self, other: &Self) -> bool {
        self.same_client(other)
            && truncate_to_seconds(self.start) == truncate_to_seconds(other.start)
    }

    /// Same id with differing content.
    ///
    /// End times only count when both sides have one. Sessions with
    /// different ids never conflict, even when they describe the same
    /// real-world interval.
    #[must_use]
    pub fn conflicts(&self, other: &Self) -> bool {
        let same_id = matches!((self.id, other.id), (Some(a), Some(b)) if a == b);
        if !same_id {
            return false;
        }

        let end_differs = matches!((self.end, other.end), (Some(a), Some(b)) if a != b);
        end_differs
            || self.start != other.start
            || !self.same_client(other)
            || self.note != other.note
    }

    /// Check `start <= end`
    pub fn validate(&self) -> crate::Result<()> {
        match self.end {
            Some(end) if end < self.start => Err(crate::Error::InvalidSession(format!(
                "end {} is before start {}",
                end.format(crate::util::TIMESTAMP_FORMAT),
                self.start.format(crate::util::TIMESTAMP_FORMAT)
            ))),
            _ => Ok(()),
        }
    }

    /// Elapsed time, if the session has ended
    #[must_use]
    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.end.map(|end| end - self.start)
    }

    /// Elapsed time as `HH:MM:SS`, or `N/A` for open sessions
    #[must_use]
    pub fn duration(&self) -> String {
        self.elapsed().map_or_else(|| "N/A".to_string(), format_delta)
    }

    /// Rate multiplied by elapsed hours
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn earnings(&self) -> Option<f64> {
        let seconds = self.elapsed()?.num_seconds() as f64;
        Some(f64::from(self.client.rate) * seconds / 3600.0)
    }

    /// Number of calendar days between start and end dates
    #[must_use]
    pub fn days_spanned(&self) -> i64 {
        self.end
            .map_or(0, |end| (end.date() - self.start.date()).num_days())
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Client: {}, Date: {}, Duration: {}",
            self.client.name,
            self.start.format("%d/%m/%Y"),
            self.duration()
        )
    }
}

/// Format a delta as `HH:MM:SS`
pub(crate) fn format_delta(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}
