//! Report windows and time arguments.
//!
//! Every query carries its own window and client filter; nothing is read
//! from process-wide state.

use std::sync::OnceLock;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

use crate::db::SessionStore;
use crate::error::{Error, Result};
use crate::models::Session;
use crate::util::start_of_day;

static RELATIVE_OFFSET: OnceLock<Regex> = OnceLock::new();

const SESSIONS_BACK_PREFIX: &str = "HEAD~";
const TIME_LAYOUTS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%H"];

/// Window a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    /// Today
    Day,
    /// The current week, starting Sunday
    Week,
    /// A month of the current year
    Month(u32),
    Year(i32),
    All,
    /// From a point in time until now
    Since(NaiveDateTime),
}

impl Timeframe {
    pub fn month(month: u32) -> Result<Self> {
        if (1..=12).contains(&month) {
            Ok(Self::Month(month))
        } else {
            Err(Error::InvalidInput(format!("invalid month '{month}'")))
        }
    }

    pub fn year(year: i32, now: NaiveDateTime) -> Result<Self> {
        if (1970..=now.year()).contains(&year) {
            Ok(Self::Year(year))
        } else {
            Err(Error::InvalidInput(format!("invalid year '{year}'")))
        }
    }

    /// Half-open `[start, end)` window relative to `now`
    pub fn window(self, now: NaiveDateTime) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let today = now.date();
        let out_of_range = || Error::InvalidInput("date out of range".into());

        let (start, end) = match self {
            Self::Day => (today, today + Days::new(1)),
            Self::Week => {
                let back = u64::from(today.weekday().num_days_from_sunday());
                let start = today - Days::new(back);
                (start, start + Days::new(7))
            }
            Self::Month(month) => {
                let start = NaiveDate::from_ymd_opt(today.year(), month, 1).ok_or_else(out_of_range)?;
                let end = start
                    .checked_add_months(Months::new(1))
                    .ok_or_else(out_of_range)?;
                (start, end)
            }
            Self::Year(year) => (
                NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(out_of_range)?,
            ),
            Self::All => (
                NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(out_of_range)?,
                NaiveDate::from_ymd_opt(9999, 12, 31).ok_or_else(out_of_range)?,
            ),
            Self::Since(since) => return Ok((since, now + TimeDelta::seconds(1))),
        };

        Ok((start_of_day(start), start_of_day(end)))
    }
}

/// Sessions in a window, optionally for one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub timeframe: Timeframe,
    pub client: Option<String>,
    pub descending: bool,
}

impl SessionQuery {
    #[must_use]
    pub const fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            client: None,
            descending: false,
        }
    }

    #[must_use]
    pub fn for_client(mut self, client: Option<String>) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub const fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn run(&self, store: &dyn SessionStore, now: NaiveDateTime) -> Result<Vec<Session>> {
        let (start, end) = self.timeframe.window(now)?;
        let mut sessions: Vec<Session> = store
            .get_between(start, end)?
            .into_iter()
            .filter(|session| {
                self.client
                    .as_deref()
                    .map_or(true, |client| session.client.same_name(client))
            })
            .collect();

        if self.descending {
            sessions.reverse();
        }
        Ok(sessions)
    }
}

/// Resolve a time argument against `now`.
///
/// Accepts `HH[:MM[:SS]]` (today), relative offsets such as `-30m`, `-1.5h`
/// or `-2d` (`M` is 30 days, `y` 365 days) and `HEAD~N`, the start of the
/// Nth most recent session.
pub fn resolve_time(
    input: &str,
    now: NaiveDateTime,
    store: &dyn SessionStore,
    client: Option<&str>,
) -> Result<NaiveDateTime> {
    let input = input.trim();

    if let Some(count) = input.strip_prefix(SESSIONS_BACK_PREFIX) {
        let count: usize = count
            .parse()
            .ok()
            .filter(|count| *count >= 1)
            .ok_or_else(|| {
                Error::InvalidInput(format!("invalid count in '{input}', expected HEAD~<positive integer>"))
            })?;
        let sessions = store.last_sessions(count, client)?;
        return sessions
            .last()
            .map(|session| session.start)
            .ok_or_else(|| Error::NotFound("no sessions to count back from".into()));
    }

    if input.starts_with('-') {
        return parse_relative(input, now);
    }

    TIME_LAYOUTS
        .iter()
        .find_map(|layout| parse_clock_time(input, layout))
        .map(|time| now.date().and_time(time))
        .ok_or_else(|| Error::InvalidInput(format!("invalid time '{input}'")))
}

fn parse_clock_time(input: &str, layout: &str) -> Option<NaiveTime> {
    if layout == "%H" {
        let hour: u32 = input.parse().ok()?;
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }
    NaiveTime::parse_from_str(input, layout).ok()
}

#[allow(clippy::cast_possible_truncation)]
fn parse_relative(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let invalid = || Error::InvalidInput(format!("invalid relative time '{input}'"));
    let pattern = RELATIVE_OFFSET
        .get_or_init(|| Regex::new(r"^-(\d+(?:\.\d+)?)([mhdwMy])$").expect("Invalid regex"));
    let captures = pattern.captures(input).ok_or_else(invalid)?;

    let amount: f64 = captures[1].parse().map_err(|_| invalid())?;
    let unit_seconds: f64 = match &captures[2] {
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86_400.0,
        "w" => 7.0 * 86_400.0,
        "M" => 30.0 * 86_400.0,
        "y" => 365.0 * 86_400.0,
        _ => return Err(invalid()),
    };

    let seconds = (amount * unit_seconds).round();
    if !seconds.is_finite() || seconds > i64::MAX as f64 {
        return Err(invalid());
    }
    let offset = TimeDelta::try_seconds(seconds as i64).ok_or_else(invalid)?;
    now.checked_sub_signed(offset).ok_or_else(invalid)
}
