//! Start/end/toggle state machine for sessions.
//!
//! Each client is either closed (no open session) or open (exactly one
//! session without an end). Every successful transition writes exactly one
//! record through the [`SessionStore`].

use chrono::NaiveDateTime;

use crate::db::SessionStore;
use crate::error::{Error, Result};
use crate::models::{Client, Session};
use crate::util::{format_timestamp, now, truncate_to_seconds};

/// Which transition a toggle performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Ended,
}

/// Session lifecycle operations over a store
pub struct SessionClock<'a, S: SessionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SessionStore + ?Sized> SessionClock<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Open a new session for `client` at `at`.
    pub fn start(&self, client: &Client, at: NaiveDateTime, note: &str) -> Result<Session> {
        if let Some(open) = self.store.get_open_session(&client.name)? {
            return Err(Error::AlreadyStarted(format!(
                "{} (open since {})",
                open.client.name,
                format_timestamp(open.start)
            )));
        }

        let session = Session::open(client.clone(), at, note);
        let session = match self.store.insert(&session, false) {
            Err(Error::Conflict(_)) => return Err(Error::AlreadyStarted(client.name.clone())),
            other => other?,
        };

        tracing::info!(
            "Started session for {} at {}",
            session.client.name,
            format_timestamp(session.start)
        );
        Ok(session)
    }

    /// Close `session` at `at`, appending `note` to the existing note.
    pub fn end(&self, session: &Session, at: NaiveDateTime, note: &str) -> Result<Session> {
        if session.end.is_some() {
            return Err(Error::AlreadyEnded);
        }

        let at = truncate_to_seconds(at);
        if at < session.start {
            return Err(Error::InvalidSession(format!(
                "end {} is before start {}",
                format_timestamp(at),
                format_timestamp(session.start)
            )));
        }

        let mut ended = session.clone().with_end(at);
        ended.note = append_note(&session.note, note);

        let days = ended.days_spanned();
        if days > 0 {
            let suffix = if days == 1 {
                "(+1 day)".to_string()
            } else {
                format!("(+{days} days)")
            };
            ended.note = append_note(&ended.note, &suffix);
        }

        self.store.update(&ended, false)?;
        tracing::info!(
            "Ended session for {} after {}",
            ended.client.name,
            ended.duration()
        );
        Ok(ended)
    }

    /// Close the client's open session, if it has one.
    pub fn end_open(&self, client: &Client, at: NaiveDateTime, note: &str) -> Result<Session> {
        let open = self
            .store
            .get_open_session(&client.name)?
            .ok_or(Error::AlreadyEnded)?;
        self.end(&open, at, note)
    }

    /// Start if the client's latest session is closed (or missing), else end it.
    pub fn toggle(&self, client: &Client, note: &str) -> Result<(Session, Transition)> {
        self.toggle_at(client, now(), note)
    }

    /// [`Self::toggle`] with an explicit timestamp
    pub fn toggle_at(
        &self,
        client: &Client,
        at: NaiveDateTime,
        note: &str,
    ) -> Result<(Session, Transition)> {
        match self.store.latest_session(&client.name)? {
            Some(latest) if latest.is_open() => {
                Ok((self.end(&latest, at, note)?, Transition::Ended))
            }
            _ => Ok((self.start(client, at, note)?, Transition::Started)),
        }
    }
}

fn append_note(existing: &str, addition: &str) -> String {
    let addition = addition.trim();
    match (existing.is_empty(), addition.is_empty()) {
        (_, true) => existing.to_string(),
        (true, false) => addition.to_string(),
        (false, false) => format!("{existing}; {addition}"),
    }
}
