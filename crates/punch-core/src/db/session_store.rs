//! Session store implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Client, Session, SessionId};
use crate::util::{format_timestamp, parse_timestamp};

/// Trait for session storage operations.
///
/// Every mutating operation accepts `dry_run`: when set, all checks run
/// and the would-be result is returned, but nothing is written.
pub trait SessionStore {
    /// Insert a new session, assigning an id when it has none.
    ///
    /// Fails with `DuplicateId` if the id is taken and with `Conflict` if a
    /// similar session exists or the client already has an open session.
    fn insert(&self, session: &Session, dry_run: bool) -> Result<Session>;

    /// Update by id, else recover an id through the similar match, else insert
    fn upsert(&self, session: &Session, dry_run: bool) -> Result<Session>;

    /// Update an existing session by id
    fn update(&self, session: &Session, dry_run: bool) -> Result<()>;

    /// Delete an existing session by id
    fn delete(&self, session: &Session, dry_run: bool) -> Result<()>;

    /// Get a session by id
    fn get_by_id(&self, id: SessionId) -> Result<Option<Session>>;

    /// The client's open session, if any
    fn get_open_session(&self, client: &str) -> Result<Option<Session>>;

    /// The client's most recently started session
    fn latest_session(&self, client: &str) -> Result<Option<Session>>;

    /// A session with the same client and start second
    fn find_similar(&self, session: &Session) -> Result<Option<Session>>;

    /// All sessions, oldest first
    fn get_all(&self) -> Result<Vec<Session>>;

    /// Sessions starting in `[start, end)`, oldest first
    fn get_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<Session>>;

    /// The `count` most recent sessions, newest first
    fn last_sessions(&self, count: usize, client: Option<&str>) -> Result<Vec<Session>>;
}

const SELECT_SESSION: &str = "SELECT s.id, c.name, c.rate, c.currency, s.start_at, s.end_at, s.note
     FROM sessions s
     JOIN clients c ON s.client_name = c.name";

/// `SQLite` implementation of `SessionStore`
pub struct SqliteSessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSessionStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Make sure the referenced client row exists without touching its rate
    fn ensure_client(&self, client: &Client) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO clients (name, rate, currency) VALUES (?, ?, ?)",
            params![client.name, client.rate, client.currency],
        )?;
        Ok(())
    }

    fn query_sessions(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(sql)?;
        let sessions = stmt
            .query_map(params, Self::parse_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn query_session(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Session>> {
        Ok(self
            .conn
            .query_row(sql, params, Self::parse_session)
            .optional()?)
    }

    fn check_open_slot(&self, session: &Session) -> Result<()> {
        if !session.is_open() {
            return Ok(());
        }
        match self.get_open_session(&session.client.name)? {
            Some(open) if open.id != session.id => Err(Error::Conflict(format!(
                "client '{}' already has an open session started {}",
                open.client.name,
                format_timestamp(open.start)
            ))),
            _ => Ok(()),
        }
    }

    /// Parse a session from a database row
    fn parse_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
        let id: i64 = row.get(0)?;
        let id = u32::try_from(id).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(error))
        })?;
        let start: String = row.get(4)?;
        let end: Option<String> = row.get(5)?;

        Ok(Session {
            id: Some(SessionId::new(id)),
            client: Client::new(
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ),
            start: parse_stored_timestamp(&start, 4)?,
            end: end
                .as_deref()
                .map(|value| parse_stored_timestamp(value, 5))
                .transpose()?,
            note: row.get(6)?,
        })
    }
}

fn parse_stored_timestamp(value: &str, column: usize) -> rusqlite::Result<NaiveDateTime> {
    parse_timestamp(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{value}'").into(),
        )
    })
}

fn map_constraint(error: rusqlite::Error, session: &Session) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(format!("{session} violates a uniqueness constraint"))
        }
        other => other.into(),
    }
}

impl SessionStore for SqliteSessionStore<'_> {
    fn insert(&self, session: &Session, dry_run: bool) -> Result<Session> {
        session.validate()?;

        if let Some(id) = session.id {
            if self.get_by_id(id)?.is_some() {
                return Err(Error::DuplicateId(id));
            }
        }
        if let Some(existing) = self.find_similar(session)? {
            let existing_id = existing
                .id
                .map_or_else(|| "?".to_string(), |id| id.to_string());
            return Err(Error::Conflict(format!(
                "{session} is similar to session {existing_id}"
            )));
        }
        self.check_open_slot(session)?;

        if dry_run {
            return Ok(session.clone());
        }

        self.ensure_client(&session.client)?;
        self.conn
            .execute(
                "INSERT INTO sessions (id, client_name, start_at, end_at, note) VALUES (?, ?, ?, ?, ?)",
                params![
                    session.id.map(SessionId::get),
                    session.client.name,
                    format_timestamp(session.start),
                    session.end.map(format_timestamp),
                    session.note
                ],
            )
            .map_err(|error| map_constraint(error, session))?;

        let rowid = self.conn.last_insert_rowid();
        let id = u32::try_from(rowid)
            .map_err(|_| Error::Database(format!("session id {rowid} out of range")))?;

        let mut inserted = session.clone();
        inserted.id = Some(SessionId::new(id));
        tracing::debug!("Inserted session {}", id);
        Ok(inserted)
    }

    fn upsert(&self, session: &Session, dry_run: bool) -> Result<Session> {
        session.validate()?;

        let target = match session.id {
            Some(id) => self.get_by_id(id)?.map(|_| id),
            None => self.find_similar(session)?.and_then(|existing| existing.id),
        };

        match target {
            Some(id) => {
                let mut updated = session.clone();
                updated.id = Some(id);
                self.update(&updated, dry_run)?;
                Ok(updated)
            }
            None => self.insert(session, dry_run),
        }
    }

    fn update(&self, session: &Session, dry_run: bool) -> Result<()> {
        let Some(id) = session.id else {
            return Err(Error::InvalidInput(
                "cannot update a session without an id".into(),
            ));
        };
        session.validate()?;

        if self.get_by_id(id)?.is_none() {
            return Err(Error::NotFound(format!("session {id}")));
        }
        self.check_open_slot(session)?;

        if dry_run {
            return Ok(());
        }

        self.ensure_client(&session.client)?;
        self.conn
            .execute(
                "UPDATE sessions SET client_name = ?, start_at = ?, end_at = ?, note = ? WHERE id = ?",
                params![
                    session.client.name,
                    format_timestamp(session.start),
                    session.end.map(format_timestamp),
                    session.note,
                    id.get()
                ],
            )
            .map_err(|error| map_constraint(error, session))?;

        tracing::debug!("Updated session {}", id);
        Ok(())
    }

    fn delete(&self, session: &Session, dry_run: bool) -> Result<()> {
        let Some(id) = session.id else {
            return Err(Error::InvalidInput(
                "cannot delete a session without an id".into(),
            ));
        };

        if self.get_by_id(id)?.is_none() {
            return Err(Error::NotFound(format!("session {id}")));
        }
        if dry_run {
            return Ok(());
        }

        self.conn
            .execute("DELETE FROM sessions WHERE id = ?", params![id.get()])?;
        tracing::debug!("Deleted session {}", id);
        Ok(())
    }

    fn get_by_id(&self, id: SessionId) -> Result<Option<Session>> {
        self.query_session(&format!("{SELECT_SESSION} WHERE s.id = ?"), params![id.get()])
    }

    fn get_open_session(&self, client: &str) -> Result<Option<Session>> {
        self.query_session(
            &format!(
                "{SELECT_SESSION} WHERE s.client_name = ? AND s.end_at IS NULL
                 ORDER BY s.start_at DESC LIMIT 1"
            ),
            params![client],
        )
    }

    fn latest_session(&self, client: &str) -> Result<Option<Session>> {
        self.query_session(
            &format!(
                "{SELECT_SESSION} WHERE s.client_name = ?
                 ORDER BY s.start_at DESC, s.id DESC LIMIT 1"
            ),
            params![client],
        )
    }

    fn find_similar(&self, session: &Session) -> Result<Option<Session>> {
        self.query_session(
            &format!(
                "{SELECT_SESSION} WHERE s.client_name = ? AND s.start_at = ?
                 ORDER BY s.id LIMIT 1"
            ),
            params![session.client.name, format_timestamp(session.start)],
        )
    }

    fn get_all(&self) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!("{SELECT_SESSION} ORDER BY s.start_at ASC, s.id ASC"),
            [],
        )
    }

    fn get_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "{SELECT_SESSION} WHERE s.start_at >= ? AND s.start_at < ?
                 ORDER BY s.start_at ASC, s.id ASC"
            ),
            params![format_timestamp(start), format_timestamp(end)],
        )
    }

    fn last_sessions(&self, count: usize, client: Option<&str>) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "{SELECT_SESSION} WHERE (?1 IS NULL OR s.client_name = ?1)
                 ORDER BY s.start_at DESC, s.id DESC LIMIT ?2"
            ),
            params![client, count as i64],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn acme() -> Client {
        Client::new("Acme", 100, "USD")
    }

    fn closed(day: u32, start: u32, end: u32) -> Session {
        Session::open(acme(), at(day, start, 0), "").with_end(at(day, end, 0))
    }

    #[test]
    fn test_insert_assigns_id_and_reads_back() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let inserted = store.insert(&closed(1, 9, 17), false).unwrap();
        let id = inserted.id.unwrap();

        let fetched = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(fetched, inserted);
    }

    #[test]
    fn test_insert_dry_run_writes_nothing() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.insert(&closed(1, 9, 17), true).unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let inserted = store.insert(&closed(1, 9, 17), false).unwrap();
        let mut other = closed(2, 9, 17);
        other.id = inserted.id;

        let result = store.insert(&other, true);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if Some(id) == inserted.id));
    }

    #[test]
    fn test_insert_rejects_similar_session() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.insert(&closed(1, 9, 17), false).unwrap();
        let mut similar = closed(1, 9, 18);
        similar.client = Client::named("ACME");

        assert!(matches!(store.insert(&similar, false), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_insert_rejects_second_open_session() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store
            .insert(&Session::open(acme(), at(1, 9, 0), ""), false)
            .unwrap();
        let second = Session::open(acme(), at(1, 10, 0), "");
        assert!(matches!(store.insert(&second, true), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_insert_keeps_explicit_id() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let session = closed(1, 9, 17).with_id(SessionId::new(40));
        let inserted = store.insert(&session, false).unwrap();
        assert_eq!(inserted.id, Some(SessionId::new(40)));
    }

    #[test]
    fn test_insert_creates_unknown_client() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let session = Session::open(Client::named("Globex"), at(1, 9, 0), "");
        let inserted = store.insert(&session, false).unwrap();
        let fetched = store.get_by_id(inserted.id.unwrap()).unwrap().unwrap();
        assert_eq!(fetched.client.name, "Globex");
        assert_eq!(fetched.client.rate, 0);
    }

    #[test]
    fn test_upsert_recovers_id_through_similar_match() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let inserted = store.insert(&closed(1, 9, 17), false).unwrap();
        let mut edited = closed(1, 9, 18);
        edited.note = "overtime".to_string();

        let upserted = store.upsert(&edited, false).unwrap();
        assert_eq!(upserted.id, inserted.id);

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].end, Some(at(1, 18, 0)));
        assert_eq!(all[0].note, "overtime");
    }

    #[test]
    fn test_upsert_inserts_when_unmatched() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.upsert(&closed(1, 9, 17), false).unwrap();
        store.upsert(&closed(2, 9, 17), false).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_delete_require_existing_id() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let missing = closed(1, 9, 17).with_id(SessionId::new(9));
        assert!(matches!(store.update(&missing, false), Err(Error::NotFound(_))));
        assert!(matches!(store.delete(&missing, false), Err(Error::NotFound(_))));
        assert!(matches!(
            store.update(&closed(1, 9, 17), false),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_delete_dry_run_keeps_row() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        let inserted = store.insert(&closed(1, 9, 17), false).unwrap();
        store.delete(&inserted, true).unwrap();
        assert!(store.get_by_id(inserted.id.unwrap()).unwrap().is_some());

        store.delete(&inserted, false).unwrap();
        assert!(store.get_by_id(inserted.id.unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_open_and_latest_session_queries() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.insert(&closed(1, 9, 17), false).unwrap();
        assert!(store.get_open_session("acme").unwrap().is_none());

        let open = store
            .insert(&Session::open(acme(), at(2, 9, 0), ""), false)
            .unwrap();
        assert_eq!(store.get_open_session("ACME").unwrap(), Some(open.clone()));
        assert_eq!(store.latest_session("Acme").unwrap(), Some(open));
        assert!(store.latest_session("Globex").unwrap().is_none());
    }

    #[test]
    fn test_get_between_is_half_open() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.insert(&closed(1, 9, 17), false).unwrap();
        store.insert(&closed(2, 9, 17), false).unwrap();
        store.insert(&closed(3, 9, 17), false).unwrap();

        let sessions = store.get_between(at(2, 0, 0), at(3, 9, 0)).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, at(2, 9, 0));
    }

    #[test]
    fn test_last_sessions_filters_by_client() {
        let db = setup();
        let store = SqliteSessionStore::new(db.connection());

        store.insert(&closed(1, 9, 17), false).unwrap();
        store.insert(&closed(2, 9, 17), false).unwrap();
        store
            .insert(
                &Session::open(Client::named("Globex"), at(3, 9, 0), "").with_end(at(3, 10, 0)),
                false,
            )
            .unwrap();

        let last = store.last_sessions(2, None).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].client.name, "Globex");

        let acme_only = store.last_sessions(5, Some("acme")).unwrap();
        assert_eq!(acme_only.len(), 2);
        assert!(acme_only[0].start > acme_only[1].start);
    }
}
