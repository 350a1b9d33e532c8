use punch_core::config::AutoSyncAction;
use punch_core::db::SessionStore;
use punch_core::merge::{
    detect_deleted_sessions, parse_sessions, serialize_sessions, InteractiveEditor,
};
use punch_core::sync::ConfirmDeletion;
use punch_core::util::{now, start_of_day};
use punch_core::{Error, Session, SessionId};

use crate::commands::common::{resolve_date_arg, Context};
use crate::editor::{TerminalConfirm, TerminalEditor};
use crate::error::CliError;

/// Which sessions `edit session` opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditSelection {
    Id(SessionId),
    Date(String),
    All,
    /// The client's latest session started today
    LatestToday(Option<String>),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub updated: usize,
    pub failed: Vec<String>,
    pub deleted: usize,
}

pub fn run_edit_session(
    ctx: &Context,
    selection: EditSelection,
    assume_yes: bool,
) -> Result<(), CliError> {
    let store = ctx.sessions();
    let sessions = select_sessions(ctx, &store, selection)?;

    let mut editor = TerminalEditor::new(ctx.config.settings.editor.as_deref());
    let mut confirm = TerminalConfirm::new(assume_yes);
    let outcome = apply_session_edits(&store, &mut editor, &mut confirm, &sessions)?;

    for failure in &outcome.failed {
        eprintln!("{failure}");
    }
    println!("Updated {} session(s)", outcome.updated);
    if outcome.deleted > 0 {
        println!("Deleted {} session(s)", outcome.deleted);
    }

    ctx.autosync(AutoSyncAction::Edit)
}

fn select_sessions(
    ctx: &Context,
    store: &dyn SessionStore,
    selection: EditSelection,
) -> Result<Vec<Session>, CliError> {
    let mut sessions = match selection {
        EditSelection::All => store.get_all()?,
        EditSelection::Id(id) => vec![store
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?],
        EditSelection::Date(input) => {
            let date = resolve_date_arg(ctx, &input)?;
            let start = start_of_day(date);
            store.get_between(start, start + chrono::Days::new(1))?
        }
        EditSelection::LatestToday(client) => {
            let client = ctx.resolve_client(client.as_deref())?;
            let today = now().date();
            store
                .latest_session(&client.name)?
                .filter(|session| session.start.date() == today)
                .into_iter()
                .collect()
        }
    };

    if sessions.is_empty() {
        return Err(CliError::NoSessions);
    }
    sessions.sort_by_key(|session| session.start);
    Ok(sessions)
}

/// Round-trip `sessions` through the editor and write the result back.
///
/// Every parsed record is applied as an update; records that fail are
/// reported and skipped. Records removed from the document are deleted only
/// after `confirm` approves.
pub fn apply_session_edits(
    store: &dyn SessionStore,
    editor: &mut dyn InteractiveEditor,
    confirm: &mut dyn ConfirmDeletion,
    sessions: &[Session],
) -> Result<EditOutcome, CliError> {
    let edited = editor.edit(&serialize_sessions(sessions))?;
    let edited = parse_sessions(&edited)?;

    let mut outcome = EditOutcome::default();
    for session in &edited {
        match store.update(session, false) {
            Ok(()) => outcome.updated += 1,
            Err(error) => outcome.failed.push(format!(
                "Unable to update session starting {}: {error}",
                session.start
            )),
        }
    }

    let deleted = detect_deleted_sessions(sessions, &edited);
    if !deleted.is_empty() && confirm.confirm_deletion(&deleted)? {
        for session in &deleted {
            match store.delete(session, false) {
                Ok(()) => outcome.deleted += 1,
                Err(error) => outcome
                    .failed
                    .push(format!("Unable to delete session {session}: {error}")),
            }
        }
    }

    Ok(outcome)
}
