use punch_core::config::AutoSyncAction;
use punch_core::db::SessionStore;
use punch_core::{Error, SessionId};

use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_delete_session(ctx: &Context, id: SessionId) -> Result<(), CliError> {
    let store = ctx.sessions();
    let session = store
        .get_by_id(id)?
        .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

    store.delete(&session, false)?;
    println!("Deleted session ({id}) {session}");

    ctx.autosync(AutoSyncAction::Delete)
}
