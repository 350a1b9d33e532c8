use punch_core::remote::Remote;
use punch_core::sync::{Reconciler, SyncOptions, SyncSummary};
use punch_core::Error;

use crate::commands::common::Context;
use crate::editor::{TerminalConfirm, TerminalEditor};
use crate::error::CliError;

pub fn run_sync(
    ctx: &Context,
    remote_name: Option<&str>,
    pull_only: bool,
    assume_yes: bool,
) -> Result<(), CliError> {
    let (name, remote_config) = ctx.config.remote(remote_name)?;
    let mut remote = Remote::from_config(remote_config)?;
    let mut editor = TerminalEditor::new(ctx.config.settings.editor.as_deref());
    let mut confirm = TerminalConfirm::new(assume_yes);
    let store = ctx.sessions();

    tracing::info!("Syncing with remote '{}'", name);
    let result = Reconciler::new(&store, &mut remote, &mut editor, &mut confirm)
        .sync(SyncOptions { pull_only });

    match result {
        Ok(summary) => {
            println!("{}", describe_summary(&name, &summary));
            Ok(())
        }
        Err(Error::PushConflicts(conflicts)) => {
            for conflict in &conflicts {
                eprintln!("conflict: {conflict}");
            }
            Err(Error::PushConflicts(conflicts).into())
        }
        Err(error) => Err(error.into()),
    }
}

pub fn describe_summary(remote_name: &str, summary: &SyncSummary) -> String {
    if summary.is_noop() {
        format!("Already in sync with '{remote_name}'")
    } else {
        format!("Synced with '{remote_name}': {summary}")
    }
}
