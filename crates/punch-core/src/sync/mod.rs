//! Pull, merge and push between the local store and a remote mirror.
//!
//! A run is strictly sequential: read the remote, classify every remote row
//! against the store with dry-run inserts, let a human settle same-id
//! conflicts, apply the local writes, then push the reconciled local set.
//! No local write happens before the merge has been accepted.

use std::collections::BTreeSet;
use std::fmt;

use crate::db::SessionStore;
use crate::error::{Error, Result};
use crate::merge::{ConflictRenderer, InteractiveEditor, Resolution};
use crate::models::{Session, SessionId};
use crate::remote::{RemoteMirror, RemoteRow, RowHandle};

/// A local session and the remote row it disagrees with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConflict {
    pub local: Session,
    pub remote: Session,
}

impl fmt::Display for PushConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local [{}] vs remote [{}]", self.local, self.remote)
    }
}

/// Asks for explicit approval before sessions are deleted
pub trait ConfirmDeletion {
    fn confirm_deletion(&mut self, sessions: &[Session]) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Stop after the pull phase
    pub pull_only: bool,
}

/// Counts reported after a successful run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Remote sessions inserted locally
    pub inserted: usize,
    /// Local open sessions closed with the remote end time
    pub updated_locally: usize,
    /// Sessions written from the accepted merge
    pub resolved: usize,
    /// Local sessions deleted after confirmation
    pub deleted: usize,
    /// Remote rows that could not be applied locally
    pub skipped: usize,
    /// Rows appended to the remote
    pub added: usize,
    /// Remote rows overwritten
    pub updated: usize,
}

impl SyncSummary {
    /// Whether the run changed anything on either side
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.inserted == 0
            && self.updated_locally == 0
            && self.resolved == 0
            && self.deleted == 0
            && self.added == 0
            && self.updated == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pulled {} new, {} closed, {} resolved, {} deleted, {} skipped; pushed {} added, {} updated",
            self.inserted,
            self.updated_locally,
            self.resolved,
            self.deleted,
            self.skipped,
            self.added,
            self.updated
        )
    }
}

#[derive(Default)]
struct PullPlan {
    to_insert: Vec<Session>,
    fast_forward: Vec<Session>,
    conflicts_local: Vec<Session>,
    conflicts_remote: Vec<Session>,
    skipped: usize,
}

enum PushAction {
    Append(Session),
    Overwrite(RowHandle, Session),
}

/// Orchestrates one sync run against one remote
pub struct Reconciler<'a> {
    store: &'a dyn SessionStore,
    remote: &'a mut dyn RemoteMirror,
    editor: &'a mut dyn InteractiveEditor,
    confirm: &'a mut dyn ConfirmDeletion,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn SessionStore,
        remote: &'a mut dyn RemoteMirror,
        editor: &'a mut dyn InteractiveEditor,
        confirm: &'a mut dyn ConfirmDeletion,
    ) -> Self {
        Self {
            store,
            remote,
            editor,
            confirm,
        }
    }

    /// Run pull, merge and (unless `pull_only`) push.
    pub fn sync(&mut self, options: SyncOptions) -> Result<SyncSummary> {
        let remote_rows = self.remote.read_all()?;
        tracing::info!("Read {} remote row(s)", remote_rows.len());

        let plan = self.plan_pull(&remote_rows)?;
        let mut summary = SyncSummary {
            skipped: plan.skipped,
            ..SyncSummary::default()
        };

        let resolution = if plan.conflicts_local.is_empty() {
            None
        } else {
            tracing::info!("{} conflicting session(s) need review", plan.conflicts_local.len());
            Some(
                ConflictRenderer::new(&mut *self.editor)
                    .resolve(&plan.conflicts_local, &plan.conflicts_remote)?,
            )
        };
        if let Some(resolution) = &resolution {
            self.check_resolution(resolution)?;
        }

        let deletions = match &resolution {
            Some(resolution) if !resolution.deleted.is_empty() => {
                if self.confirm.confirm_deletion(&resolution.deleted)? {
                    resolution.deleted.clone()
                } else {
                    tracing::info!("Deletion of {} session(s) declined", resolution.deleted.len());
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };

        self.apply_pull(&plan, resolution.as_ref(), &deletions, &mut summary)?;

        if options.pull_only {
            return Ok(summary);
        }

        let covered: BTreeSet<SessionId> = if resolution.is_some() {
            plan.conflicts_local
                .iter()
                .chain(&plan.conflicts_remote)
                .filter_map(|session| session.id)
                .collect()
        } else {
            BTreeSet::new()
        };
        self.push(&remote_rows, &covered, &mut summary)?;

        tracing::info!("Sync finished: {}", summary);
        Ok(summary)
    }

    fn plan_pull(&self, remote_rows: &[RemoteRow]) -> Result<PullPlan> {
        let mut plan = PullPlan::default();

        for row in remote_rows {
            let remote = &row.session;
            match self.store.insert(remote, true) {
                Ok(_) => plan.to_insert.push(remote.clone()),
                Err(Error::DuplicateId(id)) => {
                    let local = self
                        .store
                        .get_by_id(id)?
                        .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

                    if local.is_identical(remote) {
                        continue;
                    }
                    if local.conflicts(remote) {
                        plan.conflicts_local.push(local);
                        plan.conflicts_remote.push(remote.clone());
                    } else if local.is_open() {
                        if let Some(end) = remote.end {
                            plan.fast_forward.push(local.with_end(end));
                        }
                    }
                    // a closed local session with an open remote row is pushed as-is
                }
                Err(Error::Conflict(reason) | Error::InvalidSession(reason)) => {
                    tracing::debug!("Skipping remote row {}: {}", row.handle, reason);
                    plan.skipped += 1;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(plan)
    }

    /// Dry-run every accepted session so a bad merge fails before any write.
    fn check_resolution(&self, resolution: &Resolution) -> Result<()> {
        let mut open: Vec<&Session> = Vec::new();
        for session in &resolution.sessions {
            self.store.upsert(session, true)?;
            if !session.is_open() {
                continue;
            }
            if let Some(other) = open
                .iter()
                .find(|other| other.client.same_name(&session.client.name))
            {
                return Err(Error::Conflict(format!(
                    "merge leaves more than one session open for client '{}': [{}] and [{}]",
                    session.client.name, other, session
                )));
            }
            open.push(session);
        }
        Ok(())
    }

    fn apply_pull(
        &self,
        plan: &PullPlan,
        resolution: Option<&Resolution>,
        deletions: &[Session],
        summary: &mut SyncSummary,
    ) -> Result<()> {
        // Resolutions were checked against the untouched store, so they go first
        if let Some(resolution) = resolution {
            for session in &resolution.sessions {
                self.store.upsert(session, false)?;
                summary.resolved += 1;
            }
        }

        for session in &plan.to_insert {
            match self.store.insert(session, false) {
                Ok(_) => summary.inserted += 1,
                Err(Error::Conflict(reason)) => {
                    tracing::debug!("Skipping {}: {}", session, reason);
                    summary.skipped += 1;
                }
                Err(Error::DuplicateId(id)) => {
                    tracing::debug!("Skipping {}: id {} already taken", session, id);
                    summary.skipped += 1;
                }
                Err(error) => return Err(error),
            }
        }

        for session in &plan.fast_forward {
            self.store.update(session, false)?;
            summary.updated_locally += 1;
        }

        for session in deletions {
            match self.store.delete(session, false) {
                Ok(()) => summary.deleted += 1,
                Err(Error::NotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }

        tracing::info!(
            "Pulled {} new, {} closed, {} resolved, {} deleted, {} skipped",
            summary.inserted,
            summary.updated_locally,
            summary.resolved,
            summary.deleted,
            summary.skipped
        );
        Ok(())
    }

    fn push(
        &mut self,
        remote_rows: &[RemoteRow],
        covered: &BTreeSet<SessionId>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let local_sessions = self.store.get_all()?;
        let pairing = pair_with_remote(&local_sessions, remote_rows);

        let mut actions = Vec::new();
        let mut conflicts = Vec::new();

        for (local, matched) in local_sessions.iter().zip(pairing) {
            let Some(index) = matched else {
                actions.push(PushAction::Append(local.clone()));
                continue;
            };
            let row = &remote_rows[index];
            let remote = &row.session;

            if remote.id.is_none() {
                actions.push(PushAction::Overwrite(row.handle, local.clone()));
            } else if local.conflicts(remote)
                && !local.id.is_some_and(|id| covered.contains(&id))
            {
                conflicts.push(PushConflict {
                    local: local.clone(),
                    remote: remote.clone(),
                });
            } else if !local.is_identical(remote) {
                actions.push(PushAction::Overwrite(row.handle, local.clone()));
            }
        }

        if !conflicts.is_empty() {
            tracing::warn!("{} push conflict(s); nothing was pushed", conflicts.len());
            return Err(Error::PushConflicts(conflicts));
        }

        for action in actions {
            match action {
                PushAction::Append(session) => {
                    self.remote.append(&session)?;
                    summary.added += 1;
                }
                PushAction::Overwrite(handle, session) => {
                    self.remote.overwrite(handle, &session)?;
                    summary.updated += 1;
                }
            }
        }

        tracing::info!("Pushed {} added, {} updated", summary.added, summary.updated);
        Ok(())
    }
}

/// Match each local session to a remote row, by id first, then by similarity.
///
/// Every remote row is used at most once.
fn pair_with_remote(local: &[Session], remote_rows: &[RemoteRow]) -> Vec<Option<usize>> {
    let mut taken = vec![false; remote_rows.len()];
    let mut pairing = vec![None; local.len()];

    for (slot, session) in pairing.iter_mut().zip(local) {
        let Some(id) = session.id else { continue };
        if let Some(index) = remote_rows
            .iter()
            .enumerate()
            .position(|(i, row)| !taken[i] && row.session.id == Some(id))
        {
            taken[index] = true;
            *slot = Some(index);
        }
    }

    for (slot, session) in pairing.iter_mut().zip(local) {
        if slot.is_some() {
            continue;
        }
        if let Some(index) = remote_rows
            .iter()
            .enumerate()
            .position(|(i, row)| !taken[i] && row.session.is_similar(session))
        {
            taken[index] = true;
            *slot = Some(index);
        }
    }

    pairing
}
