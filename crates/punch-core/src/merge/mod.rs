//! Human-mediated merge of divergent session sets

mod diff;
mod document;

use std::collections::BTreeSet;

pub use diff::{conflict_document, LOCAL_MARKER, REMOTE_MARKER, SPLIT_MARKER};
pub use document::{parse_sessions, serialize_sessions, SEPARATOR};

use crate::error::{Error, Result};
use crate::models::{Session, SessionId};

/// Lets a human edit text
pub trait InteractiveEditor {
    /// Return the edited text, or `Error::NoChangesMade` if the human left it untouched.
    fn edit(&mut self, text: &str) -> Result<String>;
}

/// Outcome of a merge accepted by the human
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Sessions to treat as authoritative
    pub sessions: Vec<Session>,
    /// Sessions whose ids disappeared during the edit
    pub deleted: Vec<Session>,
}

const HEADER: &str = "\
# Resolve each conflict below by keeping one side (or writing a corrected record).
# Lines between <<<<<<< LOCAL and ======= are from this machine,
# lines between ======= and >>>>>>> REMOTE are from the remote.
# Remove every marker line before saving. Removing a whole record deletes it.
";

/// Renders conflicting sessions for review and parses the reviewer's choice
pub struct ConflictRenderer<'a> {
    editor: &'a mut dyn InteractiveEditor,
}

impl<'a> ConflictRenderer<'a> {
    pub fn new(editor: &'a mut dyn InteractiveEditor) -> Self {
        Self { editor }
    }

    /// The conflict document shown to the reviewer, without the header
    pub fn render(local: &[Session], remote: &[Session]) -> String {
        conflict_document(
            &serialize_sessions(&sorted_by_start(local)),
            &serialize_sessions(&sorted_by_start(remote)),
        )
    }

    /// Show the conflicts to the reviewer and parse the result.
    ///
    /// An untouched document aborts the merge.
    pub fn resolve(&mut self, local: &[Session], remote: &[Session]) -> Result<Resolution> {
        let document = format!("{HEADER}{}", Self::render(local, remote));

        let edited = match self.editor.edit(&document) {
            Err(Error::NoChangesMade) => return Err(Error::MergeAborted),
            other => other?,
        };
        if edited == document {
            return Err(Error::MergeAborted);
        }

        let sessions = parse_sessions(&edited)?;
        let before: Vec<Session> = local.iter().chain(remote).cloned().collect();
        let deleted = detect_deleted_sessions(&before, &sessions);

        tracing::info!(
            "Merge resolved {} session(s), {} deletion request(s)",
            sessions.len(),
            deleted.len()
        );
        Ok(Resolution { sessions, deleted })
    }
}

fn sorted_by_start(sessions: &[Session]) -> Vec<Session> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by_key(|session| session.start);
    sorted
}

/// Sessions whose id is present in `before` and absent from `after`.
///
/// Each id is reported once, using its first occurrence in `before`.
pub fn detect_deleted_sessions(before: &[Session], after: &[Session]) -> Vec<Session> {
    let kept: BTreeSet<SessionId> = after.iter().filter_map(|session| session.id).collect();
    let mut seen = BTreeSet::new();

    before
        .iter()
        .filter(|session| {
            session
                .id
                .is_some_and(|id| !kept.contains(&id) && seen.insert(id))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn acme(id: u32, start: u32, end: u32) -> Session {
        Session::open(Client::new("Acme", 100, "USD"), at(start), "x")
            .with_id(SessionId::new(id))
            .with_end(at(end))
    }

    struct ScriptedEditor<F> {
        script: F,
        seen: Vec<String>,
    }

    fn scripted<F: FnMut(&str) -> Result<String>>(script: F) -> ScriptedEditor<F> {
        ScriptedEditor {
            script,
            seen: Vec::new(),
        }
    }

    impl<F: FnMut(&str) -> Result<String>> InteractiveEditor for ScriptedEditor<F> {
        fn edit(&mut self, text: &str) -> Result<String> {
            self.seen.push(text.to_string());
            (self.script)(text)
        }
    }

    fn keep_side(text: &str, keep_local: bool) -> String {
        let mut out = Vec::new();
        let mut side = None;
        for line in text.lines() {
            match line {
                LOCAL_MARKER => side = Some(true),
                SPLIT_MARKER => side = Some(false),
                REMOTE_MARKER => side = None,
                _ if side.is_none() || side == Some(keep_local) => out.push(line),
                _ => {}
            }
        }
        out.join("\n")
    }

    #[test]
    fn test_render_shows_both_end_times() {
        let doc = ConflictRenderer::render(&[acme(1, 9, 17)], &[acme(1, 9, 18)]);
        assert!(doc.contains("end_time: 17:00:00"));
        assert!(doc.contains("end_time: 18:00:00"));
        assert!(doc.contains(LOCAL_MARKER));
        assert!(doc.contains(REMOTE_MARKER));
    }

    #[test]
    fn test_render_sorts_each_side_by_start() {
        let local = [acme(2, 11, 12), acme(1, 9, 10)];
        let remote = [acme(2, 11, 13), acme(1, 9, 10)];
        let doc = ConflictRenderer::render(&local, &remote);

        // id 1 is identical on both sides once sorted, so only id 2 remains
        assert!(!doc.contains("id: 1\n"));
        assert!(doc.contains("id: 2\n"));
    }

    #[test]
    fn test_resolve_keeps_chosen_side() {
        let mut editor = scripted(|text: &str| Ok(keep_side(text, false)));
        let resolution = ConflictRenderer::new(&mut editor)
            .resolve(&[acme(1, 9, 17)], &[acme(1, 9, 18)])
            .unwrap();

        assert_eq!(resolution.sessions.len(), 1);
        assert_eq!(resolution.sessions[0].end, Some(at(18)));
        assert!(resolution.deleted.is_empty());
        assert!(editor.seen[0].starts_with("# Resolve"));
    }

    #[test]
    fn test_unchanged_document_aborts() {
        let mut unchanged = scripted(|text: &str| Ok(text.to_string()));
        let result = ConflictRenderer::new(&mut unchanged).resolve(&[acme(1, 9, 17)], &[acme(1, 9, 18)]);
        assert!(matches!(result, Err(Error::MergeAborted)));

        let mut refused = scripted(|_: &str| Err(Error::NoChangesMade));
        let result = ConflictRenderer::new(&mut refused).resolve(&[acme(1, 9, 17)], &[acme(1, 9, 18)]);
        assert!(matches!(result, Err(Error::MergeAborted)));
    }

    #[test]
    fn test_unresolved_markers_fail_resolution() {
        let mut editor = scripted(|text: &str| Ok(format!("{text}\n")));
        let result = ConflictRenderer::new(&mut editor).resolve(&[acme(1, 9, 17)], &[acme(1, 9, 18)]);
        assert!(matches!(result, Err(Error::MergeParse { .. })));
    }

    #[test]
    fn test_detect_deleted_sessions_by_id() {
        let before = vec![acme(1, 9, 10), acme(2, 11, 12), acme(2, 11, 13)];
        let after = vec![acme(1, 9, 10)];

        let deleted = detect_deleted_sessions(&before, &after);
        assert_eq!(deleted, vec![acme(2, 11, 12)]);
        assert!(detect_deleted_sessions(&before, &before).is_empty());
    }
}
