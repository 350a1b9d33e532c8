use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use punch_core::clock::Transition;
use punch_core::config::{AutoSyncAction, FileRemoteConfig, PunchConfig, RemoteConfig};
use punch_core::db::{ClientRepository, SessionStore};
use punch_core::merge::InteractiveEditor;
use punch_core::remote::{FileRemote, RemoteMirror};
use punch_core::sync::ConfirmDeletion;
use punch_core::{Client, Error, Session, SessionId};
use tempfile::TempDir;

use crate::cli::{Cli, Commands, CompletionShell, PunchArgs, ReportArgs, ReportFormat, TimeframeArgs};
use crate::commands::client::{delete_client, format_client_lines, run_client_add, run_client_edit};
use crate::commands::common::Context;
use crate::commands::completions::completion_script;
use crate::commands::delete::run_delete_session;
use crate::commands::edit::{apply_session_edits, EditOutcome};
use crate::commands::punch::{describe_transition, run_end, run_start, run_toggle};
use crate::commands::report::{render_report, resolve_timeframe};
use crate::commands::sync::{describe_summary, run_sync};
use crate::editor::{default_editor, is_affirmative, TerminalEditor};
use crate::error::CliError;

struct ScriptedEditor<F: FnMut(&str) -> punch_core::Result<String>>(F);

impl<F: FnMut(&str) -> punch_core::Result<String>> InteractiveEditor for ScriptedEditor<F> {
    fn edit(&mut self, text: &str) -> punch_core::Result<String> {
        (self.0)(text)
    }
}

fn scripted<F: FnMut(&str) -> punch_core::Result<String>>(script: F) -> ScriptedEditor<F> {
    ScriptedEditor(script)
}

struct Answer(bool);

impl ConfirmDeletion for Answer {
    fn confirm_deletion(&mut self, _sessions: &[Session]) -> punch_core::Result<bool> {
        Ok(self.0)
    }
}

fn open_context(temp: &TempDir, config: PunchConfig) -> Context {
    Context::open(config, &temp.path().join("punch.db")).unwrap()
}

fn file_remote_config(path: &Path) -> PunchConfig {
    let mut config = PunchConfig::default();
    config.remotes.insert(
        "mirror".to_string(),
        RemoteConfig::File(FileRemoteConfig {
            path: path.to_path_buf(),
        }),
    );
    config
}

fn acme_args() -> PunchArgs {
    PunchArgs {
        client: Some("Acme".to_string()),
        message: String::new(),
    }
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn seed_closed(ctx: &Context, day: u32, note: &str) -> Session {
    ctx.sessions()
        .insert(
            &Session::open(Client::named("Acme"), at(day, 9), note).with_end(at(day, 17)),
            false,
        )
        .unwrap()
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn affirmative_answers() {
    assert!(is_affirmative("y\n"));
    assert!(is_affirmative(" YES "));
    assert!(!is_affirmative("n"));
    assert!(!is_affirmative(""));
}

#[cfg(unix)]
#[test]
fn terminal_editor_reports_untouched_text() {
    let mut editor = TerminalEditor::new(Some("true"));
    assert!(matches!(editor.edit("id: 1\n"), Err(Error::NoChangesMade)));
}

#[cfg(unix)]
#[test]
fn terminal_editor_returns_edited_text() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let script = temp.path().join("append-note.sh");
    std::fs::write(&script, "#!/bin/sh\necho 'note: edited' >> \"$1\"\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut editor = TerminalEditor::new(script.to_str());
    assert_eq!(editor.edit("id: 1\n").unwrap(), "id: 1\nnote: edited\n");
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parses_report_flags() {
    let cli = Cli::try_parse_from(["punch", "get", "--month", "3", "--format", "full-csv"]).unwrap();
    let Some(Commands::Report(args)) = cli.command else {
        panic!("expected report");
    };
    assert_eq!(args.timeframe.month, Some(Some(3)));
    assert_eq!(args.format, ReportFormat::FullCsv);

    let cli = Cli::try_parse_from(["punch", "report", "--year"]).unwrap();
    let Some(Commands::Report(args)) = cli.command else {
        panic!("expected report");
    };
    assert_eq!(args.timeframe.year, Some(None));

    assert!(Cli::try_parse_from(["punch", "report", "--week", "--all"]).is_err());
}

#[test]
fn cli_rejects_conflicting_edit_selectors() {
    assert!(Cli::try_parse_from(["punch", "edit", "session", "3", "--all"]).is_err());
    assert!(Cli::try_parse_from(["punch", "edit", "session", "--date", "2024-03-01", "--all"]).is_err());
    assert!(Cli::try_parse_from(["punch", "edit", "session", "--date", "2024-03-01"]).is_ok());
}

#[test]
fn cli_without_subcommand_toggles() {
    let cli = Cli::try_parse_from(["punch"]).unwrap();
    assert!(cli.command.is_none());
}

#[test]
fn resolve_client_uses_default_and_rejects_unknown() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = PunchConfig::default();
    config.settings.default_client = Some("Acme".to_string());
    let ctx = open_context(&temp, config);

    assert!(matches!(
        ctx.resolve_client(None),
        Err(CliError::UnknownClient(name)) if name == "Acme"
    ));

    run_client_add(&ctx, "Acme", 100, None).unwrap();
    let client = ctx.resolve_client(Some("  ")).unwrap();
    assert_eq!(client, Client::new("Acme", 100, "USD"));

    let bare_dir = tempfile::tempdir().unwrap();
    let bare = open_context(&bare_dir, PunchConfig::default());
    assert!(matches!(bare.resolve_client(None), Err(CliError::NoClient)));
}

#[test]
fn start_then_end_records_a_closed_session() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    run_client_add(&ctx, "Acme", 100, Some("eur")).unwrap();

    run_start(&ctx, Some("09:00"), &acme_args()).unwrap();
    assert!(matches!(
        run_start(&ctx, Some("09:30"), &acme_args()),
        Err(CliError::Core(Error::AlreadyStarted(_)))
    ));

    let args = PunchArgs {
        client: Some("acme".to_string()),
        message: "review".to_string(),
    };
    run_end(&ctx, Some("10:30"), &args).unwrap();

    let sessions = ctx.sessions().get_all().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration(), "01:30:00");
    assert_eq!(sessions[0].note, "review");
    assert_eq!(sessions[0].client.currency, "EUR");

    assert!(matches!(
        run_end(&ctx, None, &acme_args()),
        Err(CliError::Core(Error::AlreadyEnded))
    ));
}

#[test]
fn toggle_alternates_with_default_client() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = PunchConfig::default();
    config.settings.default_client = Some("Acme".to_string());
    let ctx = open_context(&temp, config);
    run_client_add(&ctx, "Acme", 0, None).unwrap();

    run_toggle(&ctx, &PunchArgs::default()).unwrap();
    assert!(ctx.sessions().get_open_session("Acme").unwrap().is_some());

    run_toggle(&ctx, &PunchArgs::default()).unwrap();
    assert!(ctx.sessions().get_open_session("Acme").unwrap().is_none());
    assert_eq!(ctx.sessions().get_all().unwrap().len(), 1);
}

#[test]
fn transitions_are_described() {
    let session = Session::open(Client::new("Acme", 100, "USD"), at(1, 9), "");
    assert_eq!(
        describe_transition(&session, Transition::Started),
        "Clocked in for Acme at 09:00:00"
    );

    let ended = session.with_end(at(1, 11));
    assert_eq!(
        describe_transition(&ended, Transition::Ended),
        "Clocked out of Acme at 11:00:00 after 02:00:00 (200.00 USD)"
    );
}

#[test]
fn session_edits_update_and_delete_after_confirmation() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    let first = seed_closed(&ctx, 1, "draft");
    let second = seed_closed(&ctx, 2, "");
    let store = ctx.sessions();

    let mut keep_first_only = scripted(|text: &str| {
        let first_block = text.split("---\n").next().unwrap_or_default();
        Ok(format!("{}---\n", first_block.replace("note: draft", "note: final")))
    });

    let outcome = apply_session_edits(
        &store,
        &mut keep_first_only,
        &mut Answer(false),
        &[first.clone(), second.clone()],
    )
    .unwrap();
    assert_eq!(
        outcome,
        EditOutcome {
            updated: 1,
            failed: Vec::new(),
            deleted: 0,
        }
    );
    assert_eq!(store.get_by_id(first.id.unwrap()).unwrap().unwrap().note, "final");
    assert!(store.get_by_id(second.id.unwrap()).unwrap().is_some());

    let first = store.get_by_id(first.id.unwrap()).unwrap().unwrap();
    let outcome = apply_session_edits(
        &store,
        &mut keep_first_only,
        &mut Answer(true),
        &[first, second.clone()],
    )
    .unwrap();
    assert_eq!(outcome.deleted, 1);
    assert!(store.get_by_id(second.id.unwrap()).unwrap().is_none());
}

#[test]
fn session_edits_abort_without_writes_when_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    let session = seed_closed(&ctx, 1, "draft");

    let mut untouched = scripted(|_: &str| Err(Error::NoChangesMade));
    let result = apply_session_edits(
        &ctx.sessions(),
        &mut untouched,
        &mut Answer(true),
        std::slice::from_ref(&session),
    );
    assert!(matches!(result, Err(CliError::Core(Error::NoChangesMade))));

    let mut broken = scripted(|text: &str| Ok(text.replace("17:00:00", "08:00:00")));
    let result = apply_session_edits(
        &ctx.sessions(),
        &mut broken,
        &mut Answer(true),
        std::slice::from_ref(&session),
    );
    assert!(matches!(result, Err(CliError::Core(Error::MergeParse { .. }))));
    assert!(ctx
        .sessions()
        .get_by_id(session.id.unwrap())
        .unwrap()
        .unwrap()
        .is_identical(&session));
}

#[test]
fn delete_session_by_id() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    let session = seed_closed(&ctx, 1, "");
    let id = session.id.unwrap();

    run_delete_session(&ctx, id).unwrap();
    assert!(ctx.sessions().get_by_id(id).unwrap().is_none());
    assert!(matches!(
        run_delete_session(&ctx, id),
        Err(CliError::Core(Error::NotFound(_)))
    ));
}

#[test]
fn client_management() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    run_client_add(&ctx, "Acme", 100, None).unwrap();
    run_client_add(&ctx, "Globex", 80, Some("eur")).unwrap();
    assert!(matches!(
        run_client_add(&ctx, "acme", 1, None),
        Err(CliError::Core(Error::Conflict(_)))
    ));

    run_client_edit(&ctx, "globex", Some(90), None).unwrap();
    let clients = ctx.clients().list().unwrap();
    assert_eq!(
        format_client_lines(&clients),
        "Acme       100 USD\nGlobex      90 EUR\n"
    );

    seed_closed(&ctx, 1, "");
    assert!(delete_client(&ctx, "Acme", &mut Answer(false)).is_err());
    assert!(ctx.clients().get("Acme").unwrap().is_some());

    delete_client(&ctx, "Acme", &mut Answer(true)).unwrap();
    assert!(ctx.clients().get("Acme").unwrap().is_none());
    assert!(ctx.sessions().get_all().unwrap().is_empty());

    assert!(matches!(
        run_client_edit(&ctx, "Initech", Some(1), None),
        Err(CliError::UnknownClient(_))
    ));
}

#[test]
fn report_renders_requested_window() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    seed_closed(&ctx, 1, "");
    seed_closed(&ctx, 2, "");

    let args = ReportArgs {
        timeframe: TimeframeArgs {
            all: true,
            ..TimeframeArgs::default()
        },
        client: Some("acme".to_string()),
        format: ReportFormat::Csv,
        verbose: false,
        desc: true,
        output: None,
    };
    assert_eq!(
        render_report(&ctx, &args, at(6, 12)).unwrap(),
        "client,date,duration\nAcme,2024-03-02,08:00:00\nAcme,2024-03-01,08:00:00\n"
    );

    let today = ReportArgs {
        timeframe: TimeframeArgs::default(),
        format: ReportFormat::Json,
        ..args
    };
    assert_eq!(render_report(&ctx, &today, at(6, 12)).unwrap(), "[]");
}

#[test]
fn timeframe_flags_map_to_windows() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = open_context(&temp, PunchConfig::default());
    let now = at(6, 12);

    let month = TimeframeArgs {
        month: Some(None),
        ..TimeframeArgs::default()
    };
    assert_eq!(
        resolve_timeframe(&ctx, &month, None, now).unwrap(),
        punch_core::query::Timeframe::Month(3)
    );

    let since = TimeframeArgs {
        since: Some("-2d".to_string()),
        ..TimeframeArgs::default()
    };
    assert_eq!(
        resolve_timeframe(&ctx, &since, None, now).unwrap(),
        punch_core::query::Timeframe::Since(at(4, 12))
    );

    let bad_year = TimeframeArgs {
        year: Some(Some(1900)),
        ..TimeframeArgs::default()
    };
    assert!(resolve_timeframe(&ctx, &bad_year, None, now).is_err());
}

#[test]
fn sync_pushes_local_sessions_to_file_remote() {
    let temp = tempfile::tempdir().unwrap();
    let mirror = temp.path().join("mirror.json");
    let ctx = open_context(&temp, file_remote_config(&mirror));
    seed_closed(&ctx, 1, "a");
    seed_closed(&ctx, 2, "b");

    run_sync(&ctx, Some("mirror"), false, false).unwrap();

    let rows = FileRemote::new(&mirror).read_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].session.id, Some(SessionId::new(1)));

    // Second run finds nothing to do
    run_sync(&ctx, Some("mirror"), false, false).unwrap();
    assert_eq!(FileRemote::new(&mirror).read_all().unwrap().len(), 2);

    assert!(matches!(
        run_sync(&ctx, Some("elsewhere"), false, false),
        Err(CliError::Core(Error::Config(_)))
    ));
}

#[test]
fn autosync_follows_configured_actions() {
    let temp = tempfile::tempdir().unwrap();
    let mirror = temp.path().join("mirror.json");
    let mut config = file_remote_config(&mirror);
    config.settings.default_remote = Some("mirror".to_string());
    config.settings.autosync = vec![AutoSyncAction::Start];
    let ctx = open_context(&temp, config);
    run_client_add(&ctx, "Acme", 0, None).unwrap();

    run_start(&ctx, None, &acme_args()).unwrap();
    let rows = FileRemote::new(&mirror).read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].session.is_open());

    // End is not listed, so the mirror keeps the open row
    run_end(&ctx, None, &acme_args()).unwrap();
    assert!(FileRemote::new(&mirror).read_all().unwrap()[0].session.is_open());
}

#[test]
fn sync_summary_lines() {
    let summary = punch_core::sync::SyncSummary::default();
    assert_eq!(describe_summary("mirror", &summary), "Already in sync with 'mirror'");

    let summary = punch_core::sync::SyncSummary {
        added: 2,
        ..summary
    };
    assert!(describe_summary("mirror", &summary).starts_with("Synced with 'mirror': "));
}

#[test]
fn completions_are_generated_for_punch() {
    let script = String::from_utf8(completion_script(CompletionShell::Bash)).unwrap();
    assert!(script.contains("_punch()"));
    assert!(script.contains("complete -F _punch"));
}
