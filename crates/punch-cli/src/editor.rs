//! Terminal implementations of the interactive capabilities the core asks for.

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use punch_core::merge::InteractiveEditor;
use punch_core::sync::ConfirmDeletion;
use punch_core::{Error, Result, Session};

/// Opens text in the user's editor through a temporary file
#[derive(Debug, Clone)]
pub struct TerminalEditor {
    command: String,
}

impl TerminalEditor {
    /// `configured` wins over `$VISUAL`, then `$EDITOR`, then the platform default.
    pub fn new(configured: Option<&str>) -> Self {
        Self {
            command: configured.map_or_else(preferred_editor, str::to_string),
        }
    }
}

impl InteractiveEditor for TerminalEditor {
    fn edit(&mut self, text: &str) -> Result<String> {
        let temp_file = create_temp_file_path();
        std::fs::write(&temp_file, text)?;

        let launch_result = launch_editor(&self.command, &temp_file);
        let edited = std::fs::read_to_string(&temp_file);
        let _ = std::fs::remove_file(&temp_file);

        launch_result?;
        let edited = edited?;
        if edited == text {
            return Err(Error::NoChangesMade);
        }
        Ok(edited)
    }
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<()> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // `code --wait` style commands carry their own arguments
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(Error::Editor("empty editor command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(Error::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(Error::Editor(format!("`{editor}` exited with status {status}")))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("punch-sessions-{}-{now}.txt", std::process::id()))
}

/// Asks on the terminal before deleting; `--yes` skips the prompt
#[derive(Debug, Clone, Copy)]
pub struct TerminalConfirm {
    assume_yes: bool,
}

impl TerminalConfirm {
    pub const fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmDeletion for TerminalConfirm {
    fn confirm_deletion(&mut self, sessions: &[Session]) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        let stdin = io::stdin();
        if !stdin.is_terminal() {
            tracing::warn!(
                "Refusing to delete {} session(s) without a terminal; pass --yes",
                sessions.len()
            );
            return Ok(false);
        }

        let mut stderr = io::stderr();
        writeln!(stderr, "Detected {} deleted session(s):", sessions.len())?;
        for session in sessions {
            writeln!(stderr, "  {session}")?;
        }
        write!(stderr, "Are you sure you want to delete these sessions (y/n)? ")?;
        stderr.flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
