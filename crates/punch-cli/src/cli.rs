use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use punch_core::export::ExportFormat;

#[derive(Parser)]
#[command(name = "punch")]
#[command(about = "Punch in and out of billable work sessions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Client and note flags shared by the punch commands
#[derive(Args, Clone, Debug, Default)]
pub struct PunchArgs {
    /// Client name (defaults to `settings.default_client`)
    #[arg(short, long)]
    pub client: Option<String>,
    /// Note attached to the session
    #[arg(short, long, default_value = "")]
    pub message: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a session, at TIME when given (HH:MM, -30m, HEAD~1, ...)
    Start {
        time: Option<String>,
        #[command(flatten)]
        args: PunchArgs,
    },
    /// Close the open session, at TIME when given
    End {
        time: Option<String>,
        #[command(flatten)]
        args: PunchArgs,
    },
    /// Start if nothing is open for the client, otherwise end
    Toggle {
        #[command(flatten)]
        args: PunchArgs,
    },
    /// Reconcile local sessions with a remote mirror
    Sync {
        /// Remote name (defaults to `settings.default_remote`)
        remote: Option<String>,
        /// Stop after pulling from the remote
        #[arg(long)]
        pull_only: bool,
        /// Approve deletions without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Edit sessions in $EDITOR
    Edit {
        #[command(subcommand)]
        command: EditCommands,
    },
    /// Delete a session
    Delete {
        #[command(subcommand)]
        command: DeleteCommands,
    },
    /// Manage billable clients
    #[command(alias = "clients")]
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Print sessions and totals for a timeframe
    #[command(alias = "get")]
    Report(ReportArgs),
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum EditCommands {
    /// Edit one session, a day of sessions, or everything
    #[command(alias = "sessions")]
    Session {
        /// Session id (defaults to the client's latest session today)
        #[arg(conflicts_with_all = ["date", "all"])]
        id: Option<u32>,
        /// Edit every session on this day (YYYY-MM-DD or a time argument)
        #[arg(short, long, conflicts_with = "all")]
        date: Option<String>,
        /// Edit every session of every client
        #[arg(short, long)]
        all: bool,
        /// Client whose latest session is edited
        #[arg(short, long)]
        client: Option<String>,
        /// Approve deletions without prompting
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DeleteCommands {
    /// Delete a session by id
    #[command(alias = "sessions")]
    Session { id: u32 },
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a client
    Add {
        name: String,
        /// Hourly rate
        #[arg(short, long, default_value_t = 0)]
        rate: u32,
        /// Currency code (defaults to `settings.default_currency`)
        #[arg(long)]
        currency: Option<String>,
    },
    /// List clients
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a client's rate or currency
    Edit {
        name: String,
        #[arg(short, long)]
        rate: Option<u32>,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Delete a client and all of its sessions
    Delete {
        name: String,
        /// Approve session deletion without prompting
        #[arg(short, long)]
        yes: bool,
    },
}

/// Mutually exclusive report windows; today when none is given
#[derive(Args, Clone, Debug, Default)]
#[group(multiple = false)]
pub struct TimeframeArgs {
    /// Today
    #[arg(long)]
    pub day: bool,
    /// The current week (Sunday to Saturday)
    #[arg(long)]
    pub week: bool,
    /// A month of this year (current month when no value)
    #[arg(long, value_name = "MONTH")]
    pub month: Option<Option<u32>>,
    /// A whole year (current year when no value)
    #[arg(long, value_name = "YEAR")]
    pub year: Option<Option<i32>>,
    /// Everything on record
    #[arg(long)]
    pub all: bool,
    /// From TIME until now
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub timeframe: TimeframeArgs,
    /// Only this client's sessions
    #[arg(short, long)]
    pub client: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
    /// Include notes in the table
    #[arg(short, long)]
    pub verbose: bool,
    /// Newest sessions first
    #[arg(long)]
    pub desc: bool,
    /// Optional output path (stdout when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Csv,
    FullCsv,
    Json,
}

impl From<ReportFormat> for ExportFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Table => Self::Table,
            ReportFormat::Csv => Self::Csv,
            ReportFormat::FullCsv => Self::FullCsv,
            ReportFormat::Json => Self::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
