use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use punch_core::config::{AutoSyncAction, PunchConfig};
use punch_core::db::{ClientRepository, Database, SqliteClientRepository, SqliteSessionStore};
use punch_core::query::resolve_time;
use punch_core::util::{now, DATE_FORMAT};
use punch_core::Client;

use crate::commands::sync::run_sync;
use crate::error::CliError;

pub const DB_PATH_ENV: &str = "PUNCH_DB_PATH";

/// Loaded config plus the open local database
pub struct Context {
    pub config: PunchConfig,
    pub db: Database,
}

impl Context {
    pub fn open(config: PunchConfig, db_path: &Path) -> Result<Self, CliError> {
        let db = Database::open(db_path)?;
        Ok(Self { config, db })
    }

    pub fn sessions(&self) -> SqliteSessionStore<'_> {
        SqliteSessionStore::new(self.db.connection())
    }

    pub fn clients(&self) -> SqliteClientRepository<'_> {
        SqliteClientRepository::new(self.db.connection())
    }

    /// The named client, or `settings.default_client`; it must be registered.
    pub fn resolve_client(&self, name: Option<&str>) -> Result<Client, CliError> {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or(self.config.settings.default_client.as_deref())
            .ok_or(CliError::NoClient)?;

        self.clients()
            .get(name)?
            .ok_or_else(|| CliError::UnknownClient(name.to_string()))
    }

    /// Sync against the default remote when `action` is listed under `settings.autosync`.
    pub fn autosync(&self, action: AutoSyncAction) -> Result<(), CliError> {
        if self.config.autosyncs(action) {
            tracing::info!("Autosync after {:?}", action);
            run_sync(self, None, false, false)?;
        }
        Ok(())
    }
}

pub fn load_config(cli_config_path: Option<&Path>) -> Result<PunchConfig, CliError> {
    match cli_config_path {
        Some(path) => Ok(PunchConfig::load_from_path(path)?),
        None => Ok(PunchConfig::load()?),
    }
}

pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &PunchConfig,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    Ok(config.database_path()?)
}

/// Resolve an optional time argument; the current time when absent.
pub fn resolve_time_arg(
    ctx: &Context,
    time: Option<&str>,
    client: &Client,
) -> Result<chrono::NaiveDateTime, CliError> {
    let now = now();
    match time {
        None => Ok(now),
        Some(input) => Ok(resolve_time(input, now, &ctx.sessions(), Some(&client.name))?),
    }
}

/// `YYYY-MM-DD`, or any time argument whose date is taken.
pub fn resolve_date_arg(ctx: &Context, input: &str) -> Result<NaiveDate, CliError> {
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT) {
        return Ok(date);
    }
    resolve_time(input, now(), &ctx.sessions(), None)
        .map(|timestamp| timestamp.date())
        .map_err(|_| CliError::InvalidDate(input.to_string()))
}
