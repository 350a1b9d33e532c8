//! Persistent configuration.
//!
//! Stored as pretty JSON at `<config_dir>/punch/config.json` unless
//! `PUNCH_CONFIG_PATH` points elsewhere. A missing file yields defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "punch.db";

pub const CONFIG_PATH_ENV: &str = "PUNCH_CONFIG_PATH";
pub const DEFAULT_TOKEN_ENV: &str = "PUNCH_SHEETS_TOKEN";
pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PunchConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Editor command; falls back to `$VISUAL`, `$EDITOR`, then `vi`
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default)]
    pub default_client: Option<String>,
    #[serde(default)]
    pub default_remote: Option<String>,
    /// Commands that sync against the default remote when they finish
    #[serde(default)]
    pub autosync: Vec<AutoSyncAction>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            editor: None,
            default_currency: default_currency(),
            default_client: None,
            default_remote: None,
            autosync: Vec::new(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoSyncAction {
    Start,
    End,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Known remote kinds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteConfig {
    Spreadsheet(SpreadsheetRemoteConfig),
    File(FileRemoteConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpreadsheetRemoteConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Environment variable holding the OAuth bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub columns: SheetColumns,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl SpreadsheetRemoteConfig {
    #[must_use]
    pub fn api_base_url(&self) -> String {
        normalize_text_option(self.api_base_url.clone())
            .map_or_else(|| DEFAULT_SHEETS_API.to_string(), |url| {
                url.trim_end_matches('/').to_string()
            })
    }
}

/// Header names of the spreadsheet columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SheetColumns {
    pub id: String,
    pub client: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub total_time: String,
    pub note: String,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            id: "ID".to_string(),
            client: "Client".to_string(),
            date: "Date".to_string(),
            start_time: "Start Time".to_string(),
            end_time: "End Time".to_string(),
            total_time: "Total Time".to_string(),
            note: "Note".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRemoteConfig {
    pub path: PathBuf,
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = normalize_text_option(std::env::var(CONFIG_PATH_ENV).ok()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("punch").join(CONFIG_FILE_NAME))
        .ok_or_else(|| Error::Config("could not resolve the config directory".into()))
}

pub fn default_database_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("punch").join(DATABASE_FILE_NAME))
        .ok_or_else(|| Error::Config("could not resolve the data directory".into()))
}

impl PunchConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Database location: explicit config value, else the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        self.database
            .path
            .clone()
            .map_or_else(default_database_path, Ok)
    }

    /// Resolve a remote by name, falling back to `settings.default_remote`
    pub fn remote(&self, name: Option<&str>) -> Result<(String, &RemoteConfig)> {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| self.settings.default_remote.clone())
            .ok_or_else(|| Error::Config("no remote given and no default_remote set".into()))?;

        let remote = self
            .remotes
            .get(&name)
            .ok_or_else(|| Error::Config(format!("unknown remote '{name}'")))?;
        Ok((name, remote))
    }

    /// Whether `action` should trigger a sync against the default remote
    #[must_use]
    pub fn autosyncs(&self, action: AutoSyncAction) -> bool {
        self.settings.default_remote.is_some() && self.settings.autosync.contains(&action)
    }

    fn normalize(&mut self) {
        self.settings.editor = normalize_text_option(self.settings.editor.take());
        self.settings.default_client = normalize_text_option(self.settings.default_client.take());
        self.settings.default_remote = normalize_text_option(self.settings.default_remote.take());
        self.settings.default_currency = self.settings.default_currency.trim().to_uppercase();
        if self.settings.default_currency.is_empty() {
            self.settings.default_currency = default_currency();
        }

        for remote in self.remotes.values_mut() {
            if let RemoteConfig::Spreadsheet(sheet) = remote {
                sheet.spreadsheet_id = sheet.spreadsheet_id.trim().to_string();
                sheet.sheet_name = sheet.sheet_name.trim().to_string();
                sheet.token_env = sheet.token_env.trim().to_string();
                sheet.api_base_url = normalize_text_option(sheet.api_base_url.take());
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(default) = &self.settings.default_remote {
            if !self.remotes.contains_key(default) {
                return Err(Error::Config(format!(
                    "default_remote '{default}' is not a configured remote"
                )));
            }
        }

        for (name, remote) in &self.remotes {
            match remote {
                RemoteConfig::Spreadsheet(sheet) => validate_spreadsheet(name, sheet)?,
                RemoteConfig::File(file) => {
                    if file.path.as_os_str().is_empty() {
                        return Err(Error::Config(format!("remote '{name}': path is required")));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_spreadsheet(name: &str, sheet: &SpreadsheetRemoteConfig) -> Result<()> {
    let required = [
        ("spreadsheet_id", sheet.spreadsheet_id.as_str()),
        ("sheet_name", sheet.sheet_name.as_str()),
        ("token_env", sheet.token_env.as_str()),
        ("columns.client", sheet.columns.client.as_str()),
        ("columns.date", sheet.columns.date.as_str()),
        ("columns.start_time", sheet.columns.start_time.as_str()),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(Error::Config(format!("remote '{name}': {field} is required")));
    }

    if let Some(url) = &sheet.api_base_url {
        if !is_http_url(url) {
            return Err(Error::Config(format!(
                "remote '{name}': api_base_url must include http:// or https://"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = PunchConfig::load_from_path(&temp.path().join("absent.json")).unwrap();
        assert_eq!(config, PunchConfig::default());
        assert_eq!(config.settings.default_currency, "USD");
    }

    #[test]
    fn parses_tagged_remotes_and_normalizes() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "settings": { "default_remote": " work ", "default_currency": "eur", "autosync": ["end"] },
                "remotes": {
                    "work": { "type": "spreadsheet", "spreadsheet_id": " abc ", "sheet_name": "Hours" },
                    "backup": { "type": "file", "path": "/tmp/punch.json" }
                }
            }"#,
        )
        .unwrap();

        let config = PunchConfig::load_from_path(&path).unwrap();
        assert_eq!(config.settings.default_currency, "EUR");
        assert!(config.autosyncs(AutoSyncAction::End));
        assert!(!config.autosyncs(AutoSyncAction::Start));

        let (name, remote) = config.remote(None).unwrap();
        assert_eq!(name, "work");
        let RemoteConfig::Spreadsheet(sheet) = remote else {
            panic!("expected a spreadsheet remote");
        };
        assert_eq!(sheet.spreadsheet_id, "abc");
        assert_eq!(sheet.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(sheet.columns, SheetColumns::default());
        assert_eq!(sheet.api_base_url(), DEFAULT_SHEETS_API);

        assert!(matches!(
            config.remote(Some("backup")).unwrap().1,
            RemoteConfig::File(_)
        ));
        assert!(config.remote(Some("missing")).is_err());
    }

    #[test]
    fn rejects_invalid_remotes() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");

        std::fs::write(
            &path,
            r#"{ "remotes": { "work": { "type": "spreadsheet", "spreadsheet_id": "", "sheet_name": "Hours" } } }"#,
        )
        .unwrap();
        assert!(matches!(PunchConfig::load_from_path(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "settings": { "default_remote": "nope" } }"#).unwrap();
        assert!(matches!(PunchConfig::load_from_path(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{ "remotes": { "x": { "type": "ftp" } } }"#).unwrap();
        assert!(matches!(PunchConfig::load_from_path(&path), Err(Error::Config(_))));
    }

    #[test]
    fn save_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.json");

        let mut config = PunchConfig::default();
        config.remotes.insert(
            "backup".to_string(),
            RemoteConfig::File(FileRemoteConfig {
                path: temp.path().join("mirror.json"),
            }),
        );
        config.settings.default_remote = Some("backup".to_string());
        config.save_to_path(&path).unwrap();

        assert_eq!(PunchConfig::load_from_path(&path).unwrap(), config);
    }
}
