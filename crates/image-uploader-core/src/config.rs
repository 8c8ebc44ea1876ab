use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Rule;

/// Directory name used under the platform config directory
pub const APP_DIR_NAME: &str = "image-uploader";

/// Name of the config file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration for uploading images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flickr credentials and account
    pub flickr: FlickrConfig,

    /// External commands
    pub commands: CommandsConfig,

    /// Upload behaviour
    pub upload: UploadConfig,

    /// Keyword rules, evaluated in order for every image
    pub rules: Vec<Rule>,

    /// Directory for rotated log files. Logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,

    /// Log level
    pub log_level: LogLevel,

    /// Show what would be done without changing anything (per run)
    #[serde(skip)]
    pub dry_run: bool,

    /// Upload even if the ledger says the file was uploaded (per run)
    #[serde(skip)]
    pub force: bool,
}

/// Flickr API credentials. Obtained out of band.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickrConfig {
    pub api_key: String,
    pub api_secret: String,
    pub oauth_token: String,
    pub oauth_secret: String,

    /// Account name, used only for the URLs printed to the operator
    pub username: String,
}

/// Paths and limits for external commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Path to the exiftool executable
    pub exiftool: Option<PathBuf>,

    /// Seconds an exiftool invocation may run before it is abandoned
    pub exiftool_timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            exiftool: None,
            exiftool_timeout_secs: 30,
        }
    }
}

/// What to do when an existing ledger file cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerRecovery {
    /// Report the error and continue with an empty ledger
    #[default]
    Reset,

    /// Report the error and skip the file
    Fail,
}

/// Upload behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Keep the ledger as a hidden file next to each image instead of in
    /// the central ledger directory
    pub store_in_image_dir: bool,

    /// Set Flickr's "date posted" to the capture date so the photostream
    /// is ordered by when photos were taken
    pub set_date_posted: bool,

    /// Policy for corrupt ledger files
    pub ledger_recovery: LedgerRecovery,

    /// Central ledger directory. Defaults to the platform config directory.
    pub ledger_dir: Option<PathBuf>,

    /// Seconds a single HTTP request may take
    pub http_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            store_in_image_dir: false,
            set_date_posted: true,
            ledger_recovery: LedgerRecovery::Reset,
            ledger_dir: None,
            http_timeout_secs: 300,
        }
    }
}

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// The application's directory under the platform config directory
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| Error::Configuration("Unable to determine the config directory".into()))
}

/// Where the config file is read from when no path is given
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to open config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = serde_json::from_reader(file).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Override values from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flickr = &mut self.flickr;
        for (name, field) in [
            ("FLICKR_API_KEY", &mut flickr.api_key),
            ("FLICKR_API_SECRET", &mut flickr.api_secret),
            ("FLICKR_OAUTH_TOKEN", &mut flickr.oauth_token),
            ("FLICKR_OAUTH_SECRET", &mut flickr.oauth_secret),
        ] {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }

        if let Some(exiftool) = lookup("EXIFTOOL").filter(|v| !v.is_empty()) {
            self.commands.exiftool = Some(PathBuf::from(exiftool));
        }
    }

    /// Directory holding the central ledger
    pub fn ledger_dir(&self) -> Result<PathBuf> {
        match &self.upload.ledger_dir {
            Some(dir) => Ok(dir.clone()),
            None => config_dir(),
        }
    }

    /// Validate the settings every command needs
    pub fn validate(&self) -> Result<()> {
        match &self.commands.exiftool {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => {
                return Err(Error::Configuration(
                    "commands.exiftool needs to be configured".to_string(),
                ))
            }
        }

        if self.commands.exiftool_timeout_secs == 0 {
            return Err(Error::Configuration(
                "commands.exiftool_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.upload.http_timeout_secs == 0 {
            return Err(Error::Configuration(
                "upload.http_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(album) = rule.action.albums.iter().find(|a| a.id.is_empty()) {
                return Err(Error::Configuration(format!(
                    "Rule {} refers to album '{}' without an id",
                    index + 1,
                    album.name
                )));
            }
        }

        Ok(())
    }

    /// Validate the Flickr credentials needed for uploading
    pub fn validate_credentials(&self) -> Result<()> {
        let flickr = &self.flickr;
        if flickr.api_key.is_empty()
            || flickr.api_secret.is_empty()
            || flickr.oauth_token.is_empty()
            || flickr.oauth_secret.is_empty()
        {
            return Err(Error::Configuration(
                "Flickr credentials are missing. Set flickr.api_key, flickr.api_secret, \
                 flickr.oauth_token and flickr.oauth_secret"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Album, Condition};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.commands.exiftool = Some(PathBuf::from("/usr/bin/exiftool"));
        config.flickr = FlickrConfig {
            api_key: "key".into(),
            api_secret: "secret".into(),
            oauth_token: "token".into(),
            oauth_secret: "token-secret".into(),
            username: "someone".into(),
        };
        config
    }

    #[test]
    fn test_missing_exiftool_is_rejected() {
        let mut config = valid_config();
        config.commands.exiftool = None;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let mut config = valid_config();
        assert!(config.validate_credentials().is_ok());

        config.flickr.oauth_secret.clear();
        assert!(matches!(
            config.validate_credentials(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_album_without_id_is_rejected() {
        let mut config = valid_config();
        config.rules.push(Rule {
            condition: Condition::default(),
            action: Action {
                delete: false,
                albums: vec![Album {
                    id: String::new(),
                    name: "Holidays".into(),
                }],
            },
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = valid_config();
        config.upload.ledger_recovery = LedgerRecovery::Fail;
        config.dry_run = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.flickr.api_key, "key");
        assert_eq!(loaded.upload.ledger_recovery, LedgerRecovery::Fail);
        // Per-run flags are never persisted
        assert!(!loaded.dry_run);
    }

    #[test]
    fn test_rules_use_camel_case_conditions() {
        let json = r#"{
            "commands": { "exiftool": "/opt/exiftool" },
            "upload": { "store_in_image_dir": true, "ledger_recovery": "fail" },
            "rules": [
                {
                    "condition": { "includesAny": ["private"], "excludesAll": ["public"] },
                    "action": { "delete": true, "albums": [{ "id": "721", "name": "Family" }] }
                }
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert!(config.upload.store_in_image_dir);
        assert!(config.upload.set_date_posted);
        assert_eq!(config.commands.exiftool_timeout_secs, 30);
        let rule = &config.rules[0];
        assert_eq!(rule.condition.includes_any, vec!["private"]);
        assert_eq!(rule.condition.excludes_all, vec!["public"]);
        assert!(rule.condition.includes_all.is_empty());
        assert_eq!(rule.action.albums[0].name, "Family");
    }

    #[test]
    fn test_env_overrides_replace_credentials() {
        let vars: HashMap<&str, &str> = [
            ("FLICKR_API_KEY", "env-key"),
            ("FLICKR_OAUTH_TOKEN", ""),
            ("EXIFTOOL", "/env/exiftool"),
        ]
        .into_iter()
        .collect();

        let mut config = valid_config();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.flickr.api_key, "env-key");
        // Empty values do not clear configured ones
        assert_eq!(config.flickr.oauth_token, "token");
        assert_eq!(
            config.commands.exiftool,
            Some(PathBuf::from("/env/exiftool"))
        );
    }
}
