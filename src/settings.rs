use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "kz-rich-presence";

/// Environment variable pointing at an alternative settings file
pub const CONFIG_ENV_VAR: &str = "KZ_PRESENCE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Discord application (client) id
    pub discord_app_id: i64,
    /// Name of the game process to watch, without extension
    pub process_name: String,
    pub poll_interval_secs: u64,
    /// Address the GSI listener binds to
    pub gsi_bind: String,
    /// Token the game must echo back in its payloads, if set
    pub gsi_auth_token: Option<String>,
    pub difficulty_api_url: String,
    pub lookup_timeout_secs: u64,
    pub lookup_retry_secs: u64,
    /// CS:GO `cfg` directory; when set, the GSI config file is installed there
    pub csgo_cfg_dir: Option<PathBuf>,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing` filter directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Rotated log files older than this many days are deleted at startup
    pub retention_days: u64,
    /// Overrides the platform data directory for log files
    pub directory: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info,hyper=warn,reqwest=warn".to_string(),
            retention_days: 7,
            directory: None,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            discord_app_id: 1400566342687522976,
            process_name: "csgo".to_string(),
            poll_interval_secs: 3,
            gsi_bind: "127.0.0.1:3000".to_string(),
            gsi_auth_token: None,
            difficulty_api_url: "https://kztimerglobal.com/api/v2.0/maps/name".to_string(),
            lookup_timeout_secs: 5,
            lookup_retry_secs: 60,
            csgo_cfg_dir: None,
            logging: LogSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs.max(1))
    }

    pub fn lookup_retry(&self) -> Duration {
        Duration::from_secs(self.lookup_retry_secs)
    }
}

/// Location of the settings file: `$KZ_PRESENCE_CONFIG`, or the platform config directory
pub fn get_settings_path() -> Result<PathBuf, String> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().ok_or("Failed to get config directory")?;
    Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Load settings from `path`; a missing file yields the defaults.
///
/// Runs before logging is set up, so problems are only reported through the
/// returned error.
pub fn load_settings(path: &Path) -> Result<AppSettings, String> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings file: {}", e))?;

    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
}

/// Write the defaults to `path` so they can be edited, unless a file is already
/// there. Returns whether a file was written.
pub fn write_defaults_if_missing(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    save_settings(path, &AppSettings::default())?;
    Ok(true)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), String> {
    tracing::debug!("Saving settings to {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write settings file: {}", e))
}
