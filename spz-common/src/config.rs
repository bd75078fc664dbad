//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/spz/<module>.toml`, then `/etc/spz/<module>.toml`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder (highest ENV priority)
pub const ROOT_FOLDER_ENV: &str = "SPZ_ROOT_FOLDER";
/// Alternative, shorter root folder variable
pub const ROOT_ENV: &str = "SPZ_ROOT";
/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "spz.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/spz (or /var/lib/spz for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("spz"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/spz"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("spz"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/spz"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("spz"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\spz"))
    } else {
        PathBuf::from("./spz_data")
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5760,
        }
    }
}

/// `[openai]` section - text generation gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "o4-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
        }
    }
}

/// `[autosave]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before the answer is written
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

/// `[realtime]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Fixed interval of every polling stream (no backoff, no jitter)
    pub poll_interval_ms: u64,
    /// Broadcast channel capacity of the invalidation bus
    pub event_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            event_capacity: 256,
        }
    }
}

/// `[auth]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Honor the `admin` flag on sign-up
    pub allow_admin_signup: bool,
    pub recovery_token_ttl_minutes: i64,
    /// Bearer tokens older than this are refused and purged
    pub session_ttl_days: i64,
    /// Idle in-memory sessions are dropped after this; the token still
    /// resumes from storage
    pub session_idle_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_admin_signup: false,
            recovery_token_ttl_minutes: 60,
            session_ttl_days: 30,
            session_idle_minutes: 60,
        }
    }
}

/// Contents of a module TOML file
///
/// Every section is optional; absent sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub autosave: AutosaveConfig,
    pub realtime: RealtimeConfig,
    pub auth: AuthConfig,
}

impl TomlConfig {
    /// Load the TOML config for a module, degrading to defaults when the file is
    /// missing or malformed.
    pub fn load_for_module(module_name: &str) -> Self {
        match config_file_path(module_name) {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => {
                    debug!("Loaded config file {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => {
                debug!("No config file for {}, using compiled defaults", module_name);
                Self::default()
            }
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config atomically (temp file + rename)
///
/// On Unix the file is restricted to mode 0600 since it may hold the API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Locate the config file for a module, if one exists
fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);

    let user_config = dirs::config_dir().map(|d| d.join("spz").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/spz").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the root folder following CLI > ENV > TOML > default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Set the command-line override (priority 1)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(ROOT_ENV) {
            return PathBuf::from(path);
        }

        if let Some(path) = TomlConfig::load_for_module(&self.module_name).root_folder {
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.autosave.debounce_ms, 1000);
        assert_eq!(config.realtime.poll_interval_ms, 1000);
        assert_eq!(config.openai.model, "o4-mini");
        assert!(!config.auth.allow_admin_signup);
        assert_eq!(config.server.port, 5760);
    }

    #[test]
    fn test_partial_toml_fills_missing_sections() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/spz"
            [openai]
            api_key = "sk-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/spz")));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.logging.level, "info");
    }
}
