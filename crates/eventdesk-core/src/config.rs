use crate::table::DEFAULT_BUCKETS;
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "eventdesk";
const CONFIG_FILE_NAME: &str = "config.toml";
const SNAPSHOT_FILE_NAME: &str = "events.json";
const JOURNAL_FILE_NAME: &str = "event_log.txt";
const CONFIG_DIR_ENV: &str = "EVENTDESK_CONFIG_DIR";
const CURRENT_SCHEMA_VERSION: u32 = 1;
/// Upper bound on lookup table buckets; beyond this the table is just wasted memory.
pub const MAX_BUCKETS: usize = 4096;

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub storage: StoragePreferences,
    #[serde(default)]
    pub store: StorePreferences,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            storage: StoragePreferences::default(),
            store: StorePreferences::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Where events and the action journal live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePreferences {
    #[serde(default = "StoragePreferences::default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "StoragePreferences::default_journal_path")]
    pub journal_path: String,
    #[serde(default = "StoragePreferences::default_journal_enabled")]
    pub journal_enabled: bool,
}

impl Default for StoragePreferences {
    fn default() -> Self {
        Self {
            snapshot_path: Self::default_snapshot_path(),
            journal_path: Self::default_journal_path(),
            journal_enabled: Self::default_journal_enabled(),
        }
    }
}

impl StoragePreferences {
    fn default_snapshot_path() -> String {
        data_directory()
            .join(SNAPSHOT_FILE_NAME)
            .to_string_lossy()
            .into_owned()
    }

    fn default_journal_path() -> String {
        data_directory()
            .join(JOURNAL_FILE_NAME)
            .to_string_lossy()
            .into_owned()
    }

    const fn default_journal_enabled() -> bool {
        true
    }
}

/// Tuning for the in-memory lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePreferences {
    #[serde(default = "StorePreferences::default_buckets")]
    pub buckets: usize,
}

impl Default for StorePreferences {
    fn default() -> Self {
        Self {
            buckets: Self::default_buckets(),
        }
    }
}

impl StorePreferences {
    const fn default_buckets() -> usize {
        DEFAULT_BUCKETS
    }
}

/// Per-invocation overrides, usually from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOverrides {
    pub snapshot_path: Option<String>,
    pub journal_path: Option<String>,
    pub journal_enabled: Option<bool>,
    pub buckets: Option<usize>,
}

impl RuntimeOverrides {
    pub fn is_empty(&self) -> bool {
        self.snapshot_path.is_none()
            && self.journal_path.is_none()
            && self.journal_enabled.is_none()
            && self.buckets.is_none()
    }
}

/// Fully resolved settings the application runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub snapshot_path: PathBuf,
    pub journal_path: Option<PathBuf>,
    pub buckets: usize,
}

pub fn config_directory() -> PathBuf {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return expand_path(&dir);
        }
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn data_directory() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Expands a leading `~` so config files can use home-relative paths.
pub fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value.trim()).into_owned())
}

pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &std::path::Path) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        CONFIG_FILE_NAME, err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    CONFIG_FILE_NAME, err
                ));
            }
        }
    }

    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
    }
}

pub fn save_config(config: &FileConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &std::path::Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version > CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Config schema v{} is newer than supported v{}; unknown settings are ignored.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
    }
    config.schema_version = CURRENT_SCHEMA_VERSION;

    if config.storage.snapshot_path.trim().is_empty() {
        warnings.push("storage.snapshot_path is empty; using the default location.".to_string());
        config.storage.snapshot_path = StoragePreferences::default_snapshot_path();
    }

    if config.storage.journal_path.trim().is_empty() {
        warnings.push("storage.journal_path is empty; using the default location.".to_string());
        config.storage.journal_path = StoragePreferences::default_journal_path();
    }

    if config.store.buckets == 0 || config.store.buckets > MAX_BUCKETS {
        warnings.push(format!(
            "store.buckets must be between 1 and {}, got {}; resetting to {}.",
            MAX_BUCKETS, config.store.buckets, DEFAULT_BUCKETS
        ));
        config.store.buckets = DEFAULT_BUCKETS;
    }

    (config, warnings)
}

/// Layers `overrides` over the file config and resolves paths.
pub fn apply_runtime_overrides(
    config: &FileConfig,
    overrides: &RuntimeOverrides,
    warnings: &mut Vec<String>,
) -> Settings {
    let snapshot_raw = overrides
        .snapshot_path
        .as_deref()
        .unwrap_or(&config.storage.snapshot_path);
    let journal_raw = overrides
        .journal_path
        .as_deref()
        .unwrap_or(&config.storage.journal_path);
    let journal_enabled = overrides
        .journal_enabled
        .unwrap_or(config.storage.journal_enabled);

    let buckets = match overrides.buckets {
        Some(0) => {
            warnings.push(format!(
                "--buckets must be at least 1; using {}.",
                config.store.buckets
            ));
            config.store.buckets
        }
        Some(count) if count > MAX_BUCKETS => {
            warnings.push(format!(
                "--buckets is capped at {}; using {}.",
                MAX_BUCKETS, MAX_BUCKETS
            ));
            MAX_BUCKETS
        }
        Some(count) => count,
        None => config.store.buckets,
    };

    Settings {
        snapshot_path: expand_path(snapshot_raw),
        journal_path: journal_enabled.then(|| expand_path(journal_raw)),
        buckets,
    }
}
