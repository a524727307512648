//! Configuration: the TOML file, the shortcut modifier setting, and the
//! live settings provider the pipeline reads on every keystroke.
//!
//! The file is owned by the settings collaborator. This process only reads
//! it. A missing file means defaults.
//!
//! ```toml
//! cut_shortcut_mode = "command"   # "control" | "command" | "function"
//! retry_delay_ms = 2000
//! ```

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Deserialize;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SHEAR_CONFIG";

const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Shorter retry delays are raised to this.
const MIN_RETRY_DELAY_MS: u64 = 250;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("HOME is not set; cannot locate the config file")]
    NoHomeDirectory,
}

// ---------------------------------------------------------------------------
// Shortcut modifier
// ---------------------------------------------------------------------------

/// Which modifier key turns C/X/V into a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutModifier {
    #[default]
    Control,
    Command,
    Function,
}

impl ShortcutModifier {
    /// Config key the setting is stored under.
    pub const STORAGE_KEY: &'static str = "cut_shortcut_mode";

    /// Parses a stored value. Absent or unrecognised values fall back to
    /// `Control`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("control") => Self::Control,
            Some("command") => Self::Command,
            Some("function") => Self::Function,
            _ => Self::default(),
        }
    }

    pub fn stored_value(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Command => "command",
            Self::Function => "function",
        }
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Keys are kept as raw values so a bad value for one key cannot discard
/// the other.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    cut_shortcut_mode: Option<toml::Value>,
    retry_delay_ms: Option<toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub shortcut_modifier: ShortcutModifier,
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shortcut_modifier: ShortcutModifier::default(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl Config {
    /// Loads `path`. A missing file yields `Config::default()`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn parse(text: &str) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| e.to_string())?;
        let mode = raw.cut_shortcut_mode.as_ref().and_then(toml::Value::as_str);
        Ok(Self {
            shortcut_modifier: ShortcutModifier::from_stored(mode),
            retry_delay: retry_delay(raw.retry_delay_ms.as_ref()),
        })
    }
}

/// Non-integer or non-positive values fall back to the default; small ones
/// are raised to `MIN_RETRY_DELAY_MS`.
fn retry_delay(value: Option<&toml::Value>) -> Duration {
    let ms = match value {
        None => DEFAULT_RETRY_DELAY_MS,
        Some(toml::Value::Integer(ms)) if *ms > 0 => (*ms as u64).max(MIN_RETRY_DELAY_MS),
        Some(other) => {
            log::warn!(
                "config: retry_delay_ms = {other} is not a positive integer; \
                 using {DEFAULT_RETRY_DELAY_MS}"
            );
            DEFAULT_RETRY_DELAY_MS
        }
    };
    Duration::from_millis(ms)
}

/// `$SHEAR_CONFIG`, else `~/Library/Application Support/Shear/config.toml`.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::NoHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join("Library")
        .join("Application Support")
        .join("Shear")
        .join("config.toml"))
}

// ---------------------------------------------------------------------------
// Live settings
// ---------------------------------------------------------------------------

/// Read-only view of the live shortcut setting.
pub trait SettingsProvider {
    fn shortcut_modifier(&self) -> ShortcutModifier;
}

/// Reads the modifier from the config file, reloading whenever the file's
/// modification time changes.
pub struct FileSettings {
    path: PathBuf,
    cache: RefCell<Cached>,
}

#[derive(Default)]
struct Cached {
    /// `None` until the first read; `Some(None)` when the file is absent.
    stamp: Option<Option<SystemTime>>,
    modifier: ShortcutModifier,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RefCell::new(Cached::default()),
        }
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

impl SettingsProvider for FileSettings {
    fn shortcut_modifier(&self) -> ShortcutModifier {
        let stamp = self.modified();
        let mut cache = self.cache.borrow_mut();
        if cache.stamp != Some(stamp) {
            cache.modifier = match Config::load(&self.path) {
                Ok(config) => config.shortcut_modifier,
                Err(e) => {
                    log::warn!("config: {e}; using {:?}", ShortcutModifier::default());
                    ShortcutModifier::default()
                }
            };
            cache.stamp = Some(stamp);
            log::debug!("config: shortcut modifier is {:?}", cache.modifier);
        }
        cache.modifier
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
