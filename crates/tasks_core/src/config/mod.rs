use crate::deadline::Urgency;
use crate::error::AppError;
use crate::storage::json_store::write_private;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "tasks";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKS_CONFIG_PATH";
const DATA_DIR_ENV_VAR: &str = "TASKS_DATA_DIR";
const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 60;

/// ANSI colors for the deadline badge classes. Empty strings disable color.
#[derive(Debug, Clone)]
pub struct Palette {
    pub overdue: &'static str,
    pub today: &'static str,
    pub soon: &'static str,
    pub upcoming: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn plain() -> Self {
        Self {
            overdue: "",
            today: "",
            soon: "",
            upcoming: "",
            muted: "",
            reset: "",
        }
    }

    pub fn badge(&self, urgency: Urgency, text: &str) -> String {
        let color = match urgency {
            Urgency::Overdue => self.overdue,
            Urgency::DueToday => self.today,
            Urgency::DueSoon => self.soon,
            Urgency::Upcoming => self.upcoming,
        };
        paint(color, self.reset, text)
    }

    pub fn mutedize(&self, text: &str) -> String {
        paint(self.muted, self.reset, text)
    }
}

fn paint(color: &str, reset: &str, text: &str) -> String {
    if color.is_empty() {
        text.to_string()
    } else {
        format!("{color}{text}{reset}")
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match canonical_theme_name_option(theme).as_deref() {
        Some("light") => Palette {
            overdue: "\x1b[38;5;160m",
            today: "\x1b[38;5;166m",
            soon: "\x1b[38;5;136m",
            upcoming: "\x1b[38;5;25m",
            muted: "\x1b[38;5;244m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            overdue: "\x1b[38;5;203m",
            today: "\x1b[38;5;208m",
            soon: "\x1b[38;5;221m",
            upcoming: "\x1b[38;5;111m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
    }
}

fn canonical_theme_name_option(theme: Option<&str>) -> Option<String> {
    theme.and_then(canonical_theme_name)
}

/// Maps loose theme spellings onto `dark` or `light`.
pub fn canonical_theme_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    match cleaned.trim_matches('_') {
        "" | "default" => Some("dark".to_string()),
        "dark" | "dark_mode" | "darkmode" | "night" => Some("dark".to_string()),
        "light" | "light_mode" | "lightmode" | "day" => Some("light".to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// External speech-to-text command used for dictation.
    #[serde(default)]
    pub speech_command: Option<String>,
}

fn default_reminder_interval_secs() -> u64 {
    DEFAULT_REMINDER_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: None,
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
            data_dir: None,
            speech_command: None,
        }
    }
}

impl Config {
    pub fn reminder_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reminder_interval_secs.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub reminder_interval_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub speech_command: Option<String>,
}

fn app_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

/// Where accounts and task documents live: `TASKS_DATA_DIR`, then the
/// configured `data_dir`, then the application directory.
pub fn data_dir(config: &Config) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(DATA_DIR_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    match &config.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => app_dir(),
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config_theme(config))
}

pub fn save_config(config: &Config) -> Result<PathBuf, AppError> {
    let path = config_path()?;
    save_config_to_path(&path, config)?;
    Ok(path)
}

fn save_config_to_path(path: &Path, config: &Config) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(config)?;
    write_private(path, &content)
}

fn normalize_config_theme(mut config: Config) -> Config {
    config.theme = config.theme.and_then(|name| canonical_theme_name(&name));
    config
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(theme) = overrides.theme.as_deref()
        && let Some(normalized) = canonical_theme_name(theme)
    {
        merged.theme = Some(normalized);
    }
    if let Some(secs) = overrides.reminder_interval_secs {
        merged.reminder_interval_secs = secs;
    }
    if let Some(dir) = &overrides.data_dir {
        merged.data_dir = Some(dir.clone());
    }
    if let Some(command) = &overrides.speech_command {
        merged.speech_command = Some(command.clone());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, canonical_theme_name, load_config_from_path,
        load_config_with_fallback_from_path, merge_overrides, palette_for_theme,
        save_config_to_path,
    };
    use crate::deadline::Urgency;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_with_fallback_from_path(&dir.path().join("missing.json"));

        assert_eq!(result.config, Config::default());
        assert_eq!(result.config.reminder_interval_secs, 60);
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn load_config_reads_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.json");
        let content = serde_json::json!({
            "theme": "Light Mode",
            "reminder_interval_secs": 15,
            "speech_command": "whisper-stream"
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();

        assert_eq!(loaded.theme.as_deref(), Some("light"));
        assert_eq!(loaded.reminder_interval_secs, 15);
        assert_eq!(loaded.speech_command.as_deref(), Some("whisper-stream"));
        assert_eq!(loaded.data_dir, None);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            theme: Some("light".into()),
            reminder_interval_secs: 30,
            data_dir: Some(PathBuf::from("/srv/tasks")),
            speech_command: None,
        };

        save_config_to_path(&path, &config).unwrap();
        assert_eq!(load_config_from_path(&path).unwrap(), config);
    }

    #[test]
    fn merge_overrides_replaces_only_given_fields() {
        let base = Config {
            theme: Some("light".into()),
            reminder_interval_secs: 60,
            data_dir: Some(PathBuf::from("/srv/tasks")),
            speech_command: None,
        };

        let overrides = ConfigOverrides {
            theme: Some("dark".into()),
            reminder_interval_secs: Some(5),
            ..ConfigOverrides::default()
        };

        let merged = merge_overrides(&base, &overrides);
        assert_eq!(merged.theme.as_deref(), Some("dark"));
        assert_eq!(merged.reminder_interval_secs, 5);
        assert_eq!(merged.data_dir, base.data_dir);
        assert_eq!(base.theme.as_deref(), Some("light"));
    }

    #[test]
    fn merge_overrides_ignores_unknown_theme() {
        let base = Config::default();
        let overrides = ConfigOverrides {
            theme: Some("oceanic".into()),
            ..ConfigOverrides::default()
        };
        assert_eq!(merge_overrides(&base, &overrides), base);
    }

    #[test]
    fn canonical_theme_name_maps_variants() {
        assert_eq!(canonical_theme_name("Light"), Some("light".into()));
        assert_eq!(canonical_theme_name("dark-mode"), Some("dark".into()));
        assert_eq!(canonical_theme_name("  "), Some("dark".into()));
        assert_eq!(canonical_theme_name("oceanic"), None);
    }

    #[test]
    fn palette_for_theme_colors_badges() {
        let dark = palette_for_theme(None);
        assert_eq!(
            dark.badge(Urgency::Overdue, "Overdue"),
            "\x1b[38;5;203mOverdue\x1b[0m"
        );

        let light = palette_for_theme(Some("light"));
        assert_eq!(light.upcoming, "\x1b[38;5;25m");
        assert_eq!(super::Palette::plain().badge(Urgency::DueSoon, "x"), "x");
    }
}
