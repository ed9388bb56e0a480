use crate::error::{AppError, Result};
use crate::profiles::DEFAULT_ALIAS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.toml";
pub const SECRETS_FILE: &str = ".secrets.toml";
pub const PROFILES_FILE: &str = "profiles.toml";

/// Every dotted key understood by [`Config::get`] and [`Config::set`].
///
/// The matching environment variable is [`ENV_PREFIX`] followed by the key
/// upper-cased with dots replaced by underscores, e.g.
/// `CHATDRIVER_CHATGPT_CONFIG_NAME`.
pub const ENV_PREFIX: &str = "CHATDRIVER_";

pub const KEYS: &[&str] = &[
    "chatgpt.config.name",
    "chatgpt.person.name",
    "chatgpt.logging.enabled",
    "chatgpt.personalization.enabled",
    "browser.headless",
    "browser.user_data_dir",
    "browser.purge_profile_on_exit",
    "timing.open_timeout_secs",
    "timing.start_delay_secs",
    "timing.max_polls",
    "timing.poll_interval_ms",
    "timing.reply_settle_ms",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chatgpt: ChatGptConfig,
    pub browser: BrowserSettings,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatGptConfig {
    pub config: Selection,
    pub person: Selection,
    pub logging: Toggle,
    pub personalization: Toggle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub name: String,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            name: DEFAULT_ALIAS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Persistent Chrome profile; `None` means the per-user data directory.
    pub user_data_dir: Option<PathBuf>,
    /// Unpacked extensions loaded into the browser (ad blockers and the like).
    pub extensions: Vec<PathBuf>,
    pub purge_profile_on_exit: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_data_dir: None,
            extensions: Vec::new(),
            purge_profile_on_exit: false,
        }
    }
}

impl BrowserSettings {
    pub fn resolved_user_data_dir(&self) -> PathBuf {
        self.user_data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("chatdriver").join("ChromeProfile"))
                .unwrap_or_else(|| PathBuf::from("./browser/user_data"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub open_timeout_secs: u32,
    pub start_delay_secs: u64,
    pub max_polls: u32,
    /// Length of one reply poll and of the pause between open attempts.
    pub poll_interval_ms: u64,
    pub reply_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            open_timeout_secs: 30,
            start_delay_secs: 1,
            max_polls: 30,
            poll_interval_ms: 1000,
            reply_settle_ms: 300,
        }
    }
}

/// Explicit command-line overrides; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_name: Option<String>,
    pub person_name: Option<String>,
    pub logging_enabled: Option<bool>,
}

impl Config {
    /// Defaults, then `<dir>/settings.toml`, then environment variables.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::from_file(&dir.join(SETTINGS_FILE))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str::<Config>(&contents)?;
        Ok(config)
    }

    pub fn env_var_name(key: &str) -> String {
        format!("{}{}", ENV_PREFIX, key.to_uppercase().replace('.', "_"))
    }

    /// Environment variables take precedence over the file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in KEYS {
            if let Some(value) = lookup(&Self::env_var_name(key)) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, overrides: &CliOverrides) {
        if let Some(name) = &overrides.config_name {
            self.chatgpt.config.name = name.clone();
        }
        if let Some(name) = &overrides.person_name {
            self.chatgpt.person.name = name.clone();
        }
        if let Some(enabled) = overrides.logging_enabled {
            self.chatgpt.logging.enabled = enabled;
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "chatgpt.config.name" => self.chatgpt.config.name.clone(),
            "chatgpt.person.name" => self.chatgpt.person.name.clone(),
            "chatgpt.logging.enabled" => self.chatgpt.logging.enabled.to_string(),
            "chatgpt.personalization.enabled" => self.chatgpt.personalization.enabled.to_string(),
            "browser.headless" => self.browser.headless.to_string(),
            "browser.user_data_dir" => self.browser.resolved_user_data_dir().display().to_string(),
            "browser.purge_profile_on_exit" => self.browser.purge_profile_on_exit.to_string(),
            "timing.open_timeout_secs" => self.timing.open_timeout_secs.to_string(),
            "timing.start_delay_secs" => self.timing.start_delay_secs.to_string(),
            "timing.max_polls" => self.timing.max_polls.to_string(),
            "timing.poll_interval_ms" => self.timing.poll_interval_ms.to_string(),
            "timing.reply_settle_ms" => self.timing.reply_settle_ms.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "chatgpt.config.name" => self.chatgpt.config.name = value.trim().to_string(),
            "chatgpt.person.name" => self.chatgpt.person.name = value.trim().to_string(),
            "chatgpt.logging.enabled" => self.chatgpt.logging.enabled = parse_flag(key, value)?,
            "chatgpt.personalization.enabled" => {
                self.chatgpt.personalization.enabled = parse_flag(key, value)?
            }
            "browser.headless" => self.browser.headless = parse_flag(key, value)?,
            "browser.user_data_dir" => {
                self.browser.user_data_dir = Some(PathBuf::from(value.trim()))
            }
            "browser.purge_profile_on_exit" => {
                self.browser.purge_profile_on_exit = parse_flag(key, value)?
            }
            "timing.open_timeout_secs" => self.timing.open_timeout_secs = parse_number(key, value)?,
            "timing.start_delay_secs" => self.timing.start_delay_secs = parse_number(key, value)?,
            "timing.max_polls" => self.timing.max_polls = parse_number(key, value)?,
            "timing.poll_interval_ms" => self.timing.poll_interval_ms = parse_number(key, value)?,
            "timing.reply_settle_ms" => self.timing.reply_settle_ms = parse_number(key, value)?,
            _ => {
                return Err(AppError::Configuration(format!(
                    "Unknown setting: {}",
                    key
                )))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chatgpt.config.name.trim().is_empty() {
            errors.push("Site profile name must not be empty".to_string());
        }

        if self.chatgpt.person.name.trim().is_empty() {
            errors.push("Person profile name must not be empty".to_string());
        }

        if self.timing.open_timeout_secs == 0 {
            errors.push("Open timeout must be greater than 0".to_string());
        }

        if self.timing.max_polls == 0 {
            errors.push("Max polls must be greater than 0".to_string());
        }

        if self.timing.poll_interval_ms == 0 {
            errors.push("Poll interval must be greater than 0".to_string());
        }

        for extension in &self.browser.extensions {
            if !extension.exists() {
                errors.push(format!("Extension not found: {}", extension.display()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| AppError::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "{} expects 0/1 or true/false, got {:?}",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        AppError::Configuration(format!("{} expects a number, got {:?}", key, value))
    })
}
