//! Configuration types and loading for the application.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;

use crate::CoreError;
use crate::clipboard::RetryPolicy;
use crate::normalize::AliasTable;
use crate::paths::{expand_str_path, write_default_config};
use crate::{AppPaths, env_prefix};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Window discovery and chat lookup behavior.
    pub automation: AutomationConfig,

    /// Fixed waits and clipboard retry bounds.
    pub timing: TimingConfig,

    /// UI labels of the Teams controls, per localization.
    pub labels: UiLabels,

    /// Chat aliases. Keys match case-insensitively, exactly or as a substring
    /// of a chat-list label, in the order written; values are canonical names.
    #[schemars(description = "Chat aliases. Map label fragments to canonical chat names.")]
    pub aliases: IndexMap<String, String>,
}

impl AppConfig {
    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        Self::load_layered(config_file, None)
    }

    /// Layer defaults, the file and the environment. `env` replaces the
    /// process environment when given.
    fn load_layered(config_file: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("automation.window_class", "TeamsWebView")?
            .set_default("automation.activation_delay_ms", 3_000_i64)?
            .set_default("automation.search_timeout_ms", 5_000_i64)?
            .set_default("automation.minimize_after_send", false)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(env_prefix.as_str())
                    .separator("__")
                    .source(env),
            )
            .build()?;

        let mut config: Self = built.try_deserialize()?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", config_file.display()))?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        Ok(config)
    }

    /// Check values the automation cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] naming the first offending key.
    pub fn validate(&self) -> crate::Result<()> {
        let automation = &self.automation;
        if automation.window_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(invalid("automation.window_keywords must name at least one keyword"));
        }
        if automation.search_depth == 0 {
            return Err(invalid("automation.search_depth must be at least 1"));
        }
        if self.timing.clipboard_attempts == 0 {
            return Err(invalid("timing.clipboard_attempts must be at least 1"));
        }
        let labels = &self.labels;
        for (key, value) in [
            ("labels.chat_hub", &labels.chat_hub),
            ("labels.filter_button", &labels.filter_button),
            ("labels.filter_field", &labels.filter_field),
            ("labels.filter_results", &labels.filter_results),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(&format!("{key} must not be empty")));
            }
        }
        if labels.message_fields.is_empty() {
            return Err(invalid("labels.message_fields must list at least one label"));
        }
        if labels.send_buttons.is_empty() {
            return Err(invalid("labels.send_buttons must list at least one label"));
        }
        Ok(())
    }

    /// Alias table for the name normalizer.
    #[must_use]
    pub fn alias_table(&self) -> AliasTable {
        AliasTable::new(&self.aliases)
    }

    /// Add a chat alias and write the updated config to disk.
    ///
    /// Comments and layout of the existing file are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed or written,
    /// and [`CoreError::Config`] when `aliases` exists but is not a table.
    pub fn add_alias(config_path: &Path, name: &str, value: &str) -> Result<()> {
        let content = match std::fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", config_path.display()));
            }
        };

        let mut doc = content
            .parse::<DocumentMut>()
            .with_context(|| format!("parsing {}", config_path.display()))?;

        let root = doc.as_table_mut();
        if !root.contains_key("aliases") {
            root.insert("aliases", toml_edit::table());
        }
        let Some(aliases) = root
            .get_mut("aliases")
            .and_then(toml_edit::Item::as_table_like_mut)
        else {
            return Err(invalid("aliases must be a table").into());
        };
        aliases.insert(name, toml_edit::value(value));

        std::fs::write(config_path, doc.to_string())
            .with_context(|| format!("writing {}", config_path.display()))?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut aliases = IndexMap::new();
        aliases.insert(
            "Teams Chatbot Bot".to_string(),
            "Columbus Teams Chatbot".to_string(),
        );
        Self {
            schema: None,
            logging: LoggingConfig::default(),
            automation: AutomationConfig::default(),
            timing: TimingConfig::default(),
            labels: UiLabels::default(),
            aliases,
        }
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::Config(message.to_string())
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

impl LogLevel {
    /// Matching `log` filter.
    #[must_use]
    pub const fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Window discovery and chat lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Window discovery and chat lookup behavior")]
pub struct AutomationConfig {
    /// A window qualifies when its title contains any of these keywords.
    pub window_keywords: Vec<String>,

    /// Substring required in the window class name. Empty disables the check.
    pub window_class: String,

    /// Wait after activating the window, in milliseconds.
    pub activation_delay_ms: u64,

    /// Wait for the chat filter to apply after typing, in milliseconds.
    pub search_timeout_ms: u64,

    /// Depth limit for descendant searches below the window.
    #[schemars(range(min = 1))]
    pub search_depth: u32,

    /// Sections searched first, in order, when no section is requested.
    pub section_preference: Vec<String>,

    /// Show the desktop (Win+D) after every send.
    pub minimize_after_send: bool,
}

impl AutomationConfig {
    /// Activation wait as a `Duration`.
    #[must_use]
    pub const fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }

    /// Filter wait as a `Duration`.
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            window_keywords: vec!["Microsoft Teams".to_string()],
            window_class: "TeamsWebView".to_string(),
            activation_delay_ms: 3_000,
            search_timeout_ms: 5_000,
            search_depth: 30,
            section_preference: vec!["Favorites".to_string(), "Chats".to_string()],
            minimize_after_send: false,
        }
    }
}

/// Fixed waits between UI steps, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Fixed waits and clipboard retry bounds")]
pub struct TimingConfig {
    /// Wait after clicking a chat row.
    pub open_chat_ms: u64,

    /// Wait after closing the filter box.
    pub close_filter_ms: u64,

    /// Wait after pasting an attachment for Teams to pick it up.
    pub paste_settle_ms: u64,

    /// Default wait after pressing send.
    pub wait_after_send_ms: u64,

    /// Clipboard open attempts before giving up.
    #[schemars(range(min = 1))]
    pub clipboard_attempts: u32,

    /// Wait between clipboard open attempts.
    pub clipboard_retry_ms: u64,
}

impl TimingConfig {
    /// Wait after clicking a chat row.
    #[must_use]
    pub const fn open_chat(&self) -> Duration {
        Duration::from_millis(self.open_chat_ms)
    }

    /// Wait after closing the filter box.
    #[must_use]
    pub const fn close_filter(&self) -> Duration {
        Duration::from_millis(self.close_filter_ms)
    }

    /// Wait after pasting an attachment.
    #[must_use]
    pub const fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    /// Default wait after pressing send.
    #[must_use]
    pub const fn wait_after_send(&self) -> Duration {
        Duration::from_millis(self.wait_after_send_ms)
    }

    /// Clipboard retry policy.
    #[must_use]
    pub const fn clipboard_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.clipboard_attempts,
            delay: Duration::from_millis(self.clipboard_retry_ms),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            open_chat_ms: 1_000,
            close_filter_ms: 500,
            paste_settle_ms: 2_000,
            wait_after_send_ms: 3_000,
            clipboard_attempts: 5,
            clipboard_retry_ms: 100,
        }
    }
}

/// Accessible names of the Teams controls the automation touches.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "UI labels of the Teams controls, per localization")]
pub struct UiLabels {
    /// Left rail button opening the chat hub.
    pub chat_hub: String,
    /// Button revealing the chat filter box.
    pub filter_button: String,
    /// Chat filter text field.
    pub filter_field: String,
    /// Container holding filtered results, grouped by section.
    pub filter_results: String,
    /// Button closing the filter box.
    pub close_filter: String,
    /// Message composer field names, tried in order.
    pub message_fields: Vec<String>,
    /// Send button names, tried in order.
    pub send_buttons: Vec<String>,
}

impl Default for UiLabels {
    fn default() -> Self {
        Self {
            chat_hub: "Chat (Ctrl+2)".to_string(),
            filter_button: "Show filter text box (Ctrl+Shift+F)".to_string(),
            filter_field: "Filter by name or group name".to_string(),
            filter_results: "Filter active".to_string(),
            close_filter: "Close filter text box".to_string(),
            message_fields: vec!["Type a message".to_string(), "Type your message".to_string()],
            send_buttons: vec!["Send (Ctrl+Enter)".to_string(), "Send".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load_from_path(&dir.path().join("absent.toml")).expect("config");
        assert_eq!(config.automation.window_class, "TeamsWebView");
        assert_eq!(config.automation.section_preference, vec!["Favorites", "Chats"]);
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.labels.send_buttons, vec!["Send (Ctrl+Enter)", "Send"]);
    }

    #[test]
    fn file_values_override_defaults_and_keep_alias_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[automation]
window_keywords = ["Microsoft Teams", "Teams (work or school)"]
search_timeout_ms = 1500
section_preference = ["Chats"]

[labels]
message_fields = ["Nachricht eingeben"]

[aliases]
zed = "Zed Team"
alpha = "Alpha Team"
"#,
        )
        .expect("write config");

        let config = AppConfig::load_from_path(&path).expect("config");
        assert_eq!(config.automation.window_keywords.len(), 2);
        assert_eq!(config.automation.search_timeout(), Duration::from_millis(1500));
        assert_eq!(config.automation.section_preference, vec!["Chats"]);
        assert_eq!(config.labels.message_fields, vec!["Nachricht eingeben"]);
        assert_eq!(config.labels.chat_hub, "Chat (Ctrl+2)");
        let keys: Vec<&str> = config.aliases.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zed", "alpha"]);
    }

    #[test]
    fn add_alias_writes_table_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[automation]\nsearch_depth = 20\n").expect("write config");

        AppConfig::add_alias(&path, "bot", "Columbus Teams Chatbot").expect("add alias");

        let config = AppConfig::load_from_path(&path).expect("config");
        assert_eq!(config.automation.search_depth, 20);
        assert_eq!(
            config.aliases.get("bot").map(String::as_str),
            Some("Columbus Teams Chatbot")
        );
    }

    #[test]
    fn add_alias_keeps_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# tsend settings\n[aliases]\nzed = \"Zed Team\"\n")
            .expect("write config");

        AppConfig::add_alias(&path, "bot", "Bot").expect("add alias");

        let written = std::fs::read_to_string(&path).expect("read config");
        assert_eq!(written, "# tsend settings\n[aliases]\nzed = \"Zed Team\"\nbot = \"Bot\"\n");
    }

    #[test]
    fn add_alias_leaves_unparsable_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let original = "[automation]\nsearch_depth = 20\nwindow_keywords = [\"Teams\"\n";
        std::fs::write(&path, original).expect("write config");

        let err = AppConfig::add_alias(&path, "bot", "Bot").expect_err("parse failure");
        assert!(err.to_string().starts_with("parsing "), "{err}");
        assert_eq!(std::fs::read_to_string(&path).expect("read config"), original);
    }

    #[test]
    fn add_alias_rejects_non_table_aliases() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "aliases = \"oops\"\n").expect("write config");

        let err = AppConfig::add_alias(&path, "bot", "Bot").expect_err("not a table");
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::Config(_))), "{err}");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read config"),
            "aliases = \"oops\"\n"
        );
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[automation]\nsearch_depth = 20\nsearch_timeout_ms = 1500\n")
            .expect("write config");

        let env = config::Map::from([
            ("TSEND__AUTOMATION__SEARCH_DEPTH".to_string(), "12".to_string()),
            ("TSEND__LOGGING__LEVEL".to_string(), "debug".to_string()),
            ("OTHER__AUTOMATION__SEARCH_DEPTH".to_string(), "99".to_string()),
        ]);
        let config = AppConfig::load_layered(&path, Some(env)).expect("config");
        assert_eq!(config.automation.search_depth, 12);
        assert_eq!(config.automation.search_timeout(), Duration::from_millis(1500));
        assert!(matches!(config.logging.level, LogLevel::Debug));
    }

    #[test]
    fn rejects_empty_label_lists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[labels]\nsend_buttons = []\n").expect("write config");

        let err = AppConfig::load_from_path(&path).expect_err("invalid");
        let root = err.root_cause().to_string();
        assert!(root.contains("labels.send_buttons"), "{root}");
    }

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().expect("defaults validate");
        let mut config = AppConfig::default();
        config.timing.clipboard_attempts = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn default_alias_table_maps_chatbot() {
        let table = AppConfig::default().alias_table();
        assert_eq!(table.lookup("teams chatbot bot"), Some("Columbus Teams Chatbot"));
    }

    #[test]
    fn clipboard_policy_from_timing() {
        let policy = TimingConfig::default().clipboard_policy();
        assert_eq!(policy, RetryPolicy::default());
    }
}
