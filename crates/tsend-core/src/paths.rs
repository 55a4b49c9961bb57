//! XDG-compliant path resolution for the config file and log output.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::{APP_NAME, AppConfig};

/// Application paths for the config file and state directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file.
    pub config_file: PathBuf,
    /// Directory relative log file paths resolve against.
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// Discover application paths, optionally overriding the config file location.
    ///
    /// # Errors
    ///
    /// Returns an error if paths cannot be resolved or expanded.
    pub fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!(
                "invalid config file path: {}",
                config_file.display()
            ));
        }

        Ok(Self {
            config_file,
            state_dir: default_state_dir()?,
        })
    }

    /// Resolved log file, if file logging is configured.
    #[must_use]
    pub fn log_file(&self, cfg: &AppConfig) -> Option<PathBuf> {
        let file = PathBuf::from(cfg.logging.file.as_deref()?);
        if file.is_absolute() {
            Some(file)
        } else {
            Some(self.state_dir.join(file))
        }
    }

    /// Create the parent directory of the configured log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_log_dir(&self, cfg: &AppConfig) -> Result<()> {
        if let Some(parent) = self.log_file(cfg).as_deref().and_then(Path::parent) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        Ok(())
    }
}

impl std::fmt::Display for AppPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "config: {}, state: {}",
            self.config_file.display(),
            self.state_dir.display()
        )
    }
}

/// Expand a `PathBuf`, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    path.to_str()
        .map_or_else(|| Ok(path.to_path_buf()), expand_str_path)
}

/// Expand a string path, resolving ~ and environment variables.
///
/// # Errors
///
/// Returns an error if shell expansion fails.
pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// Get the default configuration directory (`XDG_CONFIG_HOME` or fallback).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// Get the default state directory (`XDG_STATE_HOME` or fallback).
///
/// On Windows there is no state directory; the local data directory is used.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine state directory"))
}

/// Write the default configuration file to the specified path.
///
/// # Errors
///
/// Returns an error if the file cannot be written or the directory cannot be created.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let config = AppConfig::default();
    let toml_str = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml_str);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    format!(
        "# Configuration for {APP_NAME}\n# File: {}\n# Labels must match the Teams UI language.\n\n",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn directory_override_points_at_config_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::discover(Some(dir.path())).expect("paths");
        assert_eq!(paths.config_file, dir.path().join("config.toml"));
    }

    #[test]
    fn default_config_round_trips_through_loader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path).expect("write");

        let body = fs::read_to_string(&path).expect("read");
        assert!(body.starts_with("# Configuration for tsend"));

        let config = AppConfig::load_from_path(&path).expect("load");
        assert_eq!(config.labels.filter_field, "Filter by name or group name");
        assert_eq!(config.aliases.len(), 1);
    }

    #[test]
    fn relative_log_file_resolves_under_state_dir() {
        let paths = AppPaths {
            config_file: PathBuf::from("/tmp/tsend/config.toml"),
            state_dir: PathBuf::from("/tmp/tsend-state"),
        };
        let mut cfg = AppConfig::default();
        assert_eq!(paths.log_file(&cfg), None);

        cfg.logging.file = Some("tsend.log".to_string());
        assert_eq!(
            paths.log_file(&cfg),
            Some(PathBuf::from("/tmp/tsend-state/tsend.log"))
        );
    }
}
