//! Core library for tsend - send Microsoft Teams messages through the
//! desktop client's accessibility tree.
//!
//! This crate provides:
//! - Configuration loading, XDG path resolution and schema generation
//! - Chat label normalization and alias substitution
//! - Chat list indexing and chat resolution
//! - Composer control and clipboard transfer of images and files
//! - The [`TeamsDriver`] send operations over a pluggable [`desktop::Desktop`]

pub mod clipboard;
pub mod composer;
pub mod config;
pub mod desktop;
pub mod driver;
pub mod error;
pub mod index;
pub mod normalize;
pub mod paths;
pub mod resolver;
pub mod schema;

pub use config::{AppConfig, AutomationConfig, LogLevel, LoggingConfig, TimingConfig, UiLabels};
pub use driver::{FileOptions, SendOptions, Session, TeamsDriver};
pub use error::{CoreError, Result};
pub use normalize::{AliasTable, NameNormalizer, names_match};
pub use paths::{AppPaths, default_config_dir, default_state_dir};
pub use schema::{check_generated_files, generate_example_config, generate_schema, write_generated_files};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "tsend";

/// Repository URL used in generated schema identifiers.
pub const REPO_URL: &str = "https://github.com/byteowlz/tsend";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
