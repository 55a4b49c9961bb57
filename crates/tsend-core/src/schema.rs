//! JSON schema and example config generation from [`AppConfig`].

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use schemars::Schema;
use schemars::generate::SchemaSettings;
use serde_json::json;

use crate::config::AppConfig;

/// Generated schema filename.
pub const SCHEMA_FILENAME: &str = "config.schema.json";

/// Generated config filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Generate the JSON schema for `AppConfig`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn generate_schema(project_name: &str, repo_url: &str) -> Result<String> {
    // draft-07 is what taplo and most TOML editors understand
    let generator = SchemaSettings::draft07().into_generator();
    let mut schema: Schema = generator.into_root_schema_for::<AppConfig>();

    schema.insert(
        "$id".to_string(),
        json!(format!("{repo_url}/schemas/config.schema.json")),
    );
    schema.insert(
        "title".to_string(),
        json!(format!("{project_name} configuration")),
    );
    schema.insert(
        "description".to_string(),
        json!(format!("Configuration schema for {project_name}")),
    );

    if let Some(props) = schema.get_mut("properties")
        && let Some(props_obj) = props.as_object_mut()
    {
        props_obj.insert(
            "$schema".to_string(),
            json!({
                "type": "string",
                "description": "JSON Schema reference for editor support"
            }),
        );
    }

    serde_json::to_string_pretty(&schema).context("serializing JSON schema")
}

/// Generate the example TOML configuration from the default `AppConfig`.
///
/// # Errors
///
/// Returns an error if TOML serialization fails.
pub fn generate_example_config(project_name: &str, repo_url: &str) -> Result<String> {
    let config = AppConfig::default();
    let toml_body =
        toml::to_string_pretty(&config).context("serializing default config to TOML")?;

    let mut output = String::new();
    let _ = write!(
        output,
        r#""$schema" = "{repo_url}/schemas/{SCHEMA_FILENAME}"

# Configuration for {project_name}.
# Copy this file to $XDG_CONFIG_HOME/{project_name}/config.toml and adjust as needed.
# The [labels] section must match the language of the Teams client.

"#
    );
    output.push_str(&toml_body);

    Ok(output)
}

/// Write generated files to a directory.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_generated_files(output_dir: &Path, project_name: &str, repo_url: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory: {}", output_dir.display()))?;

    let schema = generate_schema(project_name, repo_url)?;
    let schema_path = output_dir.join(SCHEMA_FILENAME);
    fs::write(&schema_path, &schema)
        .with_context(|| format!("writing schema to {}", schema_path.display()))?;

    let config = generate_example_config(project_name, repo_url)?;
    let config_path = output_dir.join(CONFIG_FILENAME);
    fs::write(&config_path, &config)
        .with_context(|| format!("writing config to {}", config_path.display()))?;

    Ok(())
}

/// Check that previously generated files in `dir` match the current config types.
///
/// # Errors
///
/// Returns an error listing every missing or stale file.
pub fn check_generated_files(dir: &Path, project_name: &str, repo_url: &str) -> Result<()> {
    let expected = [
        (dir.join(SCHEMA_FILENAME), generate_schema(project_name, repo_url)?),
        (
            dir.join(CONFIG_FILENAME),
            generate_example_config(project_name, repo_url)?,
        ),
    ];

    let mut errors = Vec::new();
    for (path, body) in &expected {
        if !path.exists() {
            errors.push(format!(
                "{} does not exist. Run '{project_name} config generate' to create.",
                path.display()
            ));
            continue;
        }
        let existing =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        if existing != *body {
            errors.push(format!(
                "{} is out of date. Run '{project_name} config generate' to update.",
                path.display()
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "generated config/schema check failed:\n  - {}",
            errors.join("\n  - ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::APP_NAME;

    const REPO_URL: &str = "https://github.com/byteowlz/tsend";

    #[test]
    fn schema_has_metadata_and_sections() {
        let schema = generate_schema(APP_NAME, REPO_URL).expect("schema generation failed");
        assert!(schema.contains("tsend configuration"));
        assert!(schema.contains("\"$schema\""));
        assert!(schema.contains("LogLevel"));
        assert!(schema.contains("message_fields"));
        assert!(schema.contains("section_preference"));
    }

    #[test]
    fn example_config_lists_every_table() {
        let config = generate_example_config(APP_NAME, REPO_URL).expect("config generation failed");
        for table in ["[logging]", "[automation]", "[timing]", "[labels]", "[aliases]"] {
            assert!(config.contains(table), "missing {table}");
        }
        assert!(config.contains("$schema"));
    }

    #[test]
    fn example_config_parses_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_generated_files(dir.path(), APP_NAME, REPO_URL).expect("write");
        let config =
            AppConfig::load_from_path(&dir.path().join(CONFIG_FILENAME)).expect("load example");
        assert_eq!(config.labels.chat_hub, "Chat (Ctrl+2)");
        assert!(config.schema.is_some());
    }

    #[test]
    fn check_detects_stale_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(check_generated_files(dir.path(), APP_NAME, REPO_URL).is_err());

        write_generated_files(dir.path(), APP_NAME, REPO_URL).expect("write");
        check_generated_files(dir.path(), APP_NAME, REPO_URL).expect("fresh files pass");

        fs::write(dir.path().join(SCHEMA_FILENAME), "{}").expect("overwrite");
        let err = check_generated_files(dir.path(), APP_NAME, REPO_URL).expect_err("stale");
        assert!(err.to_string().contains("out of date"));
    }
}
