//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: PathBuf) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let updated = set_value(&settings, key, value)?;
            updated.save_to(&config_path)?;
            Output::success(&format!("Set {} = {}", key, value));
            Output::kv("Config file", &config_path.display().to_string());
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Apply a dotted `section.field` assignment and re-validate the settings.
fn set_value(settings: &Settings, key: &str, value: &str) -> Result<Settings> {
    let mut root = toml::Value::try_from(settings).context("Failed to serialize config")?;

    let (section, field) = key
        .split_once('.')
        .with_context(|| format!("Expected a key like 'completion.model', got '{}'", key))?;

    let Some(table) = root.get_mut(section).and_then(|v| v.as_table_mut()) else {
        bail!("Unknown config section '{}'", section);
    };
    // Unset optional fields are absent from the serialized table; the
    // round trip below tells them apart from unknown keys.
    let parsed = match table.get(field) {
        None => toml::Value::String(value.to_string()),
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(
            value
                .parse()
                .with_context(|| format!("'{}' expects true or false", key))?,
        ),
        Some(toml::Value::Integer(_)) => toml::Value::Integer(
            value
                .parse()
                .with_context(|| format!("'{}' expects an integer", key))?,
        ),
        Some(toml::Value::Float(_)) => toml::Value::Float(
            value
                .parse()
                .with_context(|| format!("'{}' expects a number", key))?,
        ),
        _ => toml::Value::String(value.to_string()),
    };
    table.insert(field.to_string(), parsed);

    let updated: Settings = root
        .try_into()
        .with_context(|| format!("Invalid value for '{}': {}", key, value))?;

    let known = toml::Value::try_from(&updated)
        .context("Failed to serialize config")?
        .get(section)
        .and_then(|v| v.get(field))
        .is_some();
    if !known {
        bail!("Unknown config key '{}'", key);
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorStoreProvider;

    #[test]
    fn test_set_typed_values() {
        let settings = Settings::default();

        let updated = set_value(&settings, "completion.model", "gpt-4o").unwrap();
        assert_eq!(updated.completion.model, "gpt-4o");

        let updated = set_value(&updated, "retrieval.history_limit", "20").unwrap();
        assert_eq!(updated.retrieval.history_limit, 20);

        let updated = set_value(&updated, "retrieval.index_on_start", "false").unwrap();
        assert!(!updated.retrieval.index_on_start);

        let updated = set_value(&updated, "vector_store.provider", "memory").unwrap();
        assert_eq!(updated.vector_store.provider, VectorStoreProvider::Memory);
    }

    #[test]
    fn test_set_unset_optional_field() {
        let settings = Settings::default();
        assert!(settings.prompts.custom_dir.is_none());

        let updated = set_value(&settings, "prompts.custom_dir", "~/wrench-prompts").unwrap();
        assert_eq!(updated.prompts.custom_dir.as_deref(), Some("~/wrench-prompts"));
    }

    #[test]
    fn test_set_rejects_unknown_and_mistyped() {
        let settings = Settings::default();
        assert!(set_value(&settings, "completion", "x").is_err());
        assert!(set_value(&settings, "nope.model", "x").is_err());
        assert!(set_value(&settings, "completion.nope", "x").is_err());
        assert!(set_value(&settings, "server.port", "eighty").is_err());
    }

    #[test]
    fn test_set_then_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        run_config(
            &ConfigAction::Set {
                key: "server.port".to_string(),
                value: "8080".to_string(),
            },
            Settings::default(),
            path.clone(),
        )
        .unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 8080);
    }
}
