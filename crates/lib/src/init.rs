//! Initialize the configuration directory: create ~/.chat-helper and a default config.json.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;

/// Create the config directory and write a pretty-printed default `config.json` if missing.
/// Returns true when a new file was written; an existing file is never touched.
pub fn init_config_dir(config_path: &Path) -> Result<bool> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
        return Ok(false);
    }
    let default_config =
        serde_json::to_string_pretty(&Config::default()).context("serializing default config")?;
    std::fs::write(config_path, default_config + "\n")
        .with_context(|| format!("writing default config to {}", config_path.display()))?;
    log::info!("created default config at {}", config_path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::read_config_file;

    #[test]
    fn writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        assert!(init_config_dir(&path).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"ollamaBaseUrl\""));
        assert!(written.contains("\"replyMode\": \"ownerInChannel\""));

        let c = read_config_file(&path).unwrap();
        assert_eq!(c.agent.model, "glm-4.7-flash");

        std::fs::write(&path, r#"{"agent":{"model":"mine"}}"#).unwrap();
        assert!(!init_config_dir(&path).unwrap());
        assert_eq!(read_config_file(&path).unwrap().agent.model, "mine");
    }
}
