//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.chat-helper/config.json`) and then
//! overridden by environment variables. The merged value is read once at startup
//! and shared as `Arc<Config>` for the lifetime of the process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Signal REST API connection and the linked (owner) account.
    #[serde(default)]
    pub signal: SignalConfig,

    /// Language-model endpoint and tool-loop settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Who may trigger commands.
    #[serde(default)]
    pub access: AccessConfig,

    /// Tool adapter settings (search key, cooldown).
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Signal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalConfig {
    /// Number of the linked account. Also the owner identity: commands from this number are answered in-channel.
    #[serde(default)]
    pub phone_number: String,

    /// Base URL of the signal-cli REST API (default http://localhost:8080).
    #[serde(default = "default_signal_api_url")]
    pub api_url: String,

    /// Optional bearer token for the REST API.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            phone_number: String::new(),
            api_url: default_signal_api_url(),
            api_token: None,
        }
    }
}

/// Where non-help replies go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyMode {
    /// Owner gets replies in the originating chat; everyone else gets a DM.
    #[default]
    OwnerInChannel,
    /// Every reply is a DM to the sender, owner included.
    AlwaysDirect,
}

impl ReplyMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ownerinchannel" | "owner_in_channel" | "owner-in-channel" => Some(Self::OwnerInChannel),
            "alwaysdirect" | "always_direct" | "always-direct" => Some(Self::AlwaysDirect),
            _ => None,
        }
    }
}

/// Language-model and tool-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Ollama base URL (default http://localhost:11434).
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    /// Model name exactly as shown by `ollama list`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum model round-trips with tools attached before the forced text-only call.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Parse `<tool_call>{..}</tool_call>` blocks from text for models without native tool calling.
    #[serde(default)]
    pub tool_use_fallback: bool,

    /// Upper bound for one model request, in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default)]
    pub reply_mode: ReplyMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: default_ollama_base_url(),
            model: default_model(),
            max_tool_iterations: default_max_tool_iterations(),
            tool_use_fallback: false,
            model_timeout_secs: default_model_timeout_secs(),
            reply_mode: ReplyMode::default(),
        }
    }
}

/// Access control. An empty allow list means everyone may use the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(default)]
    pub allowed_numbers: Vec<String>,
}

/// Tool adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    /// Brave Search subscription token. Overridden by BRAVE_API_KEY.
    #[serde(default)]
    pub brave_api_key: Option<String>,

    /// Pause after each search call, in milliseconds. Values below 1000 are raised to 1000
    /// (Brave free tier allows 1 req/s).
    #[serde(default = "default_search_cooldown_ms")]
    pub search_cooldown_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            search_cooldown_ms: default_search_cooldown_ms(),
        }
    }
}

fn default_signal_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "glm-4.7-flash".to_string()
}

fn default_max_tool_iterations() -> usize {
    5
}

fn default_model_timeout_secs() -> u64 {
    120
}

fn default_search_cooldown_ms() -> u64 {
    1100
}

/// Trimmed, non-empty value or None.
fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(s: &str) -> Vec<String> {
    s.split(',').filter_map(non_empty).collect()
}

impl Config {
    /// Apply environment overrides using the given lookup. Env values win over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).as_deref().and_then(non_empty);

        if let Some(v) = get("SIGNAL_PHONE_NUMBER") {
            self.signal.phone_number = v;
        }
        if let Some(v) = get("SIGNAL_API_URL") {
            self.signal.api_url = v;
        }
        if let Some(v) = get("SIGNAL_API_TOKEN") {
            self.signal.api_token = Some(v);
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.agent.ollama_base_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.agent.model = v;
        }
        if let Some(v) = get("MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations = v
                .parse()
                .with_context(|| format!("MAX_TOOL_ITERATIONS must be a number, got {:?}", v))?;
        }
        if let Some(v) = get("TOOL_USE_FALLBACK") {
            self.agent.tool_use_fallback = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("MODEL_TIMEOUT_SECS") {
            self.agent.model_timeout_secs = v
                .parse()
                .with_context(|| format!("MODEL_TIMEOUT_SECS must be a number, got {:?}", v))?;
        }
        if let Some(v) = get("REPLY_MODE") {
            self.agent.reply_mode = ReplyMode::parse(&v)
                .with_context(|| format!("REPLY_MODE must be ownerInChannel or alwaysDirect, got {:?}", v))?;
        }
        if let Some(v) = lookup("ALLOWED_NUMBERS") {
            self.access.allowed_numbers = parse_list(&v);
        }
        if let Some(v) = get("BRAVE_API_KEY") {
            self.tools.brave_api_key = Some(v);
        }
        Ok(())
    }

    /// Check the merged config is usable.
    pub fn validate(&self) -> Result<()> {
        if self.signal.phone_number.trim().is_empty() {
            anyhow::bail!(
                "signal.phoneNumber is not set (set it in the config file or SIGNAL_PHONE_NUMBER)"
            );
        }
        if self.agent.max_tool_iterations == 0 {
            anyhow::bail!("agent.maxToolIterations must be at least 1");
        }
        if self.agent.model.trim().is_empty() {
            anyhow::bail!("agent.model is empty (set it in the config file or OLLAMA_MODEL)");
        }
        Ok(())
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CHAT_HELPER_CONFIG").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".chat-helper").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Read the config file only. Missing file => default config.
pub fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

/// Load config from the given path (or the default), apply process env overrides and validate.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = read_config_file(&path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.signal.api_url, "http://localhost:8080");
        assert_eq!(c.agent.ollama_base_url, "http://localhost:11434");
        assert_eq!(c.agent.max_tool_iterations, 5);
        assert!(!c.agent.tool_use_fallback);
        assert_eq!(c.agent.reply_mode, ReplyMode::OwnerInChannel);
        assert_eq!(c.tools.search_cooldown_ms, 1100);
        assert!(c.access.allowed_numbers.is_empty());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut c: Config = serde_json::from_str(
            r#"{"signal":{"phoneNumber":"+100"},"agent":{"model":"from-file","maxToolIterations":2}}"#,
        )
        .unwrap();
        c.apply_env(env(&[
            ("OLLAMA_MODEL", "from-env"),
            ("TOOL_USE_FALLBACK", "TRUE"),
            ("ALLOWED_NUMBERS", " +1, ,+2 "),
            ("REPLY_MODE", "alwaysDirect"),
        ]))
        .unwrap();
        assert_eq!(c.signal.phone_number, "+100");
        assert_eq!(c.agent.model, "from-env");
        assert_eq!(c.agent.max_tool_iterations, 2);
        assert!(c.agent.tool_use_fallback);
        assert_eq!(c.access.allowed_numbers, vec!["+1", "+2"]);
        assert_eq!(c.agent.reply_mode, ReplyMode::AlwaysDirect);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut c = Config::default();
        c.apply_env(env(&[("OLLAMA_MODEL", "   "), ("SIGNAL_API_TOKEN", "")]))
            .unwrap();
        assert_eq!(c.agent.model, "glm-4.7-flash");
        assert!(c.signal.api_token.is_none());
    }

    #[test]
    fn bad_iteration_count_is_an_error() {
        let mut c = Config::default();
        assert!(c.apply_env(env(&[("MAX_TOOL_ITERATIONS", "lots")])).is_err());
    }

    #[test]
    fn validate_requires_phone_number_and_iterations() {
        let mut c = Config::default();
        assert!(c.validate().is_err());
        c.signal.phone_number = "+15550001".to_string();
        assert!(c.validate().is_ok());
        c.agent.max_tool_iterations = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn read_config_file_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let c = read_config_file(&path).unwrap();
        assert!(c.signal.phone_number.is_empty());

        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(br#"{"access":{"allowedNumbers":["+1"]},"tools":{"searchCooldownMs":0}}"#)
            .unwrap();
        let c = read_config_file(&path).unwrap();
        assert_eq!(c.access.allowed_numbers, vec!["+1"]);
        assert_eq!(c.tools.search_cooldown_ms, 0);
    }

    #[test]
    fn read_config_file_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_config_file(&path).is_err());
    }
}
