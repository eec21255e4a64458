//! Configuration management for aiterm.
//!
//! Settings live in `~/.aiterm/config.toml`. Every field has a default, so a
//! partial file only overrides what it names. Environment variables are
//! applied on top of the file, and CLI flags on top of both (see `cli`).

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ai: AiSettings,
}

/// Which backend serves a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

/// Provider selection plus one settings record per provider.
///
/// Only the record matching `provider` is read during a call; the other is
/// kept so switching back does not lose it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub ollama: OllamaSettings,
}

impl AiSettings {
    /// Model name of the active provider.
    pub fn active_model(&self) -> &str {
        match self.provider {
            ProviderKind::Gemini => &self.gemini.model,
            ProviderKind::Ollama => &self.ollama.model,
        }
    }

    /// Override the model of the active provider only.
    pub fn set_active_model(&mut self, model: impl Into<String>) {
        match self.provider {
            ProviderKind::Gemini => self.gemini.model = model.into(),
            ProviderKind::Ollama => self.ollama.model = model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub command_system_instruction: Option<String>,
    pub chat_system_instruction: Option<String>,
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            command_system_instruction: None,
            chat_system_instruction: None,
        }
    }
}

impl GeminiSettings {
    /// The credential from the config file, else from the environment.
    ///
    /// Returns `None` when neither source has a non-empty value; the
    /// provider decides how to react to that.
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub command_system_instruction: Option<String>,
    pub chat_system_instruction: Option<String>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            command_system_instruction: None,
            chat_system_instruction: None,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".aiterm").join("config.toml"))
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `AITERM_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("AITERM_PROVIDER") {
            self.ai.provider = ProviderKind::from_str(&provider, true)
                .map_err(|_| {
                    anyhow!(
                        "Unknown provider: '{}'. Supported: 'gemini', 'ollama'",
                        provider
                    )
                })?;
        }
        if let Some(model) = lookup("AITERM_MODEL") {
            self.ai.set_active_model(model);
        }
        if let Some(url) = lookup("AITERM_OLLAMA_URL") {
            self.ai.ollama.base_url = url;
        }
        Ok(())
    }

    pub fn save_default_to(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert_eq!(config.ai.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.ai.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ai.ollama.model, "llama3");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [ai]
            provider = "ollama"

            [ai.ollama]
            model = "mistral"
            "#,
        )
        .unwrap();
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert_eq!(config.ai.ollama.model, "mistral");
        assert_eq!(config.ai.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ai.gemini.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_save_and_load_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        AppConfig::save_default_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.ai.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.ai.provider, ProviderKind::Gemini);
    }

    #[test]
    fn test_env_overrides_target_active_provider() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AITERM_PROVIDER", "Ollama"),
            ("AITERM_MODEL", "phi3"),
            ("AITERM_OLLAMA_URL", "http://gpu-box:11434"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert_eq!(config.ai.ollama.model, "phi3");
        assert_eq!(config.ai.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.ai.ollama.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_unknown_provider_override_fails() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|name| (name == "AITERM_PROVIDER").then(|| "openai".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_api_key_prefers_config_value() {
        let settings = GeminiSettings {
            api_key: Some("from-config".into()),
            api_key_env: "AITERM_TEST_UNSET_KEY_VAR".into(),
            ..GeminiSettings::default()
        };
        assert_eq!(settings.api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_api_key_absent() {
        let settings = GeminiSettings {
            api_key: Some(String::new()),
            api_key_env: "AITERM_TEST_UNSET_KEY_VAR".into(),
            ..GeminiSettings::default()
        };
        assert_eq!(settings.api_key(), None);
    }
}
