//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::retrieval::ScoringWeights;

/// Chronos configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Only ever populated when a config file illegally carries a key;
    /// `validate` rejects it.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub default_model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Ask the provider for reasoning traces alongside the reply
    pub reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Fraction of a matched entry's score passed to each linked entry
    pub spread_factor: f64,
    /// Entries at or below this activation are dropped after spreading
    pub activation_floor: f64,
    pub max_results: usize,
    /// Replacement corpus (JSON array); the built-in corpus is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Automatic visualization-correction requests allowed per user turn
    pub max_correction_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: "x-ai/grok-4.1-fast".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
            reasoning: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            spread_factor: 0.5,
            activation_floor: 0.5,
            max_results: 10,
            corpus_path: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_correction_attempts: 1,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("CHRONOS_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "***".to_string()
    } else {
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("***{}", suffix)
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.spread_factor) {
            return Err(anyhow!("Spread factor must be between 0.0 and 1.0"));
        }
        if self.activation_floor < 0.0 {
            return Err(anyhow!("Activation floor must be non-negative"));
        }
        if self.max_results == 0 {
            return Err(anyhow!("max_results must be at least 1"));
        }
        self.weights.validate()
    }
}

const KEYS: &[&str] = &[
    "llm.default_model",
    "llm.base_url",
    "llm.temperature",
    "llm.max_tokens",
    "llm.timeout_secs",
    "llm.reasoning",
    "llm.api_key",
    "retrieval.spread_factor",
    "retrieval.activation_floor",
    "retrieval.max_results",
    "retrieval.corpus_path",
    "assistant.max_correction_attempts",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CHRONOS_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("chronos")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        self.retrieval.validate()
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),
            "llm.reasoning" => Ok(self.llm.reasoning.to_string()),

            "retrieval.spread_factor" => Ok(self.retrieval.spread_factor.to_string()),
            "retrieval.activation_floor" => Ok(self.retrieval.activation_floor.to_string()),
            "retrieval.max_results" => Ok(self.retrieval.max_results.to_string()),
            "retrieval.corpus_path" => Ok(self
                .retrieval
                .corpus_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string())),

            "assistant.max_correction_attempts" => {
                Ok(self.assistant.max_correction_attempts.to_string())
            }

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use CHRONOS_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `chronos config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.default_model" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Model name cannot be empty"));
                }
                self.llm.default_model = value.to_string();
            }
            "llm.base_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.llm.base_url = value.trim_end_matches('/').to_string();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "llm.reasoning" => {
                self.llm.reasoning = value
                    .parse()
                    .with_context(|| format!("Invalid reasoning value: {} (use true/false)", value))?;
            }

            "retrieval.spread_factor" => {
                let factor: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid spread_factor value: {}", value))?;
                if !(0.0..=1.0).contains(&factor) {
                    return Err(anyhow!("Spread factor must be between 0.0 and 1.0"));
                }
                self.retrieval.spread_factor = factor;
            }
            "retrieval.activation_floor" => {
                let floor: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid activation_floor value: {}", value))?;
                if floor < 0.0 {
                    return Err(anyhow!("Activation floor must be non-negative"));
                }
                self.retrieval.activation_floor = floor;
            }
            "retrieval.max_results" => {
                let max: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_results value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_results must be at least 1"));
                }
                self.retrieval.max_results = max;
            }
            "retrieval.corpus_path" => {
                self.retrieval.corpus_path = match value.trim() {
                    "" | "builtin" | "(built-in)" => None,
                    path => Some(PathBuf::from(path)),
                };
            }

            "assistant.max_correction_attempts" => {
                self.assistant.max_correction_attempts = value
                    .parse()
                    .with_context(|| format!("Invalid max_correction_attempts value: {}", value))?;
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the CHRONOS_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `chronos config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
