//! Pipeline and enhancer configuration.
//!
//! `PipelineConfig` can be loaded from a TOML file; every field falls back to
//! its default when absent. `EnhancerConfig` is read from the environment.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_WEAK_THRESHOLD: f64 = 60.0;
pub const DEFAULT_FOCUS_AREA: &str = "Concept Revision + Practice";

/// Tunables for the forest used by the risk classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            seed: 42,
        }
    }
}

/// Configuration for the analytics pipeline.
///
/// ```
/// use student_success::PipelineConfig;
///
/// let config = PipelineConfig::from_toml_str("weak_threshold = 55.0").unwrap();
/// assert_eq!(config.weak_threshold, 55.0);
/// assert_eq!(config.forest.n_trees, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Average score (percent) below which a subject counts as weak
    pub weak_threshold: f64,
    /// Label attached to every study plan entry
    pub focus_area: String,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weak_threshold: DEFAULT_WEAK_THRESHOLD,
            focus_area: DEFAULT_FOCUS_AREA.to_string(),
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| AnalyticsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.weak_threshold > 0.0 && self.weak_threshold <= 100.0) {
            return Err(AnalyticsError::Config(format!(
                "weak_threshold must be in (0, 100], got {}",
                self.weak_threshold
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(AnalyticsError::Config("forest.n_trees must be positive".into()));
        }
        if self.forest.max_depth == 0 {
            return Err(AnalyticsError::Config("forest.max_depth must be positive".into()));
        }
        Ok(())
    }
}

/// Connection settings for the generative-text enhancer.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancerConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "deepseek-r1:8b".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl EnhancerConfig {
    /// Reads `OLLAMA_URL`, `OLLAMA_MODEL` and `OLLAMA_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("OLLAMA_URL").unwrap_or(defaults.url),
            model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("OLLAMA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Settings for the Hugging Face inference backend.
#[derive(Debug, Clone)]
pub struct HfConfig {
    pub url: String,
    pub api_key: String,
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl HfConfig {
    pub const DEFAULT_URL: &'static str =
        "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct";

    /// Reads `HF_API_KEY` (required) and `HF_API_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = var("HF_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AnalyticsError::Config("HF_API_KEY not set".to_string()))?;
        Ok(Self {
            url: var("HF_API_URL").unwrap_or_else(|| Self::DEFAULT_URL.to_string()),
            api_key,
            max_new_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        })
    }
}
