//! Generator configuration.
//!
//! Loaded from JSON, with presets for the common cases:
//!
//! ```json
//! {
//!   "prompt": { "language": "english", "include_substeps": true, "marker_style": "word" },
//!   "policy": { "mode": "strict", "steps_min": 3, "qualified_steps_min": 3,
//!               "substeps_per_qualified_step_min": 2 },
//!   "options": { "temperature": 0.7, "output_length_max": 1000, "samples_count": 1 },
//!   "attempts_max": 5
//! }
//! ```
//!
//! `"attempts_max": null` opts into retrying until the policy is met.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sw_core::{GenerationOptions, QualityPolicy};

use crate::prompt::PromptConfig;

/// Default bound on generation attempts.
pub const DEFAULT_ATTEMPTS_MAX: u32 = 5;

fn default_attempts_max() -> Option<u32> {
    Some(DEFAULT_ATTEMPTS_MAX)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything the generation loop needs besides the question and backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Prompt rendering
    pub prompt: PromptConfig,
    /// Acceptance thresholds
    pub policy: QualityPolicy,
    /// Sampling options passed to the backend
    pub options: GenerationOptions,
    /// Maximum attempts; `None` retries until accepted or cancelled
    #[serde(default = "default_attempts_max")]
    pub attempts_max: Option<u32>,
    /// Re-render the prompt after each rejection with a diagnostic note
    pub vary_prompt_per_attempt: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prompt: PromptConfig::default(),
            policy: QualityPolicy::strict(),
            options: GenerationOptions::default(),
            attempts_max: default_attempts_max(),
            vary_prompt_per_attempt: false,
        }
    }
}

impl GeneratorConfig {
    /// Lenient gating with `1.` numbering and no substeps.
    pub fn lenient() -> Self {
        Self {
            prompt: PromptConfig {
                include_substeps: false,
                marker_style: crate::prompt::StepMarkerStyle::Dot,
                ..Default::default()
            },
            policy: QualityPolicy::lenient(),
            ..Default::default()
        }
    }

    /// Quick config for fast iteration.
    pub fn quick() -> Self {
        Self {
            attempts_max: Some(2),
            options: GenerationOptions {
                output_length_max: 400,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Retry until the policy is met or the caller cancels.
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.attempts_max = None;
        self
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts_max == Some(0) {
            return Err(ConfigError::Invalid(
                "attempts_max must be at least 1 (use null for unbounded)".to_string(),
            ));
        }
        if !self.options.temperature.is_finite() || self.options.temperature < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "temperature must be a non-negative number, got {}",
                self.options.temperature
            )));
        }
        if self.options.output_length_max == 0 {
            return Err(ConfigError::Invalid(
                "output_length_max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
