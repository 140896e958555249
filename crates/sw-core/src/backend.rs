//! Text-generation backend capability.
//!
//! Backends are blocking: one call, one completion. Timeouts are the
//! backend's responsibility, not the caller's.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sampling options passed to every backend call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub output_length_max: u32,
    /// Number of sequences requested
    pub samples_count: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            output_length_max: 1000,
            samples_count: 1,
        }
    }
}

/// Transient backend failure.
///
/// The generation loop counts these as rejected attempts; they never
/// reach the caller directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backend timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl BackendError {
    /// Convenience constructor for [`BackendError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BackendError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// A synchronous text generator.
pub trait GenerationBackend {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Produce one completion for `prompt`.
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError>;
}

impl<B: GenerationBackend + ?Sized> GenerationBackend for &B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        (**self).generate(prompt, options)
    }
}

impl<B: GenerationBackend + ?Sized> GenerationBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        (**self).generate(prompt, options)
    }
}
