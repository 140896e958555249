//! Concrete generation backends.
//!
//! Both variants implement [`sw_core::GenerationBackend`], so the
//! generation loop is written once against the trait:
//!
//! | Backend | Reaches the model through |
//! |---------|---------------------------|
//! | [`OllamaBackend`] | HTTP, `POST /api/generate` |
//! | [`LocalModelBackend`] | an [`InferenceRuntime`] in this process |
//!
//! Each backend acquires its client/runtime once at construction and
//! reuses it for every attempt.

pub mod local;
pub mod ollama;

pub use local::{CommandRuntime, InferenceRuntime, LocalModelBackend};
pub use ollama::{OllamaBackend, OllamaConfig};

use sw_core::GenerationOptions;
use tracing::warn;

/// Warn once per call when more than one sample is requested.
///
/// Neither backend can return several sequences through the single-text
/// contract, so extra samples are dropped.
pub(crate) fn warn_on_multiple_samples(backend: &str, options: &GenerationOptions) {
    if options.samples_count > 1 {
        warn!(
            backend,
            samples = options.samples_count,
            "multiple samples requested; generating one"
        );
    }
}
