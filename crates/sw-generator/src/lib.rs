//! # sw-generator
//!
//! Step-by-step instruction generation with structural quality gating.
//!
//! ## Approach
//!
//! - **Derive the prompt from the question** plus a small set of format directives
//! - **Let the model write the instruction**; only its shape is checked
//! - **Retry on rejection** until the policy is met or the attempt bound is hit
//! - **Backends are interchangeable** behind [`sw_core::GenerationBackend`]
//!
//! # Usage
//!
//! ```bash
//! # Ask an Ollama server
//! cargo run -p sw-generator -- --question "How do I repot a cactus?"
//!
//! # Lenient gating, Russian answer, local inference program
//! cargo run -p sw-generator -- --policy lenient --language ru \
//!     --backend local --local-cmd llama-cli --local-arg=--temp --local-arg={temperature}
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Question   │ ──> │   Prompt    │ ──> │   Backend   │
//! │             │     │   Builder   │     │ Ollama/Local│
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!                            ^                   │
//!                            │                   ▼
//!                            │            ┌─────────────┐
//!                            │            │  Structure  │
//!                            │            │   Parser    │
//!                            │            └──────┬──────┘
//!                            │                   │
//!                            │                   ▼
//!                     (if rejected)       ┌─────────────┐
//!                            └─────────── │   Quality   │ ──> Accepted
//!                                         │    Gate     │
//!                                         └─────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod generator;
pub mod prompt;

pub use backend::{CommandRuntime, InferenceRuntime, LocalModelBackend, OllamaBackend, OllamaConfig};
pub use config::{ConfigError, GeneratorConfig, DEFAULT_ATTEMPTS_MAX};
pub use generator::{
    run, AttemptObserver, AttemptRecord, Candidate, GenerationResult, GeneratorError,
    InstructionGenerator, ATTEMPT_HISTORY_MAX,
};
pub use prompt::{Language, PromptBuilder, PromptConfig, StepMarkerStyle};
