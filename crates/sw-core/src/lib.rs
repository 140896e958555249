//! # sw-core
//!
//! Core types for quality-gated instruction generation.
//!
//! Everything in this crate is pure and synchronous: no I/O, no global state.
//! The generation loop in `sw-generator` composes these pieces with a
//! [`GenerationBackend`].
//!
//! ## Pipeline
//!
//! | Stage | Item | Output |
//! |-------|------|--------|
//! | Input | [`Question`] | validated, trimmed question |
//! | Parse | [`parse`] | [`InstructionStructure`] (steps + substeps per step) |
//! | Gate | [`evaluate`] | [`QualityVerdict`] |
//!
//! Parsing never fails: text that cannot be classified degrades to
//! zero steps, and the gate turns that into [`VerdictReason::TooFewSteps`].

pub mod backend;
pub mod cancel;
pub mod quality;
pub mod question;
pub mod structure;

pub use backend::{BackendError, GenerationBackend, GenerationOptions};
pub use cancel::CancellationToken;
pub use quality::{evaluate, PolicyMode, QualityPolicy, QualityVerdict, VerdictReason};
pub use question::{InvalidInputError, Question};
pub use structure::{classify_line, parse, InstructionStructure, LineKind};
