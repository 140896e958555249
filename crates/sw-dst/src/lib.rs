//! # sw-dst
//!
//! Deterministic simulation for the generation loop.
//!
//! Real backends are slow, stochastic and occasionally down. This crate
//! replaces them with seeded stand-ins so loop behavior (retries, fault
//! absorption, exhaustion) is reproducible from a single `u64`.
//!
//! ## Usage
//!
//! ```rust
//! use sw_core::{GenerationBackend, GenerationOptions};
//! use sw_dst::{FaultConfig, SimBackend, SimConfig};
//!
//! let backend = SimBackend::new(42, SimConfig::default(), FaultConfig::flaky());
//! let options = GenerationOptions::default();
//!
//! // Same seed, same sequence of completions and faults
//! let _ = backend.generate("How do I tie a tie?", &options);
//! assert_eq!(backend.calls_count(), 1);
//! ```
//!
//! ## Reproducibility
//!
//! To reproduce a failing test:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod backend;
pub mod fault;
pub mod random;
pub mod synth;

pub use backend::{ScriptedBackend, SimBackend, SimConfig};
pub use fault::{BackendFault, FaultConfig, FaultInjector, FaultStats};
pub use random::DeterministicRng;
pub use synth::{random_structure, render_garbled, render_instruction, MarkerGrammar};

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    let from_env = std::env::var("DST_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&seed| seed != 0);

    match from_env {
        Some(seed) => {
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        None => {
            let seed = rand::random::<u64>().max(1);
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}
