//! Simulated generation backends.
//!
//! - [`ScriptedBackend`] replays a fixed list of responses, for exact
//!   end-to-end scenarios.
//! - [`SimBackend`] synthesizes random instructions and injects faults from
//!   a seed, for reproducible stress runs.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use sw_core::{BackendError, GenerationBackend, GenerationOptions};

use crate::fault::{BackendFault, FaultConfig, FaultInjector, FaultStats};
use crate::random::DeterministicRng;
use crate::synth::{random_structure, render_garbled, render_instruction, MarkerGrammar};

/// Backend that replays scripted responses in order.
///
/// Once the script runs out the last response is repeated; an empty
/// script reports the backend as unavailable.
pub struct ScriptedBackend {
    responses: Vec<Result<String, BackendError>>,
    next_index: Cell<usize>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedBackend {
    /// Script of successful completions.
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self::from_results(responses.into_iter().map(|s| Ok(s.into())))
    }

    /// Script mixing completions and failures.
    pub fn from_results(responses: impl IntoIterator<Item = Result<String, BackendError>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            next_index: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls_count(&self) -> usize {
        self.prompts.borrow().len()
    }

    /// Prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String, BackendError> {
        self.prompts.borrow_mut().push(prompt.to_string());

        let index = self.next_index.get();
        if index + 1 < self.responses.len() {
            self.next_index.set(index + 1);
        }

        match self.responses.get(index) {
            Some(response) => response.clone(),
            None => Err(BackendError::unavailable("script is empty")),
        }
    }
}

/// Shape of synthesized completions.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Step numbering grammar
    pub grammar: MarkerGrammar,
    /// Upper bound on steps per completion
    pub steps_max: u32,
    /// Upper bound on substeps per step
    pub substeps_max: u32,
    /// Duration reported by simulated timeouts
    pub timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grammar: MarkerGrammar::Mixed,
            steps_max: 6,
            substeps_max: 4,
            timeout: Duration::from_secs(120),
        }
    }
}

struct SimState {
    text_rng: DeterministicRng,
    faults: FaultInjector,
    calls_count: u64,
}

/// Seeded backend producing random instructions and faults.
pub struct SimBackend {
    seed: u64,
    config: SimConfig,
    state: RefCell<SimState>,
}

impl SimBackend {
    /// Create a simulated backend.
    ///
    /// Text synthesis and fault injection draw from separate forks of the
    /// seed.
    pub fn new(seed: u64, config: SimConfig, fault_config: FaultConfig) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero");
        debug_assert!(config.steps_max > 0, "Must allow at least one step");

        let mut master = DeterministicRng::new(seed);
        let text_rng = master.fork();
        let fault_rng = master.fork();

        Self {
            seed,
            config,
            state: RefCell::new(SimState {
                text_rng,
                faults: FaultInjector::new(fault_rng, fault_config),
                calls_count: 0,
            }),
        }
    }

    /// Seed this backend was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls_count(&self) -> u64 {
        self.state.borrow().calls_count
    }

    /// Faults injected so far.
    #[must_use]
    pub fn fault_stats(&self) -> FaultStats {
        self.state.borrow().faults.stats()
    }
}

impl GenerationBackend for SimBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String, BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls_count += 1;

        match state.faults.next_fault() {
            Some(BackendFault::Unavailable) => {
                Err(BackendError::unavailable("simulated connection refused"))
            }
            Some(BackendFault::Timeout) => Err(BackendError::Timeout {
                timeout: self.config.timeout,
            }),
            Some(BackendFault::Empty) => Ok(String::new()),
            Some(BackendFault::Garbled) => Ok(render_garbled(&mut state.text_rng)),
            None => {
                let shape =
                    random_structure(&mut state.text_rng, self.config.steps_max, self.config.substeps_max);
                Ok(render_instruction(&mut state.text_rng, &shape, self.config.grammar))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_then_repeats_last() {
        let backend = ScriptedBackend::new(["first", "second"]);
        let options = GenerationOptions::default();

        assert_eq!(backend.generate("p1", &options).unwrap(), "first");
        assert_eq!(backend.generate("p2", &options).unwrap(), "second");
        assert_eq!(backend.generate("p3", &options).unwrap(), "second");
        assert_eq!(backend.calls_count(), 3);
        assert_eq!(backend.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_empty_script_is_unavailable() {
        let backend = ScriptedBackend::new(Vec::<String>::new());
        let result = backend.generate("p", &GenerationOptions::default());
        assert!(matches!(result, Err(BackendError::Unavailable { .. })));
    }

    #[test]
    fn test_sim_backend_is_reproducible() {
        let options = GenerationOptions::default();
        let run = |seed| {
            let backend = SimBackend::new(seed, SimConfig::default(), FaultConfig::flaky());
            (0..50)
                .map(|_| backend.generate("q", &options))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(2024), run(2024));
    }

    #[test]
    fn test_sim_backend_reports_faults() {
        let backend = SimBackend::new(3, SimConfig::default(), FaultConfig::always_unavailable());
        let options = GenerationOptions::default();

        for _ in 0..5 {
            assert!(backend.generate("q", &options).is_err());
        }
        assert_eq!(backend.calls_count(), 5);
        assert_eq!(backend.fault_stats().unavailable_count, 5);
    }
}
