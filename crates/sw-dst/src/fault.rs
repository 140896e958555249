//! Deterministic backend fault injection.
//!
//! Simulates the ways a generation backend lets the loop down:
//! - Unreachable service
//! - Timed-out request
//! - Empty completion
//! - Garbled completion (no recognizable numbering)

use crate::random::DeterministicRng;

/// A single injected backend fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFault {
    /// Call fails with `BackendError::Unavailable`
    Unavailable,
    /// Call fails with `BackendError::Timeout`
    Timeout,
    /// Call succeeds with an empty string
    Empty,
    /// Call succeeds with unnumbered noise
    Garbled,
}

/// Configuration for fault injection.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability of an unavailable backend (0.0 to 1.0)
    pub unavailable_probability: f64,
    /// Probability of a timeout
    pub timeout_probability: f64,
    /// Probability of an empty completion
    pub empty_probability: f64,
    /// Probability of a garbled completion
    pub garbled_probability: f64,
    /// Whether fault injection is enabled
    pub enabled: bool,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            unavailable_probability: 0.02,
            timeout_probability: 0.02,
            empty_probability: 0.01,
            garbled_probability: 0.05,
            enabled: true,
        }
    }
}

impl FaultConfig {
    /// No faults - useful for baseline testing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            unavailable_probability: 0.0,
            timeout_probability: 0.0,
            empty_probability: 0.0,
            garbled_probability: 0.0,
            enabled: false,
        }
    }

    /// A backend that misbehaves on roughly a third of calls.
    #[must_use]
    pub fn flaky() -> Self {
        Self {
            unavailable_probability: 0.1,
            timeout_probability: 0.1,
            empty_probability: 0.05,
            garbled_probability: 0.1,
            enabled: true,
        }
    }

    /// Every call fails as unavailable.
    #[must_use]
    pub fn always_unavailable() -> Self {
        Self {
            unavailable_probability: 1.0,
            ..Self::none()
        }
        .with_enabled()
    }

    fn with_enabled(mut self) -> Self {
        self.enabled = true;
        self
    }
}

/// Deterministic fault injector.
///
/// The same seed produces the same fault sequence.
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    /// Create a new fault injector with the given RNG and config.
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        for p in [
            config.unavailable_probability,
            config.timeout_probability,
            config.empty_probability,
            config.garbled_probability,
        ] {
            debug_assert!((0.0..=1.0).contains(&p), "Probability must be in [0.0, 1.0]");
        }

        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Decide the fault (if any) for the next backend call.
    ///
    /// Faults are checked in a fixed order so the draw count per call is
    /// constant for a given config.
    pub fn next_fault(&mut self) -> Option<BackendFault> {
        if !self.config.enabled {
            return None;
        }

        let candidates = [
            (BackendFault::Unavailable, self.config.unavailable_probability),
            (BackendFault::Timeout, self.config.timeout_probability),
            (BackendFault::Empty, self.config.empty_probability),
            (BackendFault::Garbled, self.config.garbled_probability),
        ];

        let mut chosen = None;
        for (fault, probability) in candidates {
            let hit = self.rng.chance(probability);
            if hit && chosen.is_none() {
                chosen = Some(fault);
            }
        }

        if let Some(fault) = chosen {
            self.stats.record(fault);
        }
        chosen
    }

    /// Get statistics about injected faults.
    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    /// Get current config.
    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }
}

/// Statistics about injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Unavailable faults injected
    pub unavailable_count: u64,
    /// Timeouts injected
    pub timeouts_count: u64,
    /// Empty completions injected
    pub empties_count: u64,
    /// Garbled completions injected
    pub garbled_count: u64,
}

impl FaultStats {
    fn record(&mut self, fault: BackendFault) {
        match fault {
            BackendFault::Unavailable => self.unavailable_count += 1,
            BackendFault::Timeout => self.timeouts_count += 1,
            BackendFault::Empty => self.empties_count += 1,
            BackendFault::Garbled => self.garbled_count += 1,
        }
    }

    /// Total faults of any kind.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.unavailable_count + self.timeouts_count + self.empties_count + self.garbled_count
    }
}
