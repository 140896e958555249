//! Quality-gated generation loop.
//!
//! Implements the build → generate → parse → gate cycle:
//!
//! ```text
//! Building ─> AwaitingGeneration ─> Parsing ─> Gating ─┬─> Accepted
//!                    ^                                 │
//!                    └──────────── Retrying <──────────┴─> Exhausted
//! ```
//!
//! Backend failures never escape the loop: they count as a rejected
//! attempt with empty text. The caller only ever sees an accepted result,
//! invalid input, cancellation or exhaustion.

use std::time::{Duration, Instant};

use sw_core::{
    evaluate, parse, BackendError, CancellationToken, GenerationBackend, InstructionStructure,
    InvalidInputError, QualityVerdict, Question,
};
use tracing::{debug, info, info_span, warn};

use crate::config::GeneratorConfig;
use crate::prompt::PromptBuilder;

/// Receives a notification after every attempt.
///
/// Purely informational; the loop behaves the same with or without one.
pub trait AttemptObserver {
    /// Called once per attempt, after gating.
    fn on_attempt(&mut self, attempt: u32, verdict: &QualityVerdict);
}

impl<F> AttemptObserver for F
where
    F: FnMut(u32, &QualityVerdict),
{
    fn on_attempt(&mut self, attempt: u32, verdict: &QualityVerdict) {
        self(attempt, verdict)
    }
}

/// Most recent attempts kept in [`GenerationResult::attempt_history`].
///
/// Unbounded runs may retry indefinitely; older records are dropped.
pub const ATTEMPT_HISTORY_MAX: usize = 256;

/// Per-attempt metadata. Generated text is not retained.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Attempt number (1-indexed)
    pub attempt: u32,
    /// Gate verdict
    pub verdict: QualityVerdict,
    /// Total substeps found
    pub substeps_total: u32,
    /// Backend failure absorbed by this attempt
    pub backend_error: Option<BackendError>,
    /// Duration of this attempt
    pub duration: Duration,
}

/// A gated completion, with its text.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Attempt that produced it (1-indexed)
    pub attempt: u32,
    /// Generated text (empty if the backend failed)
    pub text: String,
    /// Parsed structure
    pub structure: InstructionStructure,
    /// Gate verdict
    pub verdict: QualityVerdict,
}

impl Candidate {
    /// Ordering key for best-so-far tracking.
    fn rank(&self) -> (u32, u32, u32) {
        (
            self.verdict.qualified_steps_count,
            self.verdict.steps_count,
            self.structure.substeps_total(),
        )
    }
}

/// Append `record`, dropping the oldest entry once the history is full.
fn push_history(attempt_history: &mut Vec<AttemptRecord>, record: AttemptRecord) {
    if attempt_history.len() >= ATTEMPT_HISTORY_MAX {
        attempt_history.remove(0);
    }
    attempt_history.push(record);
    debug_assert!(attempt_history.len() <= ATTEMPT_HISTORY_MAX);
}

/// Outcome of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Instruction text from the deciding attempt
    pub text: String,
    /// Its parsed structure
    pub structure: InstructionStructure,
    /// Its verdict
    pub verdict: QualityVerdict,
    /// Attempts made, including the deciding one
    pub attempts: u32,
    /// Total duration
    pub duration: Duration,
    /// The last [`ATTEMPT_HISTORY_MAX`] attempts, oldest first
    pub attempt_history: Vec<AttemptRecord>,
}

impl GenerationResult {
    fn from_candidate(candidate: Candidate, attempt_history: Vec<AttemptRecord>, duration: Duration) -> Self {
        debug_assert_eq!(
            attempt_history.last().map(|r| r.attempt),
            Some(candidate.attempt)
        );
        Self {
            text: candidate.text,
            structure: candidate.structure,
            verdict: candidate.verdict,
            attempts: candidate.attempt,
            duration,
            attempt_history,
        }
    }

    /// Format as a summary string.
    pub fn format_summary(&self) -> String {
        let status = if self.verdict.accepted {
            "ACCEPTED"
        } else {
            "REJECTED"
        };
        let mut summary = format!(
            "[{}] Instruction generated in {:.2}s after {} attempt(s)\n",
            status,
            self.duration.as_secs_f64(),
            self.attempts,
        );

        summary.push_str(&format!("  Number of steps: {}\n", self.structure.steps_count()));
        summary.push_str(&format!(
            "  Number of steps with substeps: {}\n",
            self.verdict.qualified_steps_count
        ));
        summary.push_str(&format!(
            "  Number of total substeps: {}\n",
            self.structure.substeps_total()
        ));

        let failures: Vec<&AttemptRecord> = self
            .attempt_history
            .iter()
            .filter(|r| r.backend_error.is_some())
            .collect();
        if !failures.is_empty() {
            summary.push_str(&format!("  Backend failures: {}\n", failures.len()));
            for record in failures {
                if let Some(ref error) = record.backend_error {
                    summary.push_str(&format!("    #{}: {}\n", record.attempt, error));
                }
            }
        }

        summary
    }
}

/// Generator errors.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("Generation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("No acceptable instruction after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        /// Result of the final attempt, with the recent history
        last: Box<GenerationResult>,
        /// Highest-ranked attempt seen
        best: Box<Candidate>,
    },
}

/// Instruction generator with structural quality gating.
///
/// Holds no per-run state: every call to [`generate_with`] owns its own
/// attempt counter, prompt and history, so one generator may serve many
/// questions.
///
/// [`generate_with`]: InstructionGenerator::generate_with
pub struct InstructionGenerator<B> {
    backend: B,
    config: GeneratorConfig,
}

impl<B: GenerationBackend> InstructionGenerator<B> {
    /// Create a new generator with the given backend and config.
    pub fn new(backend: B, config: GeneratorConfig) -> Self {
        debug_assert!(config.attempts_max != Some(0), "attempts_max must be positive");
        Self { backend, config }
    }

    /// The backend in use.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The config in use.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate an instruction for `question`.
    pub fn generate(&self, question: &str) -> Result<GenerationResult, GeneratorError> {
        self.generate_with(question, &CancellationToken::new(), None)
    }

    /// Generate with cancellation and an optional progress observer.
    ///
    /// Cancellation is checked before each attempt; a backend call already
    /// running is not interrupted.
    pub fn generate_with(
        &self,
        question: &str,
        cancel: &CancellationToken,
        mut observer: Option<&mut dyn AttemptObserver>,
    ) -> Result<GenerationResult, GeneratorError> {
        let question = Question::new(question)?;

        let span = info_span!("generate", backend = %self.backend.name());
        let _guard = span.enter();

        let start = Instant::now();
        let config = &self.config;
        let mut prompt = PromptBuilder::build(&question, &config.prompt);
        debug!(prompt_len = prompt.len(), policy = %config.policy.describe(), "prompt built");

        let mut attempt_history: Vec<AttemptRecord> = Vec::new();
        let mut best: Option<Candidate> = None;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(attempts = attempt, "generation cancelled");
                return Err(GeneratorError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            let attempt_start = Instant::now();

            let (text, backend_error) = match self.backend.generate(&prompt, &config.options) {
                Ok(text) => (text, None),
                Err(error) => {
                    warn!(attempt, error = %error, "backend call failed; counting as rejected");
                    (String::new(), Some(error))
                }
            };

            let structure = parse(&text);
            let verdict = evaluate(&structure, &config.policy);
            debug_assert_eq!(verdict.steps_count, structure.steps_count());

            if let Some(observer) = observer.as_deref_mut() {
                observer.on_attempt(attempt, &verdict);
            }

            info!(
                attempt,
                steps = verdict.steps_count,
                qualified = verdict.qualified_steps_count,
                reason = ?verdict.reason,
                "attempt evaluated"
            );

            push_history(
                &mut attempt_history,
                AttemptRecord {
                    attempt,
                    verdict,
                    substeps_total: structure.substeps_total(),
                    backend_error,
                    duration: attempt_start.elapsed(),
                },
            );
            let candidate = Candidate {
                attempt,
                text,
                structure,
                verdict,
            };

            if verdict.accepted {
                return Ok(GenerationResult::from_candidate(
                    candidate,
                    attempt_history,
                    start.elapsed(),
                ));
            }

            if best.as_ref().map_or(true, |b| candidate.rank() > b.rank()) {
                best = Some(candidate.clone());
            }

            if config.attempts_max.is_some_and(|max| attempt >= max) {
                warn!(attempts = attempt, "attempt limit reached");
                let best = Box::new(best.unwrap_or_else(|| candidate.clone()));
                let last = GenerationResult::from_candidate(candidate, attempt_history, start.elapsed());
                return Err(GeneratorError::Exhausted {
                    attempts: attempt,
                    last: Box::new(last),
                    best,
                });
            }

            if config.vary_prompt_per_attempt {
                prompt = PromptBuilder::build_retry(&question, &config.prompt, &config.policy, &verdict);
            }
        }
    }
}

/// One-shot convenience: run the loop for `question` against `backend`.
pub fn run<B: GenerationBackend>(
    question: &str,
    config: &GeneratorConfig,
    backend: &B,
    cancel: &CancellationToken,
) -> Result<GenerationResult, GeneratorError> {
    InstructionGenerator::new(backend, config.clone()).generate_with(question, cancel, None)
}
