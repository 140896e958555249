//! Structural quality gate.
//!
//! A step is *qualified* when it has at least
//! `substeps_per_qualified_step_min` substeps. The policy mode decides
//! whether qualification gates acceptance or is only reported.

use serde::{Deserialize, Serialize};

use crate::structure::InstructionStructure;

/// How a policy uses qualified steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Accept only when enough steps are qualified
    Strict,
    /// Accept on step count alone; qualification is informational
    Lenient,
}

/// Thresholds applied to a parsed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPolicy {
    /// Gating mode
    pub mode: PolicyMode,
    /// Minimum number of top-level steps
    pub steps_min: u32,
    /// Minimum number of qualified steps (strict mode only)
    pub qualified_steps_min: u32,
    /// Substeps a step needs to count as qualified
    pub substeps_per_qualified_step_min: u32,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl QualityPolicy {
    /// At least 3 steps, each of the 3 carrying 2+ substeps.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: PolicyMode::Strict,
            steps_min: 3,
            qualified_steps_min: 3,
            substeps_per_qualified_step_min: 2,
        }
    }

    /// At least 3 steps; substeps are counted but not required.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            mode: PolicyMode::Lenient,
            steps_min: 3,
            qualified_steps_min: 0,
            substeps_per_qualified_step_min: 1,
        }
    }

    /// Override the minimum step count.
    #[must_use]
    pub fn with_steps_min(mut self, steps_min: u32) -> Self {
        self.steps_min = steps_min;
        self
    }

    /// Override the minimum qualified step count.
    #[must_use]
    pub fn with_qualified_steps_min(mut self, qualified_steps_min: u32) -> Self {
        self.qualified_steps_min = qualified_steps_min;
        self
    }

    /// Describe the thresholds in one line.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.mode {
            PolicyMode::Strict => format!(
                "strict: >= {} steps, >= {} of them with >= {} substeps",
                self.steps_min, self.qualified_steps_min, self.substeps_per_qualified_step_min
            ),
            PolicyMode::Lenient => format!("lenient: >= {} steps", self.steps_min),
        }
    }
}

/// Why a structure was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictReason {
    /// Fewer steps than `steps_min`
    TooFewSteps,
    /// Enough steps, but too few of them qualified
    TooFewQualifiedSteps,
    /// All thresholds met
    Accepted,
}

impl VerdictReason {
    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            VerdictReason::TooFewSteps => "too few steps",
            VerdictReason::TooFewQualifiedSteps => "too few steps with enough substeps",
            VerdictReason::Accepted => "accepted",
        }
    }
}

/// Outcome of gating one structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// Whether the structure passed
    pub accepted: bool,
    /// Deciding reason
    pub reason: VerdictReason,
    /// Steps observed
    pub steps_count: u32,
    /// Qualified steps observed
    pub qualified_steps_count: u32,
}

impl QualityVerdict {
    fn new(reason: VerdictReason, steps_count: u32, qualified_steps_count: u32) -> Self {
        debug_assert!(qualified_steps_count <= steps_count);
        Self {
            accepted: reason == VerdictReason::Accepted,
            reason,
            steps_count,
            qualified_steps_count,
        }
    }
}

/// Gate a structure against a policy.
#[must_use]
pub fn evaluate(structure: &InstructionStructure, policy: &QualityPolicy) -> QualityVerdict {
    let steps_count = structure.steps_count();
    if steps_count == 0 {
        return QualityVerdict::new(VerdictReason::TooFewSteps, 0, 0);
    }

    let qualified_steps_count =
        structure.qualified_steps_count(policy.substeps_per_qualified_step_min);

    let reason = if steps_count < policy.steps_min {
        VerdictReason::TooFewSteps
    } else if policy.mode == PolicyMode::Strict
        && qualified_steps_count < policy.qualified_steps_min
    {
        VerdictReason::TooFewQualifiedSteps
    } else {
        VerdictReason::Accepted
    };

    QualityVerdict::new(reason, steps_count, qualified_steps_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_rejects_unqualified_step() {
        let policy = QualityPolicy::strict();
        let structure = InstructionStructure::from_substeps(vec![2, 2, 1]);

        let verdict = evaluate(&structure, &policy);
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, VerdictReason::TooFewQualifiedSteps);
        assert_eq!(verdict.steps_count, 3);
        assert_eq!(verdict.qualified_steps_count, 2);
    }

    #[test]
    fn test_strict_accepts_fully_qualified() {
        let policy = QualityPolicy::strict();
        let structure = InstructionStructure::from_substeps(vec![2, 2, 2]);

        let verdict = evaluate(&structure, &policy);
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, VerdictReason::Accepted);
    }

    #[test]
    fn test_too_few_steps_wins_over_qualification() {
        let policy = QualityPolicy::strict();
        let structure = InstructionStructure::from_substeps(vec![5, 5]);

        let verdict = evaluate(&structure, &policy);
        assert_eq!(verdict.reason, VerdictReason::TooFewSteps);
    }

    #[test]
    fn test_empty_structure_is_too_few_steps() {
        let empty = InstructionStructure::default();
        let permissive = QualityPolicy::lenient().with_steps_min(0);

        for policy in [QualityPolicy::strict(), QualityPolicy::lenient(), permissive] {
            let verdict = evaluate(&empty, &policy);
            assert!(!verdict.accepted);
            assert_eq!(verdict.reason, VerdictReason::TooFewSteps);
            assert_eq!(verdict.qualified_steps_count, 0);
        }
    }

    #[test]
    fn test_lenient_ignores_qualification() {
        let policy = QualityPolicy::lenient();
        let structure = InstructionStructure::from_substeps(vec![0, 0, 1]);

        let verdict = evaluate(&structure, &policy);
        assert!(verdict.accepted);
        assert_eq!(verdict.qualified_steps_count, 1);

        let short = InstructionStructure::from_substeps(vec![3, 3]);
        assert_eq!(evaluate(&short, &policy).reason, VerdictReason::TooFewSteps);
    }

    #[test]
    fn test_policy_serde_shape() {
        let json = serde_json::to_value(QualityPolicy::lenient()).unwrap();
        assert_eq!(json["mode"], "lenient");
        assert_eq!(json["steps_min"], 3);

        let parsed: QualityPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, QualityPolicy::lenient());
    }
}
