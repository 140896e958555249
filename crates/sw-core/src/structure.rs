//! Structural parsing of generated instructions.
//!
//! # Grammar
//!
//! Each trimmed, non-empty line is classified on its own:
//!
//! | Line starts with | Kind | Example |
//! |------------------|------|---------|
//! | `Step` (case-sensitive) | [`LineKind::Step`] | `Step 2: Preheat` |
//! | digits then `)` | [`LineKind::Step`] | `2) Preheat` |
//! | digits then `.` not followed by a digit | [`LineKind::Step`] | `2. Preheat` |
//! | digits then `.` then a digit | [`LineKind::Substep`] | `2.1. Grease the pan` |
//! | anything else | [`LineKind::None`] | `Enjoy!` |
//!
//! Substeps seen before the first step have nowhere to go and are dropped.

use serde::{Deserialize, Serialize};

/// Literal prefix for word-numbered steps.
const STEP_WORD: &str = "Step";

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Not a numbered line
    None,
    /// Top-level step marker
    Step,
    /// Sub-numbered item (`N.M`)
    Substep,
}

/// Classify one line of generated text.
///
/// Works on the trimmed line through iterators only, so short or
/// truncated lines can never cause out-of-range access.
#[must_use]
pub fn classify_line(line: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::None;
    }

    if line.starts_with(STEP_WORD) {
        return LineKind::Step;
    }

    let digits_len = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return LineKind::None;
    }

    // ASCII digits are single bytes, so `digits_len` is a char boundary.
    let mut rest = line[digits_len..].chars();
    match (rest.next(), rest.next()) {
        (Some('.'), Some(next)) if next.is_ascii_digit() => LineKind::Substep,
        (Some('.'), _) | (Some(')'), _) => LineKind::Step,
        _ => LineKind::None,
    }
}

/// Step/substep shape of a generated instruction.
///
/// `substeps_counts[i]` is the number of substeps under the `i`-th step,
/// in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionStructure {
    /// Number of substeps per step
    pub substeps_counts: Vec<u32>,
}

impl InstructionStructure {
    /// Build from explicit per-step substep counts.
    #[must_use]
    pub fn from_substeps(substeps_counts: Vec<u32>) -> Self {
        Self { substeps_counts }
    }

    /// Number of top-level steps.
    #[must_use]
    pub fn steps_count(&self) -> u32 {
        u32::try_from(self.substeps_counts.len()).unwrap_or(u32::MAX)
    }

    /// Whether no step was recognized at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.substeps_counts.is_empty()
    }

    /// Total substeps across all steps.
    #[must_use]
    pub fn substeps_total(&self) -> u32 {
        self.substeps_counts.iter().sum()
    }

    /// Number of steps carrying at least `substeps_min` substeps.
    #[must_use]
    pub fn qualified_steps_count(&self, substeps_min: u32) -> u32 {
        let count = self
            .substeps_counts
            .iter()
            .filter(|&&substeps| substeps >= substeps_min)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Parse generated text into its step structure.
///
/// Never fails: unrecognized lines are skipped and empty or garbage input
/// yields an empty structure.
#[must_use]
pub fn parse(text: &str) -> InstructionStructure {
    let mut substeps_counts: Vec<u32> = Vec::new();

    for line in text.lines() {
        match classify_line(line) {
            LineKind::Step => substeps_counts.push(0),
            LineKind::Substep => {
                if let Some(current) = substeps_counts.last_mut() {
                    *current = current.saturating_add(1);
                }
            }
            LineKind::None => {}
        }
    }

    let structure = InstructionStructure { substeps_counts };
    debug_assert_eq!(structure.steps_count() as usize, structure.substeps_counts.len());
    structure
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_word_steps() {
        assert_eq!(classify_line("Step 1"), LineKind::Step);
        assert_eq!(classify_line("  Step 12: Do the thing"), LineKind::Step);
        assert_eq!(classify_line("step 1"), LineKind::None);
        assert_eq!(classify_line("Ste"), LineKind::None);
    }

    #[test]
    fn test_classify_digit_steps() {
        assert_eq!(classify_line("1."), LineKind::Step);
        assert_eq!(classify_line("1)"), LineKind::Step);
        assert_eq!(classify_line("10. Wrap up"), LineKind::Step);
        assert_eq!(classify_line("3) Rinse"), LineKind::Step);
        assert_eq!(classify_line("1. 2 cups of flour"), LineKind::Step);
    }

    #[test]
    fn test_classify_substeps() {
        assert_eq!(classify_line("1.1"), LineKind::Substep);
        assert_eq!(classify_line("\t1.2. Whisk"), LineKind::Substep);
        assert_eq!(classify_line("12.3) Stir"), LineKind::Substep);
    }

    #[test]
    fn test_classify_short_and_unnumbered_lines() {
        assert_eq!(classify_line(""), LineKind::None);
        assert_eq!(classify_line("1"), LineKind::None);
        assert_eq!(classify_line("7"), LineKind::None);
        assert_eq!(classify_line("-"), LineKind::None);
        assert_eq!(classify_line("12abc"), LineKind::None);
        assert_eq!(classify_line("Enjoy your meal!"), LineKind::None);
        assert_eq!(classify_line("- 1. bullet"), LineKind::None);
        assert_eq!(classify_line("١. arabic digit"), LineKind::None);
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse(""), InstructionStructure::default());
        let blank = parse("   \n  \n");
        assert_eq!(blank.steps_count(), 0);
        assert!(blank.substeps_counts.is_empty());
    }

    #[test]
    fn test_parse_substep_before_first_step_is_dropped() {
        let structure = parse("1.1 foo\nStep 1\n1.1 bar");
        assert_eq!(structure.steps_count(), 1);
        assert_eq!(structure.substeps_counts, vec![1]);
    }

    #[test]
    fn test_parse_word_grammar() {
        let text = "Step 1\n\t1.1.\n\t1.2.\nStep 2\n\t2.1.\nStep 3";
        let structure = parse(text);
        assert_eq!(structure.steps_count(), 3);
        assert_eq!(structure.substeps_counts, vec![2, 1, 0]);
        assert_eq!(structure.substeps_total(), 3);
    }

    #[test]
    fn test_parse_digit_grammar() {
        let text = "Here is how:\n\n1. Gather tools\n1.1. Hammer\n1.2. Nails\n2) Build\n2.1 Frame\n\nDone.";
        let structure = parse(text);
        assert_eq!(structure.substeps_counts, vec![2, 1]);
    }

    #[test]
    fn test_parse_mixed_grammars() {
        let text = "Step 1\n1.1\n2. Second\n2.1\n2.2\n3) Third\nStep 4\n4.1";
        let structure = parse(text);
        assert_eq!(structure.substeps_counts, vec![1, 2, 0, 1]);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "Step 1\n1.1\n1.2\nStep 2\n2.1\nStep 3\n3.1\n3.2";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn test_qualified_steps_count() {
        let structure = InstructionStructure::from_substeps(vec![2, 2, 1, 0]);
        assert_eq!(structure.steps_count(), 4);
        assert_eq!(structure.qualified_steps_count(2), 2);
        assert_eq!(structure.qualified_steps_count(1), 3);
        assert_eq!(structure.qualified_steps_count(0), 4);
        assert_eq!(InstructionStructure::default().qualified_steps_count(1), 0);
    }
}
