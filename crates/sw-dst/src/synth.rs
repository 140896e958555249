//! Synthetic instruction text.
//!
//! Renders a known step/substep shape into text the way a language model
//! might: a preamble, numbered lines, prose in between. Parsing the output
//! must recover exactly the shape it was rendered from.

use sw_core::InstructionStructure;

use crate::random::DeterministicRng;

/// Numbering grammar used when rendering steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerGrammar {
    /// `Step 1`
    Word,
    /// `1.`
    Dot,
    /// `1)`
    Paren,
    /// Picks one of the above per step
    Mixed,
}

const PREAMBLE_LINES: &[&str] = &[
    "Here is a detailed instruction:",
    "Sure! Follow these steps carefully.",
    "Below is a step-by-step guide.",
];

const PROSE_LINES: &[&str] = &[
    "Make sure you have everything ready before you begin.",
    "Take your time with this part.",
    "- double-check the result",
    "Note: this may vary depending on your setup.",
    "(optional) ask someone for help",
];

const SUBSTEP_BODIES: &[&str] = &[
    "Prepare the workspace",
    "Check the requirements",
    "Do it slowly",
    "Verify the outcome",
    "Clean up afterwards",
];

/// Render `structure` as instruction text.
///
/// Prose and preamble lines never start with a digit or `Step`, so they are
/// invisible to the parser.
pub fn render_instruction(
    rng: &mut DeterministicRng,
    structure: &InstructionStructure,
    grammar: MarkerGrammar,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if rng.chance(0.5) {
        lines.extend(rng.pick(PREAMBLE_LINES).map(|s| s.to_string()));
        lines.push(String::new());
    }

    for (index, &substeps) in structure.substeps_counts.iter().enumerate() {
        let number = index + 1;
        let step_grammar = match grammar {
            MarkerGrammar::Mixed => *rng
                .pick(&[MarkerGrammar::Word, MarkerGrammar::Dot, MarkerGrammar::Paren])
                .unwrap_or(&MarkerGrammar::Dot),
            other => other,
        };

        let step_line = match step_grammar {
            MarkerGrammar::Word => format!("Step {}: part {}", number, number),
            MarkerGrammar::Paren => format!("{}) Part {}", number, number),
            MarkerGrammar::Dot | MarkerGrammar::Mixed => format!("{}. Part {}", number, number),
        };
        lines.push(step_line);

        for sub in 1..=substeps {
            let body = rng.pick(SUBSTEP_BODIES).copied().unwrap_or("Continue");
            let indent = if rng.chance(0.5) { "\t" } else { "   " };
            lines.push(format!("{}{}.{}. {}", indent, number, sub, body));
        }

        if rng.chance(0.3) {
            lines.extend(rng.pick(PROSE_LINES).map(|s| s.to_string()));
        }
    }

    lines.join("\n")
}

/// Pick a random shape with up to `steps_max` steps and `substeps_max`
/// substeps per step.
pub fn random_structure(
    rng: &mut DeterministicRng,
    steps_max: u32,
    substeps_max: u32,
) -> InstructionStructure {
    let steps = rng.count_up_to(steps_max);
    let substeps_counts = (0..steps).map(|_| rng.count_up_to(substeps_max)).collect();
    InstructionStructure::from_substeps(substeps_counts)
}

/// Noise with no numbered lines at all.
pub fn render_garbled(rng: &mut DeterministicRng) -> String {
    let lines_count = rng.count_between(1, 4);
    (0..lines_count)
        .filter_map(|_| rng.pick(PROSE_LINES).map(|s| s.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}
