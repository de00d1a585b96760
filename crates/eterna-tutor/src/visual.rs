//! Mermaid diagrams for visual aids.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

/// First fenced `mermaid` block in a model reply.
static MERMAID_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid[ \t]*\r?\n(.*?)```").ok());

/// Shape of a fallback diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    ConceptMap,
    ProcessFlow,
}

/// A canned diagram chosen by a topic substring.
struct Fallback {
    keyword: &'static str,
    shape: Shape,
    items: &'static [&'static str],
}

const FALLBACKS: &[Fallback] = &[
    Fallback {
        keyword: "photosynthesis",
        shape: Shape::ProcessFlow,
        items: &[
            "Light absorbed by chlorophyll",
            "Water split into oxygen",
            "Carbon dioxide fixed",
            "Glucose produced",
        ],
    },
    Fallback {
        keyword: "water cycle",
        shape: Shape::ProcessFlow,
        items: &["Evaporation", "Condensation", "Precipitation", "Collection"],
    },
    Fallback {
        keyword: "digestion",
        shape: Shape::ProcessFlow,
        items: &["Mouth", "Stomach", "Small intestine", "Large intestine"],
    },
    Fallback {
        keyword: "quantum",
        shape: Shape::ConceptMap,
        items: &["Wave-particle duality", "Superposition", "Entanglement"],
    },
    Fallback {
        keyword: "cell",
        shape: Shape::ConceptMap,
        items: &["Nucleus", "Mitochondria", "Cell membrane"],
    },
    Fallback {
        keyword: "gravity",
        shape: Shape::ConceptMap,
        items: &["Mass", "Acceleration", "Orbits"],
    },
];

const DEFAULT_CONCEPTS: &[&str] = &["Definition", "How it works", "Real-world example"];

/// Removes characters that would break a Mermaid node label.
fn label(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '"' | '`'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Renders a `graph TD` concept map with `topic` at the root.
///
/// # Examples
///
/// ```
/// use eterna_tutor::visual::concept_map;
///
/// let diagram = concept_map("Atoms", &["Protons", "Electrons"]);
/// assert_eq!(
///     diagram,
///     "```mermaid\ngraph TD\n    A[Atoms]\n    A --> B1[Protons]\n    A --> B2[Electrons]\n```"
/// );
/// ```
#[must_use]
pub fn concept_map(topic: &str, concepts: &[&str]) -> String {
    let mut out = format!("```mermaid\ngraph TD\n    A[{}]\n", label(topic));
    for (i, concept) in concepts.iter().enumerate() {
        let _ = writeln!(out, "    A --> B{}[{}]", i + 1, label(concept));
    }
    out.push_str("```");
    out
}

/// Renders a `flowchart LR` process from `topic` through `steps` to completion.
#[must_use]
pub fn process_flow(topic: &str, steps: &[&str]) -> String {
    let mut out = format!("```mermaid\nflowchart LR\n    Start([{}])\n", label(topic));
    let mut previous = "Start".to_string();
    for (i, step) in steps.iter().enumerate() {
        let current = format!("Step{}", i + 1);
        let _ = writeln!(out, "    {previous} --> {current}[{}]", label(step));
        previous = current;
    }
    let _ = write!(out, "    {previous} --> End([Complete])\n```");
    out
}

/// Picks a canned diagram for `topic` by substring, or a generic concept map.
#[must_use]
pub fn fallback_diagram(topic: &str) -> String {
    let lowered = topic.to_lowercase();
    match FALLBACKS.iter().find(|f| lowered.contains(f.keyword)) {
        Some(Fallback {
            shape: Shape::ProcessFlow,
            items,
            ..
        }) => process_flow(topic, items),
        Some(Fallback {
            shape: Shape::ConceptMap,
            items,
            ..
        }) => concept_map(topic, items),
        None => concept_map(topic, DEFAULT_CONCEPTS),
    }
}

/// Returns the first fenced `mermaid` block in `text`, re-fenced.
#[must_use]
pub fn extract_mermaid_block(text: &str) -> Option<String> {
    let re = MERMAID_BLOCK.as_ref()?;
    let body = re.captures(text)?.get(1)?.as_str().trim_end();
    if body.trim().is_empty() {
        return None;
    }
    Some(format!("```mermaid\n{body}\n```"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_process_flow_shape() {
        assert_eq!(
            process_flow("Baking", &["Mix", "Bake"]),
            "```mermaid\nflowchart LR\n    Start([Baking])\n    Start --> Step1[Mix]\n    Step1 --> Step2[Bake]\n    Step2 --> End([Complete])\n```"
        );
    }

    #[test]
    fn test_fallback_by_topic_substring() {
        let diagram = fallback_diagram("Explain the Water Cycle");
        assert!(diagram.contains("flowchart LR"));
        assert!(diagram.contains("Step1[Evaporation]"));

        let diagram = fallback_diagram("Explain quantum physics");
        assert!(diagram.contains("graph TD"));
        assert!(diagram.contains("B2[Superposition]"));
    }

    #[test]
    fn test_fallback_default() {
        let diagram = fallback_diagram("Tell me about jazz");
        assert!(diagram.contains("A[Tell me about jazz]"));
        assert!(diagram.contains("B1[Definition]"));
    }

    #[test]
    fn test_labels_are_sanitized() {
        let diagram = concept_map("What is f(x)?", &["[x]"]);
        assert!(diagram.contains("A[What is fx?]"));
        assert!(diagram.contains("B1[x]"));
    }

    #[test]
    fn test_extract_mermaid_block() {
        let reply = "Here you go:\n```mermaid\ngraph TD\n  A-->B\n```\nand another\n```mermaid\ngraph LR\n```";
        assert_eq!(
            extract_mermaid_block(reply).unwrap(),
            "```mermaid\ngraph TD\n  A-->B\n```"
        );
        assert!(extract_mermaid_block("no diagram").is_none());
        assert!(extract_mermaid_block("```mermaid\n\n```").is_none());
    }
}
