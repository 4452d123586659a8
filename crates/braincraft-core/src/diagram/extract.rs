//! Fenced block locator for diagram code embedded in assistant replies.
//!
//! Grammar:
//!
//! ```text
//! block := "```" lang? ws* NEWLINE body NEWLINE ws* "```"
//! lang  := [A-Za-z0-9_-]+
//! ```
//!
//! A block tagged `mermaid` wins over an untagged one. Untagged blocks count
//! only when their first keyword is a diagram keyword. Blocks tagged with any
//! other language are never diagrams.

use regex::Regex;
use std::sync::OnceLock;

use super::source::{infer_kind, leading_keyword, split_config_header};
use super::DiagramData;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_-]*)[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
            .expect("fence pattern is valid")
    })
}

const DIAGRAM_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "gantt",
    "pie",
    "journey",
    "mindmap",
    "timeline",
    "gitGraph",
];

/// Find the diagram block in free-form reply text
pub fn extract_fenced_diagram(text: &str) -> Option<DiagramData> {
    let mut untagged: Option<&str> = None;

    for caps in fence_regex().captures_iter(text) {
        let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        if lang.eq_ignore_ascii_case("mermaid") {
            return to_diagram(body);
        }
        if lang.is_empty() && untagged.is_none() && looks_like_diagram(body) {
            untagged = Some(body);
        }
    }

    untagged.and_then(to_diagram)
}

/// The code is kept whole; the kind comes from what follows any config header
fn to_diagram(body: &str) -> Option<DiagramData> {
    let code = body.trim();
    let (_, diagram) = split_config_header(code);
    if diagram.trim().is_empty() {
        return None;
    }
    Some(DiagramData::new(code, infer_kind(diagram)))
}

fn looks_like_diagram(body: &str) -> bool {
    let (_, diagram) = split_config_header(body);
    leading_keyword(diagram)
        .map(|keyword| DIAGRAM_KEYWORDS.contains(&keyword))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::DiagramKind;

    #[test]
    fn test_mermaid_block() {
        let reply = "Here is the login flow:\n\n```mermaid\ngraph TD\n  A[Start] --> B{Valid?}\n```\n\nLet me know!";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.code, "graph TD\n  A[Start] --> B{Valid?}");
        assert_eq!(diagram.kind, DiagramKind::Flowchart);
    }

    #[test]
    fn test_sequence_kind_inferred() {
        let reply = "```mermaid\nsequenceDiagram\n  Alice->>Bob: Hello\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::Sequence);
    }

    #[test]
    fn test_no_block() {
        assert!(extract_fenced_diagram("Sure, what should the diagram show?").is_none());
    }

    #[test]
    fn test_other_language_ignored() {
        let reply = "```python\nprint('graph')\n```";
        assert!(extract_fenced_diagram(reply).is_none());
    }

    #[test]
    fn test_mermaid_preferred_over_untagged() {
        let reply = "```\ngraph LR\n  X --> Y\n```\nand\n```mermaid\npie\n  \"a\" : 1\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::Pie);
    }

    #[test]
    fn test_untagged_diagram_accepted() {
        let reply = "```\nclassDiagram\n  Animal <|-- Duck\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::Class);
    }

    #[test]
    fn test_untagged_prose_rejected() {
        let reply = "```\nnot a diagram at all\n```";
        assert!(extract_fenced_diagram(reply).is_none());
    }

    #[test]
    fn test_config_header_does_not_hide_kind() {
        let reply = "Here:\n```mermaid\n---\nconfig:\n  theme: forest\n---\nsequenceDiagram\n  A->>B: hi\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::Sequence);
        assert!(diagram.code.starts_with("---\nconfig:"));
    }

    #[test]
    fn test_untagged_block_with_config_header() {
        let reply = "```\n---\nconfig:\n  theme: dark\n---\nerDiagram\n  USER ||--o{ ORDER : places\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::EntityRelationship);
    }

    #[test]
    fn test_header_only_block_is_not_a_diagram() {
        assert!(extract_fenced_diagram("```mermaid\n---\ntheme: dark\n---\n```").is_none());
    }

    #[test]
    fn test_crlf_line_endings() {
        let reply = "```mermaid\r\ngantt\r\n  title Plan\r\n```";
        let diagram = extract_fenced_diagram(reply).unwrap();
        assert_eq!(diagram.kind, DiagramKind::Gantt);
        assert_eq!(diagram.code, "gantt\r\n  title Plan");
    }
}
