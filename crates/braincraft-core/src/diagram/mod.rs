//! Diagram data, source preprocessing, and rendering.

pub mod extract;
pub mod panel;
pub mod render;
pub mod source;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use extract::extract_fenced_diagram;
pub use panel::{DiagramPanel, RenderJob, RenderState};
pub use render::{DiagramRenderer, MermaidCli, RenderOptions, RenderedDiagram};
pub use source::{infer_kind, prepare, strip_fences, PreparedDiagram};

/// Diagram kind tag as used on the wire (`flowchart`, `sequence`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiagramKind {
    #[default]
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Pie,
    Journey,
    Mindmap,
    Timeline,
    GitGraph,
}

impl DiagramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "er",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Pie => "pie",
            DiagramKind::Journey => "journey",
            DiagramKind::Mindmap => "mindmap",
            DiagramKind::Timeline => "timeline",
            DiagramKind::GitGraph => "gitgraph",
        }
    }

    /// Parse a kind tag; unknown tags fall back to a flowchart
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "sequence" | "sequencediagram" => DiagramKind::Sequence,
            "class" | "classdiagram" => DiagramKind::Class,
            "state" | "statediagram" => DiagramKind::State,
            "er" | "erdiagram" | "entity-relationship" => DiagramKind::EntityRelationship,
            "gantt" => DiagramKind::Gantt,
            "pie" => DiagramKind::Pie,
            "journey" => DiagramKind::Journey,
            "mindmap" => DiagramKind::Mindmap,
            "timeline" => DiagramKind::Timeline,
            "gitgraph" | "git" => DiagramKind::GitGraph,
            _ => DiagramKind::Flowchart,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "Flowchart",
            DiagramKind::Sequence => "Sequence diagram",
            DiagramKind::Class => "Class diagram",
            DiagramKind::State => "State diagram",
            DiagramKind::EntityRelationship => "Entity-relationship diagram",
            DiagramKind::Gantt => "Gantt chart",
            DiagramKind::Pie => "Pie chart",
            DiagramKind::Journey => "User journey",
            DiagramKind::Mindmap => "Mindmap",
            DiagramKind::Timeline => "Timeline",
            DiagramKind::GitGraph => "Git graph",
        }
    }
}

impl From<String> for DiagramKind {
    fn from(tag: String) -> Self {
        DiagramKind::from_tag(&tag)
    }
}

impl From<DiagramKind> for String {
    fn from(kind: DiagramKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagram source plus its kind, as carried by a chat reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramData {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DiagramKind,
}

impl DiagramData {
    pub fn new(code: impl Into<String>, kind: DiagramKind) -> Self {
        Self {
            code: code.into(),
            kind,
        }
    }
}
