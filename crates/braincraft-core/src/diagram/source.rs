//! Cleaning raw diagram source before it is handed to the renderer.
//!
//! Steps, in order: strip fence markers, split off an optional
//! `--- config: ... ---` header and apply it over the default render
//! options, then infer the diagram kind from the leading keyword.

use super::render::RenderOptions;
use super::DiagramKind;
use crate::logger::Logger;

/// Diagram source ready for the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDiagram {
    pub source: String,
    pub kind: DiagramKind,
    pub options: RenderOptions,
    /// Header lines that were ignored
    pub warnings: Vec<String>,
}

/// Remove a leading ```` ``` ````/```` ```mermaid ```` line and a trailing
/// ```` ``` ```` line. Applying it twice gives the same result as once.
pub fn strip_fences(source: &str) -> String {
    let trimmed = source.trim();
    let mut lines: Vec<&str> = trimmed.lines().collect();

    if lines.first().map(|l| l.trim_start().starts_with("```")).unwrap_or(false) {
        lines.remove(0);
    }
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

/// Split a `---` delimited header from the diagram body.
///
/// Returns `(None, source)` when there is no header or it is never closed.
pub fn split_config_header(source: &str) -> (Option<&str>, &str) {
    let source = source.trim_start();
    let Some(rest) = strip_delimiter_line(source) else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(header), body.trim_start_matches(['\r', '\n']));
        }
        offset += line.len();
    }

    (None, source)
}

fn strip_delimiter_line(source: &str) -> Option<&str> {
    let (first, rest) = match source.find('\n') {
        Some(idx) => (&source[..idx], &source[idx + 1..]),
        None => (source, ""),
    };
    if first.trim() == "---" {
        Some(rest)
    } else {
        None
    }
}

/// Outcome of reading a flat `key: value` header
#[derive(Debug, Default, PartialEq)]
pub struct HeaderEntries {
    pub entries: Vec<(String, String)>,
    pub rejected: Vec<String>,
}

/// Parse the header as one `key: value` pair per line.
///
/// Indentation is ignored, so nested YAML sections flatten into their leaf
/// keys. Lines with an empty value (section names such as `config:`) are
/// skipped; lines without a colon or with an empty key are rejected.
pub fn parse_config_header(header: &str) -> HeaderEntries {
    let mut parsed = HeaderEntries::default();

    for raw in header.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            parsed.rejected.push(line.to_string());
            continue;
        };

        let key = key.trim();
        let value = unquote(value.trim());
        if key.is_empty() {
            parsed.rejected.push(line.to_string());
            continue;
        }
        if value.is_empty() {
            continue;
        }

        parsed.entries.push((key.to_string(), value.to_string()));
    }

    parsed
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// First keyword of the diagram body, skipping blank and `%%` comment lines
pub fn leading_keyword(body: &str) -> Option<&str> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
        .and_then(|line| line.split_whitespace().next())
}

/// Infer the diagram kind from the leading keyword, defaulting to a flowchart
pub fn infer_kind(body: &str) -> DiagramKind {
    match leading_keyword(body) {
        Some("sequenceDiagram") => DiagramKind::Sequence,
        Some("classDiagram") | Some("classDiagram-v2") => DiagramKind::Class,
        Some("stateDiagram") | Some("stateDiagram-v2") => DiagramKind::State,
        Some("erDiagram") => DiagramKind::EntityRelationship,
        Some("gantt") => DiagramKind::Gantt,
        Some("pie") => DiagramKind::Pie,
        Some("journey") => DiagramKind::Journey,
        Some("mindmap") => DiagramKind::Mindmap,
        Some("timeline") => DiagramKind::Timeline,
        Some("gitGraph") => DiagramKind::GitGraph,
        _ => DiagramKind::Flowchart,
    }
}

/// Clean `source` and resolve its render options and kind
pub fn prepare(source: &str, explicit_kind: Option<DiagramKind>, logger: &Logger) -> PreparedDiagram {
    let stripped = strip_fences(source);
    let (header, body) = split_config_header(&stripped);

    let mut options = RenderOptions::default();
    let mut warnings = Vec::new();

    if header.is_none() && stripped.trim_start().starts_with("---") {
        let message = "Configuration header is not closed with '---'; ignoring it".to_string();
        logger.warn(&message);
        warnings.push(message);
    }

    if let Some(header) = header {
        let parsed = parse_config_header(header);
        for line in parsed.rejected {
            let message = format!("Ignoring malformed config line: {}", line);
            logger.warn(&message);
            warnings.push(message);
        }
        for (key, value) in parsed.entries {
            if let Err(reason) = options.apply(&key, &value) {
                let message = format!("Ignoring config '{}': {}", key, reason);
                logger.warn(&message);
                warnings.push(message);
            }
        }
    }

    let body = body.trim().to_string();
    let kind = explicit_kind.unwrap_or_else(|| infer_kind(&body));
    logger.debug(&format!("Prepared {} diagram ({} bytes)", kind, body.len()));

    PreparedDiagram {
        source: body,
        kind,
        options,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> Logger {
        Logger::quiet("DiagramPanel")
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```mermaid\ngraph TD\nA-->B\n```"), "graph TD\nA-->B");
        assert_eq!(strip_fences("```\npie\n```\n"), "pie");
        assert_eq!(strip_fences("graph TD\nA-->B"), "graph TD\nA-->B");
    }

    #[test]
    fn test_strip_fences_idempotent() {
        let once = strip_fences("```mermaid\nsequenceDiagram\n  A->>B: hi\n```");
        assert_eq!(strip_fences(&once), once);
    }

    #[test]
    fn test_fenced_and_bare_prepare_identically() {
        let bare = "flowchart LR\n  login --> dashboard";
        let fenced = format!("```mermaid\n{}\n```", bare);
        assert_eq!(prepare(&fenced, None, &logger()), prepare(bare, None, &logger()));
    }

    #[test]
    fn test_split_config_header() {
        let source = "---\nconfig:\n  theme: forest\n---\ngraph TD\nA-->B";
        let (header, body) = split_config_header(source);
        assert_eq!(header, Some("config:\n  theme: forest\n"));
        assert_eq!(body, "graph TD\nA-->B");
    }

    #[test]
    fn test_split_without_header() {
        let (header, body) = split_config_header("graph TD\nA-->B");
        assert!(header.is_none());
        assert_eq!(body, "graph TD\nA-->B");
    }

    #[test]
    fn test_unterminated_header_left_alone() {
        let source = "---\ntheme: dark\ngraph TD";
        let (header, body) = split_config_header(source);
        assert!(header.is_none());
        assert_eq!(body, source);
    }

    #[test]
    fn test_parse_config_header() {
        let parsed = parse_config_header("config:\n  theme: 'dark'\n  fontFamily: \"Fira Code\"\nnonsense line\n: empty\n");
        assert_eq!(
            parsed.entries,
            vec![
                ("theme".to_string(), "dark".to_string()),
                ("fontFamily".to_string(), "Fira Code".to_string()),
            ]
        );
        assert_eq!(parsed.rejected, vec!["nonsense line".to_string(), ": empty".to_string()]);
    }

    #[test]
    fn test_prepare_applies_header() {
        let source = "---\nconfig:\n  theme: forest\n  nodeSpacing: 20\n---\nsequenceDiagram\n  A->>B: hi";
        let prepared = prepare(source, None, &logger());
        assert_eq!(prepared.kind, DiagramKind::Sequence);
        assert_eq!(prepared.source, "sequenceDiagram\n  A->>B: hi");
        assert_eq!(prepared.options.theme, "forest");
        assert_eq!(prepared.options.node_spacing, 20);
        assert!(prepared.warnings.is_empty());
    }

    #[test]
    fn test_invalid_header_line_does_not_block_render() {
        let source = "---\nconfig:\n  theme: forest\n  this line is broken\n  nodeSpacing: lots\n---\ngraph TD\n  A --> B";
        let prepared = prepare(source, None, &logger());
        assert_eq!(prepared.source, "graph TD\n  A --> B");
        assert_eq!(prepared.options.theme, "forest");
        assert_eq!(prepared.options.node_spacing, RenderOptions::default().node_spacing);
        assert_eq!(prepared.warnings.len(), 2);
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("%% comment\n\nclassDiagram\n  A <|-- B"), DiagramKind::Class);
        assert_eq!(infer_kind("stateDiagram-v2\n  [*] --> Idle"), DiagramKind::State);
        assert_eq!(infer_kind("erDiagram\n  USER ||--o{ ORDER : places"), DiagramKind::EntityRelationship);
        assert_eq!(infer_kind("gantt\n  title Plan"), DiagramKind::Gantt);
        assert_eq!(infer_kind("pie title Pets"), DiagramKind::Pie);
        assert_eq!(infer_kind("graph TD\n  A-->B"), DiagramKind::Flowchart);
        assert_eq!(infer_kind(""), DiagramKind::Flowchart);
    }

    #[test]
    fn test_explicit_kind_wins() {
        let prepared = prepare("graph TD\n  A-->B", Some(DiagramKind::State), &logger());
        assert_eq!(prepared.kind, DiagramKind::State);
    }
}
