use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::source::PreparedDiagram;
use crate::error::RenderError;
use crate::logger::Logger;

const THEMES: &[&str] = &["default", "forest", "dark", "neutral", "base"];
const SECURITY_LEVELS: &[&str] = &["strict", "loose", "antiscript", "sandbox"];
const LOOKS: &[&str] = &["classic", "handDrawn"];

/// Rendering options passed to Mermaid, overridable per diagram
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub theme: String,
    pub security_level: String,
    pub font_family: String,
    pub font_size: u32,
    pub node_spacing: u32,
    pub rank_spacing: u32,
    pub curve: String,
    pub look: Option<String>,
    /// Header keys we don't model, passed through as top-level options
    pub extra: BTreeMap<String, String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            security_level: "loose".to_string(),
            font_family: "trebuchet ms, verdana, arial, sans-serif".to_string(),
            font_size: 16,
            node_spacing: 50,
            rank_spacing: 50,
            curve: "basis".to_string(),
            look: None,
            extra: BTreeMap::new(),
        }
    }
}

impl RenderOptions {
    /// Apply one `key: value` override. Returns why it was rejected, if it was.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "theme" => self.theme = one_of(value, THEMES)?,
            "securityLevel" => self.security_level = one_of(value, SECURITY_LEVELS)?,
            "look" => self.look = Some(one_of(value, LOOKS)?),
            "fontFamily" => self.font_family = value.to_string(),
            "fontSize" => self.font_size = positive(value)?,
            "nodeSpacing" => self.node_spacing = positive(value)?,
            "rankSpacing" => self.rank_spacing = positive(value)?,
            "curve" => self.curve = value.to_string(),
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    /// Mermaid configuration JSON (the `-c` file for the CLI)
    pub fn to_mermaid_config(&self) -> Value {
        let mut config = Map::new();
        for (key, value) in &self.extra {
            config.insert(key.clone(), Value::String(value.clone()));
        }
        config.insert("theme".into(), json!(self.theme));
        config.insert("securityLevel".into(), json!(self.security_level));
        config.insert("fontFamily".into(), json!(self.font_family));
        config.insert("fontSize".into(), json!(self.font_size));
        if let Some(look) = &self.look {
            config.insert("look".into(), json!(look));
        }
        config.insert(
            "flowchart".into(),
            json!({
                "nodeSpacing": self.node_spacing,
                "rankSpacing": self.rank_spacing,
                "curve": self.curve,
                "htmlLabels": true,
            }),
        );
        Value::Object(config)
    }
}

fn one_of(value: &str, allowed: &[&str]) -> Result<String, String> {
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value))
        .map(|candidate| candidate.to_string())
        .ok_or_else(|| format!("'{}' is not one of {}", value, allowed.join(", ")))
}

fn positive(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a positive number", value)),
    }
}

/// A finished render, addressed by the anchor it was produced under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub anchor: String,
    pub output: PathBuf,
    pub files: Vec<PathBuf>,
}

/// The external rendering library
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, anchor: &str, diagram: &PreparedDiagram) -> Result<RenderedDiagram, RenderError>;

    /// Remove whatever a previous render left behind
    fn discard(&self, _rendered: &RenderedDiagram) {}
}

/// Renders through the Mermaid CLI (`mmdc`) into SVG files
#[derive(Debug, Clone)]
pub struct MermaidCli {
    binary: String,
    output_dir: PathBuf,
    logger: Logger,
}

impl MermaidCli {
    pub fn new(binary: impl Into<String>, output_dir: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            logger,
        }
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    async fn run(&self, anchor: &str, diagram: &PreparedDiagram, files: &RenderFiles) -> Result<(), RenderError> {
        tokio::fs::write(&files.input, &diagram.source).await?;
        let config_json = serde_json::to_vec_pretty(&diagram.options.to_mermaid_config())
            .map_err(|e| RenderError::Io(e.to_string()))?;
        tokio::fs::write(&files.config, config_json).await?;

        self.logger.debug(&format!("Running {} for {}", self.binary, anchor));

        let result = Command::new(&self.binary)
            .arg("-i")
            .arg(&files.input)
            .arg("-o")
            .arg(&files.output)
            .arg("-c")
            .arg(&files.config)
            .arg("-q")
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RenderError::Unavailable(format!("'{}' not found", self.binary)));
            }
            Err(e) => return Err(e.into()),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let message = syntax_message(&stderr)
                .unwrap_or_else(|| format!("{} exited with {}", self.binary, out.status));
            self.logger.warn(&format!("Render of {} failed: {}", anchor, message));
            return Err(RenderError::Syntax(message));
        }

        Ok(())
    }

    fn remove_files(&self, files: &[PathBuf]) {
        for file in files {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != ErrorKind::NotFound {
                    self.logger.warn(&format!("Could not remove {}: {}", file.display(), e));
                }
            }
        }
    }
}

/// Paths one render writes, all named after its anchor
struct RenderFiles {
    input: PathBuf,
    config: PathBuf,
    output: PathBuf,
}

impl RenderFiles {
    fn new(dir: &Path, anchor: &str) -> Self {
        Self {
            input: dir.join(format!("{}.mmd", anchor)),
            config: dir.join(format!("{}.config.json", anchor)),
            output: dir.join(format!("{}.svg", anchor)),
        }
    }

    fn into_vec(self) -> Vec<PathBuf> {
        vec![self.input, self.config, self.output]
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCli {
    /// A failed render leaves nothing behind in the output directory
    async fn render(&self, anchor: &str, diagram: &PreparedDiagram) -> Result<RenderedDiagram, RenderError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let files = RenderFiles::new(&self.output_dir, anchor);
        match self.run(anchor, diagram, &files).await {
            Ok(()) => Ok(RenderedDiagram {
                anchor: anchor.to_string(),
                output: files.output.clone(),
                files: files.into_vec(),
            }),
            Err(e) => {
                self.remove_files(&files.into_vec());
                Err(e)
            }
        }
    }

    fn discard(&self, rendered: &RenderedDiagram) {
        self.remove_files(&rendered.files);
    }
}

/// Pull the useful part out of mmdc's stderr (it prints a stack trace after)
fn syntax_message(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .take_while(|line| !line.trim_start().starts_with("at "))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{infer_kind, DiagramData, DiagramKind, DiagramPanel, RenderState};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut options = RenderOptions::default();
        options.apply("theme", "Dark").unwrap();
        options.apply("rankSpacing", "80").unwrap();
        options.apply("look", "handdrawn").unwrap();
        assert_eq!(options.theme, "dark");
        assert_eq!(options.rank_spacing, 80);
        assert_eq!(options.look.as_deref(), Some("handDrawn"));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut options = RenderOptions::default();
        assert!(options.apply("theme", "neon").is_err());
        assert!(options.apply("fontSize", "0").is_err());
        assert!(options.apply("nodeSpacing", "-4").is_err());
        assert_eq!(options, RenderOptions::default());
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let mut options = RenderOptions::default();
        options.apply("title", "Login flow").unwrap();
        let config = options.to_mermaid_config();
        assert_eq!(config["title"], "Login flow");
        assert_eq!(config["theme"], "default");
        assert_eq!(config["securityLevel"], "loose");
        assert_eq!(config["flowchart"]["nodeSpacing"], 50);
    }

    #[test]
    fn test_syntax_message_drops_stack() {
        let stderr = "\nError: Parse error on line 2:\n...A-->\n-----^\n    at Parser.parseError (mermaid.js:1:1)\n    at run\n";
        assert_eq!(
            syntax_message(stderr).unwrap(),
            "Error: Parse error on line 2:\n...A-->\n-----^"
        );
        assert!(syntax_message("").is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let cli = MermaidCli::new(
            "braincraft-test-no-such-mmdc",
            dir.path(),
            Logger::quiet("MermaidCli"),
        );
        let prepared = PreparedDiagram {
            source: "graph TD\n  A-->B".to_string(),
            kind: DiagramKind::Flowchart,
            options: RenderOptions::default(),
            warnings: Vec::new(),
        };

        let err = cli.render("braincraft-diagram-1", &prepared).await.unwrap_err();
        assert!(matches!(err, RenderError::Unavailable(_)));
        assert!(!dir.path().join("braincraft-diagram-1.mmd").exists());
        assert!(!dir.path().join("braincraft-diagram-1.config.json").exists());
    }

    #[tokio::test]
    async fn test_failed_renders_leave_no_files() {
        let dir = TempDir::new().unwrap();
        let cli = Arc::new(MermaidCli::new(
            "braincraft-test-no-such-mmdc",
            dir.path(),
            Logger::quiet("MermaidCli"),
        ));
        let mut panel = DiagramPanel::new(cli, Logger::quiet("DiagramPanel"));

        for code in ["graph TD\n  A-->B", "graph LR\n  B-->C", "pie\n  \"a\" : 1"] {
            panel.render(&DiagramData::new(code, infer_kind(code))).await;
            assert!(matches!(panel.state(), RenderState::Failed { .. }));
        }

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
