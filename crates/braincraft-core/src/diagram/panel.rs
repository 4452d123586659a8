//! Diagram panel state: what is shown, and which render is current.
//!
//! Every render gets a fresh anchor so a slow render of an older diagram can
//! never overwrite a newer one. Prior output is discarded before a new render
//! starts.

use std::sync::Arc;

use super::render::{DiagramRenderer, RenderedDiagram};
use super::source::{prepare, PreparedDiagram};
use super::DiagramData;
use crate::error::RenderError;
use crate::logger::Logger;

const ANCHOR_PREFIX: &str = "braincraft-diagram";

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Empty,
    Rendering { anchor: String },
    Rendered(RenderedDiagram),
    Failed { anchor: String, message: String },
}

/// A render waiting to run, detached from the panel so it can be spawned
pub struct RenderJob {
    pub anchor: String,
    pub prepared: PreparedDiagram,
    renderer: Arc<dyn DiagramRenderer>,
}

impl RenderJob {
    pub async fn run(self) -> (String, Result<RenderedDiagram, RenderError>) {
        let result = self.renderer.render(&self.anchor, &self.prepared).await;
        (self.anchor, result)
    }
}

pub struct DiagramPanel {
    renderer: Arc<dyn DiagramRenderer>,
    logger: Logger,
    data: Option<DiagramData>,
    prepared: Option<PreparedDiagram>,
    state: RenderState,
    renders: u64,
}

impl DiagramPanel {
    pub fn new(renderer: Arc<dyn DiagramRenderer>, logger: Logger) -> Self {
        Self {
            renderer,
            logger,
            data: None,
            prepared: None,
            state: RenderState::Empty,
            renders: 0,
        }
    }

    pub fn data(&self) -> Option<&DiagramData> {
        self.data.as_ref()
    }

    pub fn prepared(&self) -> Option<&PreparedDiagram> {
        self.prepared.as_ref()
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self.state, RenderState::Rendering { .. })
    }

    /// Show `data`. Returns the render to run, or `None` if nothing changed.
    pub fn show(&mut self, data: &DiagramData) -> Option<RenderJob> {
        if self.data.as_ref() == Some(data) {
            return None;
        }

        self.clear_output();

        self.renders += 1;
        let anchor = format!("{}-{}", ANCHOR_PREFIX, self.renders);
        let prepared = prepare(&data.code, Some(data.kind), &self.logger);

        self.logger.info(&format!("Rendering {} as {}", prepared.kind, anchor));
        self.data = Some(data.clone());
        self.prepared = Some(prepared.clone());
        self.state = RenderState::Rendering {
            anchor: anchor.clone(),
        };

        Some(RenderJob {
            anchor,
            prepared,
            renderer: Arc::clone(&self.renderer),
        })
    }

    /// Apply a finished render. Completions for superseded anchors are dropped.
    pub fn finish(&mut self, anchor: &str, result: Result<RenderedDiagram, RenderError>) {
        let current = matches!(&self.state, RenderState::Rendering { anchor: a } if a == anchor);
        if !current {
            self.logger.debug(&format!("Dropping stale render {}", anchor));
            if let Ok(rendered) = result {
                self.renderer.discard(&rendered);
            }
            return;
        }

        self.state = match result {
            Ok(rendered) => RenderState::Rendered(rendered),
            Err(e) => {
                self.logger.error_with(&format!("Diagram render {} failed", anchor), &e);
                RenderState::Failed {
                    anchor: anchor.to_string(),
                    message: e.user_message(),
                }
            }
        };
    }

    /// Show and render in one step
    pub async fn render(&mut self, data: &DiagramData) {
        if let Some(job) = self.show(data) {
            let (anchor, result) = job.run().await;
            self.finish(&anchor, result);
        }
    }

    fn clear_output(&mut self) {
        if let RenderState::Rendered(rendered) = &self.state {
            self.renderer.discard(rendered);
        }
        self.state = RenderState::Empty;
        self.prepared = None;
    }
}
