//! Top-level page state.
//!
//! The controller is the only place that calls the backend for chat and
//! health and the only writer of the message store. Sends are split into
//! `begin_send` / `complete_send` so a front end can run the network call on
//! its own task and keep drawing in between.

use std::sync::Arc;

use crate::api::{ChatBackend, ChatReply};
use crate::clock::Clock;
use crate::connection::ConnectionIndicator;
use crate::diagram::{extract_fenced_diagram, DiagramData};
use crate::error::ApiError;
use crate::logger::Logger;
use crate::state::{Message, MessageStore};

/// Shown in place of a reply when a send fails
pub const FALLBACK_REPLY: &str = "Sorry, there was an error processing your request.";

pub const WELCOME_MESSAGE: &str = "Hello! I'm your AI diagram assistant. I can help you create and modify diagrams using natural language. Try asking me to create a flowchart, sequence diagram, or any other type of diagram!";

/// The diagram a reply carries.
///
/// The structured `diagram` field wins. A fenced block in the reply text is
/// only consulted when the field is absent.
pub fn resolve_diagram(reply: &ChatReply) -> Option<DiagramData> {
    match &reply.diagram {
        Some(diagram) if !diagram.code.trim().is_empty() => Some(diagram.clone()),
        _ => extract_fenced_diagram(&reply.response),
    }
}

pub struct PageController<B: ChatBackend + ?Sized> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    store: MessageStore,
    current_diagram: Option<DiagramData>,
    loading: bool,
    connection: ConnectionIndicator,
    logger: Logger,
}

impl<B: ChatBackend + ?Sized> PageController<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, connection: ConnectionIndicator, logger: Logger) -> Self {
        Self {
            backend,
            clock,
            store: MessageStore::new(),
            current_diagram: None,
            loading: false,
            connection,
            logger,
        }
    }

    /// Open the conversation with the assistant's greeting
    pub fn with_welcome(mut self) -> Self {
        let now = self.clock.now();
        self.store.push_assistant(WELCOME_MESSAGE, None, now);
        self
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn current_diagram(&self) -> Option<&DiagramData> {
        self.current_diagram.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn connection(&self) -> &ConnectionIndicator {
        &self.connection
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Start a send. Returns the text to put on the wire, or `None` when the
    /// input is blank or a send is already running.
    pub fn begin_send(&mut self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.loading {
            self.logger.warn("Send ignored: a request is already in flight");
            return None;
        }

        let now = self.clock.now();
        self.store.push_user(text, now);
        self.loading = true;
        self.logger.debug(&format!("Sending message ({} chars)", text.chars().count()));
        Some(text.to_string())
    }

    /// Record the outcome of a send started with [`begin_send`](Self::begin_send)
    pub fn complete_send(&mut self, outcome: Result<ChatReply, ApiError>) {
        let now = self.clock.now();
        match outcome {
            Ok(reply) => {
                let diagram = resolve_diagram(&reply);
                let diagram_code = diagram.as_ref().map(|d| d.code.clone());
                self.store.push_assistant(reply.response, diagram_code, now);

                if let Some(diagram) = diagram {
                    self.logger.info(&format!("Current diagram replaced ({})", diagram.kind));
                    self.current_diagram = Some(diagram);
                }
            }
            Err(e) => {
                self.logger.error_with("Error sending message", &e);
                self.store.push_assistant(FALLBACK_REPLY, None, now);
            }
        }
        self.loading = false;
    }

    /// One full round trip. No retries.
    pub async fn send_user_message(&mut self, text: &str) {
        let Some(text) = self.begin_send(text) else {
            return;
        };
        let outcome = self.backend.send_message(&text).await;
        self.complete_send(outcome);
    }

    /// Mark a health check as started. Returns false if one is already running.
    pub fn begin_health_check(&mut self) -> bool {
        self.connection.begin()
    }

    pub fn complete_health_check(&mut self, healthy: bool) {
        let now = self.clock.now();
        if !healthy {
            self.logger.warn("Backend health check failed");
        }
        self.connection.record(healthy, now);
    }

    /// Whether the periodic check should run now
    pub fn health_check_due(&self) -> bool {
        self.connection.is_due(self.clock.now())
    }

    pub async fn check_connection(&mut self) -> bool {
        if !self.begin_health_check() {
            return self.connection.status().is_connected();
        }
        let healthy = self.backend.check_health().await;
        self.complete_health_check(healthy);
        healthy
    }
}
