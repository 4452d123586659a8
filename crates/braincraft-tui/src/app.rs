use ratatui::layout::Rect;
use tokio::task::JoinHandle;

use braincraft_core::api::{ChatBackend, ChatReply};
use braincraft_core::diagram::{DiagramPanel, RenderedDiagram};
use braincraft_core::error::{ApiError, RenderError};
use braincraft_core::{Logger, PageController, VoiceSession};

/// How long an alert stays in the footer, in ticks
const ALERT_TICKS: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Error,
}

/// Short-lived inline notice shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub level: AlertLevel,
    ticks_left: u8,
}

type RenderOutcome = (String, Result<RenderedDiagram, RenderError>);

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat input
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub diagram_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub alert: Option<Alert>,

    // Panel areas for mouse hit-testing (updated during render)
    pub status_area: Option<Rect>,
    pub chat_area: Option<Rect>,
    pub input_area: Option<Rect>,
    pub diagram_area: Option<Rect>,

    // Components
    pub page: PageController<dyn ChatBackend>,
    pub diagram: DiagramPanel,
    pub voice: VoiceSession,
    logger: Logger,

    // In-flight work, polled every loop iteration
    send_task: Option<JoinHandle<Result<ChatReply, ApiError>>>,
    health_task: Option<JoinHandle<bool>>,
    render_tasks: Vec<JoinHandle<RenderOutcome>>,
    transcribe_task: Option<JoinHandle<Result<String, ApiError>>>,
    speech_task: Option<JoinHandle<Result<String, ApiError>>>,
}

/// Take the handle out of `slot` if its task has completed
fn take_finished<T>(slot: &mut Option<JoinHandle<T>>) -> Option<JoinHandle<T>> {
    if slot.as_ref().map(|h| h.is_finished()).unwrap_or(false) {
        slot.take()
    } else {
        None
    }
}

impl App {
    pub fn new(page: PageController<dyn ChatBackend>, diagram: DiagramPanel, voice: VoiceSession, logger: Logger) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            diagram_scroll: 0,
            animation_frame: 0,
            alert: None,
            status_area: None,
            chat_area: None,
            input_area: None,
            diagram_area: None,
            page,
            diagram,
            voice,
            logger,
            send_task: None,
            health_task: None,
            render_tasks: Vec::new(),
            transcribe_task: None,
            speech_task: None,
        }
    }

    /// Whether input submission is blocked. Recording and sending exclude each other.
    pub fn input_locked(&self) -> bool {
        self.page.is_loading() || self.voice.is_recording() || self.voice.is_transcribing()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.alert = Some(Alert {
            message: message.into(),
            level: AlertLevel::Info,
            ticks_left: ALERT_TICKS,
        });
    }

    pub fn alert_error(&mut self, message: impl Into<String>) {
        self.alert = Some(Alert {
            message: message.into(),
            level: AlertLevel::Error,
            ticks_left: ALERT_TICKS,
        });
    }

    /// Send the input box contents as a user message. Returns whether a send started.
    pub fn submit_input(&mut self) -> bool {
        if self.input_locked() {
            return false;
        }

        let Some(text) = self.page.begin_send(&self.input) else {
            return false;
        };

        self.input.clear();
        self.cursor = 0;
        self.scroll_chat_to_bottom();

        let backend = self.page.backend();
        self.send_task = Some(tokio::spawn(async move { backend.send_message(&text).await }));
        true
    }

    /// Start a health check unless one is already running
    pub fn request_health_check(&mut self) {
        if !self.page.begin_health_check() {
            return;
        }
        let backend = self.page.backend();
        self.health_task = Some(tokio::spawn(async move { backend.check_health().await }));
    }

    pub fn toggle_voice(&mut self) {
        if self.voice.toggle_voice_mode() {
            self.info("Voice replies on");
        } else {
            if let Some(task) = self.speech_task.take() {
                task.abort();
            }
            self.info("Voice replies off");
        }
    }

    /// Start recording, or stop and send the recording for transcription
    pub fn toggle_recording(&mut self) {
        if self.voice.is_recording() {
            match self.voice.stop_recording() {
                Ok(Some(audio)) => {
                    self.info("Transcribing...");
                    let backend = self.page.backend();
                    self.transcribe_task =
                        Some(tokio::spawn(async move { backend.transcribe_audio(&audio).await }));
                }
                Ok(None) => self.info("Nothing was recorded"),
                Err(e) => self.alert_error(e.user_message()),
            }
            return;
        }

        match self.voice.start_recording(self.page.is_loading()) {
            Ok(true) => {
                if let Some(task) = self.speech_task.take() {
                    task.abort();
                }
                self.info("Recording... press m to stop");
            }
            Ok(false) => self.info("Wait for the current request to finish"),
            Err(e) => self.alert_error(e.user_message()),
        }
    }

    /// Apply the results of any finished background tasks
    pub async fn poll_tasks(&mut self) {
        if let Some(task) = take_finished(&mut self.send_task) {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ApiError::Network(format!("request task failed: {}", e))),
            };
            self.page.complete_send(outcome);
            self.scroll_chat_to_bottom();
            self.sync_diagram();
        }

        if let Some(task) = take_finished(&mut self.health_task) {
            let healthy = task.await.unwrap_or(false);
            self.page.complete_health_check(healthy);
        }

        let (finished, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.render_tasks).into_iter().partition(|t| t.is_finished());
        self.render_tasks = pending;
        for task in finished {
            match task.await {
                Ok((anchor, result)) => self.diagram.finish(&anchor, result),
                Err(e) => self.logger.error(&format!("Render task failed: {}", e)),
            }
        }

        if let Some(task) = take_finished(&mut self.transcribe_task) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ApiError::Network(format!("transcription task failed: {}", e))),
            };
            match self.voice.finish_transcription(result) {
                Ok(Some(text)) => {
                    self.input = text;
                    self.cursor = self.input.chars().count();
                    if !self.submit_input() {
                        self.info("Transcript is in the input box; press Enter to send it");
                    }
                }
                Ok(None) => self.info("Didn't catch that. Try again."),
                Err(e) => self.alert_error(e.user_message()),
            }
        }

        if let Some(task) = take_finished(&mut self.speech_task) {
            match task.await {
                Ok(Ok(audio)) => {
                    if let Err(e) = self.voice.play_speech(&audio) {
                        self.alert_error(e.user_message());
                    }
                }
                Ok(Err(e)) => {
                    self.logger.error_with("Speech synthesis failed", &e);
                    self.alert_error(e.user_message());
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => self.logger.error(&format!("Speech task failed: {}", e)),
            }
        }

        self.maybe_speak();

        if self.page.health_check_due() {
            self.request_health_check();
        }
    }

    /// Push the controller's current diagram into the panel
    fn sync_diagram(&mut self) {
        let Some(data) = self.page.current_diagram().cloned() else {
            return;
        };
        if let Some(job) = self.diagram.show(&data) {
            self.diagram_scroll = 0;
            self.render_tasks.push(tokio::spawn(job.run()));
        }
    }

    fn maybe_speak(&mut self) {
        if self.speech_task.is_some() || self.voice.is_recording() {
            return;
        }
        let Some(message) = self.voice.next_to_speak(self.page.messages()) else {
            return;
        };
        let backend = self.page.backend();
        self.speech_task = Some(tokio::spawn(async move {
            backend.synthesize_speech(&message.content).await
        }));
    }

    /// Tick animation frame and expire alerts (called by Tick event)
    pub fn tick(&mut self) {
        if self.page.is_loading() || self.voice.is_transcribing() || self.diagram.is_rendering() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(alert) = &mut self.alert {
            alert.ticks_left = alert.ticks_left.saturating_sub(1);
            if alert.ticks_left == 0 {
                self.alert = None;
            }
        }
    }

    /// Scroll chat to bottom so the latest message (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.page.messages() {
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { (char_count / wrap_width) + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            if msg.diagram_code.is_some() {
                total_lines = total_lines.saturating_add(1);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.page.is_loading() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_chat(&mut self, delta: i32) {
        self.chat_scroll = apply_scroll(self.chat_scroll, delta);
    }

    pub fn scroll_diagram(&mut self, delta: i32) {
        self.diagram_scroll = apply_scroll(self.diagram_scroll, delta);
    }

    /// Stop everything still running before exit
    pub fn shutdown(&mut self) {
        if self.voice.is_recording() {
            let _ = self.voice.stop_recording();
        }
        self.voice.stop_playback();

        if let Some(task) = self.send_task.take() {
            task.abort();
        }
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
        for task in [self.transcribe_task.take(), self.speech_task.take()].into_iter().flatten() {
            task.abort();
        }
        for task in self.render_tasks.drain(..) {
            task.abort();
        }
        self.logger.info("Shut down");
    }
}

fn apply_scroll(current: u16, delta: i32) -> u16 {
    if delta >= 0 {
        current.saturating_add(delta as u16)
    } else {
        current.saturating_sub(delta.unsigned_abs() as u16)
    }
}
