use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use braincraft_core::api::ChatBackend;
use braincraft_core::voice::default_devices;
use braincraft_core::{
    init_tracing, ApiClient, Clock, Config, ConnectionIndicator, DiagramPanel, Logger, MermaidCli, PageController,
    SystemClock, VoiceSession,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "braincraft", version)]
#[command(about = "Chat with an AI assistant to create and refine diagrams")]
struct Cli {
    /// Backend base URL (overrides config and BRAINCRAFT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Development mode: log everything, not just errors
    #[arg(long)]
    dev: bool,

    /// Start with spoken replies turned on
    #[arg(long)]
    voice: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|_| Config::new()).with_env_overrides();
    if let Some(url) = cli.api_url {
        config.api_url = Some(url);
    }
    if cli.dev {
        config.development = Some(true);
    }

    let settings = config.log_settings();
    init_tracing(settings, &Config::log_path()?)?;
    let logger = Logger::new("BrainCraft", settings);
    logger.info(&format!(
        "Starting BrainCraft v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.api_url()
    ));

    let mut app = build_app(&config, cli.voice, &logger)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;

    if let Err(e) = &result {
        logger.error(&format!("Exited with error: {:#}", e));
    }
    result
}

fn build_app(config: &Config, voice_on: bool, logger: &Logger) -> Result<App> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let client = ApiClient::new(&config.api_url(), config.request_timeout(), logger.child("ApiClient"))?;
    let backend: Arc<dyn ChatBackend> = Arc::new(client);

    let page = PageController::new(
        backend,
        Arc::clone(&clock),
        ConnectionIndicator::new(config.health_interval()),
        logger.child("PageController"),
    )
    .with_welcome();

    let renderer = Arc::new(MermaidCli::new(
        config.mermaid_cli(),
        config.render_dir(),
        logger.child("DiagramRenderer"),
    ));
    let diagram = DiagramPanel::new(renderer, logger.child("DiagramPanel"));

    let (capture, playback) = default_devices(logger);
    let mut voice = VoiceSession::new(capture, playback, clock, logger.child("VoiceSession"));
    if voice_on || config.voice_output() {
        voice.set_voice_mode(true);
    }

    Ok(App::new(page, diagram, voice, logger.child("App")))
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        app.poll_tasks().await;
    }
    Ok(())
}
