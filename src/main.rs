use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use textgen_chat::config::ENDPOINT_ENV;
use textgen_chat::{Config, HttpTransport, RequestController};
use tracing::info;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "textgen-chat")]
#[command(version, about = "Chat with a remote text-generation endpoint from the terminal")]
struct Cli {
    /// Generation endpoint URL (overrides config and TEXTGEN_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Check that the server is reachable, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_overrides(std::env::var(ENDPOINT_ENV).ok(), cli.endpoint.clone());
    config.validate()?;

    let log_dir = match cli.log_dir {
        Some(dir) => dir,
        None => logging::default_log_dir()?,
    };
    let _log_guard = logging::init(log_dir)?;

    info!(
        endpoint = %config.endpoint,
        max_new_tokens = config.max_new_tokens,
        temperature = config.temperature,
        timeout_secs = ?config.request_timeout_secs,
        "starting textgen-chat"
    );

    let transport = HttpTransport::new(&config.endpoint, config.request_timeout())?;

    if cli.check {
        let message = transport
            .health()
            .await
            .with_context(|| format!("Generation server at {} is not reachable", config.endpoint))?;
        println!("{}", message);
        return Ok(());
    }

    let controller = RequestController::new(Arc::new(transport.clone()), &config);
    let mut app = App::new(controller, config.endpoint.clone());
    app.start_health_check(transport);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    info!(requests = app.controller.request_count(), "exiting");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    Ok(())
}
