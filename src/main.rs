use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;
mod handler;
mod tui;
mod ui;

use app::{App, QueryOutcome};
use client::QueryClient;
use config::{Config, DEFAULT_ENDPOINT};

#[derive(Parser)]
#[command(name = "petrochat")]
#[command(about = "Terminal chat client for a PetroRAG question-answering service")]
struct Cli {
    /// Query service base URL (overrides the configured value)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Enable the clear-transcript key binding ('c' in normal mode)
    #[arg(long)]
    enable_clear: bool,

    /// Persist the given endpoint and clear setting as the new defaults
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging().context("failed to initialize logging")?;

    let config = Config::load().unwrap_or_else(|_| Config::new());

    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| config.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let enable_clear = cli.enable_clear || config.enable_clear.unwrap_or(false);

    if cli.save {
        let updated = Config {
            endpoint: Some(endpoint.clone()),
            enable_clear: Some(enable_clear),
        };
        updated.save().context("failed to save config")?;
    }

    tracing::info!(%endpoint, enable_clear, "starting petrochat");

    let client = QueryClient::new(&endpoint);
    let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel::<QueryOutcome>();
    let mut app = App::new(client, outcomes_tx, endpoint, enable_clear);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events, &mut outcomes_rx).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut tui::EventHandler,
    outcomes_rx: &mut mpsc::UnboundedReceiver<QueryOutcome>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => handler::handle_event(app, event),
                    None => break,
                }
            }
            Some(outcome) = outcomes_rx.recv() => {
                app.resolve(outcome);
            }
        }
    }

    Ok(())
}

/// Log to a file; the terminal belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("could not determine data directory"))?
        .join("petrochat");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = File::create(log_dir.join("petrochat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
