use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};

mod app;
mod config;
mod dispatcher;
mod gemini;
mod handler;
mod transcript;
mod tui;
mod ui;

use app::App;
use config::Config;
use dispatcher::Outcome;
use gemini::ChatSession;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());
    let api_key = config.resolve_api_key();
    let model = config.resolve_model();

    // One session for the lifetime of the window; an invalid or missing
    // key only shows up as an error entry on the first send.
    let session = ChatSession::new(&api_key, &model);
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let mut app = App::new(Arc::new(session), model, outcome_tx);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(Duration::from_millis(300));

    let result = run(&mut terminal, &mut events, outcome_rx, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    mut outcomes: UnboundedReceiver<Outcome>,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => {
                handler::handle_event(app, event)?;
            }
            Some(outcome) = outcomes.recv() => {
                app.apply_outcome(outcome);
            }
        }
    }
    Ok(())
}
