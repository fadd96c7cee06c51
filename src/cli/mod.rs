//! TUI front-end entry (Ratatui + Crossterm)
//! - Wraps the local service, the offline queue and the Oracle in a client
//! - Sets up and restores the terminal

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::AppConfig;
use crate::oracle::Oracle;
use crate::service::FinanceService;
use crate::sync::{HttpSyncTarget, OfflineQueue};

pub mod api;
pub mod input;
pub mod state;
pub mod ui;
pub mod util;

pub async fn run(config: &AppConfig, service: FinanceService, oracle: Option<Oracle>) -> Result<()> {
    let mut app = init_app(config, service, oracle).await?;

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app).await;

    // restore the terminal even when the loop failed
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut state::App) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;
        app.tick().await;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key).await?;
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.quit {
            return Ok(());
        }
    }
}

pub async fn init_app(config: &AppConfig, service: FinanceService, oracle: Option<Oracle>) -> Result<state::App> {
    let mut client = api::Client::new(service.clone(), oracle);
    if let Some(url) = &config.remote_url {
        let queue = OfflineQueue::new(service.pool().clone(), config.sync_max_attempts);
        client = client.with_remote(queue, Arc::new(HttpSyncTarget::new(url.as_str())?));
    }

    let mut app = state::App::new(client);
    app.refresh().await?;
    if app.api.has_oracle() {
        app.load_session().await;
    }
    Ok(app)
}
