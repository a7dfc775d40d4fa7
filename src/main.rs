use std::time::Duration;

use anyhow::Result;
use crossterm::event::Event;
use netgauge::app::{poll_event, App, AppAction};
use netgauge::netinfo::{self, IpInfo};
use netgauge::speedtest::TestUpdate;
use netgauge::ui::draw_ui;
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging();

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal).await;

    ratatui::restore();
    result
}

/// The terminal belongs to the UI, so logs go to a file, and only when a
/// filter was asked for via `RUST_LOG`.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().ok()?;
    let appender = tracing_appender::rolling::never(std::env::temp_dir(), "netgauge.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

async fn run_app(terminal: &mut DefaultTerminal) -> Result<()> {
    let mut app = App::new()?;
    let mut test_rx: Option<mpsc::Receiver<TestUpdate>> = None;

    let (ip_tx, mut ip_rx) = oneshot::channel::<IpInfo>();
    tokio::spawn(async move {
        let _ = ip_tx.send(netinfo::fetch_ip_info().await);
    });

    loop {
        terminal.draw(|frame| draw_ui(frame, &app))?;

        if app.ip_info.is_none() {
            if let Ok(info) = ip_rx.try_recv() {
                app.ip_info = Some(info);
            }
        }

        // Drain everything the run produced since the last frame.
        let mut disconnected = false;
        if let Some(rx) = test_rx.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(update) => app.handle_update(update),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        if disconnected {
            test_rx = None;
        }

        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(30))? {
            if let Some(action) = app.handle_key_event(key) {
                match action {
                    AppAction::Quit => break,
                    AppAction::StartTest => {
                        app.reset_for_new_test();
                        if let Some(rx) = app.test.start(&app.settings) {
                            test_rx = Some(rx);
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
