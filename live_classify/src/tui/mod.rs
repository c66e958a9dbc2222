//! Terminal dashboard: connectivity indicator, pacing counters and the live
//! result summary, with start/stop and quit keys.

pub mod app;
pub mod ui;

use std::io::{self, Stdout};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use crate::session::Command;
use app::DashboardState;

const KEY_POLL: Duration = Duration::from_millis(100);

pub struct Dashboard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: DashboardState,
}

impl Dashboard {
    /// Switches the terminal to raw mode on the alternate screen. The
    /// terminal is restored when the dashboard is dropped.
    pub fn enter(state: DashboardState) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal, state })
    }

    pub fn draw(&mut self) -> Result<()> {
        let state = &self.state;
        self.terminal.draw(|f| ui::draw(f, state))?;
        Ok(())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

pub fn key_command(code: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Char(' ') => {
            Some(Command::ToggleCapture)
        }
        _ => None,
    }
}

/// Reads keys on a plain thread (crossterm polling blocks) and forwards them
/// as session commands. Ends after `Quit` or once the session is gone.
pub fn spawn_key_reader(commands: mpsc::Sender<Command>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match event::poll(KEY_POLL) {
            Ok(false) => {
                if commands.is_closed() {
                    return;
                }
            }
            Ok(true) => {
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(command) = key_command(key.code, key.modifiers) {
                    if commands.blocking_send(command).is_err() || command == Command::Quit {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Keyboard input failed: {e}");
                let _ = commands.blocking_send(Command::Quit);
                return;
            }
        }
    })
}
