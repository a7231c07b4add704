use std::panic;
use std::{error, io};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::Backend;
use ratatui::Terminal;

use crate::ui::{Renderer, SimContent};

pub type ContentResult<T> = Result<T, Box<dyn error::Error>>;

/// Representation of a terminal user interface.
///
/// It is responsible for setting up the terminal,
/// initializing the interface and handling the draw events.
#[derive(Debug)]
pub struct TerminalUI<B: Backend, R: Renderer> {
    /// Interface to the Terminal.
    terminal: Terminal<B>,
    renderer: R,
}

impl<B: Backend, R: Renderer> TerminalUI<B, R> {
    /// Constructs a new instance of [`TerminalUI`].
    pub fn new(terminal: Terminal<B>, renderer: R) -> Self {
        Self { terminal, renderer }
    }

    /// Initializes the terminal interface.
    ///
    /// It enables the raw mode and sets terminal properties.
    pub fn init(&mut self) -> ContentResult<()> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)?;

        // Reset the terminal properties on panic so the user's shell survives
        // an aborted run.
        let panic_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic| {
            Self::reset().expect("failed to reset the terminal");
            panic_hook(panic);
        }));

        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    /// Draws the terminal interface with the configured renderer.
    pub fn draw_ui(&mut self, app: &mut SimContent) -> ContentResult<()> {
        self.terminal
            .draw(|frame| self.renderer.render_sim_ui(app, frame))?;
        Ok(())
    }

    fn reset() -> ContentResult<()> {
        terminal::disable_raw_mode()?;
        crossterm::execute!(io::stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
        Ok(())
    }

    /// Exits the terminal interface.
    ///
    /// It disables the raw mode and reverts back the terminal properties.
    pub fn exit(&mut self) -> ContentResult<()> {
        Self::reset()?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Handles the key events and updates the state of [`SimContent`].
pub fn handle_sim_key_events(key_event: KeyEvent, content: &mut SimContent) {
    match key_event.code {
        KeyCode::Esc | KeyCode::Char('q') => content.quit(),
        _ => {}
    }
}
