use std::io;

use super::{DashboardView, Renderer};
use crate::tui::Tui;
use crate::ui::screens::DashboardScreen;

/// Draws the dashboard to the real terminal
pub struct TerminalRenderer {
    tui: Tui,
}

impl TerminalRenderer {
    /// Take over the terminal (raw mode, alternate screen)
    pub fn new() -> io::Result<Self> {
        Ok(Self { tui: Tui::new()? })
    }

    /// Give the terminal back
    pub fn restore(&mut self) -> io::Result<()> {
        self.tui.restore()
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, view: &DashboardView) -> io::Result<()> {
        self.tui
            .terminal()
            .draw(|frame| DashboardScreen::render(frame, view))?;
        Ok(())
    }
}
