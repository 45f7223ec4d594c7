//! Deciding when and what to draw

mod scheduler;
mod terminal;
mod view;

use std::io;

pub use scheduler::{RenderScheduler, TickOutcome};
pub use terminal::TerminalRenderer;
pub use view::DashboardView;

/// Something that can draw a [`DashboardView`].
///
/// Calls happen on a blocking worker thread, one at a time.
pub trait Renderer: Send + 'static {
    fn render(&mut self, view: &DashboardView) -> io::Result<()>;
}
