//! TUI components for klances
//!
//! This crate provides the render scheduler that decides when the dashboard
//! is redrawn, the ratatui dashboard itself, keybindings and terminal event
//! handling.

pub mod app;
pub mod config;
pub mod render;
pub mod tui;
pub mod ui;

pub use app::{Action, UiState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use render::{
    DashboardView, RenderScheduler, Renderer, TerminalRenderer, TickOutcome,
};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{StatusBar, dashboard_hints};
pub use ui::screens::DashboardScreen;
pub use ui::{Layout, Theme};
