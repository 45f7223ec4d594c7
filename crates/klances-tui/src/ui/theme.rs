use ratatui::style::{Color, Modifier, Style};

use klances_types::{NamespacePhase, PodPhase};

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    // Border styles
    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    /// Border of a panel showing data from a failed poll
    pub fn border_stale() -> Style {
        Style::default().fg(Self::WARNING)
    }

    // Text styles
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn stale() -> Style {
        Style::default().fg(Self::WARNING)
    }

    // Table and list styles
    pub fn header_row() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn list_item_selected() -> Style {
        Style::default()
            .fg(Self::BG)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn list_item_current() -> Style {
        Style::default()
            .fg(Self::SUCCESS)
            .add_modifier(Modifier::BOLD)
    }

    pub fn pod_phase(phase: PodPhase) -> Style {
        let color = match phase {
            PodPhase::Running | PodPhase::Succeeded => Self::SUCCESS,
            PodPhase::Pending => Self::WARNING,
            PodPhase::Failed => Self::ERROR,
            PodPhase::Unknown => Self::FG_DIM,
        };
        Style::default().fg(color)
    }

    pub fn namespace_phase(phase: NamespacePhase) -> Style {
        match phase {
            NamespacePhase::Active => Self::text(),
            NamespacePhase::Terminating => Style::default().fg(Self::WARNING),
            NamespacePhase::Unknown => Self::text_dim(),
        }
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG_DIM).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    // Error
    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }
}
