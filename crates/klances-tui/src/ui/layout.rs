use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Areas of the dashboard panels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DashboardAreas {
    pub nodes: Rect,
    pub namespaces: Rect,
    pub pods: Rect,
    pub logs: Rect,
}

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Create the main layout with header, content, and status bar
    pub fn main(area: Rect) -> (Rect, Rect, Rect) {
        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(1),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

        (chunks[0], chunks[1], chunks[2])
    }

    /// Split the content area: nodes and namespaces side by side on top,
    /// pods below them and the logs taking the rest
    pub fn dashboard(area: Rect) -> DashboardAreas {
        let rows = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(30),
                Constraint::Min(5),
            ])
            .split(area);

        let top = RatatuiLayout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[0]);

        DashboardAreas {
            nodes: top[0],
            namespaces: top[1],
            pods: rows[1],
            logs: rows[2],
        }
    }
}
