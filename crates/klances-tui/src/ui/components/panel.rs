use ratatui::{
    text::{Line, Span},
    widgets::{Block, Borders},
};

use klances_state::ResourceHealth;

use crate::ui::Theme;

/// Bordered block titled with the panel name and its detail, turning to the
/// warning style while the data behind it is stale.
pub fn panel_block<'a>(label: &'a str, detail: String, health: &ResourceHealth) -> Block<'a> {
    let mut title = vec![
        Span::styled(format!(" {} ", label), Theme::title()),
        Span::styled(format!("{} ", detail), Theme::text_dim()),
    ];

    let border = if health.is_stale() {
        let reason = health.last_error.as_deref().unwrap_or("fetch failed");
        title.push(Span::styled(
            format!("stale x{}: {} ", health.stale_ticks, reason),
            Theme::stale(),
        ));
        Theme::border_stale()
    } else {
        Theme::border()
    };

    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Line::from(title))
}
