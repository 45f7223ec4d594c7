use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

use crate::ui::Theme;

/// Status bar showing keyboard shortcuts
pub struct StatusBar<'a> {
    hints: Vec<(&'a str, &'a str)>,
    right_text: Option<String>,
    alert: bool,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            hints: Vec::new(),
            right_text: None,
            alert: false,
        }
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Set text to display on the right side
    pub fn right<S: Into<String>>(mut self, text: S) -> Self {
        self.right_text = Some(text.into());
        self
    }

    /// Show a problem on the right side, drawn over the hints if needed
    pub fn alert<S: Into<String>>(mut self, text: S) -> Self {
        self.right_text = Some(text.into());
        self.alert = true;
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Theme::status_bar());

        let mut spans = Vec::new();
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", Theme::status_bar()));
            }
            spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
            spans.push(Span::styled(format!(" {}", desc), Theme::status_bar()));
        }

        let line = Line::from(spans);
        let line_width = line.width() as u16;

        // Hints on the left
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));

        // Right text only if it does not overlap the hints, alerts always
        if let Some(right) = self.right_text {
            let right_width = (Line::raw(right.as_str()).width() as u16).min(area.width.saturating_sub(2));
            let style = if self.alert {
                Theme::error()
            } else {
                Theme::status_bar()
            };
            let right_span = Span::styled(&right, style);
            let right_x = area.x + area.width.saturating_sub(right_width + 2);
            if self.alert || right_x > area.x + line_width + 2 {
                buf.set_span(right_x, area.y, &right_span, right_width);
            }
        }
    }
}

/// Key hints of the dashboard
pub fn dashboard_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("↑/k ↓/j", "Move"),
        ("Space", "Toggle namespace"),
        ("a", "All namespaces"),
        ("r", "Refresh"),
        ("q", "Quit"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(bar: StatusBar, width: u16) -> String {
        let area = Rect::new(0, 0, width, 1);
        let mut buf = Buffer::empty(area);
        bar.render(area, &mut buf);
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_hints_and_right_text() {
        let bar = StatusBar::new().hints([("q", "Quit")]).right("3 pods");
        let text = rendered(bar, 40);
        assert!(text.contains("[q] Quit"));
        assert!(text.trim_end().ends_with("3 pods"));
    }

    #[test]
    fn test_right_text_dropped_when_too_narrow() {
        let bar = StatusBar::new()
            .hints(dashboard_hints())
            .right("right side");
        let text = rendered(bar, 30);
        assert!(!text.contains("right side"));
    }

    #[test]
    fn test_alert_shown_over_hints() {
        let bar = StatusBar::new()
            .hints(dashboard_hints())
            .alert("input error");
        let text = rendered(bar, 30);
        assert!(text.trim_end().ends_with("input error"));
    }
}
