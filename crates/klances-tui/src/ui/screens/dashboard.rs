use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Row, Table},
};

use klances_state::ResourceHealth;

use crate::{
    render::DashboardView,
    ui::{
        Layout, Theme,
        components::{StatusBar, dashboard_hints, panel_block},
    },
};

const NOT_AVAILABLE: &str = "-";

/// The single dashboard screen: nodes, namespaces, pods and logs
pub struct DashboardScreen;

impl DashboardScreen {
    pub fn render(frame: &mut Frame, view: &DashboardView) {
        let (header_area, content_area, status_area) = Layout::main(frame.area());
        let areas = Layout::dashboard(content_area);

        Self::render_header(frame, header_area, view);
        Self::render_nodes(frame, areas.nodes, view);
        Self::render_namespaces(frame, areas.namespaces, view);
        Self::render_pods(frame, areas.pods, view);
        Self::render_logs(frame, areas.logs, view);
        Self::render_status_bar(frame, status_area, view);
    }

    fn render_header(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let context = if view.context.is_empty() {
            "unknown"
        } else {
            view.context.as_str()
        };

        let title = Line::from(vec![
            Span::styled("klances", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(context, Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(view.pods_summary(), Theme::text()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_nodes(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let nodes = view.snapshot.nodes();
        let rows = nodes.iter().map(|node| {
            Row::new(vec![
                node.name.clone(),
                or_dash(node.address.as_deref()),
                or_dash(node.cpu_capacity.as_deref()),
                or_dash(node.memory_capacity.as_deref()),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(25),
                Constraint::Percentage(10),
                Constraint::Percentage(25),
            ],
        )
        .header(Row::new(vec!["NAME", "ADDRESS", "CPU", "MEMORY"]).style(Theme::header_row()))
        .block(panel_block(
            "Nodes",
            format!("({})", nodes.len()),
            &view.snapshot.staleness().nodes,
        ));

        frame.render_widget(table, area);
    }

    fn render_namespaces(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let namespaces = view.snapshot.namespaces();
        let items: Vec<ListItem> = namespaces
            .iter()
            .map(|ns| {
                let selected = view.selection.contains(&ns.name);
                let (marker, style) = if selected {
                    ("[x] ", Theme::list_item_current())
                } else {
                    ("[ ] ", Theme::namespace_phase(ns.phase))
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(format!("{} ({})", ns.name, ns.phase.as_str()), style),
                ]))
            })
            .collect();

        let detail = if view.selection.is_empty() {
            format!("({}, showing all)", namespaces.len())
        } else {
            format!("({}, {} selected)", namespaces.len(), view.selection.len())
        };

        let list = List::new(items)
            .block(panel_block(
                "Namespaces",
                detail,
                &view.snapshot.staleness().namespaces,
            ))
            .highlight_style(Theme::list_item_selected());

        let mut state = ListState::default();
        if !namespaces.is_empty() {
            state.select(Some(view.cursor.min(namespaces.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_pods(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let rows = view.pods.iter().map(|pod| {
            Row::new(vec![
                Span::raw(pod.name.clone()),
                Span::raw(pod.namespace.clone()),
                Span::raw(or_dash(pod.ip.as_deref())),
                Span::styled(pod.phase.as_str(), Theme::pod_phase(pod.phase)),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(25),
                Constraint::Percentage(20),
                Constraint::Percentage(15),
            ],
        )
        .header(Row::new(vec!["NAME", "NAMESPACE", "IP", "PHASE"]).style(Theme::header_row()))
        .block(panel_block(
            "Pods",
            view.pods_summary(),
            &view.snapshot.staleness().pods,
        ));

        frame.render_widget(table, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let mut lines: Vec<Line> = view
            .faults
            .iter()
            .map(|(pod, fault)| {
                Line::styled(
                    format!("{}: {} (retry {})", pod.name, fault.error, fault.retries),
                    Theme::error(),
                )
            })
            .collect();

        let visible = area.height.saturating_sub(2) as usize;
        let merged = view.merged_logs();
        let skip = merged.len().saturating_sub(visible.saturating_sub(lines.len()));
        lines.extend(merged.into_iter().skip(skip).map(|(pod, line)| {
            Line::from(vec![
                Span::styled(
                    line.received_at
                        .with_timezone(&Local)
                        .format("%H:%M:%S ")
                        .to_string(),
                    Theme::text_dim(),
                ),
                Span::styled(format!("{} ", pod.name), Theme::text_highlight()),
                Span::styled(line.text.clone(), Theme::text()),
            ])
        }));

        let no_faults = ResourceHealth::default();
        let paragraph = Paragraph::new(lines).block(panel_block(
            "Logs",
            format!("({} lines)", view.total_log_lines()),
            &no_faults,
        ));

        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, view: &DashboardView) {
        let focused = view
            .focused_namespace()
            .map(|ns| format!("focus: {}", ns))
            .unwrap_or_default();

        let status = StatusBar::new().hints(dashboard_hints());
        let status = match &view.notice {
            Some(notice) => status.alert(notice.as_str()),
            None => status.right(focused),
        };

        frame.render_widget(status, area);
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}
