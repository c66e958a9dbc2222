use inference_common::summary::{Breakdown, SummaryView, EMPTY_MESSAGE};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table},
    Frame,
};

use crate::connection::Connectivity;
use crate::tui::app::DashboardState;

const CLASS_NAME_WIDTH: u16 = 12;

pub fn draw(f: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(4), // Session
            Constraint::Min(8),    // Summary
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, state, chunks[0]);
    draw_session(f, state, chunks[1]);
    draw_summary(f, state, chunks[2]);
    draw_footer(f, state, chunks[3]);
}

fn draw_header(f: &mut Frame, state: &DashboardState, area: Rect) {
    let (status, status_color) = match state.connectivity {
        Connectivity::Connected => ("● Connected", Color::Green),
        Connectivity::Disconnected => ("● Disconnected", Color::Red),
    };
    let capture = if state.is_capturing() { "CAPTURING" } else { "STOPPED" };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" Live Classification ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("| "),
        Span::styled(status, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(capture, Style::default().fg(Color::Cyan)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_session(f: &mut Frame, state: &DashboardState, area: Rect) {
    let last = state
        .last_result_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let text = vec![
        Line::from(format!(
            "  Server: {}  Source: {}  Session: {}",
            state.endpoint, state.source, state.session_id
        )),
        Line::from(format!(
            "  Pacing: {}  Sent: {}  Results: {}  Stale: {}  Last result: {}",
            state.pacing_label(),
            state.stats.frames_sent,
            state.stats.results_received,
            state.stats.stale_results,
            last
        )),
    ];
    let borders = Borders::LEFT | Borders::RIGHT | Borders::BOTTOM;
    let session = Paragraph::new(text).block(Block::default().borders(borders));
    f.render_widget(session, area);
}

fn draw_summary(f: &mut Frame, state: &DashboardState, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Detection Results");
    match &state.summary {
        None => {
            let waiting = Paragraph::new("  Waiting for the first result...").block(block);
            f.render_widget(waiting, area);
        }
        Some(SummaryView::Error(message)) => {
            let error = Paragraph::new(Span::styled(
                format!("  Error: {message}"),
                Style::default().fg(Color::Red),
            ))
            .block(block);
            f.render_widget(error, area);
        }
        Some(SummaryView::Empty) => {
            f.render_widget(Paragraph::new(format!("  {EMPTY_MESSAGE}")).block(block), area)
        }
        Some(SummaryView::Breakdown(breakdown)) => {
            let inner = block.inner(area);
            f.render_widget(block, area);
            draw_breakdown(f, breakdown, inner);
        }
    }
}

fn draw_breakdown(f: &mut Frame, breakdown: &Breakdown, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    draw_class_bars(f, breakdown, chunks[0]);
    draw_top_detections(f, breakdown, chunks[1]);
}

fn draw_class_bars(f: &mut Frame, breakdown: &Breakdown, area: Rect) {
    let mut constraints = vec![Constraint::Length(1); breakdown.classes.len() + 1];
    constraints.push(Constraint::Min(0));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let total = Paragraph::new(format!(" Total objects: {}", breakdown.total_objects))
        .style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(total, rows[0]);

    for (row, area) in breakdown.classes.iter().zip(rows.iter().skip(1)) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(CLASS_NAME_WIDTH + 1), Constraint::Min(10)])
            .split(*area);
        let [r, g, b] = row.color;
        f.render_widget(Paragraph::new(format!(" {}", row.class_name)), cols[0]);
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Rgb(r, g, b)))
            .percent(row.bar_percent.min(100) as u16)
            .label(row.count_label());
        f.render_widget(gauge, cols[1]);
    }
}

fn draw_top_detections(f: &mut Frame, breakdown: &Breakdown, area: Rect) {
    let header = Row::new(vec!["#", "Class", "Confidence"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = breakdown.top_detections.iter().map(|det| {
        Row::new(vec![
            Cell::from(det.rank.to_string()),
            Cell::from(det.class_name.clone()),
            Cell::from(det.confidence.clone()),
        ])
    });
    let table = Table::new(
        rows,
        [Constraint::Length(3), Constraint::Min(10), Constraint::Length(11)],
    )
    .header(header)
    .block(Block::default().borders(Borders::LEFT).title(" Top Detections"));
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, state: &DashboardState, area: Rect) {
    let toggle = if state.is_capturing() { "top" } else { "tart" };
    let footer = Paragraph::new(Line::from(vec![
        Span::styled("[S]", Style::default().fg(Color::Yellow)),
        Span::raw(toggle),
        Span::raw("  "),
        Span::styled("[Q/Esc]", Style::default().fg(Color::Red)),
        Span::raw("uit"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
