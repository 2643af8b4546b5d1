use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::Severity;

/// Render the warnings view as a table, most severe first.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(snapshot) = app.snapshot() else {
        return;
    };

    let total = snapshot.all_warnings().len();
    if total == 0 {
        render_healthy_message(frame, app, area);
        return;
    }

    let warnings = app.visible_warnings();

    let critical_count = warnings.iter().filter(|w| w.severity == Severity::Critical).count();
    let warn_count = warnings.iter().filter(|w| w.severity == Severity::Warn).count();

    let header = Row::new(vec![
        Cell::from("Level"),
        Cell::from("Scope"),
        Cell::from("Kind"),
        Cell::from("Message"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = warnings
        .iter()
        .map(|w| {
            let severity_style = app.theme.severity_style(w.severity);
            let scope = match &w.instance {
                Some(id) => Cell::from(id.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
                None => Cell::from("campaign").style(Style::default().add_modifier(Modifier::ITALIC)),
            };

            Row::new(vec![
                Cell::from(w.severity.symbol()).style(severity_style),
                scope,
                Cell::from(w.kind.label()).style(Style::default().add_modifier(Modifier::DIM)),
                Cell::from(w.message.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(6),  // Level
        Constraint::Fill(2),    // Scope
        Constraint::Length(20), // Kind
        Constraint::Fill(5),    // Message
    ];

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !warnings.is_empty() {
        format!(" [{}/{}]", app.selected_warning_index + 1, warnings.len())
    } else {
        String::new()
    };

    let title = format!(
        " Warnings ({} crit, {} warn){}{} ",
        critical_count, warn_count, filter_info, position_info
    );

    let border_color = if critical_count > 0 {
        app.theme.critical
    } else if warn_count > 0 {
        app.theme.warning
    } else {
        app.theme.border
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(border_color)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(
        app.selected_warning_index.min(warnings.len().saturating_sub(1)),
    ));

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_healthy_message(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Warnings ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.healthy));

    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(vec![
            Span::styled("    ✓ ", Style::default().fg(app.theme.healthy)),
            Span::styled(
                "Campaign looks healthy!",
                Style::default().fg(app.theme.healthy).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "      No instance or campaign warnings this cycle.",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}
