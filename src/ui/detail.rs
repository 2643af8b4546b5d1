//! Detail overlay rendering.
//!
//! Displays a modal overlay with everything known about the selected
//! instance: liveness, progress, resources, warnings, and the raw status
//! fields.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::common::format_count;
use crate::app::App;
use crate::data::duration::format_span;
use crate::data::{DataHealth, FieldValue, InstanceSnapshot};

/// Minimum width required for the detail overlay to render properly.
const MIN_OVERLAY_WIDTH: u16 = 50;
/// Minimum height required for the detail overlay to render properly.
const MIN_OVERLAY_HEIGHT: u16 = 16;

/// Render the instance detail as a modal overlay.
pub fn render_overlay(frame: &mut Frame, app: &App, area: Rect) {
    if area.width < MIN_OVERLAY_WIDTH || area.height < MIN_OVERLAY_HEIGHT {
        return;
    }

    let Some(instance) = app.selected_instance() else {
        return;
    };

    // Width: 95% of screen, clamped to [MIN_OVERLAY_WIDTH, 100]
    let overlay_width = (area.width * 95 / 100).clamp(MIN_OVERLAY_WIDTH, 100);
    // Height: 90% of screen, clamped to [MIN_OVERLAY_HEIGHT, 50]
    let overlay_height = (area.height * 90 / 100).clamp(MIN_OVERLAY_HEIGHT, 50);

    let x = area.x + (area.width.saturating_sub(overlay_width)) / 2;
    let y = area.y + (area.height.saturating_sub(overlay_height)) / 2;
    let overlay_area = Rect::new(x, y, overlay_width, overlay_height);

    frame.render_widget(Clear, overlay_area);

    let chunks = Layout::vertical([
        Constraint::Length(7), // Header with instance info
        Constraint::Min(8),    // Warnings and fields
        Constraint::Length(1), // Footer
    ])
    .split(overlay_area);

    // ===== HEADER SECTION =====
    let header_block = Block::default()
        .title(" Instance Detail ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let header = Paragraph::new(header_lines(app, instance)).block(header_block);
    frame.render_widget(header, chunks[0]);

    // ===== CONTENT SECTION =====
    let content_chunks = Layout::vertical([
        Constraint::Percentage(35), // Warnings
        Constraint::Percentage(65), // Fields
    ])
    .split(chunks[1]);

    let mut warning_lines: Vec<Line> = instance
        .warnings
        .iter()
        .map(|w| {
            Line::from(vec![
                Span::styled(format!(" {} ", w.severity.symbol()), app.theme.severity_style(w.severity)),
                Span::raw(w.message.clone()),
            ])
        })
        .collect();
    warning_lines.extend(instance.parse_warnings.iter().map(|w| {
        Line::from(Span::styled(
            format!(" parse: {}", w),
            Style::default().add_modifier(Modifier::DIM),
        ))
    }));
    if warning_lines.is_empty() {
        warning_lines.push(Line::from(Span::styled(
            "  No warnings",
            Style::default().add_modifier(Modifier::DIM),
        )));
    }

    let warnings = Paragraph::new(warning_lines).block(
        Block::default()
            .title(format!(" Warnings ({}) ", instance.warnings.len()))
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border)),
    );
    frame.render_widget(warnings, content_chunks[0]);

    let field_rows: Vec<Row> = instance
        .record
        .fields
        .iter()
        .map(|(name, value)| {
            let style = match value {
                FieldValue::Unparsed(_) => Style::default().fg(app.theme.warning),
                _ => Style::default(),
            };
            Row::new(vec![Cell::from(name.clone()), Cell::from(format_value(value)).style(style)])
        })
        .collect();

    let fields = Table::new(field_rows, [Constraint::Length(22), Constraint::Fill(1)])
        .header(
            Row::new(vec![Cell::from("Field"), Cell::from("Value")])
                .height(1)
                .style(app.theme.header),
        )
        .block(
            Block::default()
                .title(format!(" Status Fields ({}) ", instance.record.fields.len()))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        );
    frame.render_widget(fields, content_chunks[1]);

    // ===== FOOTER =====
    let footer = Paragraph::new(Line::from(vec![Span::styled(
        " Press Esc to close ",
        Style::default().add_modifier(Modifier::DIM),
    )]));
    frame.render_widget(footer, chunks[2]);
}

fn header_lines<'a>(app: &App, instance: &'a InstanceSnapshot) -> Vec<Line<'a>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut title = vec![Span::styled(format!(" {} ", instance.id), bold)];
    if let Some(banner) = instance.banner() {
        title.push(Span::styled(
            format!("({}) ", banner),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    title.push(Span::styled(
        instance.dir.display().to_string(),
        Style::default().add_modifier(Modifier::DIM),
    ));

    let health = match instance.data_health {
        DataHealth::Complete => "complete",
        DataHealth::Incomplete => "incomplete",
        DataHealth::Unreadable => "unreadable",
    };

    let resources = match instance.resources {
        Some(usage) => format!(
            "{:.1}% CPU, {} RSS ({:.1}%)",
            usage.cpu_percent,
            format_bytes(usage.memory_bytes),
            usage.memory_percent
        ),
        None => "-".to_string(),
    };

    vec![
        Line::from(title),
        Line::from(""),
        Line::from(vec![
            Span::raw(" State: "),
            Span::styled(
                instance.liveness.label(),
                app.theme.liveness_style(instance.liveness).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "    PID: {}",
                instance.pid().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
            )),
            Span::raw(format!("    Data: {}", health)),
            Span::raw(format!(
                "    Up: {}",
                instance.run_time().map(format_span).unwrap_or_else(|| "-".to_string())
            )),
        ]),
        Line::from(vec![
            Span::raw(" Execs: "),
            Span::styled(
                instance.execs().map(format_count).unwrap_or_else(|| "-".to_string()),
                bold,
            ),
            Span::raw(format!(
                "    Speed: {}/s",
                instance.speed().map(|s| format!("{:.1}", s)).unwrap_or_else(|| "-".to_string())
            )),
            Span::raw(format!(
                "    Crashes: {}  Hangs: {}",
                instance.crashes().map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                instance.hangs().map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
            )),
        ]),
        Line::from(vec![
            Span::raw(format!(" Resources: {}", resources)),
            Span::raw(format!("    Plot samples: {}", instance.plot.len())),
        ]),
    ]
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Float(v) => format!("{:.2}", v),
        FieldValue::Percent(v) => format!("{:.2}%", v),
        FieldValue::Duration(d) => format_span(*d),
        FieldValue::Text(s) => s.clone(),
        FieldValue::Unparsed(s) => format!("{} (invalid)", s),
    }
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= 1024.0 * MIB {
        format!("{:.1} GiB", bytes as f64 / (1024.0 * MIB))
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&FieldValue::Percent(45.2)), "45.20%");
        assert_eq!(format_value(&FieldValue::Duration(Duration::from_secs(125))), "2 minutes, 5 seconds");
        assert_eq!(format_value(&FieldValue::Unparsed("fast".into())), "fast (invalid)");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512 * 1024 * 1024), "512.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
