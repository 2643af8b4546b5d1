//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::instances::render_sparkline;
use crate::app::{App, View};
use crate::data::Severity;
use crate::engine::PublishStatus;

/// Render the header bar with the campaign overview.
///
/// Displays: freshness indicator, instance counts by liveness, executions,
/// crashes, and coverage.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(snapshot) = app.snapshot() else {
        let line = Line::from(vec![
            Span::styled(" FUZZWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Waiting for first cycle..."),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };
    let summary = &snapshot.summary;

    let count = |n: usize, color| {
        if n > 0 {
            Span::styled(n.to_string(), Style::default().fg(color))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        }
    };

    let crashes_style = if summary.total_crashes > 0 {
        Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(" ● ", app.theme.publish_style(app.status())),
        Span::styled("FUZZWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        count(summary.alive, app.theme.healthy),
        Span::raw(" alive "),
        count(summary.starting, app.theme.warning),
        Span::raw(" starting "),
        count(summary.dead, app.theme.critical),
        Span::raw(" dead │ "),
        Span::raw(format!(
            "{} execs {:.0}/s",
            format_count(summary.total_execs),
            summary.total_speed
        )),
        Span::raw(" │ "),
        Span::styled(format!("{} crashes", summary.total_crashes), crashes_style),
        Span::raw(format!(" {} hangs", summary.total_hangs)),
    ];
    if let Some(coverage) = summary.max_coverage {
        spans.push(Span::raw(format!(" │ cov {:.2}%", coverage)));
    }
    let trend = app.history.campaign_sparkline();
    if !trend.is_empty() {
        spans.push(Span::styled(
            format!(" │ {}", render_sparkline(&trend)),
            Style::default().fg(app.theme.highlight),
        ));
    }
    if !snapshot.delta.baseline && snapshot.delta.new_crashes > 0 {
        spans.push(Span::styled(
            format!(" (+{} new)", snapshot.delta.new_crashes),
            Style::default().fg(app.theme.critical),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Format a count for display (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
pub(crate) fn format_count(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.1}G", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Render the tab bar showing available views.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let warnings = app.snapshot().map(|s| s.all_warnings()).unwrap_or_default();
    let worst = warnings.iter().map(|w| w.severity).max();

    let warnings_title = if warnings.is_empty() {
        Line::from(" 2:Warnings ")
    } else {
        Line::from(vec![
            Span::raw(" 2:Warnings "),
            Span::styled(
                format!("({}) ", warnings.len()),
                app.theme.severity_style(worst.unwrap_or(Severity::Info)),
            ),
        ])
    };
    let titles: Vec<Line> = vec![Line::from(" 1:Instances "), warnings_title];

    let selected = match app.current_view {
        View::Instances => 0,
        View::Warnings => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows: campaign root, age of the snapshot, available controls.
/// Also displays temporary status messages and cycle errors.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = if app.filter_active {
        "Type to search | Enter:apply Esc:cancel"
    } else {
        match app.current_view {
            View::Instances => "/:search s:sort S:reverse Tab:switch Enter:detail ?:help q:quit",
            View::Warnings => "/:search Tab:switch Enter:instance ?:help q:quit",
        }
    };

    let published = &app.published;
    let (status, style) = match (published.status(), app.snapshot()) {
        (PublishStatus::Stale, Some(snapshot)) => (
            format!(
                " STALE {} | {} failed cycle(s): {} | {}",
                age(snapshot.timestamp),
                published.consecutive_failures,
                published.last_error.as_deref().unwrap_or("unknown error"),
                controls
            ),
            app.theme.publish_style(PublishStatus::Stale),
        ),
        (_, Some(snapshot)) => {
            let retrying = published
                .last_error
                .as_deref()
                .map(|e| format!(" | retrying: {}", e))
                .unwrap_or_default();
            (
                format!(
                    " {} | Updated {}{} | {}",
                    app.source_description(),
                    age(snapshot.timestamp),
                    retrying,
                    controls
                ),
                Style::default().add_modifier(Modifier::DIM),
            )
        }
        (_, None) => (
            " Waiting for first cycle... | q:quit".to_string(),
            Style::default().add_modifier(Modifier::DIM),
        ),
    };

    frame.render_widget(Paragraph::new(status).style(style), area);
}

fn age(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = chrono::Utc::now() - timestamp;
    format!("{:.1}s ago", elapsed.num_milliseconds().max(0) as f64 / 1000.0)
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  1/2 Tab     Switch views"),
        Line::from("  ↑/↓ j/k     Navigate list"),
        Line::from("  PgUp/PgDn   Jump 10 items"),
        Line::from("  Home/End    Jump to first/last"),
        Line::from("  Enter       Instance detail"),
        Line::from("  Esc         Go back"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Instances & Warnings",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  /         Start filter/search"),
        Line::from("  c         Clear filter"),
        Line::from("  s         Cycle sort column"),
        Line::from("  S         Toggle sort direction"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  r         Reload view"),
        Line::from("  e         Export to JSON"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 24u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
