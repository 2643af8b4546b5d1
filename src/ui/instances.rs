//! Instances view rendering.
//!
//! Displays a table of all instances with liveness, execution progress,
//! coverage, findings, and sparkline trends.

use std::cmp::Ordering;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use super::common::format_count;
use crate::app::App;
use crate::data::InstanceSnapshot;

/// Sparkline characters (8 levels of height).
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Column to sort by in the Instances view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    /// Sort by instance id alphabetically.
    #[default]
    Name,
    /// Sort by liveness.
    State,
    /// Sort by total executions.
    Execs,
    /// Sort by reported executions per second.
    Speed,
    /// Sort by bitmap coverage.
    Coverage,
    /// Sort by saved crashes.
    Crashes,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Name => SortColumn::State,
            SortColumn::State => SortColumn::Execs,
            SortColumn::Execs => SortColumn::Speed,
            SortColumn::Speed => SortColumn::Coverage,
            SortColumn::Coverage => SortColumn::Crashes,
            SortColumn::Crashes => SortColumn::Name,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::State => "state",
            SortColumn::Execs => "execs",
            SortColumn::Speed => "speed",
            SortColumn::Coverage => "coverage",
            SortColumn::Crashes => "crashes",
        }
    }
}

/// Render the Instances view as a sortable table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(snapshot) = app.snapshot() else {
        return;
    };
    let instances = app.visible_instances();

    let header = Row::new(vec![
        Cell::from(format_header("Instance", SortColumn::Name, app)),
        Cell::from(format_header("State", SortColumn::State, app)),
        Cell::from(format_header("Execs", SortColumn::Execs, app)),
        Cell::from(format_header("Exec/s", SortColumn::Speed, app)),
        Cell::from(format_header("Cov", SortColumn::Coverage, app)),
        Cell::from(format_header("Crashes", SortColumn::Crashes, app)),
        Cell::from("Hangs"),
        Cell::from("Stab"),
        Cell::from("Trend"),
        Cell::from("Health"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = instances
        .iter()
        .map(|instance| {
            let mut state = instance.liveness.label().to_string();
            if instance.data_health.is_degraded() {
                state.push('*');
            }

            // Observed rate between the last two cycles, else what AFL reports
            let rate = app
                .history
                .exec_rate(&instance.id)
                .or(instance.speed())
                .map(|r| format!("{:.0}", r))
                .unwrap_or_else(|| "-".to_string());

            let crashes_style = match instance.crashes() {
                Some(n) if n > 0 => Style::default()
                    .fg(app.theme.critical)
                    .add_modifier(Modifier::BOLD),
                _ => Style::default(),
            };

            let (health, health_style) = match instance.worst_severity() {
                Some(severity) => (severity.symbol(), app.theme.severity_style(severity)),
                None => ("OK", Style::default().fg(app.theme.healthy)),
            };

            Row::new(vec![
                Cell::from(instance.id.clone()),
                Cell::from(state).style(app.theme.liveness_style(instance.liveness)),
                Cell::from(instance.execs().map(format_count).unwrap_or_else(|| "-".to_string())),
                Cell::from(rate),
                Cell::from(percent(instance.coverage())),
                Cell::from(instance.crashes().map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()))
                    .style(crashes_style),
                Cell::from(instance.hangs().map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())),
                Cell::from(percent(instance.stability())),
                Cell::from(render_sparkline(&app.history.execs_sparkline(&instance.id))),
                Cell::from(health).style(health_style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(3), // Instance
        Constraint::Min(9),  // State
        Constraint::Fill(1), // Execs
        Constraint::Fill(1), // Exec/s
        Constraint::Fill(1), // Coverage
        Constraint::Fill(1), // Crashes
        Constraint::Fill(1), // Hangs
        Constraint::Fill(1), // Stability
        Constraint::Min(8),  // Trend
        Constraint::Min(6),  // Health
    ];

    let selected_visual_index = app.selected_instance_index.min(instances.len().saturating_sub(1));
    let sort_dir = if app.sort_ascending { "↑" } else { "↓" };

    let filter_info = if app.filter_active {
        format!(" /{}_", app.filter_text)
    } else if !app.filter_text.is_empty() {
        format!(" /{}/ [c:clear]", app.filter_text)
    } else {
        String::new()
    };

    let position_info = if !instances.is_empty() {
        format!(" [{}/{}]", selected_visual_index + 1, instances.len())
    } else {
        String::new()
    };

    let title = format!(
        " Instances ({}/{}) [s:sort {}{}]{}{} ",
        instances.len(),
        snapshot.instances.len(),
        app.sort_column.label(),
        sort_dir,
        filter_info,
        position_info
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(selected_visual_index));

    frame.render_stateful_widget(table, area, &mut state);
}

fn format_header(name: &str, col: SortColumn, app: &App) -> Span<'static> {
    if app.sort_column == col {
        let arrow = if app.sort_ascending { "↑" } else { "↓" };
        Span::raw(format!("{}{}", name, arrow))
    } else {
        Span::raw(name.to_string())
    }
}

/// Sort instances by the given column and direction.
pub fn sort_instances_by(instances: &mut [&InstanceSnapshot], column: SortColumn, ascending: bool) {
    instances.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Name => a.id.cmp(&b.id),
            SortColumn::State => a.liveness.cmp(&b.liveness),
            SortColumn::Execs => a.execs().cmp(&b.execs()),
            SortColumn::Speed => cmp_f64(a.speed(), b.speed()),
            SortColumn::Coverage => cmp_f64(a.coverage(), b.coverage()),
            SortColumn::Crashes => a.crashes().cmp(&b.crashes()),
        };

        let primary = if ascending {
            primary
        } else {
            primary.reverse()
        };

        // Secondary sort by id for stability when primary values are equal
        if primary == Ordering::Equal {
            a.id.cmp(&b.id)
        } else {
            primary
        }
    });
}

/// Missing values sort below every present value.
fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v))
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn render_sparkline(data: &[u8]) -> String {
    if data.is_empty() {
        return "        ".to_string(); // 8 spaces placeholder
    }

    // Take last 8 values
    let values: Vec<u8> = data.iter().rev().take(8).rev().copied().collect();

    values.iter().map(|&v| SPARKLINE_CHARS[v.min(7) as usize]).collect()
}
