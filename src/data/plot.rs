//! Historical sample (`plot_data`) parsing.
//!
//! The header names the columns; rows are decoded by column name so that
//! both the classic AFL layout and the AFL++ layout parse.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::status::lines_with_termination;

/// Name of the historical sample file inside an instance directory.
pub const PLOT_FILE: &str = "plot_data";

/// One point of an instance's time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlotSample {
    /// Unix time (classic AFL) or seconds since start (AFL++).
    pub time: u64,
    pub cycles_done: Option<u64>,
    pub corpus_count: Option<u64>,
    pub pending_total: Option<u64>,
    pub pending_favs: Option<u64>,
    /// Coverage percentage.
    pub map_size: Option<f64>,
    pub saved_crashes: Option<u64>,
    pub saved_hangs: Option<u64>,
    pub execs_per_sec: Option<f64>,
    pub total_execs: Option<u64>,
    pub edges_found: Option<u64>,
}

/// Parsed historical samples plus soft warnings.
#[derive(Debug, Clone, Default)]
pub struct PlotData {
    pub samples: Vec<PlotSample>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Time,
    CyclesDone,
    CorpusCount,
    PendingTotal,
    PendingFavs,
    MapSize,
    SavedCrashes,
    SavedHangs,
    ExecsPerSec,
    TotalExecs,
    EdgesFound,
}

fn column_for(name: &str) -> Option<Column> {
    let column = match name {
        "unix_time" | "relative_time" => Column::Time,
        "cycles_done" => Column::CyclesDone,
        "paths_total" | "corpus_count" => Column::CorpusCount,
        "pending_total" => Column::PendingTotal,
        "pending_favs" => Column::PendingFavs,
        "map_size" => Column::MapSize,
        "unique_crashes" | "saved_crashes" => Column::SavedCrashes,
        "unique_hangs" | "saved_hangs" => Column::SavedHangs,
        "execs_per_sec" => Column::ExecsPerSec,
        "total_execs" => Column::TotalExecs,
        "edges_found" => Column::EdgesFound,
        _ => return None,
    };
    Some(column)
}

/// Read a historical sample file, keeping at most `max_points` newest rows.
///
/// A missing file is not an error: it yields no samples and no warnings.
pub fn parse_plot_file(path: &Path, max_points: usize) -> PlotData {
    match fs::read(path) {
        Ok(bytes) => parse_plot_str(&String::from_utf8_lossy(&bytes), max_points),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PlotData::default(),
        Err(e) => PlotData {
            samples: Vec::new(),
            warnings: vec![format!("plot data unreadable: {}", e)],
        },
    }
}

/// Parse historical sample content.
pub fn parse_plot_str(content: &str, max_points: usize) -> PlotData {
    let mut warnings = Vec::new();
    let mut samples: VecDeque<PlotSample> = VecDeque::new();
    let mut header: Option<Vec<Option<Column>>> = None;

    for (index, line, terminated) in lines_with_termination(content) {
        let line = line.trim();
        // A last line without a newline is still being appended
        if !terminated || line.is_empty() {
            continue;
        }

        if header.is_none() {
            let names = line.trim_start_matches('#').split(',').map(str::trim);
            let columns: Vec<Option<Column>> = names.map(column_for).collect();
            if !columns.iter().any(|c| matches!(c, Some(Column::Time))) {
                warnings.push("plot data header has no time column".to_string());
                return PlotData {
                    samples: Vec::new(),
                    warnings,
                };
            }
            header = Some(columns);
            continue;
        }
        let columns = header.as_deref().unwrap_or_default();

        // Later comment lines are ignored
        if line.starts_with('#') {
            continue;
        }

        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() != columns.len() {
            warnings.push(format!(
                "line {}: expected {} columns, found {}",
                index + 1,
                columns.len(),
                values.len()
            ));
            continue;
        }

        match decode_row(columns, &values) {
            Some(sample) => {
                samples.push_back(sample);
                if samples.len() > max_points {
                    samples.pop_front();
                }
            }
            None => warnings.push(format!("line {}: invalid time value", index + 1)),
        }
    }

    PlotData {
        samples: samples.into(),
        warnings,
    }
}

fn decode_row(columns: &[Option<Column>], values: &[&str]) -> Option<PlotSample> {
    let mut sample = PlotSample::default();
    let mut has_time = false;

    for (column, text) in columns.iter().zip(values) {
        let Some(column) = column else {
            continue;
        };
        let int = || text.parse::<u64>().ok();
        let float = || {
            text.trim_end_matches('%').trim().parse::<f64>().ok().filter(|v| v.is_finite())
        };
        match column {
            Column::Time => {
                sample.time = int()?;
                has_time = true;
            }
            Column::CyclesDone => sample.cycles_done = int(),
            Column::CorpusCount => sample.corpus_count = int(),
            Column::PendingTotal => sample.pending_total = int(),
            Column::PendingFavs => sample.pending_favs = int(),
            Column::MapSize => sample.map_size = float(),
            Column::SavedCrashes => sample.saved_crashes = int(),
            Column::SavedHangs => sample.saved_hangs = int(),
            Column::ExecsPerSec => sample.execs_per_sec = float(),
            Column::TotalExecs => sample.total_execs = int(),
            Column::EdgesFound => sample.edges_found = int(),
        }
    }

    has_time.then_some(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AFLPP: &str = "# relative_time, cycles_done, cur_item, corpus_count, pending_total, pending_favs, map_size, saved_crashes, saved_hangs, max_depth, execs_per_sec, total_execs, edges_found, total_crashes, servers_count\n\
        0, 0, 0, 50, 100, 50, 5.00%, 0, 0, 3, 512.40, 0, 1000, 0, 4\n\
        60, 0, 5, 53, 99, 50, 5.30%, 1, 0, 3, 498.10, 50000, 1040, 1, 4\n";

    #[test]
    fn test_parses_aflpp_layout() {
        let data = parse_plot_str(AFLPP, 1000);
        assert!(data.warnings.is_empty());
        assert_eq!(data.samples.len(), 2);
        let last = &data.samples[1];
        assert_eq!(last.time, 60);
        assert_eq!(last.corpus_count, Some(53));
        assert_eq!(last.map_size, Some(5.3));
        assert_eq!(last.saved_crashes, Some(1));
        assert_eq!(last.total_execs, Some(50000));
    }

    #[test]
    fn test_parses_classic_layout_by_name() {
        let content = "# unix_time, cycles_done, cur_path, paths_total, pending_total, pending_favs, map_size, unique_crashes, unique_hangs, max_depth, execs_per_sec\n\
            1700000000, 1, 2, 40, 10, 2, 12.50%, 3, 1, 4, 800.00\n";
        let data = parse_plot_str(content, 1000);
        assert_eq!(data.samples.len(), 1);
        let sample = &data.samples[0];
        assert_eq!(sample.time, 1_700_000_000);
        assert_eq!(sample.corpus_count, Some(40));
        assert_eq!(sample.saved_crashes, Some(3));
        assert_eq!(sample.saved_hangs, Some(1));
        assert_eq!(sample.total_execs, None);
    }

    #[test]
    fn test_column_mismatch_skipped_with_warning() {
        let content = "# relative_time, execs_per_sec\n10, 100.0\n20\n30, 120.0\n";
        let data = parse_plot_str(content, 1000);
        assert_eq!(data.samples.len(), 2);
        assert_eq!(data.warnings.len(), 1);
        assert!(data.warnings[0].starts_with("line 3"));
    }

    #[test]
    fn test_truncated_last_row_dropped_silently() {
        let content = "# relative_time, execs_per_sec\n10, 100.0\n20, 1";
        let data = parse_plot_str(content, 1000);
        // "20, 1" may be the start of "20, 150.0"
        assert_eq!(data.samples.len(), 1);
        assert!(data.warnings.is_empty());

        let content = "# relative_time, execs_per_sec, total_execs\n10, 100.0, 5\n20, 1";
        let data = parse_plot_str(content, 1000);
        assert_eq!(data.samples.len(), 1);
        assert!(data.warnings.is_empty());
    }

    #[test]
    fn test_keeps_newest_points() {
        let mut content = String::from("# relative_time, execs_per_sec\n");
        for i in 0..10 {
            content.push_str(&format!("{}, 1.0\n", i));
        }
        let data = parse_plot_str(&content, 3);
        let times: Vec<u64> = data.samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![7, 8, 9]);
    }

    #[test]
    fn test_header_without_time_column() {
        let data = parse_plot_str("# a, b\n1, 2\n", 1000);
        assert!(data.samples.is_empty());
        assert_eq!(data.warnings.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let data = parse_plot_file(Path::new("/nonexistent/plot_data"), 10);
        assert!(data.samples.is_empty());
        assert!(data.warnings.is_empty());
    }
}
