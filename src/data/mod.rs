//! Data models for instance status and campaign aggregation.
//!
//! ## Submodules
//!
//! - [`status`]: Tolerant parsing of `fuzzer_stats` into raw and typed records
//! - [`plot`]: Header-driven parsing of `plot_data` time series
//! - [`campaign`]: Instance and campaign snapshots, and aggregation
//! - [`health`]: Warning rules and their thresholds
//! - [`history`]: Snapshot history for sparklines and rates
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! fuzzer_stats ──▶ parse_status_file() ──▶ TypedStatusRecord ─┐
//! plot_data    ──▶ parse_plot_file()   ──▶ Vec<PlotSample>  ──┼──▶ InstanceSnapshot
//!                                                             │
//!                        aggregate() ◀────────────────────────┘
//!                             │
//!                             ├──▶ CampaignSummary
//!                             └──▶ WarningRecord (from Thresholds)
//! ```

pub mod campaign;
pub mod duration;
pub mod health;
pub mod history;
pub mod plot;
pub mod status;

pub use campaign::{
    aggregate, summarize, CampaignSnapshot, CampaignSummary, DataHealth, InstanceSnapshot,
};
pub use health::{Severity, Thresholds, WarningKind, WarningRecord};
pub use history::History;
pub use plot::{parse_plot_file, PlotSample};
pub use status::{
    parse_status_file, FieldValue, ParsedStatus, RawStatusRecord, TypedStatusRecord,
    DEFAULT_REQUIRED_FIELDS, STATUS_FILE,
};
