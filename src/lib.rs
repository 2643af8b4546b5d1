//! # fuzzwatch
//!
//! A monitor and TUI for AFL/AFL++ fuzzing campaigns.
//!
//! fuzzwatch reads what running fuzzers already write to disk (each
//! instance's `fuzzer_stats` and `plot_data`), checks whether their processes
//! are alive, and publishes one consistent campaign snapshot per poll cycle.
//! It never writes into the campaign directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          PollScheduler                           │
//! │  discover ──▶ InstanceBuilder (per instance, bounded) ──▶ aggregate │
//! │                    │                                  │          │
//! │                 probe                             DeltaTracker   │
//! │           (liveness, resources)               (StateStore, hook) │
//! └───────────────────────────┬──────────────────────────────────────┘
//!                             ▼
//!                      SnapshotHandle (Published)
//!                             │
//!        ┌───────────┬────────┴────────┬──────────────┐
//!        ▼           ▼                 ▼              ▼
//!       App      TextReport        JsonExport     ApiServer
//! ```
//!
//! - **[`data`]**: Status and plot parsing, instance and campaign snapshots,
//!   aggregation, warning rules, and history for sparklines
//! - **[`probe`]**: Process liveness and resource sampling
//! - **[`engine`]**: Discovery, per-instance building, delta tracking,
//!   notifications, and the poll scheduler that publishes snapshots
//! - **[`consumer`]**: Read-only surfaces over the published view
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The interactive terminal UI
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a campaign in the terminal UI
//! fuzzwatch /path/to/afl/output
//!
//! # Print one report and exit
//! fuzzwatch --once /path/to/afl/output
//!
//! # Run without a UI, serving JSON and rewriting an export file
//! fuzzwatch --headless --serve 127.0.0.1:8080 --json campaign.json /path/to/afl/output
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use fuzzwatch::{PollScheduler, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None)?;
//! let mut scheduler = PollScheduler::builder("/path/to/afl/output")
//!     .settings(&settings)
//!     .build();
//!
//! let snapshot = scheduler.run_once().await?;
//! println!("{} crashes", snapshot.summary.total_crashes);
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```
//!
//! ### Running in the background
//!
//! ```no_run
//! use fuzzwatch::PollScheduler;
//!
//! # tokio_test::block_on(async {
//! let running = PollScheduler::builder("/path/to/afl/output").build().start();
//! let snapshots = running.snapshots();
//! let mut cycles = snapshots.subscribe();
//!
//! cycles.changed().await?;
//! if let Some(snapshot) = snapshots.snapshot() {
//!     println!("{} instances alive", snapshot.summary.alive);
//! }
//! running.shutdown().await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

pub mod app;
pub mod consumer;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod probe;
pub mod settings;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use consumer::{ApiServer, CampaignDocument, JsonExport, SnapshotConsumer, TextReport};
pub use data::{
    CampaignSnapshot, CampaignSummary, DataHealth, InstanceSnapshot, Severity, Thresholds,
    WarningKind, WarningRecord,
};
pub use engine::{
    PollScheduler, PublishStatus, Published, SchedulerBuilder, SchedulerHandle, SnapshotHandle,
};
pub use error::{MonitorError, StatusError, StoreError};
pub use probe::Liveness;
pub use settings::Settings;
