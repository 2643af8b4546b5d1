//! Consumers of the published campaign snapshot.
//!
//! Every presentation surface reads the same [`Published`] value through a
//! [`SnapshotHandle`](crate::engine::SnapshotHandle). None of them can change
//! it; they only render it somewhere.

mod export;
mod report;
pub mod server;

pub use export::{CampaignDocument, DocumentMetadata, InstanceEntry, JsonExport};
pub use report::{render_report, TextReport};
pub use server::ApiServer;

use std::fmt::Debug;

use crate::engine::Published;

/// A read-only surface fed with each published view.
///
/// # Example
///
/// ```
/// use fuzzwatch::{Published, SnapshotConsumer};
///
/// #[derive(Debug, Default)]
/// struct CrashCounter(u64);
///
/// impl SnapshotConsumer for CrashCounter {
///     fn name(&self) -> &str {
///         "crash-counter"
///     }
///
///     fn consume(&mut self, published: &Published) -> anyhow::Result<()> {
///         if let Some(snapshot) = &published.snapshot {
///             self.0 = snapshot.summary.total_crashes;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait SnapshotConsumer: Send + Debug {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Render or store the published view.
    fn consume(&mut self, published: &Published) -> anyhow::Result<()>;
}
