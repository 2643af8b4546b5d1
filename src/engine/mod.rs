//! The polling engine: discovery, per-instance builds, deltas, notification
//! and publication of campaign snapshots.

mod builder;
pub mod delta;
mod discovery;
pub mod notify;
mod published;
mod scheduler;
pub mod store;

pub use builder::InstanceBuilder;
pub use delta::{DeltaReport, DeltaTracker, InstanceCounters, PreviousCycleState};
pub use discovery::{discover, list_candidates, qualifies, CampaignRoot, DiscoveryMode, InstanceDir};
pub use notify::{HookOutcome, NotificationHook};
pub use published::{PublishStatus, Published, SnapshotHandle};
pub use scheduler::{PollScheduler, SchedulerBuilder, SchedulerHandle, StopHandle};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
