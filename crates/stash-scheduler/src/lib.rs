//! Proactive cache refresh for stash.
//!
//! The [`Refresher`] re-fetches a single stored entry through the
//! [`FetcherRegistry`]; the [`Scheduler`] drives it over batches of entries,
//! on cron triggers or on demand.

pub mod refresher;
pub mod registry;
pub mod scheduler;
pub mod triggers;

pub use refresher::{Refresher, reconstruct_dimensions};
pub use registry::{FetcherRegistry, RegisteredFetcher};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, SweepSummary};
pub use triggers::{SweepConfig, SweepKind, Trigger, default_sweeps};
