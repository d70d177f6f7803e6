//! # Starwatch Scheduler
//!
//! The star poll cycle. One cycle is:
//!
//! ```text
//! StarScheduler::run_once (in-progress guard)
//!   ├── RepoStore::list_tracked
//!   ├── quota::gate        — remaining ≥ tracked repos, else abort cleanly
//!   ├── batch::run_in_batches
//!   │     └── detect::check_group — concurrent fetch per group, persist deltas
//!   └── fanout::dispatch   — per event, concurrent send per subscriber
//! ```
//!
//! Every failure below `run_once` is terminal at its own scope: a bad repo is
//! skipped, a bad subscriber is skipped, a bad cycle is logged. Nothing is
//! retried inside a cycle; the next tick re-reads fresh state.

pub mod batch;
pub mod detect;
pub mod engine;
pub mod fanout;
pub mod quota;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchSettings, chunk};
pub use detect::{Detection, StarDelta};
pub use engine::{CycleOutcome, CycleReport, StarScheduler};
pub use fanout::FanoutReport;
pub use quota::QuotaGate;
pub use timer::{PeriodicTimer, TickFn, TokioTimer};
