//! # Starwatch Core
//!
//! Shared building blocks for every Starwatch crate:
//! - `config` — TOML configuration with environment overrides
//! - `error` — the workspace-wide error type
//! - `types` — tracked repositories, star events, quota snapshots
//! - `traits` — the collaborator seams consumed by the poller
//!
//! ## Architecture
//! ```text
//! starwatch (binary)
//!   ├── starwatch-scheduler  — poll cycle: quota → batches → deltas → fan-out
//!   ├── starwatch-github     — StarSource + RepoResolver (GitHub REST)
//!   ├── starwatch-store      — RepoStore + SubscriptionStore (SQLite)
//!   ├── starwatch-channels   — Notifier (Telegram), templates, bot commands
//!   └── starwatch-gateway    — /health, /api/v1/status, /api/v1/check
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::StarwatchConfig;
pub use error::{Result, StarwatchError};
pub use traits::{Notifier, RepoResolver, RepoStore, StarSource, SubscriptionStore};
pub use types::{Quota, RepoInfo, StarEvent, TrackedRepo};
