//! Collaborator seams. The poller only ever talks to these traits, so each
//! backend (SQLite, GitHub, Telegram) can be swapped for an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Quota, RepoInfo, StarEvent, TrackedRepo};

/// Persistent state read and written by the poll cycle.
#[async_trait]
pub trait RepoStore: Send + Sync {
    /// All repositories that are not archived.
    async fn list_tracked(&self) -> Result<Vec<TrackedRepo>>;

    /// Store a new star count and stamp the check time.
    /// Fails with `NotFound` when the repository does not exist.
    async fn update_stars(&self, repo_id: i64, stars: i64) -> Result<()>;

    /// Append a star gain to the history.
    async fn record_star_event(&self, repo_id: i64, current: i64, previous: i64)
    -> Result<StarEvent>;

    /// Chat ids subscribed to a repository.
    async fn list_subscribers(&self, repo_id: i64) -> Result<Vec<i64>>;
}

/// Source of current star counts and the call budget.
#[async_trait]
pub trait StarSource: Send + Sync {
    /// Current stargazer count for `owner/name`.
    /// Fails with `NotFound`, `RateLimited` or `Transient`.
    async fn fetch_stars(&self, full_name: &str) -> Result<i64>;

    /// Remaining call budget. Does not consume quota.
    async fn rate_limit(&self) -> Result<Quota>;
}

/// Outbound star alerts. A failed send is never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_star_alert(
        &self,
        subscriber: i64,
        name: &str,
        full_name: &str,
        gained: i64,
        total: i64,
    ) -> Result<()>;
}

/// Resolves user input into repository metadata.
#[async_trait]
pub trait RepoResolver: Send + Sync {
    async fn resolve(&self, full_name: &str) -> Result<RepoInfo>;
}

/// Subscription management used by bot commands.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn add_subscriber(&self, chat_id: i64, username: Option<&str>) -> Result<()>;

    /// Insert or refresh a repository row. Un-archives an existing row.
    async fn upsert_repo(&self, info: &RepoInfo) -> Result<TrackedRepo>;

    /// Returns `true` when the subscription is new.
    async fn subscribe(&self, chat_id: i64, repo_id: i64) -> Result<bool>;

    /// Returns `true` when a subscription was removed.
    async fn unsubscribe(&self, chat_id: i64, full_name: &str) -> Result<bool>;

    async fn list_subscriptions(&self, chat_id: i64) -> Result<Vec<TrackedRepo>>;
}
