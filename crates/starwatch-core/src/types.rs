//! Domain types shared across crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository being watched for new stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepo {
    pub id: i64,
    /// Short display name (`ripgrep`).
    pub name: String,
    /// External reference used against the GitHub API (`BurntSushi/ripgrep`).
    pub full_name: String,
    /// Last known stargazer count.
    pub stars: i64,
    pub last_checked: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl TrackedRepo {
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}", self.full_name)
    }
}

/// A recorded star gain. Append-only history, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarEvent {
    pub id: i64,
    pub repo_id: i64,
    pub previous: i64,
    pub current: i64,
    pub created_at: DateTime<Utc>,
}

impl StarEvent {
    /// Stars gained between the two checks.
    pub fn gained(&self) -> i64 {
        self.current - self.previous
    }
}

/// Remaining external-call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub remaining: u64,
    pub limit: u64,
    pub reset_at: DateTime<Utc>,
}

impl Quota {
    /// True when at least `needed` calls can still be made.
    pub fn covers(&self, needed: usize) -> bool {
        self.remaining >= needed as u64
    }
}

/// Repository metadata as resolved from the external API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub stargazers_count: i64,
    #[serde(default)]
    pub archived: bool,
}
