//! In-memory collaborators for scheduler tests.

use async_trait::async_trait;
use chrono::Utc;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{Notifier, RepoStore, StarSource};
use starwatch_core::types::{Quota, StarEvent, TrackedRepo};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

pub fn repo(id: i64, full_name: &str, stars: i64) -> TrackedRepo {
    TrackedRepo {
        id,
        name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
        full_name: full_name.to_string(),
        stars,
        last_checked: None,
        archived: false,
    }
}

#[derive(Default)]
pub struct FakeStore {
    repos: Vec<TrackedRepo>,
    subscribers: HashMap<i64, Vec<i64>>,
    updates: Mutex<Vec<(i64, i64)>>,
    events: Mutex<Vec<StarEvent>>,
    fail_listing: AtomicBool,
    fail_subscribers_for: HashSet<i64>,
}

impl FakeStore {
    pub fn with_repos(repos: Vec<TrackedRepo>) -> Self {
        Self {
            repos,
            ..Default::default()
        }
    }

    pub fn subscribe(mut self, repo_id: i64, chat_ids: &[i64]) -> Self {
        self.subscribers.insert(repo_id, chat_ids.to_vec());
        self
    }

    pub fn failing_subscribers(mut self, repo_id: i64) -> Self {
        self.fail_subscribers_for.insert(repo_id);
        self
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(i64, i64)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<StarEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoStore for FakeStore {
    async fn list_tracked(&self) -> Result<Vec<TrackedRepo>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StarwatchError::Store("connection refused".into()));
        }
        Ok(self.repos.iter().filter(|r| !r.archived).cloned().collect())
    }

    async fn update_stars(&self, repo_id: i64, stars: i64) -> Result<()> {
        if !self.repos.iter().any(|r| r.id == repo_id) {
            return Err(StarwatchError::NotFound(format!("repo {repo_id}")));
        }
        self.updates.lock().unwrap().push((repo_id, stars));
        Ok(())
    }

    async fn record_star_event(
        &self,
        repo_id: i64,
        current: i64,
        previous: i64,
    ) -> Result<StarEvent> {
        let mut events = self.events.lock().unwrap();
        let event = StarEvent {
            id: events.len() as i64 + 1,
            repo_id,
            previous,
            current,
            created_at: Utc::now(),
        };
        events.push(event.clone());
        Ok(event)
    }

    async fn list_subscribers(&self, repo_id: i64) -> Result<Vec<i64>> {
        if self.fail_subscribers_for.contains(&repo_id) {
            return Err(StarwatchError::Store("subscriber lookup failed".into()));
        }
        Ok(self.subscribers.get(&repo_id).cloned().unwrap_or_default())
    }
}

pub struct FakeSource {
    stars: HashMap<String, i64>,
    remaining: u64,
    fetches: AtomicUsize,
    quota_checks: AtomicUsize,
    hold: bool,
    pub entered: Notify,
    pub release: Notify,
}

impl FakeSource {
    pub fn new(remaining: u64) -> Self {
        Self {
            stars: HashMap::new(),
            remaining,
            fetches: AtomicUsize::new(0),
            quota_checks: AtomicUsize::new(0),
            hold: false,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn with_stars(mut self, full_name: &str, stars: i64) -> Self {
        self.stars.insert(full_name.to_string(), stars);
        self
    }

    /// Block every fetch until `release` is notified.
    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn quota_checks(&self) -> usize {
        self.quota_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StarSource for FakeSource {
    async fn fetch_stars(&self, full_name: &str) -> Result<i64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            self.entered.notify_one();
            self.release.notified().await;
        }
        // yield so sibling fetches in a group genuinely interleave
        tokio::task::yield_now().await;
        self.stars
            .get(full_name)
            .copied()
            .ok_or_else(|| StarwatchError::NotFound(full_name.to_string()))
    }

    async fn rate_limit(&self) -> Result<Quota> {
        self.quota_checks.fetch_add(1, Ordering::SeqCst);
        Ok(Quota {
            remaining: self.remaining,
            limit: 5000,
            reset_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentAlert {
    pub subscriber: i64,
    pub name: String,
    pub full_name: String,
    pub gained: i64,
    pub total: i64,
}

#[derive(Default)]
pub struct FakeNotifier {
    fail_for: HashSet<i64>,
    sent: Mutex<Vec<SentAlert>>,
    attempts: AtomicUsize,
}

impl FakeNotifier {
    pub fn failing_for(chat_ids: &[i64]) -> Self {
        Self {
            fail_for: chat_ids.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_star_alert(
        &self,
        subscriber: i64,
        name: &str,
        full_name: &str,
        gained: i64,
        total: i64,
    ) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_for.contains(&subscriber) {
            return Err(StarwatchError::Channel("Forbidden: bot was blocked by the user".into()));
        }
        self.sent.lock().unwrap().push(SentAlert {
            subscriber,
            name: name.to_string(),
            full_name: full_name.to_string(),
            gained,
            total,
        });
        Ok(())
    }
}
