//! Scheduler engine: owns the recurring timer and the in-progress guard,
//! and runs quota gate → batches → delta detection → fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use starwatch_core::config::MAX_INTERVAL_MINUTES;
use starwatch_core::error::Result;
use starwatch_core::traits::{Notifier, RepoStore, StarSource};

use crate::batch::{self, BatchSettings};
use crate::detect::{self, Detection};
use crate::fanout::{self, FanoutReport};
use crate::quota::{self, QuotaGate};
use crate::timer::{PeriodicTimer, TickFn, TokioTimer};

/// Counters for a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tracked: usize,
    pub groups: usize,
    pub unchanged: usize,
    pub increased: usize,
    pub decreased: usize,
    pub failed: usize,
    pub notifications: FanoutReport,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            tracked: 0,
            groups: 0,
            unchanged: 0,
            increased: 0,
            decreased: 0,
            failed: 0,
            notifications: FanoutReport::default(),
        }
    }
}

/// What a call to `run_once` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle was already running.
    Skipped,
    /// Not enough API budget for one call per tracked repo.
    QuotaExhausted {
        remaining: u64,
        needed: usize,
        reset_at: DateTime<Utc>,
    },
    Completed(CycleReport),
    Failed { error: String },
}

/// Releases the in-progress flag on every exit path, unwinding included.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The star poller.
pub struct StarScheduler {
    store: Arc<dyn RepoStore>,
    source: Arc<dyn StarSource>,
    notifier: Arc<dyn Notifier>,
    batch: BatchSettings,
    running: AtomicBool,
    timer: Box<dyn PeriodicTimer>,
    last_outcome: Mutex<Option<CycleOutcome>>,
}

impl StarScheduler {
    pub fn new(
        store: Arc<dyn RepoStore>,
        source: Arc<dyn StarSource>,
        notifier: Arc<dyn Notifier>,
        batch: BatchSettings,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            batch,
            running: AtomicBool::new(false),
            timer: Box::new(TokioTimer::new()),
            last_outcome: Mutex::new(None),
        }
    }

    /// Replace the default tokio timer.
    pub fn with_timer(mut self, timer: Box<dyn PeriodicTimer>) -> Self {
        self.timer = timer;
        self
    }

    /// Run a cycle every `interval_minutes`. The first run happens after one
    /// full interval. Ticks hold only a weak reference to the scheduler.
    pub fn start_recurring(self: &Arc<Self>, interval_minutes: u64) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let on_tick: TickFn = Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.run_once().await;
                }
            }
            .boxed()
        });

        let minutes = interval_minutes.clamp(1, MAX_INTERVAL_MINUTES);
        if minutes != interval_minutes {
            tracing::warn!("⚠️ Interval {interval_minutes} min out of range, using {minutes}");
        }
        self.timer.arm_periodic(Duration::from_secs(minutes * 60), on_tick);
        tracing::info!("⏰ Star poller armed (every {minutes} min)");
    }

    /// Stop future ticks. A cycle already running finishes normally.
    pub fn stop_recurring(&self) {
        self.timer.disarm();
        tracing::info!("⏹️ Star poller disarmed");
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Outcome of the most recent cycle that actually ran.
    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run one cycle and wait for it. Never returns an error: overlapping
    /// calls are skipped and cycle failures are logged and reported.
    pub async fn run_once(&self) -> CycleOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            tracing::info!("⏳ Star check already in progress, skipping");
            return CycleOutcome::Skipped;
        };

        let outcome = match self.run_cycle().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("❌ Star check cycle failed: {e}");
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        *self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
        outcome
    }

    async fn run_cycle(&self) -> Result<CycleOutcome> {
        let started_at = Utc::now();
        let clock = std::time::Instant::now();

        let repos = self.store.list_tracked().await?;
        let mut report = CycleReport::empty(started_at);
        report.tracked = repos.len();
        if repos.is_empty() {
            tracing::info!("🔍 No tracked repositories, nothing to check");
            return Ok(CycleOutcome::Completed(report));
        }

        match quota::gate(self.source.as_ref(), repos.len()).await? {
            QuotaGate::Insufficient { quota, needed } => {
                tracing::warn!(
                    "🚦 Skipping star check: {} API calls left, {} needed (resets {})",
                    quota.remaining,
                    needed,
                    quota.reset_at.to_rfc3339()
                );
                return Ok(CycleOutcome::QuotaExhausted {
                    remaining: quota.remaining,
                    needed,
                    reset_at: quota.reset_at,
                });
            }
            QuotaGate::Proceed(quota) => {
                tracing::info!(
                    "🔍 Checking {} repositories ({}/{} API calls left)",
                    repos.len(),
                    quota.remaining,
                    quota.limit
                );
            }
        }

        report.groups = batch::chunk(&repos, self.batch.size).len();
        let store = self.store.as_ref();
        let source = self.source.as_ref();
        let results = batch::run_in_batches(&repos, &self.batch, |_, group| {
            detect::check_group(store, source, group)
        })
        .await;

        let mut deltas = Vec::new();
        for result in results {
            match result {
                Ok(Detection::Unchanged) => report.unchanged += 1,
                Ok(Detection::Decreased { .. }) => report.decreased += 1,
                Ok(Detection::Increased(delta)) => {
                    report.increased += 1;
                    deltas.push(delta);
                }
                Err(_) => report.failed += 1,
            }
        }

        report.notifications =
            fanout::dispatch(self.store.as_ref(), self.notifier.as_ref(), &deltas).await;
        report.duration_ms = clock.elapsed().as_millis() as u64;

        tracing::info!(
            "✅ Star check done in {}ms: {} up, {} down, {} same, {} failed; {} alerts sent, {} failed",
            report.duration_ms,
            report.increased,
            report.decreased,
            report.unchanged,
            report.failed,
            report.notifications.delivered,
            report.notifications.failed
        );

        Ok(CycleOutcome::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNotifier, FakeSource, FakeStore, repo};

    fn scheduler(
        store: Arc<FakeStore>,
        source: Arc<FakeSource>,
        notifier: Arc<FakeNotifier>,
    ) -> StarScheduler {
        StarScheduler::new(
            store,
            source,
            notifier,
            BatchSettings {
                size: 10,
                delay: Duration::ZERO,
            },
        )
    }

    fn completed(outcome: CycleOutcome) -> CycleReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_star_gain() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/alpha", 100)]).subscribe(1, &[11, 22]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/alpha", 103));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store.clone(), source.clone(), notifier.clone());

        let report = completed(sched.run_once().await);

        assert_eq!(store.updates(), vec![(1, 103)]);
        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].previous, events[0].current, events[0].gained()), (100, 103, 3));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        for alert in &sent {
            assert_eq!(alert.full_name, "octo/alpha");
            assert_eq!(alert.gained, 3);
            assert_eq!(alert.total, 103);
        }
        let mut chats: Vec<i64> = sent.iter().map(|a| a.subscriber).collect();
        chats.sort();
        assert_eq!(chats, vec![11, 22]);

        assert_eq!(report.increased, 1);
        assert_eq!(report.notifications.delivered, 2);
        assert_eq!(sched.last_outcome(), Some(CycleOutcome::Completed(report)));
    }

    #[tokio::test]
    async fn test_mixed_deltas() {
        let store = Arc::new(
            FakeStore::with_repos(vec![
                repo(1, "octo/same", 10),
                repo(2, "octo/up", 10),
                repo(3, "octo/down", 10),
            ])
            .subscribe(1, &[1])
            .subscribe(2, &[1])
            .subscribe(3, &[1]),
        );
        let source = Arc::new(
            FakeSource::new(60)
                .with_stars("octo/same", 10)
                .with_stars("octo/up", 15)
                .with_stars("octo/down", 7),
        );
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store.clone(), source, notifier.clone());

        let report = completed(sched.run_once().await);

        assert_eq!((report.unchanged, report.increased, report.decreased), (1, 1, 1));
        assert_eq!(store.updates(), vec![(2, 15), (3, 7)]);
        assert_eq!(store.events().len(), 1);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].full_name, "octo/up");
    }

    #[tokio::test]
    async fn test_quota_gate_blocks_all_fetches() {
        let repos: Vec<_> = (1..=6).map(|i| repo(i, &format!("octo/r{i}"), 0)).collect();
        let store = Arc::new(FakeStore::with_repos(repos));
        let source = Arc::new(FakeSource::new(5));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store.clone(), source.clone(), notifier);

        let outcome = sched.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::QuotaExhausted { remaining: 5, needed: 6, .. }
        ));
        assert_eq!(source.fetch_count(), 0);
        assert!(store.updates().is_empty());
        assert!(!sched.is_running());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/slow", 1)]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/slow", 2).holding());
        let notifier = Arc::new(FakeNotifier::default());
        let sched = Arc::new(scheduler(store.clone(), source.clone(), notifier));

        let first = tokio::spawn({
            let sched = sched.clone();
            async move { sched.run_once().await }
        });
        source.entered.notified().await;
        assert!(sched.is_running());

        let second = sched.run_once().await;
        assert_eq!(second, CycleOutcome::Skipped);
        assert_eq!(source.fetch_count(), 1);
        assert!(store.updates().is_empty());

        source.release.notify_one();
        let report = completed(first.await.unwrap());
        assert_eq!(report.increased, 1);
        assert!(!sched.is_running());
        assert_eq!(store.updates(), vec![(1, 2)]);
    }

    #[tokio::test]
    async fn test_cycle_failure_is_contained_and_guard_released() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/a", 1)]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/a", 1));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store.clone(), source.clone(), notifier);

        store.set_fail_listing(true);
        let outcome = sched.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Failed { ref error } if error.contains("connection refused")));
        assert!(!sched.is_running());

        store.set_fail_listing(false);
        let report = completed(sched.run_once().await);
        assert_eq!(report.unchanged, 1);
        assert_eq!(source.fetch_count(), 1);
    }

    /// Panics inside the quota check the first time, then behaves.
    #[derive(Default)]
    struct PanicOnceSource {
        panicked: AtomicBool,
    }

    #[async_trait::async_trait]
    impl StarSource for PanicOnceSource {
        async fn fetch_stars(&self, _full_name: &str) -> Result<i64> {
            Ok(5)
        }

        async fn rate_limit(&self) -> Result<starwatch_core::types::Quota> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("rate limit handler blew up");
            }
            Ok(starwatch_core::types::Quota {
                remaining: 60,
                limit: 60,
                reset_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_releases_guard() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/a", 5)]));
        let source = Arc::new(PanicOnceSource::default());
        let notifier = Arc::new(FakeNotifier::default());
        let sched = Arc::new(StarScheduler::new(
            store,
            source,
            notifier,
            BatchSettings {
                size: 10,
                delay: Duration::ZERO,
            },
        ));

        let task = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.run_once().await })
        };
        let joined = task.await;
        assert!(joined.unwrap_err().is_panic());
        assert!(!sched.is_running());

        let report = completed(sched.run_once().await);
        assert_eq!(report.tracked, 1);
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_failed_repo_does_not_abort_cycle() {
        let store = Arc::new(FakeStore::with_repos(vec![
            repo(1, "octo/gone", 5),
            repo(2, "octo/ok", 5),
        ]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/ok", 6));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store.clone(), source, notifier);

        let report = completed(sched.run_once().await);
        assert_eq!(report.failed, 1);
        assert_eq!(report.increased, 1);
        assert_eq!(store.updates(), vec![(2, 6)]);
    }

    #[tokio::test]
    async fn test_empty_repo_set_skips_quota_check() {
        let store = Arc::new(FakeStore::default());
        let source = Arc::new(FakeSource::new(0));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = scheduler(store, source.clone(), notifier);

        let report = completed(sched.run_once().await);
        assert_eq!(report.tracked, 0);
        assert_eq!(source.quota_checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_repo_order_across_groups() {
        let repos: Vec<_> = (1..=25).map(|i| repo(i, &format!("octo/r{i}"), 0)).collect();
        let mut source = FakeSource::new(100);
        for i in 1..=25 {
            source = source.with_stars(&format!("octo/r{i}"), i);
        }
        let store = Arc::new(FakeStore::with_repos(repos));
        let source = Arc::new(source);
        let notifier = Arc::new(FakeNotifier::default());
        let sched = StarScheduler::new(
            store.clone(),
            source,
            notifier,
            BatchSettings {
                size: 10,
                delay: Duration::from_secs(1),
            },
        );

        let started = tokio::time::Instant::now();
        let report = completed(sched.run_once().await);

        assert_eq!(report.groups, 3);
        assert_eq!(report.increased, 25);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        let order: Vec<i64> = store.events().iter().map(|e| e.repo_id).collect();
        assert_eq!(order, (1..=25).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_ticks_run_cycles() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/tick", 0)]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/tick", 0));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = Arc::new(scheduler(store, source.clone(), notifier));

        sched.start_recurring(5);
        assert!(sched.is_armed());

        tokio::time::sleep(Duration::from_secs(5 * 60 * 2 + 1)).await;
        assert_eq!(source.fetch_count(), 2);

        sched.stop_recurring();
        assert!(!sched.is_armed());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_is_clamped() {
        let store = Arc::new(FakeStore::with_repos(vec![repo(1, "octo/slow", 0)]));
        let source = Arc::new(FakeSource::new(60).with_stars("octo/slow", 0));
        let notifier = Arc::new(FakeNotifier::default());
        let sched = Arc::new(scheduler(store, source.clone(), notifier));

        sched.start_recurring(u64::MAX);
        assert!(sched.is_armed());

        tokio::time::sleep(Duration::from_secs(MAX_INTERVAL_MINUTES * 60 + 1)).await;
        assert_eq!(source.fetch_count(), 1);
        sched.stop_recurring();
    }
}
