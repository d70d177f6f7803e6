//! Periodic timer seam. The engine only needs "call me every N" and "stop";
//! tests drive `run_once` directly instead of waiting on a clock.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Callback fired on every tick. Each invocation runs on its own task, so
/// disarming the timer never cancels a tick already in flight.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub trait PeriodicTimer: Send + Sync {
    /// Fire `on_tick` every `every`, first after one full period.
    /// Re-arming replaces the previous schedule.
    fn arm_periodic(&self, every: Duration, on_tick: TickFn);

    fn disarm(&self);

    fn is_armed(&self) -> bool;
}

/// `tokio::time::interval` backed timer. Must be armed inside a runtime.
#[derive(Default)]
pub struct TokioTimer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PeriodicTimer for TokioTimer {
    fn arm_periodic(&self, every: Duration, on_tick: TickFn) {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            // a slow cycle must not cause a burst of catch-up ticks
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tokio::spawn(on_tick());
            }
        });
        *slot = Some(handle);
    }

    fn disarm(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }

    fn is_armed(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
