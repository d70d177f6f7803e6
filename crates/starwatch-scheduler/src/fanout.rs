//! Fan-out: deliver each star gain to every subscriber of the repo.
//! Events go out one after another; subscribers of one event are served
//! concurrently and independently. Best effort: no retries, no replay.

use futures::future::join_all;
use serde::Serialize;
use starwatch_core::error::Result;
use starwatch_core::traits::{Notifier, RepoStore};

use crate::detect::StarDelta;

/// Delivery counters for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub events: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Events skipped because their subscriber list could not be read.
    pub lookup_failures: usize,
}

/// Deliver every delta, in order.
pub async fn dispatch(
    store: &dyn RepoStore,
    notifier: &dyn Notifier,
    deltas: &[StarDelta],
) -> FanoutReport {
    let mut report = FanoutReport {
        events: deltas.len(),
        ..Default::default()
    };

    for delta in deltas {
        let subscribers = match store.list_subscribers(delta.repo.id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Subscriber lookup failed for {}: {e}",
                    delta.repo.full_name
                );
                report.lookup_failures += 1;
                continue;
            }
        };

        for (_, result) in deliver(notifier, delta, &subscribers).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }
    }

    report
}

/// Send one alert per subscriber concurrently. One result per subscriber,
/// in subscriber order; a failure is logged and left in its slot.
pub async fn deliver(
    notifier: &dyn Notifier,
    delta: &StarDelta,
    subscribers: &[i64],
) -> Vec<(i64, Result<()>)> {
    let gained = delta.event.gained();
    let total = delta.event.current;

    let sends = subscribers.iter().map(|&chat_id| async move {
        let result = notifier
            .send_star_alert(chat_id, &delta.repo.name, &delta.repo.full_name, gained, total)
            .await;
        if let Err(e) = &result {
            tracing::warn!(
                "⚠️ Alert for {} to chat {chat_id} failed: {e}",
                delta.repo.full_name
            );
        }
        (chat_id, result)
    });

    let results = join_all(sends).await;
    tracing::debug!(
        "📣 {} → {}/{} subscribers",
        delta.repo.full_name,
        results.iter().filter(|(_, r)| r.is_ok()).count(),
        results.len()
    );
    results
}
