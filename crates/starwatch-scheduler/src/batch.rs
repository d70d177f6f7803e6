//! Batching: bounds burst concurrency against the GitHub API.
//! Groups run one after another with a fixed pause between them; work inside
//! a group runs concurrently.

use std::future::Future;
use std::time::Duration;

use starwatch_core::config::PollerConfig;

/// Group size and inter-group pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub size: usize,
    pub delay: Duration,
}

impl BatchSettings {
    pub fn from_config(config: &PollerConfig) -> Self {
        Self {
            size: config.batch_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 10,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Split `items` into ordered groups of `size`. The last group may be shorter.
/// A size of zero is treated as one.
pub fn chunk<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Run `per_group` over each group in order, sleeping `settings.delay`
/// between groups (never after the last). Group N+1 starts only after
/// group N's future resolves. Results are concatenated in group order.
pub async fn run_in_batches<'a, T, R, F, Fut>(
    items: &'a [T],
    settings: &BatchSettings,
    mut per_group: F,
) -> Vec<R>
where
    F: FnMut(usize, &'a [T]) -> Fut,
    Fut: Future<Output = Vec<R>>,
{
    let groups = chunk(items, settings.size);
    let total = groups.len();
    let mut results = Vec::with_capacity(items.len());

    for (index, group) in groups.into_iter().enumerate() {
        if index > 0 && !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
        tracing::debug!("📦 Batch {}/{} ({} repos)", index + 1, total, group.len());
        results.extend(per_group(index, group).await);
    }

    results
}
