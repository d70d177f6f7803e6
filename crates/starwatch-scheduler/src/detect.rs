//! Delta detection: compare the live star count with the stored one and
//! persist whatever changed.

use futures::future::join_all;
use serde::Serialize;
use starwatch_core::error::Result;
use starwatch_core::traits::{RepoStore, StarSource};
use starwatch_core::types::{StarEvent, TrackedRepo};

/// A star gain ready for fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StarDelta {
    /// Snapshot with the updated star count.
    pub repo: TrackedRepo,
    pub event: StarEvent,
}

/// Outcome of checking a single repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Unchanged,
    Increased(StarDelta),
    /// Persisted silently. Losing stars never notifies anyone.
    Decreased { previous: i64, current: i64 },
}

/// Check one repository.
///
/// - equal counts: no writes
/// - any change: the new count is stored
/// - a gain: a `StarEvent` is appended as well
pub async fn check_repo(
    store: &dyn RepoStore,
    source: &dyn StarSource,
    repo: &TrackedRepo,
) -> Result<Detection> {
    let current = source.fetch_stars(&repo.full_name).await?;
    if current == repo.stars {
        return Ok(Detection::Unchanged);
    }

    store.update_stars(repo.id, current).await?;

    if current < repo.stars {
        tracing::debug!("📉 {} {} → {}", repo.full_name, repo.stars, current);
        return Ok(Detection::Decreased {
            previous: repo.stars,
            current,
        });
    }

    let event = store.record_star_event(repo.id, current, repo.stars).await?;
    tracing::info!("⭐ {} +{} ({} total)", repo.full_name, event.gained(), current);

    let mut snapshot = repo.clone();
    snapshot.stars = current;
    Ok(Detection::Increased(StarDelta {
        repo: snapshot,
        event,
    }))
}

/// Check every repository of a group concurrently.
///
/// Results come back in the same order as `group`. A failing repo is logged
/// and yields an `Err` in its slot; it never aborts its siblings.
pub async fn check_group(
    store: &dyn RepoStore,
    source: &dyn StarSource,
    group: &[TrackedRepo],
) -> Vec<Result<Detection>> {
    let checks = group.iter().map(|repo| async move {
        let result = check_repo(store, source, repo).await;
        if let Err(e) = &result {
            tracing::warn!("⚠️ Star check failed for {}: {e}", repo.full_name);
        }
        result
    });
    join_all(checks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, FakeStore, repo};
    use starwatch_core::error::StarwatchError;

    #[tokio::test]
    async fn test_unchanged_writes_nothing() {
        let store = FakeStore::with_repos(vec![repo(1, "octo/same", 42)]);
        let source = FakeSource::new(60).with_stars("octo/same", 42);

        let detection = check_repo(&store, &source, &repo(1, "octo/same", 42))
            .await
            .unwrap();

        assert_eq!(detection, Detection::Unchanged);
        assert!(store.updates().is_empty());
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_increase_writes_once_and_records_event() {
        let store = FakeStore::with_repos(vec![repo(1, "octo/up", 100)]);
        let source = FakeSource::new(60).with_stars("octo/up", 103);

        let detection = check_repo(&store, &source, &repo(1, "octo/up", 100))
            .await
            .unwrap();

        assert_eq!(store.updates(), vec![(1, 103)]);
        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous, 100);
        assert_eq!(events[0].current, 103);
        assert_eq!(events[0].gained(), 3);

        match detection {
            Detection::Increased(delta) => {
                assert_eq!(delta.repo.stars, 103);
                assert_eq!(delta.event.gained(), 3);
            }
            other => panic!("expected Increased, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decrease_writes_without_event() {
        let store = FakeStore::with_repos(vec![repo(1, "octo/down", 50)]);
        let source = FakeSource::new(60).with_stars("octo/down", 48);

        let detection = check_repo(&store, &source, &repo(1, "octo/down", 50))
            .await
            .unwrap();

        assert_eq!(
            detection,
            Detection::Decreased {
                previous: 50,
                current: 48
            }
        );
        assert_eq!(store.updates(), vec![(1, 48)]);
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_repo_is_a_fetch_failure() {
        let store = FakeStore::with_repos(vec![repo(1, "octo/renamed", 5)]);
        let source = FakeSource::new(60);

        let err = check_repo(&store, &source, &repo(1, "octo/renamed", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StarwatchError::NotFound(_)));
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_group_isolates_failures_and_keeps_order() {
        let repos = vec![
            repo(1, "octo/a", 1),
            repo(2, "octo/gone", 1),
            repo(3, "octo/c", 1),
        ];
        let store = FakeStore::with_repos(repos.clone());
        let source = FakeSource::new(60)
            .with_stars("octo/a", 2)
            .with_stars("octo/c", 4);

        let results = check_group(&store, &source, &repos).await;

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], Ok(Detection::Increased(d)) if d.repo.id == 1));
        assert!(results[1].is_err());
        assert!(matches!(&results[2], Ok(Detection::Increased(d)) if d.repo.id == 3));
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(store.updates(), vec![(1, 2), (3, 4)]);
    }
}
