//! Quota gate: one API call is reserved per tracked repo before a cycle
//! starts. Over-reserving is preferred to getting throttled mid-cycle.

use starwatch_core::error::Result;
use starwatch_core::traits::StarSource;
use starwatch_core::types::Quota;

/// Result of comparing the remaining budget with the work ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaGate {
    Proceed(Quota),
    Insufficient { quota: Quota, needed: usize },
}

/// Read the remaining call budget.
pub async fn check_quota(source: &dyn StarSource) -> Result<Quota> {
    source.rate_limit().await
}

/// Decide whether `needed` calls fit into `quota`.
pub fn evaluate(quota: Quota, needed: usize) -> QuotaGate {
    if quota.covers(needed) {
        QuotaGate::Proceed(quota)
    } else {
        QuotaGate::Insufficient { quota, needed }
    }
}

/// Check the quota and evaluate it against `needed` calls.
pub async fn gate(source: &dyn StarSource, needed: usize) -> Result<QuotaGate> {
    let quota = check_quota(source).await?;
    Ok(evaluate(quota, needed))
}
