//! Store health probing.

use std::time::{Duration, Instant};
use varstore_storage::{DocumentStore, StorageResult};

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// The store answered in time.
    pub reachable: bool,
    /// Round-trip time, or time waited before giving up.
    pub latency: Duration,
    /// Failure description when unreachable.
    pub error: Option<String>,
}

/// Times one store round trip.
pub async fn round_trip(store: &dyn DocumentStore) -> StorageResult<Duration> {
    let started = Instant::now();
    store.ping().await?;
    Ok(started.elapsed())
}

/// Probes a store. Never fails; problems are reported in the result.
pub async fn probe(store: &dyn DocumentStore, timeout: Duration) -> HealthReport {
    let started = Instant::now();
    match tokio::time::timeout(timeout, round_trip(store)).await {
        Ok(Ok(latency)) => HealthReport {
            reachable: true,
            latency,
            error: None,
        },
        Ok(Err(e)) => HealthReport {
            reachable: false,
            latency: started.elapsed(),
            error: Some(e.to_string()),
        },
        Err(_) => HealthReport {
            reachable: false,
            latency: started.elapsed(),
            error: Some(format!("no answer within {timeout:?}")),
        },
    }
}
