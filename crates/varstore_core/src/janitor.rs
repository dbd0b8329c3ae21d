//! Periodic removal of expired records.
//!
//! Records in the reserved namespace hold an expiry timestamp in
//! milliseconds, either as the value itself or as the `expiresAt` field of
//! a map. The janitor removes every record whose expiry has passed and
//! drops collections left empty.

use crate::clock::unix_millis;
use crate::error::{CoreError, CoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use varstore_codec::Value;
use varstore_storage::DocumentStore;

/// Default sweep interval (two hours).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(7_200_000);

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Collections visited.
    pub collections: usize,
    /// Records removed.
    pub removed: u64,
    /// Collections dropped because they became empty.
    pub dropped: usize,
    /// The sweep stopped early on cancellation.
    pub interrupted: bool,
}

/// Reads the expiry timestamp of a record value.
pub fn expiry_of(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.get("expiresAt").and_then(Value::as_f64))
}

/// Sweeps one namespace.
///
/// A record expires when its expiry is strictly less than `now_ms`.
/// Records without a numeric expiry are kept. Cancellation is checked
/// between collections.
pub async fn sweep_namespace(
    store: &dyn DocumentStore,
    namespace: &str,
    now_ms: i64,
    cancel: &CancellationToken,
) -> CoreResult<SweepReport> {
    let mut report = SweepReport::default();
    let now = now_ms as f64;

    for collection in store.list_collections(namespace).await? {
        if cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }
        report.collections += 1;

        let expired: Vec<_> = store
            .scan(namespace, &collection)
            .await?
            .into_iter()
            .filter(|doc| expiry_of(&doc.value).is_some_and(|at| at < now))
            .map(|doc| doc.id)
            .collect();

        if !expired.is_empty() {
            report.removed += store.delete_ids(namespace, &collection, &expired).await?;
        }
        if store.count(namespace, &collection).await? == 0
            && store.drop_collection(namespace, &collection).await?
        {
            report.dropped += 1;
        }
        debug!(
            namespace,
            collection = %collection,
            expired = expired.len(),
            "swept collection"
        );
    }

    Ok(report)
}

/// Janitor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JanitorState {
    /// Waiting for the next tick.
    Idle,
    /// A sweep is running.
    Sweeping,
    /// The task has exited.
    Stopped,
}

/// Observable janitor status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JanitorStatus {
    /// Current state.
    pub state: JanitorState,
    /// Sweeps completed, failed ones included.
    pub sweeps: u64,
    /// Report of the last successful sweep.
    pub last: Option<SweepReport>,
}

/// Removes expired records from a namespace.
#[derive(Clone)]
pub struct Janitor {
    store: Arc<dyn DocumentStore>,
    namespace: String,
    interval: Duration,
}

impl std::fmt::Debug for Janitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Janitor")
            .field("namespace", &self.namespace)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Janitor {
    /// Creates a janitor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if `interval` is zero.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: impl Into<String>,
        interval: Duration,
    ) -> CoreResult<Self> {
        if interval.is_zero() {
            return Err(CoreError::config("cleanup interval must be positive"));
        }
        Ok(Self {
            store,
            namespace: namespace.into(),
            interval,
        })
    }

    /// Returns the swept namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep against `now_ms`.
    pub async fn sweep(&self, now_ms: i64) -> CoreResult<SweepReport> {
        sweep_namespace(
            self.store.as_ref(),
            &self.namespace,
            now_ms,
            &CancellationToken::new(),
        )
        .await
    }

    /// Starts the periodic sweep task.
    ///
    /// The first sweep runs one interval after the start. The task stops
    /// when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JanitorHandle {
        let (status, receiver) = watch::channel(JanitorStatus {
            state: JanitorState::Idle,
            sweeps: 0,
            last: None,
        });
        let task = tokio::spawn(self.run(status, cancel.clone()));
        JanitorHandle {
            status: receiver,
            cancel,
            task,
        }
    }

    async fn run(self, status: watch::Sender<JanitorStatus>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(
            namespace = %self.namespace,
            interval_ms = self.interval.as_millis() as u64,
            "janitor started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    status.send_modify(|s| s.state = JanitorState::Sweeping);
                    let result = sweep_namespace(
                        self.store.as_ref(),
                        &self.namespace,
                        unix_millis(),
                        &cancel,
                    )
                    .await;

                    let last = match result {
                        Ok(report) => {
                            info!(
                                namespace = %self.namespace,
                                removed = report.removed,
                                dropped = report.dropped,
                                "sweep finished"
                            );
                            Some(report)
                        }
                        Err(e) => {
                            warn!(namespace = %self.namespace, error = %e, "sweep failed");
                            None
                        }
                    };
                    status.send_modify(|s| {
                        s.state = JanitorState::Idle;
                        s.sweeps += 1;
                        if last.is_some() {
                            s.last = last;
                        }
                    });
                }
            }
        }

        status.send_modify(|s| s.state = JanitorState::Stopped);
        info!(namespace = %self.namespace, "janitor stopped");
    }
}

/// Handle to a running janitor task.
#[derive(Debug)]
pub struct JanitorHandle {
    status: watch::Receiver<JanitorStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Returns the current state.
    pub fn state(&self) -> JanitorState {
        self.status.borrow().state
    }

    /// Returns a snapshot of the status.
    pub fn status(&self) -> JanitorStatus {
        self.status.borrow().clone()
    }

    /// Returns a receiver that observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<JanitorStatus> {
        self.status.clone()
    }

    /// Waits until at least `count` sweeps have completed.
    ///
    /// Returns the status at that point, or `None` if the task stopped
    /// first.
    pub async fn wait_for_sweeps(&self, count: u64) -> Option<JanitorStatus> {
        let mut receiver = self.status.clone();
        let status = receiver
            .wait_for(|s| s.sweeps >= count || s.state == JanitorState::Stopped)
            .await
            .ok()?
            .clone();
        (status.sweeps >= count).then_some(status)
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(self) -> CoreResult<()> {
        self.cancel.cancel();
        self.task.await?;
        Ok(())
    }
}
