//! Delayed command payloads.
//!
//! A timeout is a record in the `timeouts` collection of the reserved
//! namespace. Its key is a random id and its value a map holding the due
//! time in milliseconds (`dueAt`), the command name and an arbitrary
//! payload. The due time is not an `expiresAt` field, so the janitor
//! leaves pending timeouts alone and only [`Timeouts::due`] or
//! [`Timeouts::cancel`] remove them.

use crate::engine::Engine;
use crate::error::CoreResult;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use varstore_codec::Value;
use varstore_storage::{Document, DocumentStore};

/// Collection holding scheduled timeouts.
pub const TIMEOUTS_COLLECTION: &str = "timeouts";

/// A timeout read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTimeout {
    /// Id returned by [`Timeouts::schedule`].
    pub id: String,
    /// Command that scheduled it.
    pub command: String,
    /// Due time in milliseconds since the epoch.
    pub due_at: i64,
    /// Caller data.
    pub payload: Value,
}

impl ScheduledTimeout {
    fn from_document(doc: &Document) -> Option<Self> {
        let due_at = doc.value.get("dueAt")?.as_f64()? as i64;
        let command = doc
            .value
            .get("command")
            .and_then(Value::as_text)
            .unwrap_or_default()
            .to_string();
        let payload = doc.value.get("payload").cloned().unwrap_or(Value::Null);
        Some(Self {
            id: doc.key.clone(),
            command,
            due_at,
            payload,
        })
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("dueAt".to_string(), Value::Integer(self.due_at));
        map.insert("command".to_string(), Value::Text(self.command.clone()));
        map.insert("payload".to_string(), self.payload.clone());
        Value::Map(map)
    }
}

/// Timeout scheduler over an engine's reserved namespace.
#[derive(Debug, Clone)]
pub struct Timeouts {
    engine: Engine,
}

impl Timeouts {
    /// Creates a scheduler.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    fn namespace(&self) -> &str {
        &self.engine.options().reserved_namespace
    }

    /// Schedules `payload` to become due after `duration`.
    ///
    /// Returns the id of the new timeout.
    ///
    /// # Errors
    ///
    /// Fails if the payload holds a non-finite number or the write fails.
    pub async fn schedule(
        &self,
        command: &str,
        payload: Value,
        duration: Duration,
        now_ms: i64,
    ) -> CoreResult<String> {
        payload.check_finite()?;
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let timeout = ScheduledTimeout {
            id: Uuid::new_v4().simple().to_string(),
            command: command.to_string(),
            due_at: now_ms.saturating_add(duration_ms),
            payload,
        };

        let store = self.engine.store();
        self.engine
            .timed(
                "schedule timeout",
                store.upsert(
                    self.namespace(),
                    TIMEOUTS_COLLECTION,
                    &timeout.id,
                    timeout.to_value(),
                ),
            )
            .await?;
        debug!(command, id = %timeout.id, due_at = timeout.due_at, "timeout scheduled");
        Ok(timeout.id)
    }

    /// Returns every pending timeout, earliest first.
    pub async fn pending(&self) -> CoreResult<Vec<ScheduledTimeout>> {
        let store = self.engine.store();
        let docs = self
            .engine
            .timed(
                "list timeouts",
                store.scan(self.namespace(), TIMEOUTS_COLLECTION),
            )
            .await?;
        let mut pending: Vec<_> = docs
            .iter()
            .filter_map(ScheduledTimeout::from_document)
            .collect();
        pending.sort_by_key(|t| t.due_at);
        Ok(pending)
    }

    /// Removes and returns the timeouts due strictly before `now_ms`.
    ///
    /// Each timeout is returned by exactly one call.
    pub async fn due(&self, now_ms: i64) -> CoreResult<Vec<ScheduledTimeout>> {
        let store = self.engine.store();
        let docs = self
            .engine
            .timed(
                "read timeouts",
                store.scan(self.namespace(), TIMEOUTS_COLLECTION),
            )
            .await?;

        let mut ids = Vec::new();
        let mut fired = Vec::new();
        for doc in &docs {
            if let Some(timeout) = ScheduledTimeout::from_document(doc) {
                if timeout.due_at < now_ms {
                    ids.push(doc.id);
                    fired.push(timeout);
                }
            }
        }
        if ids.is_empty() {
            return Ok(fired);
        }

        let removed = self
            .engine
            .timed(
                "remove due timeouts",
                store.delete_ids(self.namespace(), TIMEOUTS_COLLECTION, &ids),
            )
            .await?;
        debug!(removed, "timeouts fired");
        fired.sort_by_key(|t| t.due_at);
        Ok(fired)
    }

    /// Cancels a pending timeout. Returns true if it was still pending.
    pub async fn cancel(&self, id: &str) -> CoreResult<bool> {
        let store = self.engine.store();
        self.engine
            .timed(
                "cancel timeout",
                store.delete(self.namespace(), TIMEOUTS_COLLECTION, id),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::Cooldowns;
    use crate::engine::EngineOptions;
    use crate::janitor::sweep_namespace;
    use crate::registry::StaticRegistry;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use varstore_codec::Scope;
    use varstore_storage::{DocumentStore, MemoryStore};

    fn timeouts() -> (Timeouts, Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(
            store.clone(),
            Arc::new(StaticRegistry::new()),
            EngineOptions::default(),
        );
        (Timeouts::new(engine.clone()), engine, store)
    }

    fn payload(n: i64) -> Value {
        let mut map = BTreeMap::new();
        map.insert("channel".to_string(), Value::Text("42".to_string()));
        map.insert("n".to_string(), Value::Integer(n));
        Value::Map(map)
    }

    #[tokio::test]
    async fn schedule_stores_in_reserved_namespace() {
        let (timeouts, _, store) = timeouts();
        let id = timeouts
            .schedule("remind", payload(1), Duration::from_secs(5), 1_000)
            .await
            .unwrap();

        let doc = store.find("cooldown", "timeouts", &id).await.unwrap().unwrap();
        assert_eq!(doc.value.get("dueAt"), Some(&Value::Integer(6_000)));
        assert_eq!(doc.value.get("command"), Some(&Value::Text("remind".into())));
        assert_eq!(doc.value.get("payload"), Some(&payload(1)));
    }

    #[tokio::test]
    async fn due_fires_once() {
        let (timeouts, _, store) = timeouts();
        let early = timeouts
            .schedule("remind", payload(1), Duration::from_secs(1), 0)
            .await
            .unwrap();
        timeouts
            .schedule("remind", payload(2), Duration::from_secs(60), 0)
            .await
            .unwrap();

        assert!(timeouts.due(1_000).await.unwrap().is_empty());

        let fired = timeouts.due(1_001).await.unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, early);
        assert_eq!(fired[0].command, "remind");
        assert_eq!(fired[0].payload, payload(1));

        assert!(timeouts.due(1_001).await.unwrap().is_empty());
        assert_eq!(store.count("cooldown", "timeouts").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn due_returns_earliest_first() {
        let (timeouts, _, _) = timeouts();
        for secs in [30, 10, 20] {
            timeouts
                .schedule("remind", payload(secs), Duration::from_secs(secs as u64), 0)
                .await
                .unwrap();
        }

        let fired: Vec<_> = timeouts
            .due(i64::MAX)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.due_at)
            .collect();
        assert_eq!(fired, vec![10_000, 20_000, 30_000]);
    }

    #[tokio::test]
    async fn cancel_removes_pending() {
        let (timeouts, _, _) = timeouts();
        let id = timeouts
            .schedule("remind", Value::Null, Duration::from_secs(1), 0)
            .await
            .unwrap();

        assert_eq!(timeouts.pending().await.unwrap().len(), 1);
        assert!(timeouts.cancel(&id).await.unwrap());
        assert!(!timeouts.cancel(&id).await.unwrap());
        assert!(timeouts.due(i64::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_finite_payload_is_rejected() {
        let (timeouts, _, store) = timeouts();
        let result = timeouts
            .schedule("remind", Value::Float(f64::NAN), Duration::from_secs(1), 0)
            .await;
        assert!(result.is_err());
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn janitor_keeps_pending_timeouts() {
        let (timeouts, engine, store) = timeouts();
        let cooldowns = Cooldowns::new(engine);
        cooldowns
            .check("daily", &Scope::user("1"), Duration::from_secs(1), 0)
            .await
            .unwrap();
        let id = timeouts
            .schedule("remind", payload(1), Duration::from_secs(1), 0)
            .await
            .unwrap();

        let report = sweep_namespace(store.as_ref(), "cooldown", 10_000, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.removed, 1);
        assert!(store.find("cooldown", "daily", "daily_1").await.unwrap().is_none());
        assert!(store.find("cooldown", "timeouts", &id).await.unwrap().is_some());

        let fired = timeouts.due(10_000).await.unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, id);
    }
}
