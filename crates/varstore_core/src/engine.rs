//! The variable storage engine.
//!
//! Every table is a namespace, every variable a collection and every scoped
//! instance a record keyed by [`encode_key`]. All operations are bounded
//! by the configured operation timeout and propagate store failures.

use crate::clock::unix_millis;
use crate::error::{CoreError, CoreResult};
use crate::janitor::{sweep_namespace, SweepReport};
use crate::probe::round_trip;
use crate::query::{Filter, Lookup, Record, SortOrder};
use crate::registry::VariableRegistry;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use varstore_codec::{encode_key, Value};
use varstore_storage::{Document, DocumentStore};

/// Default result limit of [`Engine::all`].
pub const DEFAULT_ALL_LIMIT: usize = 100;

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Namespace exempt from registry checks; holds cooldowns.
    pub reserved_namespace: String,
    /// Variables exempt from registry checks in any table.
    pub reserved_variables: HashSet<String>,
    /// Upper bound for a single operation.
    pub operation_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reserved_namespace: "cooldown".to_string(),
            reserved_variables: HashSet::from(["timeouts".to_string()]),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

/// Reads and writes variables on a shared document store.
///
/// Cloning is cheap; clones share the store and registry.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    registry: Arc<dyn VariableRegistry>,
    options: EngineOptions,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<dyn VariableRegistry>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            registry,
            options,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Returns the variable registry.
    pub fn registry(&self) -> &Arc<dyn VariableRegistry> {
        &self.registry
    }

    /// Returns the engine options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Returns true if lookups in `table` for `variable` skip the registry.
    pub fn is_reserved(&self, table: &str, variable: &str) -> bool {
        table == self.options.reserved_namespace
            || self.options.reserved_variables.contains(variable)
    }

    pub(crate) async fn timed<T, E, F>(&self, operation: &'static str, fut: F) -> CoreResult<T>
    where
        F: Future<Output = Result<T, E>>,
        CoreError: From<E>,
    {
        let after = self.options.operation_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Timeout { operation, after }),
        }
    }

    /// Looks up a variable.
    ///
    /// An unregistered variable outside the reserved set resolves to
    /// [`Lookup::Absent`] without touching the store.
    pub async fn get(
        &self,
        table: &str,
        variable: &str,
        scope_id: Option<&str>,
    ) -> CoreResult<Lookup> {
        let reserved = self.is_reserved(table, variable);
        if !reserved && !self.registry.has(variable, table) {
            debug!(table, variable, "lookup of undeclared variable");
            return Ok(Lookup::Absent);
        }

        let key = encode_key(variable, scope_id);
        let found = self
            .timed("get", self.store.find(table, variable, &key))
            .await?;

        Ok(match found {
            Some(doc) => Lookup::Stored(doc.value),
            None if reserved => Lookup::Absent,
            None => self
                .registry
                .default_value(variable, table)
                .map_or(Lookup::Absent, Lookup::Default),
        })
    }

    /// Stores a variable. Declaration is not checked.
    pub async fn set(
        &self,
        table: &str,
        variable: &str,
        scope_id: Option<&str>,
        value: Value,
    ) -> CoreResult<()> {
        let key = encode_key(variable, scope_id);
        self.put_raw(table, variable, &key, value).await
    }

    /// Stores a value under an explicit record key.
    pub async fn put_raw(
        &self,
        table: &str,
        variable: &str,
        key: &str,
        value: Value,
    ) -> CoreResult<()> {
        value.check_finite()?;
        self.timed("set", self.store.upsert(table, variable, key, value))
            .await?;
        Ok(())
    }

    /// Deletes one variable instance.
    ///
    /// The variable's collection is dropped once it holds no records.
    /// Returns true if a record was removed.
    pub async fn delete(
        &self,
        table: &str,
        variable: &str,
        scope_id: Option<&str>,
    ) -> CoreResult<bool> {
        let key = encode_key(variable, scope_id);
        self.timed("delete", self.delete_and_prune(table, variable, &key))
            .await
    }

    /// Deletes every matching record in a table.
    ///
    /// Emptied collections are left in place.
    pub async fn delete_many(&self, table: &str, filter: &Filter) -> CoreResult<u64> {
        self.timed("delete_many", self.remove_matching(table, filter))
            .await
    }

    /// Returns matching records in listing order, up to `limit`.
    pub async fn find_many(
        &self,
        table: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Record>> {
        self.timed("find_many", self.collect(table, filter, limit))
            .await
    }

    /// Returns matching records sorted by numeric value.
    ///
    /// `limit` defaults to [`DEFAULT_ALL_LIMIT`]. Records without a numeric
    /// reading come last.
    pub async fn all(
        &self,
        table: &str,
        filter: &Filter,
        limit: Option<usize>,
        order: SortOrder,
    ) -> CoreResult<Vec<Record>> {
        let mut records = self.timed("all", self.collect(table, filter, None)).await?;
        records.sort_unstable_by(|a, b| order.compare(a, b));
        records.truncate(limit.unwrap_or(DEFAULT_ALL_LIMIT));
        Ok(records)
    }

    /// Drops a whole table, or one variable of it.
    ///
    /// Returns true if something existed.
    pub async fn drop(&self, table: &str, variable: Option<&str>) -> CoreResult<bool> {
        match variable {
            Some(variable) => {
                self.timed("drop", self.store.drop_collection(table, variable))
                    .await
            }
            None => self.timed("drop", self.store.drop_namespace(table)).await,
        }
    }

    /// Returns the value of some record of a variable, if any.
    pub async fn find_one(&self, table: &str, variable: &str) -> CoreResult<Option<Value>> {
        let doc = self
            .timed("find_one", self.store.first(table, variable))
            .await?;
        Ok(doc.map(|doc| doc.value))
    }

    /// Runs one expiry sweep over `namespace` now.
    pub async fn clean(&self, namespace: &str) -> CoreResult<SweepReport> {
        let token = CancellationToken::new();
        self.timed(
            "clean",
            sweep_namespace(self.store.as_ref(), namespace, unix_millis(), &token),
        )
        .await
    }

    /// Measures a store round trip.
    pub async fn ping(&self) -> CoreResult<Duration> {
        self.timed("ping", round_trip(self.store.as_ref())).await
    }

    async fn delete_and_prune(&self, table: &str, variable: &str, key: &str) -> CoreResult<bool> {
        let removed = self.store.delete(table, variable, key).await?;
        if self.store.count(table, variable).await? == 0 {
            self.store.drop_collection(table, variable).await?;
        }
        Ok(removed)
    }

    async fn remove_matching(&self, table: &str, filter: &Filter) -> CoreResult<u64> {
        let mut removed = 0;
        for variable in self.variables(table, filter).await? {
            let mut ids = Vec::new();
            for doc in self.store.scan(table, &variable).await? {
                let id = doc.id;
                if filter.matches(&to_record(table, &variable, doc)) {
                    ids.push(id);
                }
            }
            if !ids.is_empty() {
                removed += self.store.delete_ids(table, &variable, &ids).await?;
            }
        }
        Ok(removed)
    }

    async fn variables(&self, table: &str, filter: &Filter) -> CoreResult<Vec<String>> {
        let collections = self.store.list_collections(table).await?;
        Ok(match filter.variable_name() {
            Some(only) => collections.into_iter().filter(|c| c == only).collect(),
            None => collections,
        })
    }

    async fn collect(
        &self,
        table: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Record>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();
        if limit == 0 {
            return Ok(records);
        }
        for variable in self.variables(table, filter).await? {
            for doc in self.store.scan(table, &variable).await? {
                let record = to_record(table, &variable, doc);
                if filter.matches(&record) {
                    records.push(record);
                    if records.len() >= limit {
                        return Ok(records);
                    }
                }
            }
        }
        Ok(records)
    }
}

fn to_record(table: &str, variable: &str, doc: Document) -> Record {
    Record {
        table: table.to_string(),
        variable: variable.to_string(),
        key: doc.key,
        value: doc.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use async_trait::async_trait;
    use uuid::Uuid;
    use varstore_storage::{MemoryStore, StorageResult};

    fn engine_with(store: Arc<MemoryStore>) -> Engine {
        let registry = StaticRegistry::new()
            .with_variable("coins", Value::Integer(0))
            .with_variable("motd", Value::from("welcome"));
        Engine::new(store, Arc::new(registry), EngineOptions::default())
    }

    fn engine() -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (engine_with(store.clone()), store)
    }

    #[tokio::test]
    async fn set_then_get() {
        let (engine, _) = engine();
        engine
            .set("main", "coins", Some("42"), Value::Integer(7))
            .await
            .unwrap();

        let found = engine.get("main", "coins", Some("42")).await.unwrap();
        assert_eq!(found, Lookup::Stored(Value::Integer(7)));
    }

    #[tokio::test]
    async fn miss_resolves_to_default() {
        let (engine, _) = engine();
        assert_eq!(
            engine.get("main", "motd", None).await.unwrap(),
            Lookup::Default(Value::from("welcome"))
        );
    }

    #[tokio::test]
    async fn undeclared_variable_skips_store() {
        let (engine, store) = engine();
        store
            .upsert("main", "ghost", "ghost", Value::Integer(1))
            .await
            .unwrap();
        store.set_online(false);

        // Would fail if the store were consulted.
        assert!(engine.get("main", "ghost", None).await.unwrap().is_absent());
    }

    #[tokio::test]
    async fn reserved_lookups_bypass_registry() {
        let (engine, _) = engine();
        assert!(engine
            .get("cooldown", "daily", Some("1"))
            .await
            .unwrap()
            .is_absent());

        engine
            .set("cooldown", "daily", Some("1"), Value::Integer(99))
            .await
            .unwrap();
        assert_eq!(
            engine.get("cooldown", "daily", Some("1")).await.unwrap(),
            Lookup::Stored(Value::Integer(99))
        );

        engine
            .set("main", "timeouts", None, Value::Integer(5))
            .await
            .unwrap();
        assert!(engine.get("main", "timeouts", None).await.unwrap().is_stored());
    }

    #[tokio::test]
    async fn set_rejects_non_finite_numbers() {
        let (engine, store) = engine();
        let err = engine
            .set("main", "coins", None, Value::Float(f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Codec(_)));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn delete_drops_empty_collection() {
        let (engine, store) = engine();
        engine.set("main", "coins", Some("1"), Value::Integer(1)).await.unwrap();
        engine.set("main", "coins", Some("2"), Value::Integer(2)).await.unwrap();

        assert!(engine.delete("main", "coins", Some("1")).await.unwrap());
        assert_eq!(store.list_collections("main").await.unwrap(), vec!["coins"]);

        assert!(engine.delete("main", "coins", Some("2")).await.unwrap());
        assert!(store.list_collections("main").await.unwrap().is_empty());

        let coins = Filter::new().variable("coins");
        assert!(engine.find_many("main", &coins, None).await.unwrap().is_empty());
        assert!(engine
            .all("main", &coins, None, SortOrder::Desc)
            .await
            .unwrap()
            .is_empty());
        assert!(engine.find_one("main", "coins").await.unwrap().is_none());

        assert!(!engine.delete("main", "coins", Some("2")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_many_keeps_collections() {
        let (engine, store) = engine();
        for (scope, coins) in [("1_g", 1), ("2_g", 2), ("3_h", 3)] {
            engine
                .set("main", "coins", Some(scope), Value::Integer(coins))
                .await
                .unwrap();
        }
        engine.set("main", "motd", None, Value::from("hi")).await.unwrap();

        let removed = engine
            .delete_many("main", &Filter::new().key_suffix("_g"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count("main", "coins").await.unwrap(), 1);

        let removed = engine
            .delete_many("main", &Filter::new().variable("coins"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.list_collections("main").await.unwrap(),
            vec!["coins", "motd"]
        );
    }

    #[tokio::test]
    async fn find_many_respects_order_and_limit() {
        let (engine, _) = engine();
        engine.set("main", "motd", None, Value::from("hi")).await.unwrap();
        engine.set("main", "coins", Some("b"), Value::Integer(2)).await.unwrap();
        engine.set("main", "coins", Some("a"), Value::Integer(1)).await.unwrap();

        let all = engine.find_many("main", &Filter::new(), None).await.unwrap();
        let keys: Vec<_> = all.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["coins_a", "coins_b", "motd"]);

        let two = engine.find_many("main", &Filter::new(), Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert!(engine
            .find_many("main", &Filter::new(), Some(0))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn all_sorts_numerically() {
        let (engine, _) = engine();
        for (scope, coins) in [("a", 10), ("b", 30), ("c", 20)] {
            engine
                .set("main", "coins", Some(scope), Value::Integer(coins))
                .await
                .unwrap();
        }

        let top = engine
            .all("main", &Filter::new(), Some(2), SortOrder::Desc)
            .await
            .unwrap();
        let values: Vec<_> = top.iter().map(|r| r.value.clone()).collect();
        assert_eq!(values, vec![Value::Integer(30), Value::Integer(20)]);

        let bottom = engine
            .all("main", &Filter::new(), None, SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(bottom[0].value, Value::Integer(10));
        assert_eq!(bottom.len(), 3);
    }

    #[tokio::test]
    async fn drop_variable_and_table() {
        let (engine, store) = engine();
        engine.set("main", "coins", None, Value::Integer(1)).await.unwrap();
        engine.set("main", "motd", None, Value::from("x")).await.unwrap();

        assert!(engine.drop("main", Some("coins")).await.unwrap());
        assert_eq!(store.list_collections("main").await.unwrap(), vec!["motd"]);

        assert!(engine.drop("main", None).await.unwrap());
        assert!(store.list_namespaces().await.unwrap().is_empty());
        assert!(!engine.drop("main", None).await.unwrap());
    }

    #[tokio::test]
    async fn find_one_returns_any_record() {
        let (engine, _) = engine();
        assert_eq!(engine.find_one("main", "coins").await.unwrap(), None);
        engine.set("main", "coins", Some("1"), Value::Integer(4)).await.unwrap();
        assert_eq!(
            engine.find_one("main", "coins").await.unwrap(),
            Some(Value::Integer(4))
        );
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let (engine, store) = engine();
        store.set_online(false);

        let err = engine.get("main", "coins", None).await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(engine.set("main", "coins", None, Value::Null).await.is_err());
        assert!(engine.ping().await.is_err());
    }

    struct StallingStore;

    #[async_trait]
    impl DocumentStore for StallingStore {
        async fn find(&self, _: &str, _: &str, _: &str) -> StorageResult<Option<Document>> {
            std::future::pending().await
        }
        async fn upsert(&self, _: &str, _: &str, k: &str, v: Value) -> StorageResult<Document> {
            Ok(Document::new(k, v))
        }
        async fn delete(&self, _: &str, _: &str, _: &str) -> StorageResult<bool> {
            Ok(false)
        }
        async fn delete_ids(&self, _: &str, _: &str, _: &[Uuid]) -> StorageResult<u64> {
            Ok(0)
        }
        async fn scan(&self, _: &str, _: &str) -> StorageResult<Vec<Document>> {
            Ok(Vec::new())
        }
        async fn first(&self, _: &str, _: &str) -> StorageResult<Option<Document>> {
            Ok(None)
        }
        async fn count(&self, _: &str, _: &str) -> StorageResult<u64> {
            Ok(0)
        }
        async fn list_namespaces(&self) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn list_collections(&self, _: &str) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn drop_collection(&self, _: &str, _: &str) -> StorageResult<bool> {
            Ok(false)
        }
        async fn drop_namespace(&self, _: &str) -> StorageResult<bool> {
            Ok(false)
        }
        async fn ping(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_operations_time_out() {
        let options = EngineOptions {
            operation_timeout: Duration::from_millis(20),
            ..EngineOptions::default()
        };
        let registry = StaticRegistry::new().with_variable("coins", Value::Integer(0));
        let engine = Engine::new(Arc::new(StallingStore), Arc::new(registry), options);

        let err = engine.get("main", "coins", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout { operation: "get", .. }));
        assert!(engine.ping().await.is_ok());
    }
}
