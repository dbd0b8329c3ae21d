//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every write in memory and checks the
//! engine against it.

use crate::fixtures::TestEngine;
use std::collections::HashMap;
use varstore_codec::{Scope, Value};
use varstore_core::Lookup;

type Slot = (String, String, Option<String>);

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The engine under test.
    pub test: TestEngine,
    expected: HashMap<Slot, Value>,
}

impl IntegrationHarness {
    /// Creates a harness over an in-memory store.
    pub fn new() -> Self {
        Self::with(TestEngine::memory())
    }

    /// Creates a harness over a file store.
    pub fn file() -> Self {
        Self::with(TestEngine::file())
    }

    fn with(test: TestEngine) -> Self {
        Self {
            test,
            expected: HashMap::new(),
        }
    }

    /// Stores a value and tracks it for later verification.
    pub async fn set(&mut self, table: &str, variable: &str, scope: &Scope, value: Value) {
        let scope_id = scope.scope_id();
        self.test
            .set(table, variable, scope_id.as_deref(), value.clone())
            .await
            .expect("Failed to set variable");
        self.expected
            .insert((table.to_string(), variable.to_string(), scope_id), value);
    }

    /// Reads a value and checks it against the tracked one.
    pub async fn get_and_verify(&self, table: &str, variable: &str, scope: &Scope) -> Lookup {
        let scope_id = scope.scope_id();
        let actual = self
            .test
            .get(table, variable, scope_id.as_deref())
            .await
            .expect("Failed to get variable");

        let slot = (table.to_string(), variable.to_string(), scope_id);
        if let Some(expected) = self.expected.get(&slot) {
            assert_eq!(
                actual,
                Lookup::Stored(expected.clone()),
                "Value mismatch for {slot:?}"
            );
        }
        actual
    }

    /// Deletes a value and updates tracking.
    pub async fn delete(&mut self, table: &str, variable: &str, scope: &Scope) -> bool {
        let scope_id = scope.scope_id();
        let removed = self
            .test
            .delete(table, variable, scope_id.as_deref())
            .await
            .expect("Failed to delete variable");
        self.expected
            .remove(&(table.to_string(), variable.to_string(), scope_id));
        removed
    }

    /// Checks every tracked value.
    pub async fn verify_all(&self) {
        for ((table, variable, scope_id), expected) in &self.expected {
            let actual = self
                .test
                .get(table, variable, scope_id.as_deref())
                .await
                .expect("Failed to get variable");
            assert_eq!(actual, Lookup::Stored(expected.clone()));
        }
    }

    /// Returns the number of tracked values.
    pub fn tracked(&self) -> usize {
        self.expected.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}
