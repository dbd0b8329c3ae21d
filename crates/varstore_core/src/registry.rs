//! Variable registry adapter.
//!
//! The engine never owns variable declarations. It asks a registry whether
//! a variable exists in a table and what its default value is.

use std::collections::HashMap;
use varstore_codec::Value;

/// Source of variable declarations and defaults.
pub trait VariableRegistry: Send + Sync {
    /// Returns true if `name` is declared for `table`.
    fn has(&self, name: &str, table: &str) -> bool;

    /// Returns the declared default of `name` in `table`.
    fn default_value(&self, name: &str, table: &str) -> Option<Value>;
}

/// A registry built up front from a fixed set of declarations.
///
/// Table-specific declarations shadow global ones.
///
/// ```
/// use varstore_core::{StaticRegistry, VariableRegistry};
/// use varstore_codec::Value;
///
/// let registry = StaticRegistry::new()
///     .with_variable("coins", Value::Integer(0))
///     .with_table_variable("economy", "coins", Value::Integer(100));
///
/// assert_eq!(registry.default_value("coins", "main"), Some(Value::Integer(0)));
/// assert_eq!(registry.default_value("coins", "economy"), Some(Value::Integer(100)));
/// assert!(!registry.has("level", "main"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    global: HashMap<String, Value>,
    per_table: HashMap<(String, String), Value>,
}

impl StaticRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable in every table.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, default: Value) -> Self {
        self.global.insert(name.into(), default);
        self
    }

    /// Declares a variable in one table.
    #[must_use]
    pub fn with_table_variable(
        mut self,
        table: impl Into<String>,
        name: impl Into<String>,
        default: Value,
    ) -> Self {
        self.per_table.insert((table.into(), name.into()), default);
        self
    }

    /// Returns the number of declarations.
    pub fn len(&self) -> usize {
        self.global.len() + self.per_table.len()
    }

    /// Returns true if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str, table: &str) -> Option<&Value> {
        self.per_table
            .get(&(table.to_string(), name.to_string()))
            .or_else(|| self.global.get(name))
    }
}

impl VariableRegistry for StaticRegistry {
    fn has(&self, name: &str, table: &str) -> bool {
        self.lookup(name, table).is_some()
    }

    fn default_value(&self, name: &str, table: &str) -> Option<Value> {
        self.lookup(name, table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_variables_exist_everywhere() {
        let registry = StaticRegistry::new().with_variable("coins", Value::Integer(0));
        assert!(registry.has("coins", "main"));
        assert!(registry.has("coins", "other"));
        assert!(!registry.has("gems", "main"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn table_variables_are_scoped() {
        let registry =
            StaticRegistry::new().with_table_variable("economy", "bank", Value::Integer(5));
        assert!(registry.has("bank", "economy"));
        assert!(!registry.has("bank", "main"));
        assert_eq!(registry.default_value("bank", "main"), None);
    }

    #[test]
    fn table_declaration_shadows_global() {
        let registry = StaticRegistry::new()
            .with_variable("prefix", Value::from("!"))
            .with_table_variable("main", "prefix", Value::from("?"));
        assert_eq!(registry.default_value("prefix", "main"), Some(Value::from("?")));
        assert_eq!(registry.default_value("prefix", "alt"), Some(Value::from("!")));
    }

    #[test]
    fn empty_registry() {
        let registry = StaticRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.has("anything", "main"));
    }
}
