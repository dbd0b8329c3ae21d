//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use std::collections::BTreeMap;
use varstore_codec::{Scope, Value};

/// Strategy for generating valid variable names.
///
/// Names never end in `_<digits>`, so they survive legacy key decoding.
pub fn variable_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Table name must not be reserved", |s| s != "cooldown")
}

/// Strategy for generating numeric scope ids.
pub fn scope_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[1-9][0-9]{0,18}").expect("Invalid regex")
}

/// Strategy for generating scopes.
pub fn scope_strategy() -> impl Strategy<Value = Scope> {
    prop_oneof![
        Just(Scope::Global),
        scope_id_strategy().prop_map(Scope::Guild),
        scope_id_strategy().prop_map(Scope::user),
        (scope_id_strategy(), scope_id_strategy()).prop_map(|(u, g)| Scope::member(u, g)),
        scope_id_strategy().prop_map(Scope::Channel),
    ]
}

/// Strategy for generating storable values.
///
/// Floats are finite. Nesting is limited to two levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[ -~]{0,32}".prop_map(Value::Text),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m: BTreeMap<String, Value>| Value::Map(m)),
        ]
    })
}

/// Strategy for generating numeric values for sorting tests.
pub fn numeric_values_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-10_000i64..10_000, 1..32)
}
