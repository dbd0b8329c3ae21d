//! Query results and filters.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use varstore_codec::Value;

/// The outcome of a variable lookup.
///
/// A miss is not an error: it is either resolved to the registry default
/// or reported as [`Lookup::Absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A record was found.
    Stored(Value),
    /// No record was found; the registry default applies.
    Default(Value),
    /// No record and no default.
    Absent,
}

impl Lookup {
    /// Returns the resolved value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Stored(v) | Self::Default(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Consumes the lookup and returns the resolved value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Stored(v) | Self::Default(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Returns true if the value came from the store.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    /// Returns true if nothing was resolved.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// A stored variable together with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Namespace.
    pub table: String,
    /// Collection, which is the variable name.
    pub variable: String,
    /// Full record key.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

/// Sort direction for [`crate::Engine::all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Compares two records by numeric value in this direction.
    ///
    /// Records without a numeric reading sort after all numeric ones in
    /// either direction.
    pub fn compare(self, a: &Record, b: &Record) -> Ordering {
        match (a.value.as_f64(), b.value.as_f64()) {
            (Some(x), Some(y)) => match self {
                Self::Asc => x.total_cmp(&y),
                Self::Desc => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A record filter.
///
/// Every condition that is set must hold. An empty filter matches every
/// record.
///
/// ```
/// use varstore_core::{Filter, Record};
/// use varstore_codec::Value;
///
/// let filter = Filter::new().key_suffix("_42").min(10.0);
/// let record = Record {
///     table: "main".into(),
///     variable: "coins".into(),
///     key: "coins_42".into(),
///     value: Value::Integer(15),
/// };
/// assert!(filter.matches(&record));
/// ```
#[derive(Clone, Default)]
pub struct Filter {
    key: Option<String>,
    key_prefix: Option<String>,
    key_suffix: Option<String>,
    variable: Option<String>,
    value: Option<Value>,
    min: Option<f64>,
    max: Option<f64>,
    predicate: Option<Predicate>,
}

impl Filter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires an exact key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Requires a key prefix.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Requires a key suffix, e.g. `_<guildId>` for every member of a guild.
    #[must_use]
    pub fn key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = Some(suffix.into());
        self
    }

    /// Restricts to one variable.
    #[must_use]
    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// Requires an exact value.
    #[must_use]
    pub fn value_eq(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Requires a numeric value of at least `min`.
    #[must_use]
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Requires a numeric value of at most `max`.
    #[must_use]
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Adds an arbitrary predicate.
    #[must_use]
    pub fn predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(f));
        self
    }

    /// Returns the variable this filter is restricted to, if any.
    pub fn variable_name(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// Tests a record against every set condition.
    pub fn matches(&self, record: &Record) -> bool {
        if self.variable.as_ref().is_some_and(|v| *v != record.variable) {
            return false;
        }
        if self.key.as_ref().is_some_and(|k| *k != record.key) {
            return false;
        }
        if let Some(prefix) = &self.key_prefix {
            if !record.key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.key_suffix {
            if !record.key.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if self.value.as_ref().is_some_and(|v| *v != record.value) {
            return false;
        }
        if self.min.is_some() || self.max.is_some() {
            let Some(n) = record.value.as_f64() else {
                return false;
            };
            if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
                return false;
            }
        }
        self.predicate.as_ref().map_or(true, |p| p(record))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("key", &self.key)
            .field("key_prefix", &self.key_prefix)
            .field("key_suffix", &self.key_suffix)
            .field("variable", &self.variable)
            .field("value", &self.value)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
