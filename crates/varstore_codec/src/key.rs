//! Composite record key codec.
//!
//! Every stored record is addressed by a key built from the variable name
//! and an optional scope id:
//!
//! | Scope | Key |
//! |-------|-----|
//! | global | `coins` |
//! | scoped | `coins_<scope id>` |
//!
//! Scope ids are opaque strings. [`Scope`] maps the scripting runtime's
//! variable kinds (user, guild, channel, message) onto them.

use regex::Regex;
use std::sync::LazyLock;

/// Separator placed between a variable name and its scope id.
pub const SCOPE_SEPARATOR: char = '_';

/// `(prefix)(_<digits>)(suffix)`, prefix matched lazily.
static LEGACY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(.+?)_\d+(.*)$").expect("legacy key pattern is valid")
});

/// Builds the record key for a variable and an optional scope id.
///
/// Returns `variable` unchanged when the scope id is absent or empty,
/// otherwise `variable + "_" + scope_id`.
///
/// # Example
///
/// ```
/// use varstore_codec::encode_key;
///
/// assert_eq!(encode_key("coins", None), "coins");
/// assert_eq!(encode_key("coins", Some("")), "coins");
/// assert_eq!(encode_key("coins", Some("42")), "coins_42");
/// ```
#[must_use]
pub fn encode_key(variable: &str, scope_id: Option<&str>) -> String {
    match scope_id {
        Some(id) if !id.is_empty() => {
            let mut key = String::with_capacity(variable.len() + 1 + id.len());
            key.push_str(variable);
            key.push(SCOPE_SEPARATOR);
            key.push_str(id);
            key
        }
        _ => variable.to_string(),
    }
}

/// Recovers the variable name from a legacy flat-file key.
///
/// Legacy keys embed a numeric scope id (`name_<digits><suffix>`). When the
/// key matches, the part before the first `_<digits>` run is returned;
/// otherwise the whole key is returned unchanged.
///
/// This is a best-effort heuristic. A variable whose own name contains an
/// underscore followed by digits (`level_2_bonus`) is cut at that point
/// and yields `level`. Legacy dumps carry no information to disambiguate
/// this case.
///
/// # Example
///
/// ```
/// use varstore_codec::decode_variable;
///
/// assert_eq!(decode_variable("coins_123"), "coins");
/// assert_eq!(decode_variable("coins_123_456"), "coins");
/// assert_eq!(decode_variable("motd"), "motd");
/// ```
#[must_use]
pub fn decode_variable(legacy_key: &str) -> &str {
    LEGACY_KEY
        .captures(legacy_key)
        .and_then(|caps| caps.get(1))
        .map_or(legacy_key, |prefix| prefix.as_str())
}

/// The scope a variable value belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One value for the whole application.
    Global,
    /// One value per guild.
    Guild(String),
    /// One value per user, optionally per guild.
    User {
        /// The user id.
        user: String,
        /// The guild id, for guild-local user variables.
        guild: Option<String>,
    },
    /// One value per channel.
    Channel(String),
    /// One value per message.
    Message(String),
}

impl Scope {
    /// Creates a guild-local user scope.
    pub fn member(user: impl Into<String>, guild: impl Into<String>) -> Self {
        Self::User {
            user: user.into(),
            guild: Some(guild.into()),
        }
    }

    /// Creates a global user scope.
    pub fn user(user: impl Into<String>) -> Self {
        Self::User {
            user: user.into(),
            guild: None,
        }
    }

    /// Returns the scope id used in record keys, `None` for [`Scope::Global`].
    ///
    /// A guild-local user scope encodes as `<user>_<guild>`, which is the
    /// layout legacy dumps use.
    #[must_use]
    pub fn scope_id(&self) -> Option<String> {
        match self {
            Scope::Global => None,
            Scope::Guild(id) | Scope::Channel(id) | Scope::Message(id) => Some(id.clone()),
            Scope::User { user, guild: None } => Some(user.clone()),
            Scope::User {
                user,
                guild: Some(guild),
            } => Some(encode_key(user, Some(guild))),
        }
    }

    /// Builds the record key for `variable` in this scope.
    #[must_use]
    pub fn key_for(&self, variable: &str) -> String {
        encode_key(variable, self.scope_id().as_deref())
    }
}
