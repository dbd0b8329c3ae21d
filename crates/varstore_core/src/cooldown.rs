//! Command cooldown bookkeeping.
//!
//! A cooldown is an ordinary record in the reserved namespace: the
//! collection is the command name, the key is scoped like any variable and
//! the value is the expiry in milliseconds. The janitor removes expired
//! cooldowns.

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::janitor::expiry_of;
use crate::query::Lookup;
use std::time::Duration;
use varstore_codec::{Scope, Value};

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// The command may run; a new cooldown was armed.
    Ready,
    /// The command is still cooling down.
    Active {
        /// Milliseconds until the cooldown ends.
        remaining_ms: u64,
    },
}

/// Cooldown tracker over an engine's reserved namespace.
#[derive(Debug, Clone)]
pub struct Cooldowns {
    engine: Engine,
}

impl Cooldowns {
    /// Creates a tracker.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    fn namespace(&self) -> &str {
        &self.engine.options().reserved_namespace
    }

    /// Checks a cooldown and arms a new one of `duration` if it has ended.
    pub async fn check(
        &self,
        command: &str,
        scope: &Scope,
        duration: Duration,
        now_ms: i64,
    ) -> CoreResult<CooldownStatus> {
        if let Some(remaining_ms) = self.remaining(command, scope, now_ms).await? {
            return Ok(CooldownStatus::Active { remaining_ms });
        }

        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms.saturating_add(duration_ms);
        let scope_id = scope.scope_id();
        self.engine
            .set(
                self.namespace(),
                command,
                scope_id.as_deref(),
                Value::Integer(expires_at),
            )
            .await?;
        Ok(CooldownStatus::Ready)
    }

    /// Returns the time left on a cooldown, or `None` if none is active.
    pub async fn remaining(
        &self,
        command: &str,
        scope: &Scope,
        now_ms: i64,
    ) -> CoreResult<Option<u64>> {
        let scope_id = scope.scope_id();
        let lookup = self
            .engine
            .get(self.namespace(), command, scope_id.as_deref())
            .await?;

        let expires_at = match lookup {
            Lookup::Stored(value) => expiry_of(&value),
            _ => None,
        };
        Ok(expires_at
            .map(|at| at - now_ms as f64)
            .filter(|left| *left > 0.0)
            .map(|left| left.ceil() as u64))
    }

    /// Clears a cooldown. Returns true if one was stored.
    pub async fn reset(&self, command: &str, scope: &Scope) -> CoreResult<bool> {
        let scope_id = scope.scope_id();
        self.engine
            .delete(self.namespace(), command, scope_id.as_deref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::registry::StaticRegistry;
    use std::sync::Arc;
    use varstore_storage::{DocumentStore, MemoryStore};

    fn cooldowns() -> (Cooldowns, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(
            store.clone(),
            Arc::new(StaticRegistry::new()),
            EngineOptions::default(),
        );
        (Cooldowns::new(engine), store)
    }

    #[tokio::test]
    async fn first_check_arms_cooldown() {
        let (cooldowns, store) = cooldowns();
        let scope = Scope::member("1", "9");

        let status = cooldowns
            .check("daily", &scope, Duration::from_secs(60), 1_000)
            .await
            .unwrap();
        assert_eq!(status, CooldownStatus::Ready);

        let doc = store.find("cooldown", "daily", "daily_1_9").await.unwrap().unwrap();
        assert_eq!(doc.value, Value::Integer(61_000));
    }

    #[tokio::test]
    async fn active_until_expiry() {
        let (cooldowns, _) = cooldowns();
        let scope = Scope::user("1");
        let minute = Duration::from_secs(60);

        cooldowns.check("work", &scope, minute, 0).await.unwrap();
        assert_eq!(
            cooldowns.check("work", &scope, minute, 45_000).await.unwrap(),
            CooldownStatus::Active {
                remaining_ms: 15_000
            }
        );
        assert_eq!(
            cooldowns.check("work", &scope, minute, 60_000).await.unwrap(),
            CooldownStatus::Ready
        );
        assert_eq!(
            cooldowns.remaining("work", &scope, 60_000).await.unwrap(),
            Some(60_000)
        );
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let (cooldowns, _) = cooldowns();
        let minute = Duration::from_secs(60);
        cooldowns.check("rob", &Scope::user("1"), minute, 0).await.unwrap();

        assert_eq!(
            cooldowns.check("rob", &Scope::user("2"), minute, 0).await.unwrap(),
            CooldownStatus::Ready
        );
        assert_eq!(cooldowns.remaining("rob", &Scope::Global, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_clears() {
        let (cooldowns, store) = cooldowns();
        let scope = Scope::user("1");
        cooldowns
            .check("daily", &scope, Duration::from_secs(60), 0)
            .await
            .unwrap();

        assert!(cooldowns.reset("daily", &scope).await.unwrap());
        assert_eq!(cooldowns.remaining("daily", &scope, 0).await.unwrap(), None);
        assert!(store.list_collections("cooldown").await.unwrap().is_empty());
    }
}
