//! Clean, ping and drop commands.

use super::{CommandResult, Context};
use std::time::Duration;
use varstore_core::probe;

/// Sweeps expired records from `namespace`, or the reserved namespace.
pub async fn clean(ctx: &Context, namespace: Option<&str>) -> CommandResult {
    let namespace = namespace.unwrap_or(ctx.config.reserved_namespace.as_str());
    let report = ctx.engine.clean(namespace).await?;

    println!("Swept {namespace}");
    println!("  Collections visited: {}", report.collections);
    println!("  Records removed:     {}", report.removed);
    println!("  Collections dropped: {}", report.dropped);
    Ok(())
}

/// Probes the store.
pub async fn ping(ctx: &Context) -> CommandResult {
    let report = probe(ctx.engine.store().as_ref(), ctx.config.operation_timeout).await;
    if report.reachable {
        println!("OK ({:.1} ms)", duration_ms(report.latency));
        Ok(())
    } else {
        let error = report.error.unwrap_or_default();
        let waited = duration_ms(report.latency);
        Err(format!("store unreachable after {waited:.1} ms: {error}").into())
    }
}

/// Drops a table, or one variable of it.
pub async fn drop(ctx: &Context, table: &str, variable: Option<&str>) -> CommandResult {
    let existed = ctx.engine.drop(table, variable).await?;
    let target = match variable {
        Some(variable) => format!("{table}/{variable}"),
        None => table.to_string(),
    };
    if existed {
        println!("Dropped {target}");
    } else {
        println!("Nothing to drop at {target}");
    }
    Ok(())
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use varstore_codec::Value;
    use varstore_storage::DocumentStore;

    #[tokio::test]
    async fn clean_defaults_to_reserved_namespace() {
        let ctx = Context::open(Some("memory://"), None).unwrap();
        ctx.engine
            .set("cooldown", "daily", Some("1"), Value::Integer(1))
            .await
            .unwrap();

        clean(&ctx, None).await.unwrap();
        assert!(ctx
            .engine
            .store()
            .list_collections("cooldown")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn ping_and_drop() {
        let ctx = Context::open(Some("memory://"), None).unwrap();
        ping(&ctx).await.unwrap();

        ctx.engine.set("main", "coins", None, Value::Integer(1)).await.unwrap();
        drop(&ctx, "main", Some("coins")).await.unwrap();
        assert_eq!(ctx.engine.find_one("main", "coins").await.unwrap(), None);
    }
}
