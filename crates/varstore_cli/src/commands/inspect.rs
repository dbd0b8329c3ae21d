//! Inspect command implementation.

use super::{CommandResult, Context};
use serde::Serialize;
use varstore_core::Engine;
use varstore_storage::DocumentStore;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store URL.
    pub url: String,
    /// Tables found.
    pub tables: Vec<TableStats>,
    /// Records across all tables.
    pub total_records: u64,
}

/// Statistics for one table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Whether this is the reserved namespace.
    pub reserved: bool,
    /// Variables and their record counts.
    pub variables: Vec<VariableStats>,
}

/// Statistics for one variable.
#[derive(Debug, Serialize)]
pub struct VariableStats {
    /// Variable name.
    pub name: String,
    /// Number of records.
    pub records: u64,
}

/// Collects statistics for every table, or one.
pub async fn collect(
    engine: &Engine,
    url: &str,
    only: Option<&str>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = engine.store();
    let names = match only {
        Some(table) => vec![table.to_string()],
        None => store.list_namespaces().await?,
    };

    let mut result = InspectResult {
        url: url.to_string(),
        tables: Vec::with_capacity(names.len()),
        total_records: 0,
    };
    for name in names {
        let mut variables = Vec::new();
        for variable in store.list_collections(&name).await? {
            let records = store.count(&name, &variable).await?;
            result.total_records += records;
            variables.push(VariableStats {
                name: variable,
                records,
            });
        }
        result.tables.push(TableStats {
            reserved: name == engine.options().reserved_namespace,
            name,
            variables,
        });
    }
    Ok(result)
}

/// Runs the inspect command.
pub async fn run(ctx: &Context, table: Option<&str>, format: &str) -> CommandResult {
    let result = collect(&ctx.engine, &ctx.config.url, table).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("VarStore Inspection");
    println!("===================");
    println!();
    println!("Store: {}", result.url);
    println!("Records: {}", result.total_records);

    for table in &result.tables {
        println!();
        let marker = if table.reserved { " (reserved)" } else { "" };
        println!("Table {}{}:", table.name, marker);
        if table.variables.is_empty() {
            println!("  (empty)");
        }
        for variable in &table.variables {
            println!("  {:<24} {} records", variable.name, variable.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varstore_codec::Value;

    #[tokio::test]
    async fn collects_counts() {
        let ctx = Context::open(Some("memory://"), None).unwrap();
        let engine = &ctx.engine;
        engine.set("main", "coins", Some("1"), Value::Integer(1)).await.unwrap();
        engine.set("main", "coins", Some("2"), Value::Integer(2)).await.unwrap();
        engine.set("cooldown", "daily", Some("1"), Value::Integer(5)).await.unwrap();

        let result = collect(engine, "memory://", None).await.unwrap();
        assert_eq!(result.total_records, 3);
        assert_eq!(result.tables.len(), 2);

        let cooldown = &result.tables[0];
        assert_eq!(cooldown.name, "cooldown");
        assert!(cooldown.reserved);

        let only = collect(engine, "memory://", Some("main")).await.unwrap();
        assert_eq!(only.tables.len(), 1);
        assert_eq!(only.tables[0].variables[0].records, 2);

        let json = serde_json::to_value(&only).unwrap();
        assert_eq!(json["tables"][0]["variables"][0]["name"], "coins");
    }
}
