use anyhow::{Context, Result};
use colored::*;
use serde_json::{Map, Value};

use pattern_expert::config::ExpertConfig;

use super::open_search;

pub fn run(config: &ExpertConfig, id: &str, fields: &str, json: bool) -> Result<()> {
    let fields: Map<String, Value> =
        serde_json::from_str(fields).context("fields must be a JSON object")?;
    let engine = open_search(config)?;
    engine.update_pattern(id, &fields)?;

    let mut changed: Vec<&str> = fields.keys().map(String::as_str).collect();
    changed.sort_unstable();

    if json {
        println!("{}", serde_json::json!({ "id": id, "updated": changed }));
    } else {
        println!(
            "{} Updated {} ({})",
            "✓".green(),
            id.cyan(),
            changed.join(", ")
        );
    }
    Ok(())
}
