use anyhow::Result;
use colored::*;

use pattern_expert::config::ExpertConfig;

use super::open_search;

pub fn run(config: &ExpertConfig, id: &str, json: bool) -> Result<()> {
    let engine = open_search(config)?;
    let removed = engine.remove_pattern(id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "name": removed.name, "remaining": engine.store().count() })
        );
    } else {
        println!("{} Deleted {} ({})", "✓".green(), id.cyan(), removed.name);
    }
    Ok(())
}
