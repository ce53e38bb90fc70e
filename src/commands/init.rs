use std::fs;
use std::path::Path;

use anyhow::{bail, Result};
use colored::*;

use pattern_expert::config::ExpertConfig;

pub fn run(config_path: &Path, domain: Option<&str>, force: bool, json: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = ExpertConfig::default();
    if let Some(domain) = domain {
        config.domain = domain.to_string();
    }
    config.validate()?;
    config.save(config_path)?;

    let paths = config.paths();
    fs::create_dir_all(&paths.domain_dir)?;
    let created_store = !paths.patterns.exists();
    if created_store {
        fs::write(&paths.patterns, "[]\n")?;
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "config": config_path.display().to_string(),
                "domain": config.domain,
                "patterns": paths.patterns.display().to_string(),
                "created_store": created_store,
            })
        );
        return Ok(());
    }

    println!("{}", "Expert Setup".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("{} Wrote {}", "✓".green(), config_path.display());
    if created_store {
        println!("{} Created {}", "✓".green(), paths.patterns.display());
    } else {
        println!("{} {} exists", "✓".green(), paths.patterns.display());
    }
    println!();
    println!(
        "Add patterns with {} and build the index with {}.",
        "expert add".cyan(),
        "expert index".cyan()
    );
    Ok(())
}
