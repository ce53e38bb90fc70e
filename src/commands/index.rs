//! Index command - Build the embedding index

use anyhow::{bail, Result};
use colored::Colorize;

use pattern_expert::config::ExpertConfig;
use pattern_expert::search::VectorDB;

use super::open_search;

/// Run index command
pub async fn run(config: &ExpertConfig, status_only: bool, rebuild: bool, json: bool) -> Result<()> {
    if status_only {
        return show_status(config, json);
    }
    if !config.search.semantic {
        bail!("semantic search is disabled (search.semantic: false)");
    }

    let engine = open_search(config)?;
    if !json {
        println!("{} Building search index...", "→".dimmed());
        if rebuild {
            println!("{} Rebuilding from scratch", "→".dimmed());
        }
    }

    let stats = engine.index_all(rebuild).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!();
        println!("{}", "Indexing Complete".green().bold());
        println!("  {} {} patterns indexed", "✓".green(), stats.indexed);
        if stats.skipped > 0 {
            println!("  {} {} already up to date", "→".dimmed(), stats.skipped);
        }
        if stats.failed > 0 {
            println!("  {} {} failed", "✗".red(), stats.failed);
        }
        println!("  {} Took {} ms", "→".dimmed(), stats.duration_ms);
    }
    Ok(())
}

fn show_status(config: &ExpertConfig, json: bool) -> Result<()> {
    let db_path = config.paths().embeddings;

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({ "exists": false, "path": db_path.display().to_string() })
            );
        } else {
            println!("{} No index at {}", "!".yellow(), db_path.display());
            println!("  Run {} to build it", "expert index".cyan());
        }
        return Ok(());
    }

    let db = VectorDB::open(&db_path)?;
    let stats = db.get_stats()?;
    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "embedding_count": stats.embedding_count,
                "last_indexed": stats.last_indexed,
                "file_size_bytes": file_size,
            })
        );
    } else {
        println!("{}", "Index Status".bold());
        println!();
        println!(
            "  {} {} embeddings",
            "→".dimmed(),
            stats.embedding_count.to_string().cyan()
        );
        println!("  {} Size: {:.2} KB", "→".dimmed(), file_size as f64 / 1024.0);
        if let Some(ts) = stats.last_indexed {
            let dt = chrono::DateTime::from_timestamp(ts, 0)
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            println!("  {} Last indexed: {}", "→".dimmed(), dt);
        }
    }
    Ok(())
}
