use std::collections::BTreeMap;

use anyhow::Result;
use colored::*;
use serde::Serialize;

use pattern_expert::config::ExpertConfig;
use pattern_expert::ExpertPaths;

use super::{open_store, pad};

#[derive(Serialize)]
struct DomainStatus {
    domain: String,
    patterns_path: String,
    pattern_count: usize,
    status_distribution: BTreeMap<String, usize>,
    category_distribution: BTreeMap<String, usize>,
    average_confidence: f32,
    embeddings_indexed: bool,
    specialists: Vec<String>,
    router: String,
    other_domains: Vec<String>,
}

pub fn run(config: &ExpertConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let patterns = store.all();
    let paths = config.paths();

    let mut status_dist = BTreeMap::new();
    let mut category_dist = BTreeMap::new();
    for p in &patterns {
        *status_dist.entry(p.status.to_string()).or_insert(0) += 1;
        let category = p.category.clone().unwrap_or_else(|| "(none)".to_string());
        *category_dist.entry(category).or_insert(0) += 1;
    }
    let average_confidence = if patterns.is_empty() {
        0.0
    } else {
        patterns.iter().map(|p| p.confidence).sum::<f32>() / patterns.len() as f32
    };

    let status = DomainStatus {
        domain: config.domain.clone(),
        patterns_path: paths.patterns.display().to_string(),
        pattern_count: patterns.len(),
        status_distribution: status_dist,
        category_distribution: category_dist,
        average_confidence,
        embeddings_indexed: paths.embeddings.exists(),
        specialists: config.specialists.iter().map(|s| s.id.clone()).collect(),
        router: config.router.kind.clone(),
        other_domains: ExpertPaths::discover_domains(&config.data_dir)
            .into_iter()
            .filter(|d| d != &config.domain)
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &DomainStatus) {
    println!("{}", format!("Domain: {}", status.domain).bold());
    println!("{}", "=".repeat(50));
    println!();
    println!(
        "  {} {} patterns in {}",
        "→".dimmed(),
        status.pattern_count.to_string().cyan(),
        status.patterns_path
    );
    println!(
        "  {} average confidence {:.2}",
        "→".dimmed(),
        status.average_confidence
    );
    println!(
        "  {} embeddings {}",
        "→".dimmed(),
        if status.embeddings_indexed {
            "indexed".green()
        } else {
            "not built".yellow()
        }
    );
    println!(
        "  {} router {} with {}",
        "→".dimmed(),
        status.router,
        status.specialists.join(", ")
    );

    for (title, dist) in [
        ("Status", &status.status_distribution),
        ("Categories", &status.category_distribution),
    ] {
        if dist.is_empty() {
            continue;
        }
        println!();
        println!("{}", title.bold());
        let width = dist.keys().map(|k| k.len()).max().unwrap_or(0);
        for (key, count) in dist {
            println!("  {} {}", pad(key, width), count.to_string().cyan());
        }
    }

    if !status.other_domains.is_empty() {
        println!();
        println!(
            "{} Other domains: {}",
            "→".dimmed(),
            status.other_domains.join(", ")
        );
    }
}
