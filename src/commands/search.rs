//! Search command - direct hybrid search over one domain

use anyhow::Result;
use colored::Colorize;

use pattern_expert::config::ExpertConfig;
use pattern_expert::SearchRequest;

use super::{open_search, pad, score_colored, truncate};

pub async fn run(
    config: &ExpertConfig,
    query: &str,
    limit: Option<usize>,
    category: Option<&str>,
    exact: bool,
    json: bool,
) -> Result<()> {
    let engine = open_search(config)?;
    let limit = limit.unwrap_or(config.search.default_limit);
    let request = SearchRequest::new(query, limit)
        .category(category)
        .exact_only(exact);
    let hits = engine.search_scored(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    let mode = if hits.iter().any(|h| h.semantic.is_some()) {
        "semantic"
    } else {
        "keyword"
    };
    println!(
        "{} {} results for: {} ({})",
        "→".dimmed(),
        hits.len(),
        query.cyan(),
        mode
    );
    println!();

    let id_width = hits.iter().map(|h| h.id().len()).max().unwrap_or(0).min(24);
    for (i, hit) in hits.iter().enumerate() {
        let marker = if hit.keyword.exact_match {
            " exact".green().to_string()
        } else {
            String::new()
        };
        println!(
            "{}. [{}] {} {}{}",
            (i + 1).to_string().bold(),
            score_colored(hit.combined.min(1.0)),
            pad(&truncate(hit.id(), 24), id_width).dimmed(),
            hit.pattern.name.cyan(),
            marker
        );

        let summary = if hit.pattern.description.is_empty() {
            &hit.pattern.solution
        } else {
            &hit.pattern.description
        };
        if !summary.is_empty() {
            println!("   {}", truncate(summary, 100).dimmed());
        }
        if let Some(category) = &hit.pattern.category {
            println!("   {} | confidence {:.2}", category, hit.pattern.confidence);
        }
        println!();
    }

    Ok(())
}
