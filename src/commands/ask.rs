//! Ask command - full query resolution

use anyhow::{Context, Result};
use colored::Colorize;

use pattern_expert::config::ExpertConfig;
use pattern_expert::{QueryPipeline, ResponseEnvelope};

use super::{score_colored, truncate};

pub async fn run(config: &ExpertConfig, query: &str, json: bool) -> Result<()> {
    let pipeline = QueryPipeline::from_config(config)
        .with_context(|| format!("building pipeline for '{}'", config.domain))?;
    let envelope = pipeline.resolve(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        print_envelope(&envelope);
    }
    Ok(())
}

fn print_envelope(envelope: &ResponseEnvelope) {
    if envelope.is_empty() {
        println!(
            "{} No answer found for: {}",
            "→".dimmed(),
            envelope.query.cyan()
        );
        return;
    }

    let source = envelope.specialist_id.as_deref().unwrap_or("multiple specialists");
    println!(
        "{} [{}] {} ({})",
        "→".dimmed(),
        score_colored(envelope.confidence),
        source.cyan(),
        envelope.strategy
    );
    println!();

    if !envelope.answer.is_empty() {
        println!("{}", envelope.answer);
        println!();
    }

    for response in &envelope.responses {
        println!("{}", response.specialist_id.bold());
        println!("{}", "-".repeat(50));
        if response.raw_answer.is_empty() {
            for pattern in &response.patterns {
                println!("  • {}", pattern.name);
            }
        } else {
            println!("{}", response.raw_answer);
        }
        println!();
    }

    if envelope.patterns.len() > 1 {
        println!("{}", "Patterns".bold());
        for (i, p) in envelope.patterns.iter().enumerate() {
            let score = p.combined_score.unwrap_or(p.pattern.confidence);
            println!(
                "{}. [{}] {} {}",
                (i + 1).to_string().bold(),
                score_colored(score),
                p.pattern.name.cyan(),
                p.id().unwrap_or("").dimmed()
            );
            if !p.pattern.description.is_empty() {
                println!("   {}", truncate(&p.pattern.description, 100).dimmed());
            }
        }
        println!();
    }

    if let Some(related) = envelope.metadata.get("related_patterns").and_then(|v| v.as_array()) {
        let names: Vec<&str> = related.iter().filter_map(|r| r["name"].as_str()).collect();
        println!("{} Related: {}", "→".dimmed(), names.join(", "));
    }
    if let Some(errors) = envelope.metadata.get("enrichment_errors").and_then(|v| v.as_array()) {
        for e in errors {
            eprintln!(
                "{} enricher {} failed: {}",
                "!".yellow(),
                e["enricher"].as_str().unwrap_or("?"),
                e["error"].as_str().unwrap_or("?")
            );
        }
    }
}
