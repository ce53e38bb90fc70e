use anyhow::Result;
use colored::*;

use pattern_expert::config::ExpertConfig;
use pattern_expert::Feedback;

use super::{open_store, score_colored};

pub fn run(config: &ExpertConfig, id: &str, rating: u8, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let before = store.get_by_id(id).map(|p| p.confidence);
    store.record_feedback(id, Feedback { rating: Some(rating) })?;
    let after = store.get_by_id(id);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": id,
                "rating": rating,
                "previous_confidence": before,
                "confidence": after.as_ref().map(|p| p.confidence),
                "times_accessed": after.as_ref().map(|p| p.times_accessed),
            })
        );
    } else if let Some(pattern) = after {
        println!(
            "{} Recorded {}/5 for {}: confidence {} → {}",
            "✓".green(),
            rating,
            id.cyan(),
            before.map(|c| format!("{:.2}", c)).unwrap_or_default(),
            score_colored(pattern.confidence)
        );
    }
    Ok(())
}
