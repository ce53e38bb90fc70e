pub mod add;
pub mod ask;
pub mod delete;
pub mod feedback;
pub mod index;
pub mod init;
pub mod search;
pub mod status;
pub mod update;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use pattern_expert::config::ExpertConfig;
use pattern_expert::core::store::PatternStore;
use pattern_expert::pipeline::open_engine;
use pattern_expert::HybridSearchEngine;

/// Load the configured domain's pattern store
pub fn open_store(config: &ExpertConfig) -> Result<PatternStore> {
    let paths = config.paths();
    let store = PatternStore::new(&config.domain, &paths.patterns).with_decay(config.feedback.decay);
    store
        .load()
        .with_context(|| format!("loading {}", paths.patterns.display()))?;
    Ok(store)
}

pub fn open_search(config: &ExpertConfig) -> Result<HybridSearchEngine> {
    open_engine(config).with_context(|| format!("opening domain '{}'", config.domain))
}

/// Truncate to a display width, char-aware for wide Unicode
pub fn truncate(text: &str, max_width: usize) -> String {
    let text = text.replace('\n', " ");
    if text.width() <= max_width {
        return text;
    }
    let mut width = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > max_width.saturating_sub(3) {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push_str("...");
    out
}

/// Pad to a display width
pub fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

pub fn score_colored(score: f32) -> ColoredString {
    let s = format!("{:.2}", score);
    if score > 0.8 {
        s.green()
    } else if score > 0.6 {
        s.yellow()
    } else {
        s.dimmed()
    }
}
