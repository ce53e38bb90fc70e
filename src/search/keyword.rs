//! Keyword relevance scoring
//!
//! A query is reduced to its content words (lowercase, punctuation stripped,
//! stop-words and tokens of two characters or fewer removed). A pattern earns
//! one point per content word found anywhere in its searchable text, plus a
//! bonus when it was created from the very same query (+100) or when its
//! origin query shares a content word (+30).

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::core::pattern::Pattern;

pub const EXACT_MATCH_BONUS: f32 = 100.0;
pub const ORIGIN_WORD_BONUS: f32 = 30.0;

lazy_static! {
    static ref PUNCTUATION_RE: Regex = Regex::new(r"[^\p{L}\p{N}\s]+").unwrap();
    static ref STOP_WORDS: HashSet<&'static str> = HashSet::from([
        "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had",
        "her", "was", "one", "our", "out", "has", "have", "his", "how", "its", "may", "who",
        "why", "what", "when", "where", "which", "with", "without", "this", "that", "these",
        "those", "there", "then", "than", "them", "they", "from", "into", "onto", "about",
        "would", "could", "should", "will", "shall", "does", "did", "doing", "done", "been",
        "being", "were", "some", "such", "only", "own", "same", "very", "just", "also", "more",
        "most", "other", "over", "under", "again", "each", "few", "both", "here", "once",
        "while", "because", "until", "between", "through", "during", "before", "after",
        "above", "below", "off", "too", "him", "she", "myself", "yourself", "get",
        "use", "using", "want", "need", "please", "tell", "show", "give", "make",
    ]);
}

/// Distinct content words of `text`, in first-seen order
pub fn content_words(text: &str) -> Vec<String> {
    let cleaned = PUNCTUATION_RE.replace_all(text, " ").to_lowercase();
    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(*w))
        .filter(|w| seen.insert(w.to_string()))
        .map(String::from)
        .collect()
}

/// A query prepared once and scored against many patterns
#[derive(Debug, Clone)]
pub struct KeywordQuery {
    pub raw_lower: String,
    pub words: Vec<String>,
}

impl KeywordQuery {
    pub fn new(query: &str) -> Self {
        Self {
            raw_lower: query.trim().to_lowercase(),
            words: content_words(query),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KeywordScore {
    /// Content words found in the pattern's text
    pub base: usize,
    /// `base` plus match bonuses; used for ranking and score bands
    pub total: f32,
    pub exact_match: bool,
    pub origin_word_match: bool,
}

impl KeywordScore {
    /// Whether keyword-only search may return this pattern
    pub fn is_eligible(&self) -> bool {
        self.base > 0 || self.exact_match || self.origin_word_match
    }
}

pub fn score_pattern(pattern: &Pattern, query: &KeywordQuery) -> KeywordScore {
    let origin = pattern
        .origin_query
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .unwrap_or_default();
    let examples: Vec<String> = pattern
        .examples_text()
        .into_iter()
        .map(|e| e.to_lowercase())
        .collect();

    let fields = [
        pattern.name.to_lowercase(),
        pattern.description.to_lowercase(),
        pattern.problem.to_lowercase(),
        pattern.solution.to_lowercase(),
        origin.clone(),
        pattern.tags.join(" ").to_lowercase(),
        examples.join(" "),
    ];

    let base = query
        .words
        .iter()
        .filter(|w| fields.iter().any(|f| f.contains(w.as_str())))
        .count();

    let mut score = KeywordScore {
        base,
        total: base as f32,
        ..Default::default()
    };

    let exact = !query.raw_lower.is_empty()
        && (origin == query.raw_lower || examples.iter().any(|e| e.trim() == query.raw_lower));
    if exact {
        score.exact_match = true;
        score.total += EXACT_MATCH_BONUS;
    } else if !origin.is_empty() && query.words.iter().any(|w| origin.contains(w.as_str())) {
        score.origin_word_match = true;
        score.total += ORIGIN_WORD_BONUS;
    }

    score
}
