use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::envelope::{AttributedPattern, ResponseEnvelope};
use crate::specialist::SpecialistResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    #[default]
    MergeAll,
    FirstWins,
    SideBySide,
    BestPattern,
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationStrategy::MergeAll => "merge_all",
            AggregationStrategy::FirstWins => "first_wins",
            AggregationStrategy::SideBySide => "side_by_side",
            AggregationStrategy::BestPattern => "best_pattern",
        };
        write!(f, "{}", name)
    }
}

/// Folds specialist responses into a single envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAggregator {
    strategy: AggregationStrategy,
}

impl ResponseAggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Aggregate with the configured strategy
    pub fn combine(&self, responses: Vec<SpecialistResponse>, query: &str) -> ResponseEnvelope {
        Self::aggregate(responses, self.strategy, query)
    }

    pub fn aggregate(
        mut responses: Vec<SpecialistResponse>,
        strategy: AggregationStrategy,
        query: &str,
    ) -> ResponseEnvelope {
        match responses.len() {
            0 => return ResponseEnvelope::empty(query, strategy.to_string()),
            1 => {
                if let Some(only) = responses.pop() {
                    return ResponseEnvelope::from_response(only, query);
                }
            }
            _ => {}
        }

        debug!(responses = responses.len(), %strategy, "aggregating");
        let mut envelope = match strategy {
            AggregationStrategy::MergeAll => merge_all(responses, query),
            AggregationStrategy::FirstWins => first_wins(responses, query),
            AggregationStrategy::SideBySide => side_by_side(responses, query),
            AggregationStrategy::BestPattern => best_pattern(responses, query),
        };
        envelope.strategy = strategy.to_string();
        envelope
    }
}

fn max_confidence(responses: &[SpecialistResponse]) -> f32 {
    responses.iter().map(|r| r.confidence).fold(0.0, f32::max)
}

fn specialist_ids(responses: &[SpecialistResponse]) -> Value {
    responses
        .iter()
        .map(|r| Value::from(r.specialist_id.clone()))
        .collect()
}

fn merge_all(responses: Vec<SpecialistResponse>, query: &str) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::empty(query, "");
    envelope.confidence = max_confidence(&responses);
    envelope.set_meta("specialists", specialist_ids(&responses));

    // answer from the most confident response, first on ties
    if let Some(best) = responses
        .iter()
        .fold(None::<&SpecialistResponse>, |best, r| match best {
            Some(b) if b.confidence >= r.confidence => Some(b),
            _ => Some(r),
        })
    {
        envelope.answer = best.raw_answer.clone();
    }

    let mut scored: Vec<AttributedPattern> = responses
        .into_iter()
        .flat_map(|response| {
            let weight = response.confidence;
            let source = response.specialist_id;
            response.patterns.into_iter().map(move |pattern| {
                let score = pattern.confidence * weight;
                AttributedPattern::new(pattern, source.clone()).scored(score)
            })
        })
        .collect();

    // stable, so equal scores keep response order
    scored.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut seen = HashSet::new();
    envelope.patterns = scored
        .into_iter()
        .filter(|p| match p.id() {
            Some(id) => seen.insert(id.to_string()),
            None => true,
        })
        .collect();
    envelope
}

fn first_wins(mut responses: Vec<SpecialistResponse>, query: &str) -> ResponseEnvelope {
    let alternatives = responses.split_off(1);
    let mut envelope = match responses.pop() {
        Some(first) => ResponseEnvelope::from_response(first, query),
        None => ResponseEnvelope::empty(query, ""),
    };
    envelope.set_meta(
        "alternative_responses",
        serde_json::to_value(&alternatives).unwrap_or(Value::Null),
    );
    envelope
}

fn side_by_side(responses: Vec<SpecialistResponse>, query: &str) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::empty(query, "");
    envelope.confidence = max_confidence(&responses);
    envelope.set_meta("specialists", specialist_ids(&responses));
    envelope.responses = responses;
    envelope
}

fn best_pattern(responses: Vec<SpecialistResponse>, query: &str) -> ResponseEnvelope {
    let mut best: Option<(usize, usize, f32)> = None;
    for (ri, response) in responses.iter().enumerate() {
        for (pi, pattern) in response.patterns.iter().enumerate() {
            let score = pattern.confidence * response.confidence;
            if best.map_or(true, |(_, _, top)| score > top) {
                best = Some((ri, pi, score));
            }
        }
    }

    let Some((ri, pi, score)) = best else {
        return merge_all(responses, query);
    };

    let confidence = max_confidence(&responses);
    let ids = specialist_ids(&responses);
    let Some(mut source) = responses.into_iter().nth(ri) else {
        return ResponseEnvelope::empty(query, "");
    };
    let pattern = source.patterns.swap_remove(pi);

    let mut envelope = ResponseEnvelope::empty(query, "");
    envelope.specialist_id = Some(source.specialist_id.clone());
    envelope.confidence = confidence;
    envelope.answer = source.raw_answer;
    envelope.patterns = vec![AttributedPattern::new(pattern, source.specialist_id).scored(score)];
    envelope.set_meta("specialists", ids);
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pattern::Pattern;

    fn pattern(id: &str, confidence: f32) -> Pattern {
        let mut p = Pattern::new(id, "solution").with_id(id);
        p.confidence = confidence;
        p
    }

    fn responses() -> Vec<SpecialistResponse> {
        vec![
            SpecialistResponse::new("a", 0.6)
                .with_patterns(vec![pattern("p1", 0.5), pattern("p2", 0.9)])
                .with_answer("from a"),
            SpecialistResponse::new("b", 0.8)
                .with_patterns(vec![pattern("p1", 0.5), pattern("p3", 0.4)])
                .with_answer("from b"),
        ]
    }

    #[test]
    fn test_empty_and_single() {
        let empty = ResponseAggregator::aggregate(vec![], AggregationStrategy::MergeAll, "q");
        assert_eq!(empty.confidence, 0.0);
        assert!(empty.patterns.is_empty());

        let single = ResponseAggregator::aggregate(
            responses().into_iter().take(1).collect(),
            AggregationStrategy::BestPattern,
            "q",
        );
        assert_eq!(single.strategy, "single");
        assert_eq!(single.patterns.len(), 2);
    }

    #[test]
    fn test_merge_all_scores_and_dedups() {
        let envelope = ResponseAggregator::aggregate(responses(), AggregationStrategy::MergeAll, "q");
        let ids: Vec<_> = envelope.patterns.iter().filter_map(|p| p.id()).collect();

        // p2: 0.9*0.6, p1: 0.5*0.8 beats 0.5*0.6, p3: 0.4*0.8
        assert_eq!(ids, vec!["p2", "p1", "p3"]);
        assert_eq!(envelope.patterns[1].source_specialist.as_deref(), Some("b"));
        for p in &envelope.patterns {
            assert!(p.combined_score.is_some());
        }
        assert!((envelope.patterns[0].combined_score.unwrap() - 0.54).abs() < 1e-6);
        assert_eq!(envelope.confidence, 0.8);
        assert_eq!(envelope.answer, "from b");
        assert_eq!(envelope.strategy, "merge_all");
    }

    #[test]
    fn test_merge_all_keeps_patterns_without_id() {
        let anonymous = Pattern::new("synthetic", "made up");
        let responses = vec![
            SpecialistResponse::new("a", 0.5).with_patterns(vec![anonymous.clone()]),
            SpecialistResponse::new("b", 0.5).with_patterns(vec![anonymous]),
        ];
        let envelope = ResponseAggregator::aggregate(responses, AggregationStrategy::MergeAll, "q");
        assert_eq!(envelope.patterns.len(), 2);
    }

    #[test]
    fn test_first_wins() {
        let envelope =
            ResponseAggregator::aggregate(responses(), AggregationStrategy::FirstWins, "q");
        assert_eq!(envelope.specialist_id.as_deref(), Some("a"));
        assert_eq!(envelope.patterns.len(), 2);
        assert_eq!(envelope.answer, "from a");

        let alternatives = envelope.metadata["alternative_responses"].as_array().unwrap();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0]["specialist_id"], "b");
    }

    #[test]
    fn test_side_by_side() {
        let envelope =
            ResponseAggregator::aggregate(responses(), AggregationStrategy::SideBySide, "q");
        assert!(envelope.patterns.is_empty());
        assert_eq!(envelope.responses.len(), 2);
        assert_eq!(envelope.strategy, "side_by_side");
    }

    #[test]
    fn test_best_pattern() {
        let envelope =
            ResponseAggregator::aggregate(responses(), AggregationStrategy::BestPattern, "q");
        assert_eq!(envelope.patterns.len(), 1);
        assert_eq!(envelope.patterns[0].id(), Some("p2"));
        assert_eq!(envelope.specialist_id.as_deref(), Some("a"));

        let no_patterns = vec![
            SpecialistResponse::new("a", 0.4),
            SpecialistResponse::new("b", 0.7),
        ];
        let fallback =
            ResponseAggregator::aggregate(no_patterns, AggregationStrategy::BestPattern, "q");
        assert!(fallback.patterns.is_empty());
        assert_eq!(fallback.confidence, 0.7);
        assert_eq!(fallback.strategy, "best_pattern");
    }
}
