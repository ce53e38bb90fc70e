//! Specialist routing and response aggregation
//!
//! A [`Router`] picks which specialists answer a query and how they are
//! invoked; the [`ResponseAggregator`] folds their responses into one
//! [`ResponseEnvelope`](crate::envelope::ResponseEnvelope).

mod aggregator;
mod confidence;
mod hierarchy;
mod multi;
mod registry;

pub use aggregator::{AggregationStrategy, ResponseAggregator};
pub use confidence::ConfidenceRouter;
pub use hierarchy::HierarchyRouter;
pub use multi::MultiSpecialistRouter;
pub use registry::{RouterConstructor, RouterRegistry};

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::specialist::{QueryContext, SpecialistMap};

pub const DEFAULT_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MULTI_THRESHOLD: f32 = 0.2;

/// How the selected specialists are invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Single,
    #[default]
    Parallel,
    Sequential,
    Fallback,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingStrategy::Single => "single",
            RoutingStrategy::Parallel => "parallel",
            RoutingStrategy::Sequential => "sequential",
            RoutingStrategy::Fallback => "fallback",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Order matters for sequential and fallback invocation
    pub specialist_ids: Vec<String>,
    pub strategy: RoutingStrategy,
    pub confidence: f32,
    pub reasoning: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RouteResult {
    /// No specialist selected
    pub fn empty(reasoning: impl Into<String>) -> Self {
        Self {
            specialist_ids: Vec::new(),
            strategy: RoutingStrategy::Single,
            confidence: 0.0,
            reasoning: reasoning.into(),
            metadata: Map::new(),
        }
    }

    pub fn single(id: impl Into<String>, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            specialist_ids: vec![id.into()],
            strategy: RoutingStrategy::Single,
            confidence,
            reasoning: reasoning.into(),
            metadata: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.specialist_ids.is_empty()
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    async fn route(
        &self,
        query: &str,
        specialists: &SpecialistMap,
        ctx: Option<&QueryContext>,
    ) -> RouteResult;

    /// Every id is registered and the confidence lies in [0, 1]
    fn validate(&self, result: &RouteResult, specialists: &SpecialistMap) -> bool {
        result
            .specialist_ids
            .iter()
            .all(|id| specialists.contains_key(id))
            && (0.0..=1.0).contains(&result.confidence)
    }
}

/// Router settings; `kind` selects the implementation from [`RouterRegistry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub kind: String,
    /// Falls back to the per-kind default when unset
    pub threshold: Option<f32>,
    pub generalist: Option<String>,
    /// Fallback chains keyed by the primary specialist id
    pub hierarchies: HashMap<String, Vec<String>>,
    pub max_chain_length: usize,
    pub min_specialists: usize,
    pub max_specialists: usize,
    /// Invocation mode for the multi-specialist router
    pub mode: RoutingStrategy,
    pub require_threshold: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            kind: "confidence".to_string(),
            threshold: None,
            generalist: None,
            hierarchies: HashMap::new(),
            max_chain_length: 3,
            min_specialists: 1,
            max_specialists: 3,
            mode: RoutingStrategy::Parallel,
            require_threshold: false,
        }
    }
}

/// `can_handle` for every specialist, best first, ties by id ascending
pub(crate) fn rank_specialists(query: &str, specialists: &SpecialistMap) -> Vec<(String, f32)> {
    let mut scores: Vec<(String, f32)> = specialists
        .iter()
        .map(|(id, s)| (id.clone(), s.can_handle(query).clamp(0.0, 1.0)))
        .collect();
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialist::testing::{map, FixedSpecialist};

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let specialists = map(vec![
            FixedSpecialist::scoring("zeta", 0.5),
            FixedSpecialist::scoring("alpha", 0.5),
            FixedSpecialist::scoring("mid", 0.9),
        ]);
        let ranked: Vec<String> = rank_specialists("q", &specialists)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ranked, vec!["mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_validate() {
        let router = ConfidenceRouter::new(DEFAULT_THRESHOLD, None);
        let specialists = map(vec![FixedSpecialist::scoring("a", 0.5)]);

        assert!(router.validate(&RouteResult::single("a", 0.5, ""), &specialists));
        assert!(router.validate(&RouteResult::empty("none"), &specialists));
        assert!(!router.validate(&RouteResult::single("ghost", 0.5, ""), &specialists));
        assert!(!router.validate(&RouteResult::single("a", 1.5, ""), &specialists));
    }

    #[test]
    fn test_strategy_serde() {
        let value = serde_json::to_value(RoutingStrategy::Fallback).unwrap();
        assert_eq!(value, "fallback");
        assert_eq!(RoutingStrategy::Sequential.to_string(), "sequential");
    }
}
