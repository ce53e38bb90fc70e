use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::{rank_specialists, RouteResult, Router, RoutingStrategy};
use crate::specialist::{QueryContext, SpecialistMap};

/// Routes to the best specialist, backed by a configured fallback chain
/// when its score is below the threshold
pub struct HierarchyRouter {
    threshold: f32,
    hierarchies: HashMap<String, Vec<String>>,
    max_chain_length: usize,
}

impl HierarchyRouter {
    pub fn new(
        threshold: f32,
        hierarchies: HashMap<String, Vec<String>>,
        max_chain_length: usize,
    ) -> Self {
        Self {
            threshold,
            hierarchies,
            max_chain_length: max_chain_length.max(1),
        }
    }

    fn chain(&self, best: &str, specialists: &SpecialistMap) -> Vec<String> {
        let mut chain = vec![best.to_string()];
        for id in self.hierarchies.get(best).into_iter().flatten() {
            if chain.len() >= self.max_chain_length {
                break;
            }
            if specialists.contains_key(id) && !chain.contains(id) {
                chain.push(id.clone());
            }
        }
        chain
    }
}

#[async_trait]
impl Router for HierarchyRouter {
    fn name(&self) -> &str {
        "hierarchy"
    }

    async fn route(
        &self,
        query: &str,
        specialists: &SpecialistMap,
        _ctx: Option<&QueryContext>,
    ) -> RouteResult {
        let ranked = rank_specialists(query, specialists);
        let Some((best, score)) = ranked.into_iter().next() else {
            return RouteResult::empty("no specialists registered");
        };

        if score >= self.threshold {
            return RouteResult::single(
                best.clone(),
                score,
                format!("{} scored {:.2} (threshold {:.2})", best, score, self.threshold),
            );
        }

        let chain = self.chain(&best, specialists);
        debug!(primary = %best, score, chain = ?chain, "hierarchy route");
        let chain_length = chain.len();
        RouteResult {
            reasoning: format!(
                "{} scored {:.2} below {:.2}; fallback chain of {}",
                best, score, self.threshold, chain_length
            ),
            specialist_ids: chain,
            strategy: RoutingStrategy::Fallback,
            confidence: score,
            metadata: Default::default(),
        }
        .with_meta("chain_length", chain_length)
    }
}
