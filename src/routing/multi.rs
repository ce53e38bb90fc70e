use async_trait::async_trait;
use tracing::debug;

use super::{rank_specialists, RouteResult, Router, RoutingStrategy};
use crate::specialist::{QueryContext, SpecialistMap};

/// Routes to every specialist above the threshold
pub struct MultiSpecialistRouter {
    threshold: f32,
    min_specialists: usize,
    max_specialists: usize,
    mode: RoutingStrategy,
    require_threshold: bool,
}

impl MultiSpecialistRouter {
    pub fn new(threshold: f32, min_specialists: usize, max_specialists: usize) -> Self {
        Self {
            threshold,
            min_specialists,
            max_specialists: max_specialists.max(min_specialists),
            mode: RoutingStrategy::Parallel,
            require_threshold: false,
        }
    }

    /// Parallel or sequential invocation
    pub fn mode(mut self, mode: RoutingStrategy) -> Self {
        self.mode = mode;
        self
    }

    /// Never top up with specialists below the threshold
    ///
    /// The route may then hold fewer than `min_specialists`; it records the
    /// requested minimum under `metadata.short_of_min` when that happens.
    pub fn require_threshold(mut self, require: bool) -> Self {
        self.require_threshold = require;
        self
    }
}

#[async_trait]
impl Router for MultiSpecialistRouter {
    fn name(&self) -> &str {
        "multi"
    }

    async fn route(
        &self,
        query: &str,
        specialists: &SpecialistMap,
        _ctx: Option<&QueryContext>,
    ) -> RouteResult {
        let ranked = rank_specialists(query, specialists);
        let qualified = ranked.iter().filter(|(_, s)| *s >= self.threshold).count();

        let take = if qualified >= self.min_specialists || self.require_threshold {
            qualified
        } else {
            self.min_specialists
        };
        let selected: Vec<(String, f32)> =
            ranked.into_iter().take(take.min(self.max_specialists)).collect();

        if selected.is_empty() {
            return RouteResult::empty(format!(
                "no specialist reached {:.2}",
                self.threshold
            ));
        }

        let confidence = selected.iter().map(|(_, s)| s).sum::<f32>() / selected.len() as f32;
        let short_of_min = selected.len() < self.min_specialists;
        debug!(selected = selected.len(), qualified, confidence, "multi route");

        let result = RouteResult {
            reasoning: format!(
                "{} of {} selected specialists reached {:.2}",
                qualified.min(selected.len()),
                selected.len(),
                self.threshold
            ),
            specialist_ids: selected.into_iter().map(|(id, _)| id).collect(),
            strategy: self.mode,
            confidence,
            metadata: Default::default(),
        }
        .with_meta("qualified", qualified);

        // Fewer specialists than requested, either registered or qualified
        if short_of_min {
            result.with_meta("short_of_min", self.min_specialists)
        } else {
            result
        }
    }
}
