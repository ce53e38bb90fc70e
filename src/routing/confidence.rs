use async_trait::async_trait;
use tracing::debug;

use super::{rank_specialists, RouteResult, Router};
use crate::specialist::{QueryContext, SpecialistMap};

/// Routes to the single best-scoring specialist
pub struct ConfidenceRouter {
    threshold: f32,
    generalist: Option<String>,
}

impl ConfidenceRouter {
    pub fn new(threshold: f32, generalist: Option<String>) -> Self {
        Self {
            threshold,
            generalist,
        }
    }
}

#[async_trait]
impl Router for ConfidenceRouter {
    fn name(&self) -> &str {
        "confidence"
    }

    async fn route(
        &self,
        query: &str,
        specialists: &SpecialistMap,
        _ctx: Option<&QueryContext>,
    ) -> RouteResult {
        let ranked = rank_specialists(query, specialists);
        let best = ranked.first().cloned();

        if let Some((id, score)) = &best {
            if *score >= self.threshold {
                debug!(specialist = %id, score, "confidence route");
                return RouteResult::single(
                    id.clone(),
                    *score,
                    format!("{} scored {:.2} (threshold {:.2})", id, score, self.threshold),
                );
            }
        }

        let best_score = best.as_ref().map(|(_, s)| *s).unwrap_or(0.0);
        match &self.generalist {
            Some(generalist) => {
                let confidence = specialists
                    .get(generalist)
                    .map(|s| s.can_handle(query).clamp(0.0, 1.0))
                    .unwrap_or(0.0);
                debug!(specialist = %generalist, best_score, "generalist fallback");
                RouteResult::single(
                    generalist.clone(),
                    confidence,
                    format!(
                        "no specialist reached {:.2} (best {:.2}); using generalist {}",
                        self.threshold, best_score, generalist
                    ),
                )
                .with_meta("fallback", true)
                .with_meta("best_score", best_score)
            }
            None => RouteResult::empty(format!(
                "no specialist reached {:.2} (best {:.2})",
                self.threshold, best_score
            )),
        }
    }
}
