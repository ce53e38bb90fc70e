use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{EnrichmentContext, Enricher};
use crate::envelope::ResponseEnvelope;
use crate::error::Result;

/// Applies enrichers one after another; the first error aborts the chain
pub struct ChainedEnricher {
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl ChainedEnricher {
    pub fn new(enrichers: Vec<Arc<dyn Enricher>>) -> Self {
        Self { enrichers }
    }
}

#[async_trait]
impl Enricher for ChainedEnricher {
    fn name(&self) -> &str {
        "chained"
    }

    async fn enrich(
        &self,
        mut envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        for enricher in &self.enrichers {
            if !enricher.supports(ctx.format) {
                debug!(enricher = enricher.name(), format = %ctx.format, "skipping enricher");
                continue;
            }
            envelope = enricher.enrich(envelope, ctx).await?;
        }
        Ok(envelope)
    }

    fn can_run_parallel(&self) -> bool {
        false
    }
}

/// Runs enrichers concurrently on copies of the envelope and merges the
/// changes back
///
/// Every top-level field a branch changed, and every metadata key it
/// inserted, changed or removed, is applied to the original in registration
/// order, so the last enricher to touch a field or key wins.
/// Failures are recorded under `metadata.enrichment_errors` and do not
/// affect the other branches.
pub struct ParallelEnricher {
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl ParallelEnricher {
    pub fn new(enrichers: Vec<Arc<dyn Enricher>>) -> Self {
        Self { enrichers }
    }
}

#[async_trait]
impl Enricher for ParallelEnricher {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn enrich(
        &self,
        envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        let eligible: Vec<&Arc<dyn Enricher>> = self
            .enrichers
            .iter()
            .filter(|e| e.supports(ctx.format))
            .collect();

        let results = join_all(eligible.iter().map(|enricher| {
            let copy = envelope.clone();
            async move { (enricher.name().to_string(), enricher.enrich(copy, ctx).await) }
        }))
        .await;

        let mut merged = envelope.clone();
        let mut errors = Vec::new();
        for (name, result) in results {
            match result {
                Ok(enriched) => merge_changes(&envelope, enriched, &mut merged),
                Err(e) => {
                    warn!(enricher = %name, error = %e, "enricher failed");
                    errors.push(json!({ "enricher": name, "error": e.to_string() }));
                }
            }
        }

        if !errors.is_empty() {
            merged.set_meta("enrichment_errors", Value::Array(errors));
        }
        Ok(merged)
    }
}

/// Apply whatever `enriched` changed relative to `original` onto `target`
fn merge_changes(original: &ResponseEnvelope, enriched: ResponseEnvelope, target: &mut ResponseEnvelope) {
    if enriched.query != original.query {
        target.query = enriched.query;
    }
    if enriched.specialist_id != original.specialist_id {
        target.specialist_id = enriched.specialist_id;
    }
    if enriched.strategy != original.strategy {
        target.strategy = enriched.strategy;
    }
    if enriched.answer != original.answer {
        target.answer = enriched.answer;
    }
    if enriched.confidence != original.confidence {
        target.confidence = enriched.confidence;
    }
    if enriched.patterns != original.patterns {
        target.patterns = enriched.patterns;
    }
    if enriched.responses != original.responses {
        target.responses = enriched.responses;
    }
    for key in original.metadata.keys() {
        if !enriched.metadata.contains_key(key) {
            target.metadata.remove(key);
        }
    }
    for (key, value) in enriched.metadata {
        if original.metadata.get(&key) != Some(&value) {
            target.metadata.insert(key, value);
        }
    }
}
