//! Query resolution: route, invoke, aggregate, enrich

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ExpertConfig;
use crate::core::store::PatternStore;
use crate::enrich::{ChainedEnricher, EnricherRegistry, EnrichmentContext, Enricher, OutputFormat};
use crate::envelope::ResponseEnvelope;
use crate::error::Result;
use crate::routing::{
    AggregationStrategy, ResponseAggregator, RouteResult, Router, RouterRegistry, RoutingStrategy,
};
use crate::search::{EmbeddingService, HybridSearchEngine, VectorDB};
use crate::specialist::{QueryContext, SpecialistMap, SpecialistRegistry, SpecialistResponse};

pub struct QueryPipeline {
    engine: Arc<HybridSearchEngine>,
    specialists: SpecialistMap,
    router: Box<dyn Router>,
    aggregator: ResponseAggregator,
    enricher: Arc<dyn Enricher>,
    format: OutputFormat,
}

impl QueryPipeline {
    /// Pipeline with no enrichment and the default aggregation strategy
    pub fn new(
        engine: Arc<HybridSearchEngine>,
        specialists: SpecialistMap,
        router: Box<dyn Router>,
    ) -> Self {
        Self {
            engine,
            specialists,
            router,
            aggregator: ResponseAggregator::default(),
            enricher: Arc::new(ChainedEnricher::new(Vec::new())),
            format: OutputFormat::default(),
        }
    }

    pub fn with_aggregation(mut self, strategy: AggregationStrategy) -> Self {
        self.aggregator = ResponseAggregator::new(strategy);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>, format: OutputFormat) -> Self {
        self.enricher = enricher;
        self.format = format;
        self
    }

    /// Open the configured domain and assemble every stage
    pub fn from_config(config: &ExpertConfig) -> Result<Self> {
        let engine = Arc::new(open_engine(config)?);
        let specialists = SpecialistRegistry::default().build_all(&config.specialists, &engine)?;
        let router = RouterRegistry::default().build(&config.router)?;
        let enricher = EnricherRegistry::default().build_pipeline(&config.enrichment)?;

        info!(
            domain = %config.domain,
            patterns = engine.store().count(),
            specialists = specialists.len(),
            router = router.name(),
            "pipeline ready"
        );

        Ok(Self::new(engine, specialists, router)
            .with_aggregation(config.aggregation)
            .with_enricher(enricher, config.enrichment.format))
    }

    pub fn engine(&self) -> &Arc<HybridSearchEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<PatternStore> {
        self.engine.store()
    }

    pub fn specialists(&self) -> &SpecialistMap {
        &self.specialists
    }

    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    pub async fn resolve(&self, query: &str) -> Result<ResponseEnvelope> {
        let ctx = QueryContext::new(self.store().domain());
        let route = self.router.route(query, &self.specialists, Some(&ctx)).await;
        debug!(
            specialists = ?route.specialist_ids,
            strategy = %route.strategy,
            confidence = route.confidence,
            "routed"
        );

        if !self.router.validate(&route, &self.specialists) {
            warn!(specialists = ?route.specialist_ids, "router produced an invalid route");
            let mut envelope = ResponseEnvelope::empty(query, self.aggregator.strategy().to_string());
            envelope.set_meta("route_invalid", true);
            envelope.set_meta("route", route_summary(&route));
            return Ok(envelope);
        }

        let responses = self.invoke(&route, query, &ctx).await;
        let mut envelope = self.aggregator.combine(responses, query);
        envelope.set_meta("route", route_summary(&route));

        let enrich_ctx = EnrichmentContext::new(query, Arc::clone(self.store()))
            .specialist(envelope.specialist_id.clone())
            .format(self.format);
        let envelope = self.enricher.enrich(envelope, &enrich_ctx).await?;

        info!(
            patterns = envelope.patterns.len(),
            confidence = envelope.confidence,
            "query resolved"
        );
        Ok(envelope)
    }

    async fn invoke(
        &self,
        route: &RouteResult,
        query: &str,
        ctx: &QueryContext,
    ) -> Vec<SpecialistResponse> {
        match route.strategy {
            RoutingStrategy::Single => match route.specialist_ids.first() {
                Some(id) => self.call(id, query, ctx).await.into_iter().collect(),
                None => Vec::new(),
            },
            RoutingStrategy::Parallel => {
                join_all(route.specialist_ids.iter().map(|id| self.call(id, query, ctx)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect()
            }
            RoutingStrategy::Sequential => {
                let mut responses = Vec::new();
                for id in &route.specialist_ids {
                    responses.extend(self.call(id, query, ctx).await);
                }
                responses
            }
            RoutingStrategy::Fallback => {
                let mut attempted = Vec::new();
                for id in &route.specialist_ids {
                    let Some(response) = self.call(id, query, ctx).await else {
                        continue;
                    };
                    if !response.patterns.is_empty() {
                        return vec![response];
                    }
                    debug!(specialist = %id, "no patterns, trying next in chain");
                    attempted.push(response);
                }
                attempted
            }
        }
    }

    async fn call(&self, id: &str, query: &str, ctx: &QueryContext) -> Option<SpecialistResponse> {
        let specialist = self.specialists.get(id)?;
        match specialist.process_query(query, ctx).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(specialist = %id, error = %e, "specialist failed");
                None
            }
        }
    }
}

fn route_summary(route: &RouteResult) -> serde_json::Value {
    json!({
        "specialists": route.specialist_ids,
        "strategy": route.strategy,
        "confidence": route.confidence,
        "reasoning": route.reasoning,
    })
}

/// Pattern store, vector store and embedding backend for the configured domain
///
/// A vector store that cannot be opened only disables semantic search.
pub fn open_engine(config: &ExpertConfig) -> Result<HybridSearchEngine> {
    let paths = config.paths();
    let store = PatternStore::new(&config.domain, &paths.patterns).with_decay(config.feedback.decay);
    store.load()?;
    let store = Arc::new(store);

    if !config.search.semantic {
        return Ok(HybridSearchEngine::keyword_only(store, config.search.clone()));
    }

    let vectors = std::fs::create_dir_all(&paths.domain_dir)
        .map_err(Into::into)
        .and_then(|_| VectorDB::open(&paths.embeddings));
    let vectors = match vectors {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            warn!(path = %paths.embeddings.display(), error = %e, "vector store unavailable");
            None
        }
    };

    Ok(HybridSearchEngine::new(
        store,
        vectors,
        Arc::new(EmbeddingService::htp()),
        config.search.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::core::pattern::Pattern;
    use crate::routing::{ConfidenceRouter, HierarchyRouter, MultiSpecialistRouter};
    use crate::specialist::testing::{map, FixedSpecialist};
    use std::collections::HashMap;

    fn engine() -> (tempfile::TempDir, Arc<HybridSearchEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new("d", &dir.path().join("patterns.json"));
        (dir, Arc::new(HybridSearchEngine::keyword_only(Arc::new(store), SearchConfig::default())))
    }

    fn pattern(id: &str) -> Pattern {
        Pattern::new(id, "solution").with_id(id)
    }

    #[tokio::test]
    async fn test_parallel_route_merges_responses() {
        let (_dir, engine) = engine();
        let specialists = map(vec![
            FixedSpecialist::answering(
                "a",
                0.9,
                SpecialistResponse::new("a", 0.9).with_patterns(vec![pattern("p1")]),
            ),
            FixedSpecialist::answering(
                "b",
                0.5,
                SpecialistResponse::new("b", 0.5).with_patterns(vec![pattern("p1"), pattern("p2")]),
            ),
        ]);
        let pipeline = QueryPipeline::new(
            engine,
            specialists,
            Box::new(MultiSpecialistRouter::new(0.2, 1, 3)),
        );

        let envelope = pipeline.resolve("q").await.unwrap();
        let ids: Vec<_> = envelope.patterns.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(envelope.strategy, "merge_all");
        assert_eq!(envelope.metadata["route"]["strategy"], "parallel");
    }

    #[tokio::test]
    async fn test_failing_specialist_is_skipped() {
        let (_dir, engine) = engine();
        let specialists = map(vec![
            FixedSpecialist::scoring("broken", 0.9),
            FixedSpecialist::answering(
                "ok",
                0.5,
                SpecialistResponse::new("ok", 0.5).with_patterns(vec![pattern("p1")]),
            ),
        ]);
        let pipeline = QueryPipeline::new(
            engine,
            specialists,
            Box::new(MultiSpecialistRouter::new(0.2, 1, 3)),
        );

        let envelope = pipeline.resolve("q").await.unwrap();
        assert_eq!(envelope.strategy, "single");
        assert_eq!(envelope.specialist_id.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_fallback_chain_stops_at_first_with_patterns() {
        let (_dir, engine) = engine();
        let specialists = map(vec![
            FixedSpecialist::answering("primary", 0.2, SpecialistResponse::new("primary", 0.2)),
            FixedSpecialist::answering(
                "backup",
                0.1,
                SpecialistResponse::new("backup", 0.4).with_patterns(vec![pattern("p9")]),
            ),
        ]);
        let hierarchies = HashMap::from([("primary".to_string(), vec!["backup".to_string()])]);
        let pipeline = QueryPipeline::new(
            engine,
            specialists,
            Box::new(HierarchyRouter::new(0.3, hierarchies, 3)),
        );

        let envelope = pipeline.resolve("q").await.unwrap();
        assert_eq!(envelope.specialist_id.as_deref(), Some("backup"));
        assert_eq!(envelope.patterns[0].id(), Some("p9"));
    }

    #[tokio::test]
    async fn test_invalid_route_returns_empty_envelope() {
        let (_dir, engine) = engine();
        let specialists = map(vec![FixedSpecialist::scoring("a", 0.1)]);
        let pipeline = QueryPipeline::new(
            engine,
            specialists,
            Box::new(ConfidenceRouter::new(0.3, Some("missing".to_string()))),
        );

        let envelope = pipeline.resolve("q").await.unwrap();
        assert!(envelope.patterns.is_empty());
        assert_eq!(envelope.metadata["route_invalid"], true);
    }

    #[tokio::test]
    async fn test_empty_route_still_enriches() {
        let (_dir, engine) = engine();
        let pipeline = QueryPipeline::new(
            engine,
            SpecialistMap::new(),
            Box::new(ConfidenceRouter::new(0.3, None)),
        )
        .with_enricher(Arc::new(crate::enrich::ConfidenceLabel), OutputFormat::Text);

        let envelope = pipeline.resolve("q").await.unwrap();
        assert_eq!(envelope.confidence, 0.0);
        assert_eq!(envelope.metadata["confidence_label"], "low");
    }
}
