//! Hybrid search engine - keyword scoring blended with embeddings
//!
//! With an embedding backend, every pattern passing the category filter is
//! ranked by `semantic_weight * cosine + keyword_weight * normalized keyword
//! score`, where the keyword score (content-word hits plus match bonuses) is
//! normalized by the highest score among the candidates.
//!
//! Without one, patterns with no keyword evidence are dropped, exact matches
//! are pinned, and the remaining slots are filled by weighted random
//! selection over score bands.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::embedding::{cosine_similarity, encode_pattern, Embedder, EmbeddingService};
use super::keyword::{score_pattern, KeywordQuery, KeywordScore};
use super::selection::WeightedSelector;
use super::vectordb::VectorDB;
use crate::config::SearchConfig;
use crate::core::pattern::Pattern;
use crate::core::store::PatternStore;
use crate::error::{ExpertError, Result};

/// Patterns embedded per backend call while indexing
const INDEX_BATCH_SIZE: usize = 32;

/// A selected pattern with the evidence that selected it
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub pattern: Pattern,
    pub keyword: KeywordScore,
    /// Cosine similarity, present in semantic mode
    pub semantic: Option<f32>,
    /// Score the result list is ordered by
    pub combined: f32,
}

impl SearchHit {
    pub fn id(&self) -> &str {
        self.pattern.id.as_deref().unwrap_or("")
    }
}

/// Search parameters
#[derive(Debug, Clone, Default)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub category: Option<&'a str>,
    pub limit: usize,
    pub exact_only: bool,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str, limit: usize) -> Self {
        Self {
            query,
            limit,
            ..Default::default()
        }
    }

    pub fn category(mut self, category: Option<&'a str>) -> Self {
        self.category = category;
        self
    }

    pub fn exact_only(mut self, exact_only: bool) -> Self {
        self.exact_only = exact_only;
        self
    }
}

/// Indexing statistics
#[derive(Debug, Default, Serialize)]
pub struct IndexingStats {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

pub struct HybridSearchEngine {
    store: Arc<PatternStore>,
    vectors: Option<Arc<VectorDB>>,
    embeddings: Arc<EmbeddingService>,
    selector: WeightedSelector,
    config: SearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        store: Arc<PatternStore>,
        vectors: Option<Arc<VectorDB>>,
        embeddings: Arc<EmbeddingService>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            vectors,
            embeddings,
            selector: WeightedSelector::from_entropy(),
            config,
        }
    }

    /// Keyword-only engine with no vector store
    pub fn keyword_only(store: Arc<PatternStore>, config: SearchConfig) -> Self {
        Self::new(store, None, Arc::new(EmbeddingService::disabled()), config)
    }

    /// Replace the random source, e.g. with a seeded one in tests
    pub fn with_selector(mut self, selector: WeightedSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search and return the selected patterns
    pub async fn search(&self, request: SearchRequest<'_>) -> Result<Vec<Pattern>> {
        Ok(self
            .search_scored(request)
            .await?
            .into_iter()
            .map(|hit| hit.pattern)
            .collect())
    }

    /// Search and keep the score breakdown for every result
    pub async fn search_scored(&self, request: SearchRequest<'_>) -> Result<Vec<SearchHit>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let query = KeywordQuery::new(request.query);
        let mut seen = HashSet::new();
        let mut hits: Vec<SearchHit> = self
            .store
            .all()
            .into_iter()
            .filter(|p| request.category.map_or(true, |c| p.matches_category(c)))
            .filter(|p| seen.insert(p.id.clone()))
            .map(|pattern| {
                let keyword = score_pattern(&pattern, &query);
                SearchHit {
                    combined: keyword.total,
                    pattern,
                    keyword,
                    semantic: None,
                }
            })
            .collect();

        if request.exact_only {
            hits.retain(|h| h.keyword.exact_match);
        }

        if self.config.semantic_weight > 0.0 {
            if let Some(backend) = self.embeddings.backend().await {
                match self.rank_semantic(backend.as_ref(), request.query, hits.clone()) {
                    Ok(mut ranked) => {
                        ranked.truncate(request.limit);
                        debug!(query = request.query, results = ranked.len(), "semantic search");
                        return Ok(ranked);
                    }
                    Err(e) => warn!(error = %e, "semantic ranking failed, using keyword search"),
                }
            }
        }

        let selected = self.select_keyword(hits, request.limit);
        debug!(query = request.query, results = selected.len(), "keyword search");
        Ok(selected)
    }

    fn rank_semantic(
        &self,
        backend: &dyn Embedder,
        query: &str,
        mut hits: Vec<SearchHit>,
    ) -> Result<Vec<SearchHit>> {
        let query_vec = backend.embed(query)?;
        let mut cached = match &self.vectors {
            Some(db) => db.all()?,
            None => HashMap::new(),
        };

        let max_total = hits.iter().map(|h| h.keyword.total).fold(0.0f32, f32::max);

        for hit in &mut hits {
            let id = hit.id().to_string();
            let pattern_vec = match cached.remove(&id) {
                Some(v) if v.len() == query_vec.len() => v,
                _ => self.embed_pattern(backend, &hit.pattern)?,
            };

            let cosine = cosine_similarity(&query_vec, &pattern_vec)?;
            let keyword = if max_total > 0.0 {
                hit.keyword.total / max_total
            } else {
                0.0
            };
            hit.semantic = Some(cosine);
            hit.combined =
                self.config.semantic_weight * cosine + self.config.keyword_weight * keyword;
        }

        hits.sort_by(|a, b| {
            b.combined
                .partial_cmp(&a.combined)
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare_keyword(a, b))
        });
        Ok(hits)
    }

    fn select_keyword(&self, hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
        let (mut pinned, rest): (Vec<SearchHit>, Vec<SearchHit>) = hits
            .into_iter()
            .filter(|h| h.keyword.is_eligible())
            .partition(|h| h.keyword.exact_match);

        pinned.sort_by(compare_keyword);
        pinned.truncate(limit);

        let slots = limit - pinned.len();
        let scores: Vec<f32> = rest.iter().map(|h| h.keyword.total).collect();
        let picks = self.selector.select(&scores, slots);

        let mut rest: Vec<Option<SearchHit>> = rest.into_iter().map(Some).collect();
        let mut selected = pinned;
        selected.extend(picks.into_iter().filter_map(|i| rest[i].take()));
        selected.sort_by(compare_keyword);
        selected
    }

    fn embed_pattern(&self, backend: &dyn Embedder, pattern: &Pattern) -> Result<Vec<f32>> {
        let embedding = backend.embed(&encode_pattern(pattern, self.config.token_budget))?;
        if let (Some(db), Some(id)) = (&self.vectors, pattern.id.as_deref()) {
            db.upsert(id, &embedding)?;
        }
        Ok(embedding)
    }

    /// Embed every pattern missing from the vector store
    ///
    /// Embedding and SQLite writes run on the blocking pool.
    pub async fn index_all(&self, rebuild: bool) -> Result<IndexingStats> {
        let start = std::time::Instant::now();
        let db = self
            .vectors
            .clone()
            .ok_or_else(|| ExpertError::Embedding("no vector store configured".to_string()))?;
        let backend = self
            .embeddings
            .backend()
            .await
            .ok_or_else(|| ExpertError::Embedding("embedding backend unavailable".to_string()))?;
        let patterns = self.store.all();
        let budget = self.config.token_budget;

        let mut stats = tokio::task::spawn_blocking(move || {
            index_patterns(&db, backend.as_ref(), patterns, budget, rebuild)
        })
        .await
        .map_err(|e| ExpertError::Embedding(format!("indexing task failed: {e}")))??;

        stats.duration_ms = start.elapsed().as_millis();
        Ok(stats)
    }

    /// Add or replace a pattern; a replaced pattern loses its embedding
    pub fn add_pattern(&self, pattern: Pattern) -> Result<String> {
        let id = self.store.add(pattern)?;
        self.invalidate(&id)?;
        Ok(id)
    }

    /// Update a pattern and drop its now stale embedding
    pub fn update_pattern(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        self.store.update(id, fields)?;
        self.invalidate(id)
    }

    /// Delete a pattern together with its embedding
    pub fn remove_pattern(&self, id: &str) -> Result<Pattern> {
        let removed = self.store.delete(id)?;
        self.invalidate(id)?;
        Ok(removed)
    }

    fn invalidate(&self, id: &str) -> Result<()> {
        if let Some(db) = &self.vectors {
            db.delete(id)?;
        }
        Ok(())
    }
}

fn index_patterns(
    db: &VectorDB,
    backend: &dyn Embedder,
    patterns: Vec<Pattern>,
    budget: usize,
    rebuild: bool,
) -> Result<IndexingStats> {
    if rebuild {
        db.clear()?;
    }
    let existing = db.all()?;

    let mut stats = IndexingStats::default();
    let pending: Vec<Pattern> = patterns
        .into_iter()
        .filter(|p| {
            let fresh = p
                .id
                .as_deref()
                .and_then(|id| existing.get(id))
                .map_or(false, |v| v.len() == backend.dimension());
            if fresh {
                stats.skipped += 1;
            }
            !fresh
        })
        .collect();

    for batch in pending.chunks(INDEX_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|p| encode_pattern(p, budget)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let vectors = match backend.embed_batch(&refs) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(size = batch.len(), error = %e, "failed to embed batch");
                stats.failed += batch.len();
                continue;
            }
        };
        for (pattern, vector) in batch.iter().zip(vectors) {
            let id = pattern.id.as_deref().unwrap_or_default();
            match db.upsert(id, &vector) {
                Ok(()) => stats.indexed += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "failed to store embedding");
                    stats.failed += 1;
                }
            }
        }
    }

    db.set_meta("indexed_count", &stats.indexed.to_string())?;
    db.set_meta("last_full_index", &chrono::Utc::now().timestamp().to_string())?;
    Ok(stats)
}

fn compare_keyword(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.keyword
        .total
        .partial_cmp(&a.keyword.total)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id().cmp(b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::HtpEmbedder;

    fn store_with(patterns: Vec<Pattern>) -> (tempfile::TempDir, Arc<PatternStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new("test", &dir.path().join("patterns.json"));
        for p in patterns {
            store.add(p).unwrap();
        }
        (dir, Arc::new(store))
    }

    fn xor_and_sort() -> Vec<Pattern> {
        vec![
            Pattern::new("XOR Operation", "toggle bits").with_id("p1"),
            Pattern::new("Sorting", "quicksort").with_id("p2"),
        ]
    }

    fn ids(patterns: &[Pattern]) -> Vec<&str> {
        patterns.iter().filter_map(|p| p.id.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_keyword_scenario() {
        let (_dir, store) = store_with(xor_and_sort());
        let engine = HybridSearchEngine::keyword_only(store, SearchConfig::default());

        let results = engine
            .search(SearchRequest::new("how do I toggle bits with xor", 5))
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_limit_and_uniqueness() {
        let patterns = (0..12)
            .map(|i| {
                Pattern::new(format!("Bit trick {}", i), "mask bits").with_id(format!("b{:02}", i))
            })
            .collect();
        let (_dir, store) = store_with(patterns);
        let engine = HybridSearchEngine::keyword_only(store, SearchConfig::default())
            .with_selector(WeightedSelector::seeded(3));

        for limit in 0..15 {
            let results = engine
                .search(SearchRequest::new("bits mask", limit))
                .await
                .unwrap();
            assert!(results.len() <= limit);
            assert_eq!(results.len(), limit.min(12));
            let distinct: HashSet<_> = ids(&results).into_iter().collect();
            assert_eq!(distinct.len(), results.len());
        }
    }

    #[tokio::test]
    async fn test_exact_match_outranks_partial() {
        let mut patterns: Vec<Pattern> = (0..6)
            .map(|i| {
                Pattern::new(format!("Swap variant {}", i), "swap two values")
                    .with_id(format!("s{}", i))
            })
            .collect();
        patterns.push(
            Pattern::new("XOR swap", "a ^= b; b ^= a; a ^= b")
                .with_id("exact")
                .with_origin_query("swap two values without temp"),
        );
        let (_dir, store) = store_with(patterns);
        let engine = HybridSearchEngine::keyword_only(store, SearchConfig::default());

        for _ in 0..20 {
            let results = engine
                .search(SearchRequest::new("swap two values without temp", 2))
                .await
                .unwrap();
            assert_eq!(results[0].id.as_deref(), Some("exact"));
        }
    }

    #[tokio::test]
    async fn test_exact_only_and_category_filter() {
        let patterns = vec![
            Pattern::new("XOR swap", "swap with xor")
                .with_id("p1")
                .with_category("bitwise")
                .with_origin_query("xor swap"),
            Pattern::new("Temp swap", "swap with temp")
                .with_id("p2")
                .with_category("basics"),
        ];
        let (_dir, store) = store_with(patterns);
        let engine = HybridSearchEngine::keyword_only(store, SearchConfig::default());

        let exact = engine
            .search(SearchRequest::new("xor swap", 5).exact_only(true))
            .await
            .unwrap();
        assert_eq!(ids(&exact), vec!["p1"]);

        let basics = engine
            .search(SearchRequest::new("swap", 5).category(Some("basics")))
            .await
            .unwrap();
        assert_eq!(ids(&basics), vec!["p2"]);
    }

    #[tokio::test]
    async fn test_semantic_mode_keeps_zero_keyword_patterns() {
        let (dir, store) = store_with(xor_and_sort());
        let vectors = Arc::new(VectorDB::open(&dir.path().join("embeddings.db")).unwrap());
        let engine = HybridSearchEngine::new(
            store,
            Some(Arc::clone(&vectors)),
            Arc::new(EmbeddingService::htp()),
            SearchConfig::default(),
        );

        let hits = engine
            .search_scored(SearchRequest::new("toggle bits with xor", 5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id(), "p1");
        assert!(hits.iter().all(|h| h.semantic.is_some()));
        assert!(hits[0].combined >= hits[1].combined);

        // Pattern embeddings were cached on first use
        assert_eq!(vectors.get_stats().unwrap().embedding_count, 2);
    }

    #[tokio::test]
    async fn test_failed_backend_degrades_to_keyword() {
        let (_dir, store) = store_with(xor_and_sort());
        let service =
            EmbeddingService::new(|| Err(ExpertError::Embedding("no model".to_string())));
        let engine =
            HybridSearchEngine::new(store, None, Arc::new(service), SearchConfig::default());

        let results = engine
            .search(SearchRequest::new("toggle bits with xor", 5))
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_index_and_invalidate() {
        let (dir, store) = store_with(xor_and_sort());
        let vectors = Arc::new(VectorDB::open(&dir.path().join("embeddings.db")).unwrap());
        let engine = HybridSearchEngine::new(
            store,
            Some(Arc::clone(&vectors)),
            Arc::new(EmbeddingService::new(|| {
                Ok(Arc::new(HtpEmbedder::new()) as Arc<dyn Embedder>)
            })),
            SearchConfig::default(),
        );

        let stats = engine.index_all(false).await.unwrap();
        assert_eq!((stats.indexed, stats.skipped, stats.failed), (2, 0, 0));
        let stats = engine.index_all(false).await.unwrap();
        assert_eq!((stats.indexed, stats.skipped), (0, 2));
        assert!(vectors.get_meta("last_full_index").unwrap().is_some());

        let fields = serde_json::json!({"solution": "x ^= mask"});
        engine.update_pattern("p1", fields.as_object().unwrap()).unwrap();
        assert!(vectors.get("p1").unwrap().is_none());

        engine.remove_pattern("p2").unwrap();
        assert!(vectors.get("p2").unwrap().is_none());
        assert_eq!(engine.store().count(), 1);
    }

    #[tokio::test]
    async fn test_readding_a_pattern_drops_its_embedding() {
        let (dir, store) = store_with(xor_and_sort());
        let vectors = Arc::new(VectorDB::open(&dir.path().join("embeddings.db")).unwrap());
        let engine = HybridSearchEngine::new(
            store,
            Some(Arc::clone(&vectors)),
            Arc::new(EmbeddingService::htp()),
            SearchConfig::default(),
        );
        engine.index_all(false).await.unwrap();
        let old = vectors.get("p1").unwrap().unwrap();

        engine
            .add_pattern(Pattern::new("XOR Operation", "flip every masked flag").with_id("p1"))
            .unwrap();
        assert!(vectors.get("p1").unwrap().is_none());

        let stats = engine.index_all(false).await.unwrap();
        assert_eq!((stats.indexed, stats.skipped), (1, 1));
        assert_ne!(vectors.get("p1").unwrap().unwrap(), old);
    }

    #[tokio::test]
    async fn test_index_without_backend_fails() {
        let (_dir, store) = store_with(xor_and_sort());
        let engine = HybridSearchEngine::keyword_only(store, SearchConfig::default());
        assert!(matches!(
            engine.index_all(false).await,
            Err(ExpertError::Embedding(_))
        ));
    }
}
