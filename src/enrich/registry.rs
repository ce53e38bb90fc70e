use std::collections::HashMap;
use std::sync::Arc;

use super::{
    AnswerFallback, ChainedEnricher, ConfidenceLabel, Enricher, EnrichmentConfig, EnrichmentMode,
    ParallelEnricher, RelatedPatterns, SourceFootnotes,
};
use crate::error::{ExpertError, Result};

pub type EnricherConstructor = fn() -> Arc<dyn Enricher>;

/// Maps enricher names to constructors
pub struct EnricherRegistry {
    constructors: HashMap<String, EnricherConstructor>,
}

impl EnricherRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: EnricherConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn build(&self, name: &str) -> Result<Arc<dyn Enricher>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| {
                ExpertError::Config(format!(
                    "unknown enricher '{}' (available: {})",
                    name,
                    self.names().join(", ")
                ))
            })
    }

    /// Compose the configured enrichers into one chained or parallel stage
    pub fn build_pipeline(&self, config: &EnrichmentConfig) -> Result<Arc<dyn Enricher>> {
        let enrichers = config
            .enrichers
            .iter()
            .map(|name| self.build(name))
            .collect::<Result<Vec<_>>>()?;

        let pipeline: Arc<dyn Enricher> = match config.mode {
            EnrichmentMode::Chained => Arc::new(ChainedEnricher::new(enrichers)),
            EnrichmentMode::Parallel => {
                if let Some(serial) = enrichers.iter().find(|e| !e.can_run_parallel()) {
                    return Err(ExpertError::Config(format!(
                        "enricher '{}' cannot run in parallel",
                        serial.name()
                    )));
                }
                Arc::new(ParallelEnricher::new(enrichers))
            }
        };
        Ok(pipeline)
    }
}

impl Default for EnricherRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("answer_fallback", || -> Arc<dyn Enricher> {
            Arc::new(AnswerFallback)
        });
        registry.register("confidence_label", || -> Arc<dyn Enricher> {
            Arc::new(ConfidenceLabel)
        });
        registry.register("related_patterns", || -> Arc<dyn Enricher> {
            Arc::new(RelatedPatterns::default())
        });
        registry.register("source_footnotes", || -> Arc<dyn Enricher> {
            Arc::new(SourceFootnotes)
        });
        registry
    }
}
