//! Specialists - domain handlers that score and answer queries
//!
//! Routers only see the [`Specialist`] trait. The built-in implementation is
//! [`PatternSpecialist`], assembled from a declarative [`SpecialistProfile`];
//! other kinds plug in through [`SpecialistRegistry`].

mod pattern;
mod registry;

pub use pattern::{PatternSpecialist, SpecialistBuilder, SpecialistProfile};
pub use registry::{SpecialistConstructor, SpecialistRegistry};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::pattern::Pattern;
use crate::error::Result;

/// Specialists keyed by id
pub type SpecialistMap = HashMap<String, Arc<dyn Specialist>>;

/// Per-query information passed to routers and specialists
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub domain_id: String,
    pub metadata: Map<String, Value>,
}

impl QueryContext {
    pub fn new(domain_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            metadata: Map::new(),
        }
    }
}

/// What a specialist returns for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialistResponse {
    pub specialist_id: String,
    pub confidence: f32,
    /// May include synthetic patterns that are not in any store
    pub patterns: Vec<Pattern>,
    pub raw_answer: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SpecialistResponse {
    pub fn new(specialist_id: impl Into<String>, confidence: f32) -> Self {
        Self {
            specialist_id: specialist_id.into(),
            confidence: confidence.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<Pattern>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.raw_answer = answer.into();
        self
    }
}

#[async_trait]
pub trait Specialist: Send + Sync {
    fn id(&self) -> &str;

    /// How well this specialist fits the query, in [0, 1]
    fn can_handle(&self, query: &str) -> f32;

    async fn process_query(&self, query: &str, ctx: &QueryContext) -> Result<SpecialistResponse>;

    /// Visible text for a response
    ///
    /// Empty when a downstream enricher is expected to supply the text.
    fn format_response(&self, response: &SpecialistResponse) -> String;
}
