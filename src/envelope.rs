//! The response envelope handed from aggregation to enrichment to output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::pattern::Pattern;
use crate::specialist::SpecialistResponse;

/// A pattern as it appears in a final response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedPattern {
    #[serde(flatten)]
    pub pattern: Pattern,
    #[serde(
        rename = "_source_specialist",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_specialist: Option<String>,
    #[serde(
        rename = "_combined_score",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub combined_score: Option<f32>,
}

impl AttributedPattern {
    pub fn new(pattern: Pattern, source_specialist: impl Into<String>) -> Self {
        Self {
            pattern,
            source_specialist: Some(source_specialist.into()),
            combined_score: None,
        }
    }

    pub fn scored(mut self, score: f32) -> Self {
        self.combined_score = Some(score);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.pattern.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<String>,
    /// Aggregation strategy that produced this envelope, or `single`
    pub strategy: String,
    pub confidence: f32,
    pub patterns: Vec<AttributedPattern>,
    pub answer: String,
    /// Per-specialist responses kept for independent rendering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<SpecialistResponse>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn empty(query: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            strategy: strategy.into(),
            ..Default::default()
        }
    }

    /// Wrap a single specialist response unchanged
    pub fn from_response(response: SpecialistResponse, query: impl Into<String>) -> Self {
        let source = response.specialist_id.clone();
        Self {
            query: query.into(),
            specialist_id: Some(source.clone()),
            strategy: "single".to_string(),
            confidence: response.confidence,
            patterns: response
                .patterns
                .into_iter()
                .map(|p| AttributedPattern::new(p, source.clone()))
                .collect(),
            answer: response.raw_answer,
            responses: Vec::new(),
            metadata: response.metadata,
        }
    }

    pub fn top_pattern(&self) -> Option<&AttributedPattern> {
        self.patterns.first()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.responses.is_empty() && self.answer.is_empty()
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}
