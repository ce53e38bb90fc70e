//! Enrichment - transforms applied to a response envelope before output
//!
//! Enrichers compose either sequentially ([`ChainedEnricher`]) or
//! concurrently on independent copies ([`ParallelEnricher`]).

mod builtin;
mod compose;
mod registry;

pub use builtin::{AnswerFallback, ConfidenceLabel, RelatedPatterns, SourceFootnotes};
pub use compose::{ChainedEnricher, ParallelEnricher};
pub use registry::{EnricherConstructor, EnricherRegistry};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::store::PatternStore;
use crate::envelope::ResponseEnvelope;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Html,
    Slack,
    Text,
}

impl OutputFormat {
    pub const ALL: &'static [OutputFormat] = &[
        OutputFormat::Markdown,
        OutputFormat::Json,
        OutputFormat::Html,
        OutputFormat::Slack,
        OutputFormat::Text,
    ];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
            OutputFormat::Slack => "slack",
            OutputFormat::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// What an enricher may consult besides the envelope itself
#[derive(Clone)]
pub struct EnrichmentContext {
    pub domain_id: String,
    pub specialist_id: Option<String>,
    pub query: String,
    pub store: Arc<PatternStore>,
    /// Target format; composites skip enrichers that do not support it
    pub format: OutputFormat,
    pub metadata: Map<String, Value>,
    /// An upstream language model already produced the visible answer
    pub llm_confirmed: bool,
}

impl EnrichmentContext {
    pub fn new(query: impl Into<String>, store: Arc<PatternStore>) -> Self {
        Self {
            domain_id: store.domain().to_string(),
            specialist_id: None,
            query: query.into(),
            store,
            format: OutputFormat::default(),
            metadata: Map::new(),
            llm_confirmed: false,
        }
    }

    pub fn specialist(mut self, id: Option<String>) -> Self {
        self.specialist_id = id;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn llm_confirmed(mut self, confirmed: bool) -> Self {
        self.llm_confirmed = confirmed;
        self
    }
}

#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the transformed envelope; the input is owned, never shared
    async fn enrich(
        &self,
        envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope>;

    fn supported_formats(&self) -> &[OutputFormat] {
        OutputFormat::ALL
    }

    fn can_run_parallel(&self) -> bool {
        true
    }

    fn supports(&self, format: OutputFormat) -> bool {
        self.supported_formats().contains(&format)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    #[default]
    Chained,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub mode: EnrichmentMode,
    pub format: OutputFormat,
    /// Registry names, applied in order when chained
    pub enrichers: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            mode: EnrichmentMode::Chained,
            format: OutputFormat::Markdown,
            enrichers: vec![
                "answer_fallback".to_string(),
                "related_patterns".to_string(),
                "confidence_label".to_string(),
                "source_footnotes".to_string(),
            ],
        }
    }
}
