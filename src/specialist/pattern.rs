use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{QueryContext, Specialist, SpecialistResponse};
use crate::error::Result;
use crate::search::keyword::content_words;
use crate::search::{HybridSearchEngine, SearchRequest};

/// Lowest score a generalist reports, so it can always be ranked
const GENERALIST_FLOOR: f32 = 0.1;
/// Confidence reported when the top pattern matched the query exactly
const EXACT_MATCH_CONFIDENCE: f32 = 0.9;

/// Declarative description of a specialist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialistProfile {
    pub id: String,
    /// Registry key of the implementation to build
    pub kind: String,
    pub name: String,
    /// One-line persona description shown alongside answers
    pub identity: String,
    pub keywords: Vec<String>,
    /// Pattern categories this specialist searches first
    pub categories: Vec<String>,
    pub generalist: bool,
    pub search_limit: usize,
    /// Leave the visible answer empty for a downstream enricher to fill
    pub defer_answer: bool,
}

impl Default for SpecialistProfile {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: "pattern".to_string(),
            name: String::new(),
            identity: String::new(),
            keywords: Vec::new(),
            categories: Vec::new(),
            generalist: false,
            search_limit: 5,
            defer_answer: false,
        }
    }
}

impl SpecialistProfile {
    pub fn generalist(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            identity: "General knowledge assistant".to_string(),
            generalist: true,
            id,
            ..Default::default()
        }
    }
}

/// Builder for [`PatternSpecialist`]
pub struct SpecialistBuilder {
    profile: SpecialistProfile,
}

impl SpecialistBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            profile: SpecialistProfile {
                name: id.clone(),
                id,
                ..Default::default()
            },
        }
    }

    pub fn from_profile(profile: SpecialistProfile) -> Self {
        Self { profile }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.profile.name = name.into();
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.profile.identity = identity.into();
        self
    }

    pub fn keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.profile
            .keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.profile.categories.push(category.into());
        self
    }

    pub fn generalist(mut self, generalist: bool) -> Self {
        self.profile.generalist = generalist;
        self
    }

    pub fn search_limit(mut self, limit: usize) -> Self {
        self.profile.search_limit = limit;
        self
    }

    pub fn defer_answer(mut self, defer: bool) -> Self {
        self.profile.defer_answer = defer;
        self
    }

    pub fn build(self, engine: Arc<HybridSearchEngine>) -> PatternSpecialist {
        let vocabulary = self
            .profile
            .keywords
            .iter()
            .chain(&self.profile.categories)
            .flat_map(|term| content_words(term))
            .collect();

        PatternSpecialist {
            profile: self.profile,
            vocabulary,
            engine,
        }
    }
}

/// Specialist that answers from the hybrid search engine
pub struct PatternSpecialist {
    profile: SpecialistProfile,
    vocabulary: HashSet<String>,
    engine: Arc<HybridSearchEngine>,
}

impl PatternSpecialist {
    /// Registry constructor for the built-in `pattern` kind
    pub fn boxed(
        profile: SpecialistProfile,
        engine: Arc<HybridSearchEngine>,
    ) -> Arc<dyn Specialist> {
        Arc::new(SpecialistBuilder::from_profile(profile).build(engine))
    }

    pub fn profile(&self) -> &SpecialistProfile {
        &self.profile
    }

    fn knows(&self, word: &str) -> bool {
        self.vocabulary.contains(word)
            || (word.len() > 3
                && self.vocabulary.iter().any(|term| {
                    term.len() > 3 && (term.starts_with(word) || word.starts_with(term.as_str()))
                }))
    }
}

#[async_trait]
impl Specialist for PatternSpecialist {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn can_handle(&self, query: &str) -> f32 {
        let words = content_words(query);
        let score = if words.is_empty() {
            0.0
        } else {
            words.iter().filter(|w| self.knows(w)).count() as f32 / words.len() as f32
        };

        if self.profile.generalist {
            score.max(GENERALIST_FLOOR)
        } else {
            score
        }
    }

    async fn process_query(&self, query: &str, ctx: &QueryContext) -> Result<SpecialistResponse> {
        let limit = self.profile.search_limit;
        let category = self.profile.categories.first().map(String::as_str);

        let mut hits = self
            .engine
            .search_scored(SearchRequest::new(query, limit).category(category))
            .await?;
        if hits.is_empty() && category.is_some() {
            hits = self
                .engine
                .search_scored(SearchRequest::new(query, limit))
                .await?;
        }

        debug!(
            specialist = %self.profile.id,
            domain = %ctx.domain_id,
            hits = hits.len(),
            "processed query"
        );

        let Some(top) = hits.first() else {
            let mut response = SpecialistResponse::new(&self.profile.id, 0.0);
            response
                .metadata
                .insert("identity".to_string(), Value::from(self.profile.identity.clone()));
            return Ok(response);
        };

        let mut confidence = 0.5 * self.can_handle(query) + 0.5 * top.pattern.confidence;
        if top.keyword.exact_match {
            confidence = confidence.max(EXACT_MATCH_CONFIDENCE);
        }

        let answer = if self.profile.defer_answer {
            String::new()
        } else {
            format!("**{}**\n\n{}", top.pattern.name, top.pattern.solution)
        };
        let mode = if top.semantic.is_some() { "semantic" } else { "keyword" };
        let exact = top.keyword.exact_match;

        let mut response = SpecialistResponse::new(&self.profile.id, confidence)
            .with_patterns(hits.into_iter().map(|h| h.pattern).collect())
            .with_answer(answer);
        response
            .metadata
            .insert("identity".to_string(), Value::from(self.profile.identity.clone()));
        response
            .metadata
            .insert("search_mode".to_string(), Value::from(mode));
        response
            .metadata
            .insert("exact_match".to_string(), Value::from(exact));
        Ok(response)
    }

    fn format_response(&self, response: &SpecialistResponse) -> String {
        if self.profile.defer_answer {
            return String::new();
        }
        if !response.raw_answer.is_empty() {
            return response.raw_answer.clone();
        }
        response
            .patterns
            .iter()
            .map(|p| format!("- {}", p.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
