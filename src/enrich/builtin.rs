use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{EnrichmentContext, Enricher, OutputFormat};
use crate::envelope::ResponseEnvelope;
use crate::error::Result;

const HIGH_CONFIDENCE: f32 = 0.8;
const MEDIUM_CONFIDENCE: f32 = 0.6;

/// Adds `metadata.confidence_label`: high, medium or low
pub struct ConfidenceLabel;

impl ConfidenceLabel {
    pub fn label(confidence: f32) -> &'static str {
        if confidence >= HIGH_CONFIDENCE {
            "high"
        } else if confidence >= MEDIUM_CONFIDENCE {
            "medium"
        } else {
            "low"
        }
    }
}

#[async_trait]
impl Enricher for ConfidenceLabel {
    fn name(&self) -> &str {
        "confidence_label"
    }

    async fn enrich(
        &self,
        mut envelope: ResponseEnvelope,
        _ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        let label = Self::label(envelope.confidence);
        envelope.set_meta("confidence_label", label);
        Ok(envelope)
    }
}

/// Lists stored patterns that share a tag with the top pattern under
/// `metadata.related_patterns`
pub struct RelatedPatterns {
    limit: usize,
}

impl RelatedPatterns {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for RelatedPatterns {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl Enricher for RelatedPatterns {
    fn name(&self) -> &str {
        "related_patterns"
    }

    async fn enrich(
        &self,
        mut envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        let Some(top) = envelope.top_pattern() else {
            return Ok(envelope);
        };
        let tags: HashSet<String> = top.pattern.tags.iter().map(|t| t.to_lowercase()).collect();
        if tags.is_empty() {
            return Ok(envelope);
        }

        let shown: HashSet<&str> = envelope.patterns.iter().filter_map(|p| p.id()).collect();
        let related: Vec<Value> = ctx
            .store
            .all()
            .into_iter()
            .filter(|p| p.id.as_deref().map_or(true, |id| !shown.contains(id)))
            .filter_map(|p| {
                let shared: Vec<&String> = p
                    .tags
                    .iter()
                    .filter(|t| tags.contains(&t.to_lowercase()))
                    .collect();
                if shared.is_empty() {
                    return None;
                }
                Some(json!({ "id": p.id, "name": p.name, "shared_tags": shared }))
            })
            .take(self.limit)
            .collect();

        if !related.is_empty() {
            envelope.set_meta("related_patterns", Value::Array(related));
        }
        Ok(envelope)
    }
}

/// Composes an answer from the top pattern when nothing upstream produced one
pub struct AnswerFallback;

#[async_trait]
impl Enricher for AnswerFallback {
    fn name(&self) -> &str {
        "answer_fallback"
    }

    async fn enrich(
        &self,
        mut envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        if !envelope.answer.trim().is_empty() || ctx.llm_confirmed {
            return Ok(envelope);
        }

        let top = envelope
            .top_pattern()
            .map(|p| &p.pattern)
            .or_else(|| envelope.responses.iter().find_map(|r| r.patterns.first()));
        let Some(pattern) = top else {
            return Ok(envelope);
        };

        let answer = match ctx.format {
            OutputFormat::Html => format!(
                "<p><strong>{}</strong></p>\n<p>{}</p>",
                pattern.name, pattern.solution
            ),
            OutputFormat::Slack => format!("*{}*\n{}", pattern.name, pattern.solution),
            OutputFormat::Text | OutputFormat::Json => {
                format!("{}\n\n{}", pattern.name, pattern.solution)
            }
            OutputFormat::Markdown => format!("**{}**\n\n{}", pattern.name, pattern.solution),
        };
        envelope.answer = answer;
        envelope.set_meta("answer_source", "pattern");
        Ok(envelope)
    }
}

/// Appends a numbered source list to the answer
pub struct SourceFootnotes;

#[async_trait]
impl Enricher for SourceFootnotes {
    fn name(&self) -> &str {
        "source_footnotes"
    }

    async fn enrich(
        &self,
        mut envelope: ResponseEnvelope,
        ctx: &EnrichmentContext,
    ) -> Result<ResponseEnvelope> {
        let sources: Vec<String> = envelope
            .patterns
            .iter()
            .filter_map(|p| {
                let id = p.id()?;
                Some(match &p.pattern.origin {
                    Some(origin) => format!("{} ({})", id, origin),
                    None => id.to_string(),
                })
            })
            .collect();
        if sources.is_empty() {
            return Ok(envelope);
        }

        let footnotes = match ctx.format {
            OutputFormat::Html => {
                let items: String = sources
                    .iter()
                    .map(|s| format!("<li>{}</li>", s))
                    .collect();
                format!("\n<ol class=\"sources\">{}</ol>", items)
            }
            _ => {
                let lines: Vec<String> = sources
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("[{}] {}", i + 1, s))
                    .collect();
                format!("\n\n---\nSources:\n{}", lines.join("\n"))
            }
        };
        envelope.answer.push_str(&footnotes);
        Ok(envelope)
    }

    fn supported_formats(&self) -> &[OutputFormat] {
        &[OutputFormat::Markdown, OutputFormat::Html]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::pattern::Pattern;
    use crate::core::store::PatternStore;
    use crate::envelope::AttributedPattern;
    use crate::specialist::SpecialistResponse;

    fn ctx() -> (tempfile::TempDir, EnrichmentContext) {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::new("bitwise", &dir.path().join("patterns.json"));
        store
            .add(Pattern::new("XOR", "toggle").with_id("p1").with_tags(["bits"]))
            .unwrap();
        store
            .add(
                Pattern::new("Masking", "and with mask")
                    .with_id("p2")
                    .with_tags(["Bits", "masks"]),
            )
            .unwrap();
        store
            .add(Pattern::new("Sorting", "quicksort").with_id("p3").with_tags(["sort"]))
            .unwrap();
        (dir, EnrichmentContext::new("q", Arc::new(store)))
    }

    fn envelope_with(pattern: Pattern) -> ResponseEnvelope {
        let mut envelope = ResponseEnvelope::empty("q", "single");
        envelope.patterns = vec![AttributedPattern::new(pattern, "bits")];
        envelope
    }

    #[tokio::test]
    async fn test_confidence_label() {
        let (_dir, ctx) = ctx();
        for (confidence, label) in [(0.85, "high"), (0.6, "medium"), (0.2, "low")] {
            let mut envelope = ResponseEnvelope::empty("q", "single");
            envelope.confidence = confidence;
            let envelope = ConfidenceLabel.enrich(envelope, &ctx).await.unwrap();
            assert_eq!(envelope.metadata["confidence_label"], label);
        }
    }

    #[tokio::test]
    async fn test_related_patterns_share_tags() {
        let (_dir, ctx) = ctx();
        let top = ctx.store.get_by_id("p1").unwrap();
        let envelope = RelatedPatterns::default()
            .enrich(envelope_with(top), &ctx)
            .await
            .unwrap();

        let related = envelope.metadata["related_patterns"].as_array().unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0]["id"], "p2");
        assert_eq!(related[0]["shared_tags"][0], "Bits");
    }

    #[tokio::test]
    async fn test_answer_fallback() {
        let (_dir, ctx) = ctx();
        let top = ctx.store.get_by_id("p1").unwrap();

        let envelope = AnswerFallback.enrich(envelope_with(top.clone()), &ctx).await.unwrap();
        assert_eq!(envelope.answer, "**XOR**\n\ntoggle");
        assert_eq!(envelope.metadata["answer_source"], "pattern");

        let confirmed = ctx.clone().llm_confirmed(true);
        let untouched = AnswerFallback.enrich(envelope_with(top), &confirmed).await.unwrap();
        assert!(untouched.answer.is_empty());
    }

    #[tokio::test]
    async fn test_answer_fallback_uses_side_by_side_responses() {
        let (_dir, ctx) = ctx();
        let mut envelope = ResponseEnvelope::empty("q", "side_by_side");
        envelope.responses = vec![
            SpecialistResponse::new("a", 0.5),
            SpecialistResponse::new("b", 0.5).with_patterns(vec![Pattern::new("Sorting", "quicksort")]),
        ];
        let envelope = AnswerFallback.enrich(envelope, &ctx.format(OutputFormat::Text)).await.unwrap();
        assert_eq!(envelope.answer, "Sorting\n\nquicksort");
    }

    #[tokio::test]
    async fn test_source_footnotes() {
        let (_dir, ctx) = ctx();
        let mut top = ctx.store.get_by_id("p1").unwrap();
        top.origin = Some("manual".to_string());

        let mut envelope = envelope_with(top);
        envelope.answer = "Use XOR.".to_string();
        let envelope = SourceFootnotes.enrich(envelope, &ctx).await.unwrap();
        assert_eq!(envelope.answer, "Use XOR.\n\n---\nSources:\n[1] p1 (manual)");
        assert!(!SourceFootnotes.supports(OutputFormat::Json));
    }
}
