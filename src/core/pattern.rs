use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default confidence assigned to patterns that never received feedback
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    #[default]
    Candidate,
    Certified,
    Flagged,
    Rejected,
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate => write!(f, "candidate"),
            Self::Certified => write!(f, "certified"),
            Self::Flagged => write!(f, "flagged"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Worked example attached to a pattern: either plain text or a structured record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternExample {
    Text(String),
    Record(Map<String, Value>),
}

impl PatternExample {
    /// Flattened text used for keyword matching
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Record(map) => map
                .values()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A stored unit of domain knowledge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Legacy key used by older stores; wins over `id` when indexing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pattern_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<PatternExample>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub times_accessed: u64,
    #[serde(default)]
    pub status: PatternStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields this crate does not model, kept so saves never drop data
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

impl Pattern {
    pub fn new(name: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            solution: solution.into(),
            confidence: DEFAULT_CONFIDENCE,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_origin_query(mut self, query: impl Into<String>) -> Self {
        self.origin_query = Some(query.into());
        self
    }

    /// Key used by the store index: `pattern_id`, then `id`, then `name`
    pub fn index_key(&self) -> Option<&str> {
        [
            self.pattern_id.as_deref(),
            self.id.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|key| !key.is_empty())
    }

    /// Category-like labels: category, type and tags
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.category
            .as_deref()
            .into_iter()
            .chain(self.pattern_type.as_deref())
            .chain(self.tags.iter().map(String::as_str))
    }

    /// Case-insensitive category filter against category, type and tags
    pub fn matches_category(&self, category: &str) -> bool {
        let wanted = category.to_lowercase();
        self.labels().any(|label| label.to_lowercase() == wanted)
    }

    pub fn examples_text(&self) -> Vec<String> {
        self.examples.iter().map(PatternExample::as_text).collect()
    }
}

/// Feedback submitted for a pattern after it was shown
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Feedback {
    /// Star rating, 1-5
    pub rating: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_key_priority() {
        let mut p = Pattern::new("Sorting", "quicksort");
        assert_eq!(p.index_key(), Some("Sorting"));

        p.id = Some("p2".to_string());
        assert_eq!(p.index_key(), Some("p2"));

        p.pattern_id = Some("legacy-2".to_string());
        assert_eq!(p.index_key(), Some("legacy-2"));

        let unnamed = Pattern::default();
        assert_eq!(unnamed.index_key(), None);
    }

    #[test]
    fn test_deserialize_mixed_examples_and_unknown_fields() {
        let json = r#"{
            "id": "p1",
            "name": "XOR Operation",
            "type": "bitwise",
            "examples": ["a ^ b", {"input": "1010", "output": "0101"}],
            "source_url": "https://example.com"
        }"#;
        let p: Pattern = serde_json::from_str(json).unwrap();

        assert_eq!(p.pattern_type.as_deref(), Some("bitwise"));
        assert_eq!(p.examples.len(), 2);
        assert_eq!(p.examples_text()[1], "1010 0101");
        assert_eq!(p.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(p.status, PatternStatus::Candidate);
        assert!(p.extra.contains_key("source_url"));

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["source_url"], "https://example.com");
        assert_eq!(back["type"], "bitwise");
    }

    #[test]
    fn test_matches_category() {
        let p = Pattern::new("XOR", "toggle")
            .with_category("Bitwise")
            .with_tags(["bits"]);
        assert!(p.matches_category("bitwise"));
        assert!(p.matches_category("BITS"));
        assert!(!p.matches_category("sorting"));
    }
}
