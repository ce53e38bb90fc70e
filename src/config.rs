//! YAML configuration for the expert assistant
//!
//! A missing config file is not an error: every section has defaults, so a
//! fresh checkout answers queries against `./data/general` out of the box.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::paths::ExpertPaths;
use crate::enrich::EnrichmentConfig;
use crate::error::{ExpertError, Result};
use crate::routing::{AggregationStrategy, RouterConfig};
use crate::specialist::SpecialistProfile;

pub const DEFAULT_CONFIG_FILE: &str = "expert.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpertConfig {
    pub domain: String,
    pub data_dir: PathBuf,
    pub search: SearchConfig,
    pub feedback: FeedbackConfig,
    pub router: RouterConfig,
    pub aggregation: AggregationStrategy,
    pub enrichment: EnrichmentConfig,
    pub specialists: Vec<SpecialistProfile>,
}

impl Default for ExpertConfig {
    fn default() -> Self {
        Self {
            domain: "general".to_string(),
            data_dir: PathBuf::from("data"),
            search: SearchConfig::default(),
            feedback: FeedbackConfig::default(),
            router: RouterConfig::default(),
            aggregation: AggregationStrategy::default(),
            enrichment: EnrichmentConfig::default(),
            specialists: vec![SpecialistProfile::generalist("general")],
        }
    }
}

/// Hybrid search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Enable the embedding backend; keyword-only selection when false
    pub semantic: bool,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Token budget for the text embedded per pattern (~4 chars per token)
    pub token_budget: usize,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic: true,
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            token_budget: 256,
            default_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Weight kept by the historical confidence when blending a new rating
    pub decay: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { decay: 0.7 }
    }
}

impl ExpertConfig {
    /// Load config from YAML, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|e| ExpertError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| ExpertError::Config(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(ExpertError::Config("domain must not be empty".to_string()));
        }
        if !(0.0..1.0).contains(&self.feedback.decay) {
            return Err(ExpertError::Config(format!(
                "feedback.decay must be in [0, 1), got {}",
                self.feedback.decay
            )));
        }
        for (name, weight) in [
            ("semantic_weight", self.search.semantic_weight),
            ("keyword_weight", self.search.keyword_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ExpertError::Config(format!(
                    "search.{} must be in [0, 1], got {}",
                    name, weight
                )));
            }
        }
        if self.specialists.is_empty() {
            return Err(ExpertError::Config(
                "at least one specialist must be configured".to_string(),
            ));
        }
        Ok(())
    }

    pub fn paths(&self) -> ExpertPaths {
        ExpertPaths::new(&self.data_dir, &self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingStrategy;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExpertConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.domain, "general");
        assert_eq!(config.feedback.decay, 0.7);
        assert_eq!(config.specialists.len(), 1);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expert.yaml");
        std::fs::write(
            &path,
            r#"
domain: bitwise
search:
  semantic: false
router:
  kind: multi
  threshold: 0.25
  mode: sequential
aggregation: best_pattern
"#,
        )
        .unwrap();

        let config = ExpertConfig::load(&path).unwrap();
        assert_eq!(config.domain, "bitwise");
        assert!(!config.search.semantic);
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.router.kind, "multi");
        assert_eq!(config.router.threshold, Some(0.25));
        assert_eq!(config.router.mode, RoutingStrategy::Sequential);
        assert_eq!(config.aggregation, AggregationStrategy::BestPattern);
    }

    #[test]
    fn test_invalid_decay_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expert.yaml");
        std::fs::write(&path, "feedback:\n  decay: 1.5\n").unwrap();
        assert!(matches!(
            ExpertConfig::load(&path),
            Err(ExpertError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("expert.yaml");
        let mut config = ExpertConfig::default();
        config.domain = "crypto".to_string();
        config.save(&path).unwrap();

        let loaded = ExpertConfig::load(&path).unwrap();
        assert_eq!(loaded.domain, "crypto");
        assert_eq!(loaded.specialists[0].id, "general");
    }
}
