use std::collections::HashMap;

use super::{
    ConfidenceRouter, HierarchyRouter, MultiSpecialistRouter, Router, RouterConfig,
    RoutingStrategy, DEFAULT_MULTI_THRESHOLD, DEFAULT_THRESHOLD,
};
use crate::error::{ExpertError, Result};

pub type RouterConstructor = fn(&RouterConfig) -> Result<Box<dyn Router>>;

/// Maps `RouterConfig::kind` to the constructor that builds it
pub struct RouterRegistry {
    constructors: HashMap<String, RouterConstructor>,
}

impl RouterRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, constructor: RouterConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(&self, config: &RouterConfig) -> Result<Box<dyn Router>> {
        if let Some(threshold) = config.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ExpertError::Config(format!(
                    "router.threshold must be in [0, 1], got {}",
                    threshold
                )));
            }
        }
        let constructor = self.constructors.get(&config.kind).ok_or_else(|| {
            ExpertError::Config(format!(
                "unknown router kind '{}' (available: {})",
                config.kind,
                self.kinds().join(", ")
            ))
        })?;
        constructor(config)
    }
}

impl Default for RouterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("confidence", build_confidence);
        registry.register("hierarchy", build_hierarchy);
        registry.register("multi", build_multi);
        registry
    }
}

fn build_confidence(config: &RouterConfig) -> Result<Box<dyn Router>> {
    Ok(Box::new(ConfidenceRouter::new(
        config.threshold.unwrap_or(DEFAULT_THRESHOLD),
        config.generalist.clone(),
    )))
}

fn build_hierarchy(config: &RouterConfig) -> Result<Box<dyn Router>> {
    Ok(Box::new(HierarchyRouter::new(
        config.threshold.unwrap_or(DEFAULT_THRESHOLD),
        config.hierarchies.clone(),
        config.max_chain_length,
    )))
}

fn build_multi(config: &RouterConfig) -> Result<Box<dyn Router>> {
    if !matches!(
        config.mode,
        RoutingStrategy::Parallel | RoutingStrategy::Sequential
    ) {
        return Err(ExpertError::Config(format!(
            "multi router mode must be parallel or sequential, got {}",
            config.mode
        )));
    }
    Ok(Box::new(
        MultiSpecialistRouter::new(
            config.threshold.unwrap_or(DEFAULT_MULTI_THRESHOLD),
            config.min_specialists,
            config.max_specialists,
        )
        .mode(config.mode)
        .require_threshold(config.require_threshold),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kinds() {
        let registry = RouterRegistry::default();
        assert_eq!(registry.kinds(), vec!["confidence", "hierarchy", "multi"]);

        for kind in ["confidence", "hierarchy", "multi"] {
            let config = RouterConfig {
                kind: kind.to_string(),
                ..Default::default()
            };
            assert_eq!(registry.build(&config).unwrap().name(), kind);
        }
    }

    #[test]
    fn test_rejects_bad_config() {
        let registry = RouterRegistry::default();

        let unknown = RouterConfig {
            kind: "llm".to_string(),
            ..Default::default()
        };
        assert!(matches!(registry.build(&unknown), Err(ExpertError::Config(_))));

        let bad_threshold = RouterConfig {
            threshold: Some(1.5),
            ..Default::default()
        };
        assert!(registry.build(&bad_threshold).is_err());

        let bad_mode = RouterConfig {
            kind: "multi".to_string(),
            mode: RoutingStrategy::Fallback,
            ..Default::default()
        };
        assert!(registry.build(&bad_mode).is_err());
    }
}
