use std::collections::HashMap;
use std::sync::Arc;

use super::{PatternSpecialist, Specialist, SpecialistMap, SpecialistProfile};
use crate::error::{ExpertError, Result};
use crate::search::HybridSearchEngine;

/// Builds a specialist of one kind from its profile
pub type SpecialistConstructor =
    fn(SpecialistProfile, Arc<HybridSearchEngine>) -> Arc<dyn Specialist>;

/// Maps a profile's `kind` to the constructor that builds it
pub struct SpecialistRegistry {
    constructors: HashMap<String, SpecialistConstructor>,
}

impl SpecialistRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, constructor: SpecialistConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(
        &self,
        profile: SpecialistProfile,
        engine: Arc<HybridSearchEngine>,
    ) -> Result<Arc<dyn Specialist>> {
        let constructor = self.constructors.get(&profile.kind).ok_or_else(|| {
            ExpertError::Config(format!(
                "unknown specialist kind '{}' for '{}'",
                profile.kind, profile.id
            ))
        })?;
        Ok(constructor(profile, engine))
    }

    /// Build every profile; ids must be unique and non-empty
    pub fn build_all(
        &self,
        profiles: &[SpecialistProfile],
        engine: &Arc<HybridSearchEngine>,
    ) -> Result<SpecialistMap> {
        let mut specialists = SpecialistMap::new();
        for profile in profiles {
            if profile.id.trim().is_empty() {
                return Err(ExpertError::Config("specialist id must not be empty".to_string()));
            }
            if specialists.contains_key(&profile.id) {
                return Err(ExpertError::Config(format!(
                    "duplicate specialist id '{}'",
                    profile.id
                )));
            }
            let specialist = self.build(profile.clone(), Arc::clone(engine))?;
            specialists.insert(profile.id.clone(), specialist);
        }
        Ok(specialists)
    }
}

impl Default for SpecialistRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("pattern", PatternSpecialist::boxed);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::core::store::PatternStore;

    fn engine() -> (tempfile::TempDir, Arc<HybridSearchEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PatternStore::new("d", &dir.path().join("patterns.json")));
        (dir, Arc::new(HybridSearchEngine::keyword_only(store, SearchConfig::default())))
    }

    #[test]
    fn test_default_registry_builds_pattern_kind() {
        let (_dir, engine) = engine();
        let registry = SpecialistRegistry::default();
        assert_eq!(registry.kinds(), vec!["pattern"]);

        let profiles = vec![
            SpecialistProfile::generalist("general"),
            SpecialistProfile {
                id: "bits".to_string(),
                keywords: vec!["xor".to_string()],
                ..Default::default()
            },
        ];
        let specialists = registry.build_all(&profiles, &engine).unwrap();
        assert_eq!(specialists.len(), 2);
        assert_eq!(specialists["bits"].can_handle("xor"), 1.0);
    }

    #[test]
    fn test_unknown_kind_and_duplicates() {
        let (_dir, engine) = engine();
        let registry = SpecialistRegistry::default();

        let unknown = SpecialistProfile {
            id: "web".to_string(),
            kind: "web_search".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            registry.build(unknown, Arc::clone(&engine)),
            Err(ExpertError::Config(_))
        ));

        let dupes = vec![
            SpecialistProfile::generalist("general"),
            SpecialistProfile::generalist("general"),
        ];
        assert!(registry.build_all(&dupes, &engine).is_err());
    }

    #[test]
    fn test_custom_kind() {
        let (_dir, engine) = engine();
        let mut registry = SpecialistRegistry::default();
        registry.register("alias", PatternSpecialist::boxed);

        let profile = SpecialistProfile {
            id: "alias".to_string(),
            kind: "alias".to_string(),
            generalist: true,
            ..Default::default()
        };
        let specialist = registry.build(profile, engine).unwrap();
        assert_eq!(specialist.id(), "alias");
    }
}
