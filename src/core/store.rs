//! In-memory pattern index backed by one JSON file per domain
//!
//! Reads take a shared lock. Every mutation takes the write lock, applies the
//! change to a copy of the index, writes that copy to disk and only then
//! swaps it in, so the in-memory view never runs ahead of the file.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::pattern::{Feedback, Pattern};
use crate::error::{ExpertError, Result};

/// Default weight kept by historical confidence on feedback
pub const DEFAULT_DECAY: f32 = 0.7;

#[derive(Debug, Clone, Default)]
struct StoreState {
    /// Insertion order of keys
    order: Vec<String>,
    patterns: HashMap<String, Pattern>,
}

impl StoreState {
    fn insert(&mut self, key: String, pattern: Pattern) {
        if self.patterns.insert(key.clone(), pattern).is_none() {
            self.order.push(key);
        }
    }

    fn ordered(&self) -> impl Iterator<Item = &Pattern> {
        self.order.iter().filter_map(|k| self.patterns.get(k))
    }
}

/// Persisted layout: a bare array, or an object wrapping one
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternFile {
    List(Vec<Pattern>),
    Wrapped { patterns: Vec<Pattern> },
}

pub struct PatternStore {
    domain: String,
    path: PathBuf,
    decay: f32,
    state: RwLock<StoreState>,
}

impl PatternStore {
    /// Create a store for `domain` persisted at `path`; nothing is read yet
    pub fn new(domain: impl Into<String>, path: &Path) -> Self {
        Self {
            domain: domain.into(),
            path: path.to_path_buf(),
            decay: DEFAULT_DECAY,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    /// Create and load in one step
    pub fn open(domain: impl Into<String>, path: &Path) -> Result<Self> {
        let store = Self::new(domain, path);
        store.load()?;
        Ok(store)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)load every pattern from disk
    ///
    /// A missing file yields an empty store. Unparseable content is a
    /// `Format` error and leaves the current index untouched.
    pub fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "pattern file missing, starting empty");
            *self.state.write() = StoreState::default();
            return Ok(());
        }

        let raw = fs::read_to_string(&self.path)?;
        let patterns = if raw.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str::<PatternFile>(&raw) {
                Ok(PatternFile::List(list)) | Ok(PatternFile::Wrapped { patterns: list }) => list,
                Err(e) => {
                    return Err(ExpertError::Format {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        };

        // Derived ids must not collide with keys spelled out later in the file
        let mut taken: HashSet<String> = patterns
            .iter()
            .filter_map(|p| p.index_key().map(String::from))
            .collect();

        let mut state = StoreState::default();
        for (i, mut pattern) in patterns.into_iter().enumerate() {
            let key = match pattern.index_key() {
                Some(k) => k.to_string(),
                None => {
                    let mut seq = i + 1;
                    while taken.contains(&self.sequence_id(seq)) {
                        seq += 1;
                    }
                    let key = self.sequence_id(seq);
                    taken.insert(key.clone());
                    key
                }
            };
            if state.patterns.contains_key(&key) {
                warn!(domain = %self.domain, id = %key, "duplicate pattern id, keeping the later record");
            }
            if !(0.0..=1.0).contains(&pattern.confidence) {
                warn!(id = %key, confidence = pattern.confidence, "confidence out of range, clamping");
                pattern.confidence = pattern.confidence.clamp(0.0, 1.0);
            }
            // The index key becomes the canonical id downstream
            pattern.id = Some(key.clone());
            state.insert(key, pattern);
        }

        info!(domain = %self.domain, count = state.patterns.len(), "loaded patterns");
        *self.state.write() = state;
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<Pattern> {
        self.state.read().patterns.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().patterns.contains_key(id)
    }

    /// Union of category, type and tags across all patterns
    pub fn all_categories(&self) -> BTreeSet<String> {
        self.state
            .read()
            .patterns
            .values()
            .flat_map(|p| p.labels().map(String::from).collect::<Vec<_>>())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.read().patterns.len()
    }

    /// Snapshot of every pattern in load/insertion order
    pub fn all(&self) -> Vec<Pattern> {
        self.state.read().ordered().cloned().collect()
    }

    /// Insert a pattern, assigning `{domain}_{seq:03d}` when it has no id
    pub fn add(&self, mut pattern: Pattern) -> Result<String> {
        let mut state = self.state.write();
        let mut next = state.clone();

        let id = match pattern.index_key() {
            Some(k) if pattern.id.is_some() || pattern.pattern_id.is_some() => k.to_string(),
            _ => {
                let mut seq = next.patterns.len() + 1;
                while next.patterns.contains_key(&self.sequence_id(seq)) {
                    seq += 1;
                }
                self.sequence_id(seq)
            }
        };

        check_confidence(&id, pattern.confidence)?;

        let now = Utc::now();
        pattern.id = Some(id.clone());
        pattern.created_at.get_or_insert(now);
        pattern.updated_at = Some(now);
        next.insert(id.clone(), pattern);

        self.persist(&next)?;
        *state = next;
        info!(domain = %self.domain, id = %id, "added pattern");
        Ok(id)
    }

    /// Shallow-merge `fields` into an existing pattern
    pub fn update(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        for key in ["id", "pattern_id"] {
            if let Some(v) = fields.get(key) {
                if v.as_str() != Some(id) {
                    return Err(ExpertError::InvalidUpdate {
                        id: id.to_string(),
                        reason: format!("'{}' cannot be changed", key),
                    });
                }
            }
        }

        self.mutate(id, |pattern| {
            let mut value = serde_json::to_value(&*pattern)?;
            if let Value::Object(ref mut obj) = value {
                for (k, v) in fields {
                    obj.insert(k.clone(), v.clone());
                }
            }
            *pattern = serde_json::from_value(value).map_err(|e| ExpertError::InvalidUpdate {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
            check_confidence(id, pattern.confidence)
        })
    }

    /// Blend a rating into confidence and count the access
    pub fn record_feedback(&self, id: &str, feedback: Feedback) -> Result<()> {
        if let Some(rating) = feedback.rating {
            if !(1..=5).contains(&rating) {
                return Err(ExpertError::InvalidRating(rating));
            }
        }

        let decay = self.decay;
        self.mutate(id, |pattern| {
            if let Some(rating) = feedback.rating {
                let observed = f32::from(rating) / 5.0;
                pattern.confidence =
                    (pattern.confidence * decay + observed * (1.0 - decay)).clamp(0.0, 1.0);
            }
            pattern.times_accessed += 1;
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<Pattern> {
        let mut state = self.state.write();
        let mut next = state.clone();

        let removed = next
            .patterns
            .remove(id)
            .ok_or_else(|| ExpertError::NotFound(id.to_string()))?;
        next.order.retain(|k| k != id);

        self.persist(&next)?;
        *state = next;
        info!(domain = %self.domain, id = %id, "deleted pattern");
        Ok(removed)
    }

    fn mutate<F>(&self, id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Pattern) -> Result<()>,
    {
        let mut state = self.state.write();
        let mut next = state.clone();

        let pattern = next
            .patterns
            .get_mut(id)
            .ok_or_else(|| ExpertError::NotFound(id.to_string()))?;
        let previous = pattern.updated_at;
        apply(pattern)?;

        // Clock skew must never move updated_at backwards
        let now = Utc::now();
        pattern.updated_at = Some(previous.map_or(now, |p| p.max(now)));

        self.persist(&next)?;
        *state = next;
        debug!(domain = %self.domain, id = %id, "updated pattern");
        Ok(())
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let patterns: Vec<&Pattern> = state.ordered().collect();
        let json = serde_json::to_string_pretty(&patterns)?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn sequence_id(&self, seq: usize) -> String {
        format!("{}_{:03}", self.domain, seq)
    }
}

fn check_confidence(id: &str, confidence: f32) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(ExpertError::InvalidUpdate {
            id: id.to_string(),
            reason: format!("confidence {} is outside [0, 1]", confidence),
        })
    }
}
