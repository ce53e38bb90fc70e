//! Embedding backends and the service that owns them
//!
//! The built-in backend is Harmonic Token Projection (HTP): every token is
//! read as a base-2^16 integer, reduced modulo a set of primes, and each
//! residue is projected onto the unit circle. Token vectors are mean-pooled
//! and L2-normalized. No model file, deterministic, multilingual.
//! See <https://arxiv.org/html/2511.20665>.
//!
//! The backend is created at most once per [`EmbeddingService`], on first
//! use. A backend that fails to load leaves the service permanently in
//! keyword-only mode instead of failing queries.

use std::f64::consts::PI;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::core::pattern::Pattern;
use crate::error::{ExpertError, Result};

/// Output dimension of the HTP backend (two components per modulus)
pub const EMBEDDING_DIM: usize = 256;

/// Approximate characters per token used for embedding budgets
pub const CHARS_PER_TOKEN: usize = 4;

const MAX_TOKEN_CHARS: usize = 64;
const SOLUTION_CAP: usize = 1000;
const SECONDARY_CAP: usize = 200;

/// Anything that turns text into a fixed-length vector
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Harmonic Token Projection embedder
pub struct HtpEmbedder {
    moduli: Vec<u64>,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(EMBEDDING_DIM / 2),
        }
    }

    fn project_token(&self, token: &str, acc: &mut [f64]) {
        let n = token
            .chars()
            .take(MAX_TOKEN_CHARS)
            .fold(0u64, |n, c| n.wrapping_mul(1 << 16).wrapping_add(c as u64));

        for (i, &m) in self.moduli.iter().enumerate() {
            let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
            acc[2 * i] += theta.sin();
            acc[2 * i + 1] += theta.cos();
        }
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HtpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens: Vec<String> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut acc = vec![0.0f64; EMBEDDING_DIM];
        if tokens.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }
        for token in &tokens {
            self.project_token(token, &mut acc);
        }

        // Mean pooling cancels out under L2 normalization
        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        Ok(acc
            .into_iter()
            .map(|x| if norm > 0.0 { (x / norm) as f32 } else { x as f32 })
            .collect())
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Cosine similarity; vectors must have equal length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ExpertError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        Ok(dot / (norm_a * norm_b))
    } else {
        Ok(0.0)
    }
}

/// Build the text embedded for a pattern within `token_budget`
///
/// Fields go in priority order name, solution, description, problem,
/// origin_query, tags. If they do not all fit, the text falls back to name
/// plus a capped solution, then one capped secondary field if room remains.
pub fn encode_pattern(pattern: &Pattern, token_budget: usize) -> String {
    let budget = token_budget * CHARS_PER_TOKEN;
    let tags = pattern.tags.join(" ");
    let fields = [
        pattern.name.as_str(),
        pattern.solution.as_str(),
        pattern.description.as_str(),
        pattern.problem.as_str(),
        pattern.origin_query.as_deref().unwrap_or(""),
        tags.as_str(),
    ];

    let full: Vec<&str> = fields.iter().copied().filter(|f| !f.is_empty()).collect();
    let full_len: usize = full.iter().map(|f| f.chars().count() + 1).sum();
    if full_len <= budget {
        return full.join(" ");
    }

    let mut text = pattern.name.clone();
    let solution = truncate_chars(&pattern.solution, SOLUTION_CAP);
    if !solution.is_empty() {
        text.push(' ');
        text.push_str(&solution);
    }

    let used = text.chars().count();
    for secondary in [&pattern.description, &pattern.problem] {
        if secondary.is_empty() {
            continue;
        }
        let capped = truncate_chars(secondary, SECONDARY_CAP);
        if used + 1 + capped.chars().count() <= budget {
            text.push(' ');
            text.push_str(&capped);
            break;
        }
    }

    text
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

type EmbedderLoader = Box<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Owns the embedding backend; constructed once and shared with the engine
pub struct EmbeddingService {
    enabled: bool,
    loader: EmbedderLoader,
    backend: OnceCell<Option<Arc<dyn Embedder>>>,
}

impl EmbeddingService {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        Self {
            enabled: true,
            loader: Box::new(loader),
            backend: OnceCell::new(),
        }
    }

    /// Service backed by the built-in HTP embedder
    pub fn htp() -> Self {
        Self::new(|| Ok(Arc::new(HtpEmbedder::new()) as Arc<dyn Embedder>))
    }

    /// Service that never provides a backend (keyword-only search)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            loader: Box::new(|| Err(ExpertError::Embedding("disabled".to_string()))),
            backend: OnceCell::new(),
        }
    }

    /// The backend, loading it on first call; `None` when unavailable
    pub async fn backend(&self) -> Option<Arc<dyn Embedder>> {
        if !self.enabled {
            return None;
        }

        self.backend
            .get_or_init(|| async {
                match (self.loader)() {
                    Ok(backend) => {
                        info!(dimension = backend.dimension(), "embedding backend ready");
                        Some(backend)
                    }
                    Err(e) => {
                        warn!(error = %e, "embedding backend failed to load, using keyword search");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}
