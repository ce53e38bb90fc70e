//! Hybrid pattern search
//!
//! Keyword relevance is always computed; semantic similarity joins in when an
//! embedding backend is available.

pub mod embedding;
pub mod engine;
pub mod keyword;
pub mod selection;
pub mod vectordb;

pub use embedding::{cosine_similarity, encode_pattern, Embedder, EmbeddingService, HtpEmbedder};
pub use engine::{HybridSearchEngine, IndexingStats, SearchHit, SearchRequest};
pub use keyword::{content_words, KeywordScore};
pub use selection::WeightedSelector;
pub use vectordb::VectorDB;
