//! pattern-expert library
//!
//! Domain-agnostic expert assistant that answers free-text queries from a
//! curated store of knowledge patterns.
//!
//! # Modules
//!
//! - `core`: Pattern records and the per-domain pattern store
//! - `search`: Hybrid keyword/semantic search, embeddings and vector store
//! - `specialist`: Query handlers and their registry
//! - `routing`: Routers that pick specialists, and the response aggregator
//! - `enrich`: Chained and parallel response enrichment
//! - `pipeline`: End-to-end query resolution

pub mod config;
pub mod core;
pub mod enrich;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod routing;
pub mod search;
pub mod specialist;

// Re-exports for convenience
pub use config::{ExpertConfig, SearchConfig};
pub use core::paths::ExpertPaths;
pub use core::pattern::{Feedback, Pattern, PatternStatus};
pub use core::store::PatternStore;
pub use envelope::{AttributedPattern, ResponseEnvelope};
pub use error::{ExpertError, Result};
pub use pipeline::QueryPipeline;
pub use search::{HybridSearchEngine, SearchRequest};
