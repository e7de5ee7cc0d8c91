//! Multi-collection retrieval core.
//!
//! Routes a query to one or more topical collections, searches them
//! concurrently under the caller's access tier, and resolves factual
//! conflicts between collections before returning one merged answer set.
//!
//! Components, leaf first:
//! - [`CollectionManager`]: catalog plus lazily connected, memoized handles
//! - [`ConflictResolver`]: pure conflict detection/resolution with counters
//! - [`QueryRouter`]: query → primary collection, fallbacks, confidence
//! - [`SearchService`]: tier-gated single and fan-out search
//!
//! The vector store and the embedding provider are injected through the
//! [`VectorStoreConnector`] and [`EmbeddingProvider`] traits.

pub mod collections;
pub mod config;
pub mod conflict;
pub mod embeddings;
pub mod memory_store;
pub mod router;
pub mod search;
pub mod types;
pub mod vector_store;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use collections::{CollectionHandle, CollectionManager};
pub use config::{load_config, load_config_from, RetrievalConfig};
pub use conflict::{ConflictResolver, ResolutionStats, StatsSnapshot};
pub use embeddings::{EmbeddingProvider, TrigramProvider};
pub use memory_store::{load_documents, InMemoryConnector, InMemoryVectorStore, SeedDocument};
pub use router::{is_pricing_query, QueryRouter};
pub use search::{parse_tier_filter, SearchService};
pub use types::{
    AccessTier, CollectionFailure, CollectionHealth, CollectionInfo, CollectionResults, Conflict,
    ConflictAwareResponse, ConflictCandidate, Disposition, HealthStatus, ResolutionRule,
    RouteDecision, SearchFilter, SearchRequest, SearchResponse, SearchResult, Tier,
};
pub use vector_store::{VectorStore, VectorStoreConnector};
