//! Vector store abstraction.
//!
//! The store client is owned outside this crate and injected. It is bound to
//! one backing index per collection through a [`VectorStoreConnector`].

use crate::types::{SearchFilter, SearchResult};
use advisor_core::AppResult;
use std::sync::Arc;

/// One backing index in the vector store.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for the `limit` most similar documents to `query_vector`.
    ///
    /// Returns results ordered by descending score. Implementations should
    /// honour `filter`, but callers re-check it.
    async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>>;

    /// Number of documents currently stored. Used as a liveness probe.
    async fn count(&self) -> AppResult<u64>;
}

/// Opens handles to backing indexes by their identifier.
#[async_trait::async_trait]
pub trait VectorStoreConnector: Send + Sync {
    /// Connect to the index named `actual_name`.
    ///
    /// Fails with a connection error when the index cannot be reached.
    async fn connect(&self, actual_name: &str) -> AppResult<Arc<dyn VectorStore>>;
}
