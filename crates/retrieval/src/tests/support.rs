//! Test doubles for the vector store and embedding seams.

use crate::embeddings::EmbeddingProvider;
use crate::types::{CollectionInfo, SearchFilter, SearchResult};
use crate::vector_store::{VectorStore, VectorStoreConnector};
use crate::{ConflictResolver, QueryRouter, RetrievalConfig, ResolutionStats, SearchService};
use crate::collections::CollectionManager;
use advisor_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns canned results after an optional delay, ignoring the filter.
pub struct FixedStore {
    results: Vec<SearchResult>,
    delay: Option<Duration>,
}

impl FixedStore {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            delay: None,
        }
    }

    pub fn slow(results: Vec<SearchResult>, delay: Duration) -> Self {
        Self {
            results,
            delay: Some(delay),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for FixedStore {
    async fn search(
        &self,
        _query_vector: &[f32],
        _filter: &SearchFilter,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.results.len() as u64)
    }
}

/// Every call fails as if the index were unreachable.
pub struct FailingStore;

#[async_trait::async_trait]
impl VectorStore for FailingStore {
    async fn search(
        &self,
        _query_vector: &[f32],
        _filter: &SearchFilter,
        _limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        Err(AppError::Connection("connection refused".to_string()))
    }

    async fn count(&self) -> AppResult<u64> {
        Err(AppError::Connection("connection refused".to_string()))
    }
}

/// Connector over prepared stores that counts connections.
#[derive(Default)]
pub struct StubConnector {
    stores: HashMap<String, Arc<dyn VectorStore>>,
    connect_delay: Option<Duration>,
    pub connects: AtomicUsize,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, actual_name: &str, store: impl VectorStore + 'static) -> Self {
        self.stores.insert(actual_name.to_string(), Arc::new(store));
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VectorStoreConnector for StubConnector {
    async fn connect(&self, actual_name: &str) -> AppResult<Arc<dyn VectorStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.stores
            .get(actual_name)
            .cloned()
            .ok_or_else(|| AppError::Connection(format!("no route to index '{}'", actual_name)))
    }
}

/// Embeds everything to the same vector, optionally after a delay.
#[derive(Debug, Default)]
pub struct ConstantEmbedder {
    pub delay: Option<Duration>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn provider_name(&self) -> &str {
        "constant"
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// A tax-focused catalog: base and updates collections plus an unrelated one.
pub fn tax_catalog() -> Vec<CollectionInfo> {
    vec![
        CollectionInfo::new("tax_updates", "tax_updates_idx", 7)
            .with_keywords(&["tax", "vat", "rate", "current"]),
        CollectionInfo::new("tax_knowledge", "tax_knowledge_idx", 6)
            .with_keywords(&["tax", "vat", "law"]),
        CollectionInfo::new("visa_oracle", "visa_idx", 9).with_keywords(&["visa", "kitas"]),
    ]
}

pub fn result(id: &str, score: f32, metadata: serde_json::Value) -> SearchResult {
    SearchResult::new(id, format!("document {}", id), score).with_metadata(metadata)
}

pub fn fast_config(catalog: Vec<CollectionInfo>) -> RetrievalConfig {
    RetrievalConfig {
        per_collection_timeout_ms: 100,
        request_timeout_ms: 1_000,
        collections: catalog,
        ..Default::default()
    }
}

/// Service wired with explicit collaborators and a shared stats instance.
pub fn service(
    config: &RetrievalConfig,
    connector: Arc<StubConnector>,
    embedder: ConstantEmbedder,
) -> (SearchService, Arc<ResolutionStats>) {
    let collections =
        Arc::new(CollectionManager::new(config.collections.clone(), connector).unwrap());
    let router = QueryRouter::new(Arc::clone(&collections), config);
    let stats = Arc::new(ResolutionStats::new());
    let resolver = ConflictResolver::with_stats(Arc::clone(&stats));
    (
        SearchService::new(collections, router, resolver, Arc::new(embedder), config),
        stats,
    )
}
