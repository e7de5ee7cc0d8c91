//! In-process vector store.
//!
//! Brute-force cosine similarity over embedded documents. Backs the CLI and
//! the crate's tests; production deployments inject a real store client.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::types::{CollectionInfo, SearchFilter, SearchResult};
use crate::vector_store::{VectorStore, VectorStoreConnector};
use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A document as stored in a seed file (one JSON object per line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    pub id: String,
    /// Logical collection name
    pub collection: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    text: String,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

/// One backing index held in memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document by id.
    pub async fn upsert(
        &self,
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: serde_json::Value,
        embedding: Vec<f32>,
    ) {
        let doc = StoredDocument {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding,
        };

        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => documents.push(doc),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        let documents = self.documents.read().await;

        let mut results: Vec<SearchResult> = documents
            .iter()
            .map(|doc| SearchResult {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                score: cosine_similarity(query_vector, &doc.embedding).clamp(0.0, 1.0),
                collection: String::new(),
                disposition: None,
            })
            .filter(|result| filter.allows(result))
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.documents.read().await.len() as u64)
    }
}

/// Connector over a fixed set of in-memory indexes.
///
/// Connecting to an index name that was never registered fails with a
/// connection error, the same way an unreachable remote index would.
#[derive(Default)]
pub struct InMemoryConnector {
    indexes: HashMap<String, Arc<InMemoryVectorStore>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index under its backing name.
    pub fn with_index(
        mut self,
        actual_name: impl Into<String>,
        store: Arc<InMemoryVectorStore>,
    ) -> Self {
        self.indexes.insert(actual_name.into(), store);
        self
    }

    pub fn index(&self, actual_name: &str) -> Option<Arc<InMemoryVectorStore>> {
        self.indexes.get(actual_name).cloned()
    }

    /// Build one index per catalog entry and embed the seed documents into them.
    ///
    /// Documents naming a collection outside the catalog are skipped.
    pub async fn from_documents(
        catalog: &[CollectionInfo],
        documents: Vec<SeedDocument>,
        embedder: &dyn EmbeddingProvider,
    ) -> AppResult<Self> {
        let mut connector = Self::new();
        for info in catalog {
            connector
                .indexes
                .insert(info.actual_name.clone(), Arc::new(InMemoryVectorStore::new()));
        }

        if documents.is_empty() {
            return Ok(connector);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let mut skipped = 0usize;
        for (doc, embedding) in documents.into_iter().zip(embeddings) {
            let store = catalog
                .iter()
                .find(|info| info.name == doc.collection)
                .and_then(|info| connector.indexes.get(&info.actual_name));

            match store {
                Some(store) => store.upsert(doc.id, doc.text, doc.metadata, embedding).await,
                None => {
                    tracing::warn!(
                        "Skipping document '{}': collection '{}' is not in the catalog",
                        doc.id,
                        doc.collection
                    );
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::info!("Skipped {} seed documents outside the catalog", skipped);
        }

        Ok(connector)
    }
}

#[async_trait::async_trait]
impl VectorStoreConnector for InMemoryConnector {
    async fn connect(&self, actual_name: &str) -> AppResult<Arc<dyn VectorStore>> {
        match self.indexes.get(actual_name) {
            Some(store) => {
                let store: Arc<dyn VectorStore> = store.clone();
                Ok(store)
            }
            None => Err(AppError::Connection(format!(
                "Index '{}' is not available",
                actual_name
            ))),
        }
    }
}

/// Read seed documents from a JSONL file. Blank lines are ignored.
pub fn load_documents(path: &Path) -> AppResult<Vec<SeedDocument>> {
    let content = std::fs::read_to_string(path)?;
    parse_documents(&content)
}

fn parse_documents(content: &str) -> AppResult<Vec<SeedDocument>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                AppError::Serialization(format!("Invalid document on line {}: {}", i + 1, e))
            })
        })
        .collect()
}
