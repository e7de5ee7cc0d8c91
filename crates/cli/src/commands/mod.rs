//! Command handlers for the Advisor CLI.
//!
//! Commands that search need a document set; they embed it into an
//! in-memory store with the trigram provider before running.

pub mod collections;
pub mod health;
pub mod route;
pub mod search;

pub use collections::CollectionsCommand;
pub use health::HealthCommand;
pub use route::RouteCommand;
pub use search::SearchCommand;

use advisor_core::{config::AppConfig, AppResult};
use advisor_retrieval::{
    load_config_from, load_documents, InMemoryConnector, RetrievalConfig, SearchService,
    TrigramProvider,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Service over the configured catalog with no documents behind it.
fn catalog_service(config: &AppConfig) -> AppResult<SearchService> {
    let retrieval = load_config_from(&config.retrieval_config_path())?;
    SearchService::from_config(
        &retrieval,
        Arc::new(InMemoryConnector::new()),
        Arc::new(TrigramProvider::default()),
    )
}

/// Service over the configured catalog seeded from a JSONL document file.
async fn seeded_service(
    config: &AppConfig,
    documents: &Path,
) -> AppResult<(RetrievalConfig, SearchService)> {
    let retrieval = load_config_from(&config.retrieval_config_path())?;
    let documents = load_documents(documents)?;
    tracing::info!("Loaded {} documents", documents.len());

    let embedder = Arc::new(TrigramProvider::default());
    let connector =
        InMemoryConnector::from_documents(&retrieval.collections, documents, embedder.as_ref())
            .await?;
    let service = SearchService::from_config(&retrieval, Arc::new(connector), embedder)?;
    Ok((retrieval, service))
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
