//! Tier-gated search over one or many collections.
//!
//! `SearchService` is the only component that talks to the vector store.
//!
//! # Conflict-aware pipeline
//!
//! 1. Validate the caller's level and resolve allowed tiers
//! 2. Route the query (primary + fallbacks)
//! 3. Fan out one bounded search per collection with [`futures::future::join_all`],
//!    each under the per-collection timeout, all under the request timeout
//! 4. Record failed or timed-out collections; fail only if none succeeded
//! 5. Detect and resolve conflicts between the successful collections
//! 6. Sort, truncate, and score the merged set

use crate::collections::{CollectionHandle, CollectionManager};
use crate::config::RetrievalConfig;
use crate::conflict::ConflictResolver;
use crate::embeddings::EmbeddingProvider;
use crate::router::QueryRouter;
use crate::types::{
    AccessTier, CollectionFailure, CollectionHealth, CollectionResults, ConflictAwareResponse,
    HealthStatus, ResultsByCollection, SearchFilter, SearchRequest, SearchResponse, SearchResult,
    Tier,
};
use crate::vector_store::VectorStoreConnector;
use advisor_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Share of response confidence taken from the routing decision.
const ROUTE_CONFIDENCE_WEIGHT: f32 = 0.6;

/// Share of response confidence taken from the top merged score.
const SCORE_CONFIDENCE_WEIGHT: f32 = 0.4;

/// Outcome of one collection call during fan-out.
type CollectionOutcome = (String, Result<Vec<SearchResult>, CollectionFailure>);

/// Orchestrates routing, retrieval and conflict resolution.
pub struct SearchService {
    collections: Arc<CollectionManager>,
    router: QueryRouter,
    resolver: ConflictResolver,
    embedder: Arc<dyn EmbeddingProvider>,
    per_collection_timeout: Duration,
    request_timeout: Duration,
}

impl SearchService {
    /// Assemble a service from its collaborators.
    pub fn new(
        collections: Arc<CollectionManager>,
        router: QueryRouter,
        resolver: ConflictResolver,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            collections,
            router,
            resolver,
            embedder,
            per_collection_timeout: config.per_collection_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Build the full component graph from configuration.
    pub fn from_config(
        config: &RetrievalConfig,
        connector: Arc<dyn VectorStoreConnector>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        config.validate()?;
        let collections = Arc::new(CollectionManager::new(config.collections.clone(), connector)?);
        let router = QueryRouter::new(Arc::clone(&collections), config);
        Ok(Self::new(
            collections,
            router,
            ConflictResolver::new(),
            embedder,
            config,
        ))
    }

    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Single-collection search.
    ///
    /// Routes without fallbacks, searches the chosen collection once, and
    /// drops results outside the caller's effective tiers.
    pub async fn search(&self, request: &SearchRequest) -> AppResult<SearchResponse> {
        let level = AccessTier::new(request.user_level)?;
        let effective_tiers = level.effective_tiers(request.tier_filter.as_deref());

        let route = self.router.route_query(
            &request.query,
            request.collection_override.as_deref(),
            false,
        );

        let mut response = SearchResponse {
            query: request.query.clone(),
            results: Vec::new(),
            user_level: level.level(),
            allowed_tiers: level.allowed_tiers().to_vec(),
            effective_tiers: effective_tiers.clone(),
            collection_used: route.primary_collection.clone(),
        };

        if request.limit == 0 || effective_tiers.is_empty() {
            tracing::debug!(
                "Nothing to search (limit {}, effective tiers {:?})",
                request.limit,
                effective_tiers
            );
            return Ok(response);
        }

        let Some(handle) = self.collections.get_collection(&route.primary_collection).await? else {
            return Ok(response);
        };

        let query_vector = self.embed_query(&request.query).await?;
        let filter = SearchFilter::new().with_tiers(effective_tiers);

        let results = self
            .timed_search(&handle, &query_vector, &filter, request.limit)
            .await?;
        response.results = finalize(filter.apply(results), request.limit);

        tracing::info!(
            "Search in '{}' returned {} results",
            response.collection_used,
            response.results.len()
        );

        Ok(response)
    }

    /// Multi-collection search with conflict resolution.
    pub async fn search_with_conflict_resolution(
        &self,
        request: &SearchRequest,
    ) -> AppResult<ConflictAwareResponse> {
        let level = AccessTier::new(request.user_level)?;
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("conflict_search", %request_id, user_level = level.level());

        let search = self.run_conflict_search(request, level).instrument(span);
        match tokio::time::timeout(self.request_timeout, search).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    %request_id,
                    "Request exceeded {}ms",
                    self.request_timeout.as_millis()
                );
                Err(AppError::Timeout(format!(
                    "request exceeded {}ms",
                    self.request_timeout.as_millis()
                )))
            }
        }
    }

    async fn run_conflict_search(
        &self,
        request: &SearchRequest,
        level: AccessTier,
    ) -> AppResult<ConflictAwareResponse> {
        let start = Instant::now();
        let effective_tiers = level.effective_tiers(request.tier_filter.as_deref());

        let route = self.router.route_query(
            &request.query,
            request.collection_override.as_deref(),
            request.enable_fallbacks,
        );

        let mut response = ConflictAwareResponse {
            query: request.query.clone(),
            results: Vec::new(),
            user_level: level.level(),
            primary_collection: route.primary_collection.clone(),
            collections_searched: Vec::new(),
            collections_failed: Vec::new(),
            confidence: 0.0,
            conflicts_detected: 0,
            conflicts: Vec::new(),
            fallbacks_used: false,
        };

        if request.limit == 0 || effective_tiers.is_empty() {
            tracing::debug!(
                "Nothing to search (limit {}, effective tiers {:?})",
                request.limit,
                effective_tiers
            );
            return Ok(response);
        }

        let query_vector = self.embed_query(&request.query).await?;
        let filter = SearchFilter::new().with_tiers(effective_tiers);
        let targets = route.collections();

        tracing::info!("Fanning out to {} collections: {:?}", targets.len(), targets);

        let outcomes = futures::future::join_all(
            targets
                .iter()
                .map(|name| self.search_one(name, &query_vector, &filter, request.limit)),
        )
        .await;

        let mut results_by_collection = ResultsByCollection::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(results) => {
                    tracing::debug!("Collection '{}' returned {} results", name, results.len());
                    response.collections_searched.push(name.clone());
                    results_by_collection.insert(name, results);
                }
                Err(failure) => {
                    tracing::warn!(
                        collection = %failure.collection,
                        timed_out = failure.timed_out,
                        "Collection search failed: {}",
                        failure.reason
                    );
                    response.collections_failed.push(failure);
                }
            }
        }

        if response.collections_searched.is_empty() {
            return Err(all_failed_error(&response.collections_failed));
        }

        let candidates = self.resolver.detect_conflicts(&results_by_collection);
        let (resolved, conflicts) = self
            .resolver
            .resolve_conflicts(&results_by_collection, &candidates);

        response.conflicts_detected = candidates.len();
        response.conflicts = conflicts;
        response.results = finalize(resolved, request.limit);
        response.fallbacks_used = response
            .results
            .iter()
            .any(|r| r.collection != route.primary_collection);
        response.confidence = response_confidence(
            route.confidence,
            response.results.first().map(|r| r.score),
            response.collections_searched.len(),
            targets.len(),
        );

        tracing::info!(
            "Conflict-aware search finished in {:.2}s: {} results from {:?}, {} conflicts, confidence {:.2}",
            start.elapsed().as_secs_f64(),
            response.results.len(),
            response.collections_searched,
            response.conflicts_detected,
            response.confidence
        );

        Ok(response)
    }

    /// Search one collection during fan-out, capturing any failure.
    async fn search_one(
        &self,
        name: &str,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> CollectionOutcome {
        let failure = |reason: String, timed_out: bool| CollectionFailure {
            collection: name.to_string(),
            reason,
            timed_out,
        };

        let call = async {
            let handle = self
                .collections
                .get_collection(name)
                .await?
                .ok_or_else(|| AppError::Other(format!("collection '{}' not found", name)))?;
            handle.search(query_vector, filter, limit).await
        };

        let outcome = match tokio::time::timeout(self.per_collection_timeout, call).await {
            Ok(Ok(results)) => Ok(filter.apply(results)),
            Ok(Err(err)) => Err(failure(err.to_string(), matches!(err, AppError::Timeout(_)))),
            Err(_) => Err(failure(
                format!("timed out after {}ms", self.per_collection_timeout.as_millis()),
                true,
            )),
        };

        (name.to_string(), outcome)
    }

    /// Direct search of one named collection, bypassing the router.
    ///
    /// An unknown collection yields an empty result set.
    pub async fn search_collection(
        &self,
        query: &str,
        collection_name: &str,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> AppResult<CollectionResults> {
        let filter = filter.unwrap_or_default();
        let mut response = CollectionResults {
            collection: collection_name.to_string(),
            results: Vec::new(),
        };

        let no_tiers = filter.tiers.as_ref().map(|t| t.is_empty()).unwrap_or(false);
        if limit == 0 || no_tiers {
            return Ok(response);
        }

        let Some(handle) = self.collections.get_collection(collection_name).await? else {
            tracing::warn!("Direct search on unknown collection '{}'", collection_name);
            return Ok(response);
        };

        let query_vector = self.embed_query(query).await?;
        let results = self.timed_search(&handle, &query_vector, &filter, limit).await?;
        response.results = finalize(filter.apply(results), limit);

        Ok(response)
    }

    /// Catalog metadata plus a liveness probe. `None` for unknown collections.
    pub async fn get_collection_health(
        &self,
        collection_name: &str,
    ) -> AppResult<Option<CollectionHealth>> {
        let Some(info) = self.collections.get_collection_info(collection_name).cloned() else {
            return Ok(None);
        };

        let live_count = match self.collections.get_collection(collection_name).await {
            Ok(Some(handle)) => {
                match tokio::time::timeout(self.per_collection_timeout, handle.count()).await {
                    Ok(Ok(count)) => Some(count),
                    Ok(Err(err)) => {
                        tracing::warn!("Health probe for '{}' failed: {}", collection_name, err);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("Health probe for '{}' timed out", collection_name);
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("Cannot connect '{}': {}", collection_name, err);
                None
            }
        };

        Ok(Some(CollectionHealth {
            name: info.name,
            actual_name: info.actual_name,
            priority: info.priority,
            doc_count: info.doc_count,
            live_count,
            status: if live_count.is_some() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unreachable
            },
        }))
    }

    /// Connect every collection ahead of the first query.
    ///
    /// Safe to call repeatedly; returns the number of connected collections.
    pub async fn warmup(&self) -> AppResult<usize> {
        let start = Instant::now();
        let handles = self.collections.get_all_collections().await?;
        tracing::info!(
            "Warmed up {} collections in {:.2}s",
            handles.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(handles.len())
    }

    async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        self.embedder
            .embed(query)
            .await
            .map_err(|e| match e {
                AppError::Embedding(_) => e,
                other => AppError::Embedding(other.to_string()),
            })
    }

    async fn timed_search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> AppResult<Vec<SearchResult>> {
        tokio::time::timeout(
            self.per_collection_timeout,
            handle.search(query_vector, filter, limit),
        )
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "collection '{}' exceeded {}ms",
                handle.name(),
                self.per_collection_timeout.as_millis()
            ))
        })?
    }
}

/// Sort by score descending (ties by collection, then id) and truncate.
fn finalize(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.collection.cmp(&b.collection))
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
    results
}

/// Blend route confidence with the top score, penalised by failed collections.
fn response_confidence(
    route_confidence: f32,
    top_score: Option<f32>,
    succeeded: usize,
    attempted: usize,
) -> f32 {
    let Some(top_score) = top_score else {
        return 0.0;
    };
    if attempted == 0 {
        return 0.0;
    }

    let blended = ROUTE_CONFIDENCE_WEIGHT * route_confidence + SCORE_CONFIDENCE_WEIGHT * top_score;
    (blended * succeeded as f32 / attempted as f32).clamp(0.0, 1.0)
}

fn all_failed_error(failures: &[CollectionFailure]) -> AppError {
    let summary = failures
        .iter()
        .map(|f| format!("{}: {}", f.collection, f.reason))
        .collect::<Vec<_>>()
        .join("; ");

    if !failures.is_empty() && failures.iter().all(|f| f.timed_out) {
        AppError::Timeout(format!("all collections timed out: {}", summary))
    } else {
        AppError::Connection(format!("all collections failed: {}", summary))
    }
}

/// Parse tier labels, rejecting unknown ones.
pub fn parse_tier_filter<S: AsRef<str>>(labels: &[S]) -> AppResult<Vec<Tier>> {
    labels.iter().map(|label| label.as_ref().parse()).collect()
}
