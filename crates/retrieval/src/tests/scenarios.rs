//! End-to-end behaviour of `SearchService` on small catalogs.

use super::support::*;
use crate::types::{Disposition, HealthStatus, ResolutionRule, SearchFilter, SearchRequest, Tier};
use advisor_core::AppError;
use serde_json::json;
use std::sync::Arc;

fn tax_connector() -> StubConnector {
    StubConnector::new()
        .with_store(
            "tax_knowledge_idx",
            FixedStore::new(vec![result(
                "vat-2022",
                0.70,
                json!({"topic": "VAT rate", "value": "11%", "tier": "C"}),
            )]),
        )
        .with_store(
            "tax_updates_idx",
            FixedStore::new(vec![result(
                "vat-2025",
                0.55,
                json!({"topic": "vat rate", "value": "12%", "tier": "C"}),
            )]),
        )
        .with_store(
            "visa_idx",
            FixedStore::new(vec![result("kitas", 0.40, json!({"topic": "kitas"}))]),
        )
}

#[tokio::test]
async fn test_updated_tax_table_beats_original_law_text() {
    let config = fast_config(tax_catalog());
    let (service, stats) = service(&config, Arc::new(tax_connector()), ConstantEmbedder::default());

    let request = SearchRequest::new("current VAT rate", 3).with_fallbacks(true);
    let response = service.search_with_conflict_resolution(&request).await.unwrap();

    assert_eq!(response.primary_collection, "tax_updates");
    assert_eq!(response.collections_searched, vec!["tax_updates", "tax_knowledge"]);
    assert!(response.collections_failed.is_empty());

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].collection, "tax_updates");
    assert_eq!(response.results[0].metadata["conflict_winner"], true);

    assert_eq!(response.conflicts_detected, 1);
    let conflict = &response.conflicts[0];
    assert_eq!(conflict.rule, ResolutionRule::Temporal);
    assert_eq!(conflict.winner.id, "vat-2025");
    assert_eq!(conflict.losers.len(), 1);
    assert_eq!(conflict.losers[0].collection, "tax_knowledge");
    assert_eq!(conflict.losers[0].disposition, Some(Disposition::Outdated));

    // The only surviving result came from the primary collection.
    assert!(!response.fallbacks_used);
    assert!(response.confidence > 0.0 && response.confidence <= 1.0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.conflicts_detected, 1);
    assert_eq!(snapshot.conflicts_resolved, 1);
    assert_eq!(snapshot.temporal_resolutions, 1);
}

#[tokio::test]
async fn test_second_outdated_chunk_cannot_outrank_the_update() {
    let connector = tax_connector().with_store(
        "tax_knowledge_idx",
        FixedStore::new(vec![
            result("vat-2022", 0.70, json!({"topic": "VAT rate", "value": "11%"})),
            result("vat-2022-faq", 0.65, json!({"topic": "VAT rate", "value": "11%"})),
        ]),
    );
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(connector), ConstantEmbedder::default());

    let request = SearchRequest::new("current VAT rate", 3).with_fallbacks(true);
    let response = service.search_with_conflict_resolution(&request).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "vat-2025");
    assert!(response.results.iter().all(|r| r.metadata["value"] != "11%"));

    let losers: Vec<_> = response.conflicts[0]
        .losers
        .iter()
        .map(|l| l.id.as_str())
        .collect();
    assert_eq!(losers, vec!["vat-2022", "vat-2022-faq"]);
}

#[tokio::test]
async fn test_response_serializes_disposition() {
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(tax_connector()), ConstantEmbedder::default());

    let request = SearchRequest::new("current VAT rate", 3);
    let response = service.search_with_conflict_resolution(&request).await.unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["conflicts"][0]["losers"][0]["disposition"], "outdated");
    assert_eq!(json["conflicts"][0]["rule"], "temporal");
    assert!(json["results"][0].get("disposition").is_none());
}

#[tokio::test]
async fn test_tier_filter_outside_level_returns_nothing() {
    let config = fast_config(tax_catalog());
    let connector = Arc::new(tax_connector());
    let (service, _) = service(&config, Arc::clone(&connector), ConstantEmbedder::default());

    let request = SearchRequest::new("current VAT rate", 0).with_tier_filter(vec![Tier::S]);
    let response = service.search(&request).await.unwrap();

    assert!(response.results.is_empty());
    assert!(!response.allowed_tiers.contains(&Tier::S));
    assert!(response.effective_tiers.is_empty());
    assert_eq!(connector.connect_count(), 0);

    let conflict_response = service.search_with_conflict_resolution(&request).await.unwrap();
    assert!(conflict_response.results.is_empty());
    assert_eq!(conflict_response.confidence, 0.0);
}

#[tokio::test]
async fn test_override_bypasses_routing() {
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(tax_connector()), ConstantEmbedder::default());

    let decision = service
        .router()
        .route_query("current VAT rate", Some("visa_oracle"), true);
    assert_eq!(decision.primary_collection, "visa_oracle");
    assert_eq!(decision.confidence, 1.0);
    assert!(decision.fallback_collections.is_empty());

    let request = SearchRequest::new("current VAT rate", 3).with_collection_override("visa_oracle");
    let response = service.search(&request).await.unwrap();
    assert_eq!(response.collection_used, "visa_oracle");
    assert_eq!(response.results[0].id, "kitas");

    let response = service.search_with_conflict_resolution(&request).await.unwrap();
    assert_eq!(response.primary_collection, "visa_oracle");
    assert_eq!(response.collections_searched, vec!["visa_oracle"]);
    assert!(response.conflicts.is_empty());
}

#[tokio::test]
async fn test_invalid_level_fails_before_io() {
    let config = fast_config(tax_catalog());
    let connector = Arc::new(tax_connector());
    let (service, _) = service(&config, Arc::clone(&connector), ConstantEmbedder::default());

    for level in [-1, 4, 99] {
        let request = SearchRequest::new("current VAT rate", level);
        let err = service.search(&request).await.unwrap_err();
        assert!(err.is_client_error());
        let err = service
            .search_with_conflict_resolution(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_zero_limit_is_empty_not_error() {
    let config = fast_config(tax_catalog());
    let connector = Arc::new(tax_connector());
    let (service, _) = service(&config, Arc::clone(&connector), ConstantEmbedder::default());

    let request = SearchRequest::new("current VAT rate", 3).with_limit(0);
    assert!(service.search(&request).await.unwrap().results.is_empty());
    assert!(service
        .search_with_conflict_resolution(&request)
        .await
        .unwrap()
        .results
        .is_empty());
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_results_outside_tier_are_dropped_even_if_store_returns_them() {
    let connector = StubConnector::new().with_store(
        "visa_idx",
        FixedStore::new(vec![
            result("secret", 0.9, json!({"tier": "S"})),
            result("partner", 0.8, json!({"tier": "C"})),
            result("public", 0.7, json!({})),
        ]),
    );
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(connector), ConstantEmbedder::default());

    let request = SearchRequest::new("kitas visa", 1);
    let response = service.search(&request).await.unwrap();

    let ids: Vec<_> = response.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["partner", "public"]);
    assert_eq!(response.allowed_tiers, vec![Tier::C, Tier::D]);
}

#[tokio::test]
async fn test_search_collection_direct() {
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(tax_connector()), ConstantEmbedder::default());

    let direct = service
        .search_collection("anything", "tax_knowledge", 5, None)
        .await
        .unwrap();
    assert_eq!(direct.collection, "tax_knowledge");
    assert_eq!(direct.results[0].id, "vat-2022");

    let filtered = service
        .search_collection(
            "anything",
            "tax_knowledge",
            5,
            Some(SearchFilter::new().with_tiers(vec![Tier::D])),
        )
        .await
        .unwrap();
    assert!(filtered.results.is_empty());

    let unknown = service
        .search_collection("anything", "nope", 5, None)
        .await
        .unwrap();
    assert!(unknown.results.is_empty());
}

#[tokio::test]
async fn test_collection_health() {
    let connector = tax_connector().with_store("broken_idx", FailingStore);
    let mut catalog = tax_catalog();
    catalog.push(
        crate::types::CollectionInfo::new("legal_updates", "broken_idx", 1).with_doc_count(97),
    );
    catalog.push(crate::types::CollectionInfo::new("property_listings", "missing_idx", 1));
    let config = fast_config(catalog);
    let (service, _) = service(&config, Arc::new(connector), ConstantEmbedder::default());

    let healthy = service.get_collection_health("tax_updates").await.unwrap().unwrap();
    assert_eq!(healthy.status, HealthStatus::Healthy);
    assert_eq!(healthy.live_count, Some(1));
    assert_eq!(healthy.actual_name, "tax_updates_idx");

    let broken = service.get_collection_health("legal_updates").await.unwrap().unwrap();
    assert_eq!(broken.status, HealthStatus::Unreachable);
    assert_eq!(broken.doc_count, 97);

    let missing = service.get_collection_health("property_listings").await.unwrap().unwrap();
    assert_eq!(missing.status, HealthStatus::Unreachable);
    assert!(missing.live_count.is_none());

    assert!(service.get_collection_health("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_conflict_search_is_repeatable() {
    let config = fast_config(tax_catalog());
    let (service, _) = service(&config, Arc::new(tax_connector()), ConstantEmbedder::default());
    let request = SearchRequest::new("current VAT rate and visa", 3);

    let first = service.search_with_conflict_resolution(&request).await.unwrap();
    for _ in 0..3 {
        let again = service.search_with_conflict_resolution(&request).await.unwrap();
        assert_eq!(again.results, first.results);
        assert_eq!(again.conflicts, first.conflicts);
        assert_eq!(again.collections_searched, first.collections_searched);
    }
}
