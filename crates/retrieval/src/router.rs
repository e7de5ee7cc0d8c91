//! Query routing across collections.
//!
//! Maps a free-text query to a primary collection, ranked fallbacks, and a
//! confidence score. Routing never touches the vector store.

use crate::collections::CollectionManager;
use crate::config::RetrievalConfig;
use crate::types::{CollectionInfo, RouteDecision};
use std::collections::HashSet;
use std::sync::Arc;

/// Weight of a multi-word keyword found as a phrase in the query.
const PHRASE_WEIGHT: f32 = 2.0;

/// Weight of a single-word keyword matching a query token.
const TOKEN_WEIGHT: f32 = 1.0;

/// Weight of a query token that extends a keyword ("visas" for "visa").
const PREFIX_WEIGHT: f32 = 0.75;

/// Boost given to pricing collections for pricing queries.
const PRICING_BOOST: f32 = 2.0;

/// Raw score at which routing confidence saturates at 1.0.
const CONFIDENCE_SATURATION: f32 = 3.0;

const PRICING_TOKENS: &[&str] = &[
    "price", "prices", "pricing", "priced", "cost", "costs", "fee", "fees", "tariff", "tariffs",
    "quote", "quotation", "budget", "cheap", "cheapest", "expensive", "afford", "harga", "biaya",
    "tarif", "idr", "usd", "eur", "rupiah",
];

const PRICING_PHRASES: &[&str] = &[
    "how much",
    "what does it cost",
    "berapa harga",
    "berapa biaya",
    "price list",
];

/// Lowercase the query and collapse every non-alphanumeric run into one space.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `query` asks about prices or fees.
///
/// Keyword and pattern matching only: pricing words, pricing phrases,
/// currency symbols, and rupiah amounts such as `rp500000`.
pub fn is_pricing_query(query: &str) -> bool {
    if query.contains('$') || query.contains('€') {
        return true;
    }

    let normalized = normalize_query(query);
    let padded = format!(" {} ", normalized);

    if PRICING_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
    {
        return true;
    }

    normalized
        .split(' ')
        .any(|token| PRICING_TOKENS.contains(&token) || is_rupiah_amount(token))
}

fn is_rupiah_amount(token: &str) -> bool {
    token
        .strip_prefix("rp")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Score one collection's keyword vocabulary against a normalized query.
fn keyword_score(info: &CollectionInfo, padded_query: &str, tokens: &HashSet<&str>) -> f32 {
    info.keywords
        .iter()
        .map(|keyword| {
            let keyword = normalize_query(keyword);
            if keyword.is_empty() {
                0.0
            } else if keyword.contains(' ') {
                if padded_query.contains(&format!(" {} ", keyword)) {
                    PHRASE_WEIGHT
                } else {
                    0.0
                }
            } else if tokens.contains(keyword.as_str()) {
                TOKEN_WEIGHT
            } else if keyword.chars().count() >= 4
                && tokens.iter().any(|t| t.len() > keyword.len() && t.starts_with(&keyword))
            {
                PREFIX_WEIGHT
            } else {
                0.0
            }
        })
        .sum()
}

#[derive(Debug, Clone)]
struct ScoredCollection<'a> {
    name: &'a str,
    priority: u8,
    position: usize,
    score: f32,
}

/// Routes queries using the catalog held by a [`CollectionManager`].
pub struct QueryRouter {
    collections: Arc<CollectionManager>,
    max_fallbacks: usize,
    fallback_threshold: f32,
}

impl QueryRouter {
    pub fn new(collections: Arc<CollectionManager>, config: &RetrievalConfig) -> Self {
        Self {
            collections,
            max_fallbacks: config.max_fallbacks,
            fallback_threshold: config.fallback_confidence_threshold,
        }
    }

    pub fn collections(&self) -> &Arc<CollectionManager> {
        &self.collections
    }

    pub fn is_pricing_query(&self, query: &str) -> bool {
        is_pricing_query(query)
    }

    /// Choose collections for `query`.
    ///
    /// A known `collection_override` wins outright with confidence 1.0 and no
    /// fallbacks. Otherwise every collection is scored; ties go to the higher
    /// priority, then to the first-listed collection. Fallbacks are added when
    /// requested or when confidence is below the configured threshold.
    pub fn route_query(
        &self,
        query: &str,
        collection_override: Option<&str>,
        enable_fallbacks: bool,
    ) -> RouteDecision {
        let is_pricing = is_pricing_query(query);

        if let Some(name) = collection_override {
            if self.collections.contains(name) {
                tracing::debug!("Routing override to '{}'", name);
                return RouteDecision {
                    primary_collection: name.to_string(),
                    fallback_collections: Vec::new(),
                    confidence: 1.0,
                    is_pricing,
                };
            }
            tracing::warn!("Ignoring unknown collection override '{}'", name);
        }

        let ranked = self.rank(query, is_pricing);
        // The catalog is never empty, so ranked has a first element.
        let top = &ranked[0];
        let confidence = (top.score / CONFIDENCE_SATURATION).clamp(0.0, 1.0);

        let fallback_collections = if enable_fallbacks || confidence < self.fallback_threshold {
            ranked
                .iter()
                .skip(1)
                .filter(|c| c.score > 0.0 || top.score == 0.0)
                .take(self.max_fallbacks)
                .map(|c| c.name.to_string())
                .collect()
        } else {
            Vec::new()
        };

        let decision = RouteDecision {
            primary_collection: top.name.to_string(),
            fallback_collections,
            confidence,
            is_pricing,
        };

        tracing::debug!(
            "Routed query to '{}' (confidence {:.2}, fallbacks {:?}, pricing {})",
            decision.primary_collection,
            decision.confidence,
            decision.fallback_collections,
            decision.is_pricing
        );

        decision
    }

    /// All collections ordered by descending score, then priority, then catalog position.
    fn rank(&self, query: &str, is_pricing: bool) -> Vec<ScoredCollection<'_>> {
        let normalized = normalize_query(query);
        let padded = format!(" {} ", normalized);
        let tokens: HashSet<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

        let mut ranked: Vec<ScoredCollection<'_>> = self
            .collections
            .catalog()
            .enumerate()
            .map(|(position, info)| {
                let mut score = keyword_score(info, &padded, &tokens);
                if is_pricing && info.pricing {
                    score += PRICING_BOOST;
                }
                ScoredCollection {
                    name: info.name.as_str(),
                    priority: info.priority,
                    position,
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.position.cmp(&b.position))
        });

        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_catalog;
    use crate::memory_store::InMemoryConnector;

    fn router_with(catalog: Vec<CollectionInfo>) -> QueryRouter {
        let manager = CollectionManager::new(catalog, Arc::new(InMemoryConnector::new())).unwrap();
        QueryRouter::new(Arc::new(manager), &RetrievalConfig::default())
    }

    fn default_router() -> QueryRouter {
        router_with(default_catalog())
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  What's the VAT-rate?? "), "what s the vat rate");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_pricing_classifier() {
        assert!(is_pricing_query("How much is a KITAS?"));
        assert!(is_pricing_query("company setup fees"));
        assert!(is_pricing_query("Is $500 enough"));
        assert!(is_pricing_query("berapa harga visa"));
        assert!(is_pricing_query("biaya rp1500000"));
        assert!(!is_pricing_query("current VAT rate"));
        assert!(!is_pricing_query("how do I renew my visa"));
        assert!(!is_pricing_query("rpm limits"));
    }

    #[test]
    fn test_routes_visa_query() {
        let decision = default_router().route_query("How do I extend my KITAS visa?", None, false);
        assert_eq!(decision.primary_collection, "visa_oracle");
        assert!(!decision.is_pricing);
        assert!(decision.confidence > 0.5);
    }

    #[test]
    fn test_prefix_match() {
        let router = router_with(vec![
            CollectionInfo::new("visa_oracle", "v", 1).with_keywords(&["visa"]),
            CollectionInfo::new("other", "o", 1).with_keywords(&["tax"]),
        ]);
        let decision = router.route_query("visas for families", None, false);
        assert_eq!(decision.primary_collection, "visa_oracle");
    }

    #[test]
    fn test_pricing_query_prefers_pricing_collection() {
        let decision = default_router().route_query(
            "what is the price for a company package",
            None,
            false,
        );
        assert!(decision.is_pricing);
        assert_eq!(decision.primary_collection, "service_pricing");
    }

    #[test]
    fn test_override_short_circuits() {
        let decision = default_router().route_query("current VAT rate", Some("visa_oracle"), true);
        assert_eq!(decision.primary_collection, "visa_oracle");
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.fallback_collections.is_empty());
    }

    #[test]
    fn test_unknown_override_falls_through() {
        let decision =
            default_router().route_query("kbli code for cafe", Some("nonexistent"), false);
        assert_eq!(decision.primary_collection, "kbli_eye");
    }

    #[test]
    fn test_tie_prefers_priority_then_catalog_order() {
        let router = router_with(vec![
            CollectionInfo::new("first_low", "a", 1).with_keywords(&["permit"]),
            CollectionInfo::new("high", "b", 5).with_keywords(&["permit"]),
            CollectionInfo::new("second_low", "c", 1).with_keywords(&["permit"]),
        ]);
        let decision = router.route_query("permit", None, true);
        assert_eq!(decision.primary_collection, "high");
        assert_eq!(decision.fallback_collections, vec!["first_low", "second_low"]);
    }

    #[test]
    fn test_fallbacks_ranked_and_capped() {
        let decision = default_router().route_query("current VAT rate and tax law", None, true);
        assert_eq!(decision.primary_collection, "tax_updates");
        assert!(decision.fallback_collections.contains(&"tax_knowledge".to_string()));
        assert!(decision.fallback_collections.len() <= 3);
        assert!(!decision.fallback_collections.contains(&decision.primary_collection));
    }

    #[test]
    fn test_confident_route_skips_fallbacks_unless_enabled() {
        let router = default_router();
        let decision = router.route_query("KITAS visa sponsor immigration", None, false);
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.fallback_collections.is_empty());
    }

    #[test]
    fn test_low_confidence_adds_fallbacks() {
        let decision = default_router().route_query("tell me something", None, false);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.primary_collection, "visa_oracle");
        assert_eq!(decision.fallback_collections.len(), 3);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let router = default_router();
        for query in ["current VAT rate", "villa lease", "", "law law law", "how much"] {
            let first = router.route_query(query, None, true);
            for _ in 0..5 {
                assert_eq!(router.route_query(query, None, true), first);
            }
        }
    }
}
