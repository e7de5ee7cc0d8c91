//! Retrieval type definitions.

use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Substring marking a collection that carries newer data than its base collection.
pub const UPDATES_MARKER: &str = "updates";

/// Access-control label attached to documents.
///
/// `S` is the most restricted tier, `D` is public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Tier::S),
            "A" => Ok(Tier::A),
            "B" => Ok(Tier::B),
            "C" => Ok(Tier::C),
            "D" => Ok(Tier::D),
            other => Err(AppError::Validation(format!(
                "Unknown tier '{}'. Supported: S, A, B, C, D",
                other
            ))),
        }
    }
}

/// Caller access level (0-3).
///
/// Each level maps to a fixed, ordered list of allowed tiers, and every
/// level's list contains the list of the level below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessTier(u8);

impl AccessTier {
    pub const MAX_LEVEL: u8 = 3;

    /// Validate a raw user level.
    pub fn new(level: i32) -> AppResult<Self> {
        if (0..=Self::MAX_LEVEL as i32).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(AppError::Validation(format!(
                "user_level must be between 0 and {}, got {}",
                Self::MAX_LEVEL,
                level
            )))
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Tiers this level may read, most restricted first.
    pub fn allowed_tiers(&self) -> &'static [Tier] {
        match self.0 {
            0 => &[Tier::D],
            1 => &[Tier::C, Tier::D],
            2 => &[Tier::A, Tier::B, Tier::C, Tier::D],
            _ => &[Tier::S, Tier::A, Tier::B, Tier::C, Tier::D],
        }
    }

    /// Intersect a requested tier filter with the allowed tiers.
    ///
    /// Keeps the allowed-tier order. An empty intersection is a valid result.
    pub fn effective_tiers(&self, tier_filter: Option<&[Tier]>) -> Vec<Tier> {
        let allowed = self.allowed_tiers();
        match tier_filter {
            Some(requested) => allowed
                .iter()
                .copied()
                .filter(|tier| requested.contains(tier))
                .collect(),
            None => allowed.to_vec(),
        }
    }
}

/// Static metadata for one collection in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Logical key used by callers and the router
    pub name: String,

    /// Backing index identifier in the vector store
    pub actual_name: String,

    /// Routing/tie-break hint; higher is preferred
    #[serde(default)]
    pub priority: u8,

    /// Number of documents at catalog load time
    #[serde(default)]
    pub doc_count: u64,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Topic vocabulary the router scores queries against
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Collection answers pricing questions
    #[serde(default)]
    pub pricing: bool,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, actual_name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            actual_name: actual_name.into(),
            priority,
            doc_count: 0,
            description: String::new(),
            keywords: Vec::new(),
            pricing: false,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_doc_count(mut self, doc_count: u64) -> Self {
        self.doc_count = doc_count;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_pricing(mut self) -> Self {
        self.pricing = true;
        self
    }

    /// Whether this collection supersedes its base collection.
    pub fn is_updates(&self) -> bool {
        is_updates_collection(&self.name)
    }
}

pub fn is_updates_collection(name: &str) -> bool {
    name.to_ascii_lowercase().contains(UPDATES_MARKER)
}

/// Why a result lost a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Same topic, superseded by newer data
    Outdated,
    /// Same topic, differing but not superseded
    Alternate,
}

/// A single retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,

    pub text: String,

    /// Open key/value map (`topic`, `tier`, `value`, `effective_date`, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Similarity, 0-1, higher is more relevant
    pub score: f32,

    /// Origin collection (logical name)
    pub collection: String,

    /// Set on results that lost a conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            score,
            collection: String::new(),
            disposition: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Normalised topical key used for conflict grouping.
    pub fn topic(&self) -> Option<String> {
        self.metadata_str("topic")
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }

    /// Access tier of this result. Missing tier means public.
    ///
    /// Returns `None` for an unrecognised label.
    pub fn tier(&self) -> Option<Tier> {
        match self.metadata_str("tier") {
            Some(label) => label.parse().ok(),
            None => Some(Tier::D),
        }
    }

    /// Whether this result comes from newer data than its base collection.
    pub fn is_updates(&self) -> bool {
        is_updates_collection(&self.collection)
            || self
                .metadata
                .get("updated")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
    }

    pub(crate) fn set_metadata(&mut self, key: &str, value: serde_json::Value) {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }
}

/// Results keyed by origin collection, in collection name order.
pub type ResultsByCollection = BTreeMap<String, Vec<SearchResult>>;

/// Filter pushed down to the vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Only return results in these tiers
    pub tiers: Option<Vec<Tier>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = Some(tiers);
        self
    }

    pub fn allows(&self, result: &SearchResult) -> bool {
        match &self.tiers {
            Some(tiers) => result.tier().map(|t| tiers.contains(&t)).unwrap_or(false),
            None => true,
        }
    }

    /// Keep only results the filter allows.
    pub fn apply(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        results.into_iter().filter(|r| self.allows(r)).collect()
    }
}

/// Collection selection for one query. Computed fresh per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub primary_collection: String,
    pub fallback_collections: Vec<String>,
    pub confidence: f32,
    pub is_pricing: bool,
}

impl RouteDecision {
    /// Primary followed by fallbacks.
    pub fn collections(&self) -> Vec<String> {
        std::iter::once(self.primary_collection.clone())
            .chain(self.fallback_collections.iter().cloned())
            .collect()
    }
}

/// Results from different collections that disagree about one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    pub topic: String,

    /// Top-scoring result per collection, in collection name order
    pub results: Vec<SearchResult>,
}

impl ConflictCandidate {
    pub fn collections(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.collection.as_str()).collect()
    }
}

/// Rule that decided a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionRule {
    /// Updates collection beat a base collection
    Temporal,
    /// Higher score won
    Relevance,
}

/// A resolved conflict, disclosed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub topic: String,
    pub collections: Vec<String>,
    pub winner: SearchResult,
    /// Each loser carries its disposition
    pub losers: Vec<SearchResult>,
    pub rule: ResolutionRule,
}

/// Request shape accepted by `SearchService`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_level: i32,
    pub limit: usize,
    #[serde(default)]
    pub tier_filter: Option<Vec<Tier>>,
    #[serde(default)]
    pub collection_override: Option<String>,
    pub enable_fallbacks: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, user_level: i32) -> Self {
        Self {
            query: query.into(),
            user_level,
            limit: 5,
            tier_filter: None,
            collection_override: None,
            enable_fallbacks: true,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_tier_filter(mut self, tiers: Vec<Tier>) -> Self {
        self.tier_filter = Some(tiers);
        self
    }

    pub fn with_collection_override(mut self, collection: impl Into<String>) -> Self {
        self.collection_override = Some(collection.into());
        self
    }

    pub fn with_fallbacks(mut self, enable: bool) -> Self {
        self.enable_fallbacks = enable;
        self
    }
}

/// Response from a single-collection search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub user_level: u8,
    /// Tiers the caller's level may read
    pub allowed_tiers: Vec<Tier>,
    /// Allowed tiers intersected with the request's tier filter
    pub effective_tiers: Vec<Tier>,
    pub collection_used: String,
}

/// A collection excluded from a fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionFailure {
    pub collection: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Response from a conflict-aware multi-collection search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictAwareResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub user_level: u8,
    pub primary_collection: String,
    pub collections_searched: Vec<String>,
    pub collections_failed: Vec<CollectionFailure>,
    pub confidence: f32,
    pub conflicts_detected: usize,
    pub conflicts: Vec<Conflict>,
    pub fallbacks_used: bool,
}

/// Response from a direct collection search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResults {
    pub collection: String,
    pub results: Vec<SearchResult>,
}

/// Liveness of a collection's backing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unreachable,
}

/// Catalog metadata plus a liveness signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionHealth {
    pub name: String,
    pub actual_name: String,
    pub priority: u8,
    pub doc_count: u64,
    /// Documents reported by the store, when reachable
    pub live_count: Option<u64>,
    pub status: HealthStatus,
}
