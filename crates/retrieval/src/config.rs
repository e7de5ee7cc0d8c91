//! Retrieval configuration and the built-in collection catalog.

use crate::types::CollectionInfo;
use advisor_core::config::ADVISOR_DIR;
use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for routing, fan-out and the collection catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned when a caller does not pass a limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Budget for one collection call during fan-out
    #[serde(default = "default_per_collection_timeout_ms")]
    pub per_collection_timeout_ms: u64,

    /// Budget for a whole request, fan-out and fan-in included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum fallback collections added to a route
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: usize,

    /// Routes below this confidence always get fallbacks
    #[serde(default = "default_fallback_confidence_threshold")]
    pub fallback_confidence_threshold: f32,

    /// Collection catalog
    #[serde(default = "default_catalog")]
    pub collections: Vec<CollectionInfo>,
}

fn default_limit() -> usize {
    5
}

fn default_per_collection_timeout_ms() -> u64 {
    3_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_fallbacks() -> usize {
    3
}

fn default_fallback_confidence_threshold() -> f32 {
    0.5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            per_collection_timeout_ms: default_per_collection_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_fallbacks: default_max_fallbacks(),
            fallback_confidence_threshold: default_fallback_confidence_threshold(),
            collections: default_catalog(),
        }
    }
}

impl RetrievalConfig {
    pub fn per_collection_timeout(&self) -> Duration {
        Duration::from_millis(self.per_collection_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate this configuration.
    ///
    /// Checks:
    /// - both timeouts are greater than 0
    /// - the per-collection timeout fits inside the request timeout
    /// - the confidence threshold lies in 0..=1
    /// - the catalog is non-empty with unique names
    pub fn validate(&self) -> AppResult<()> {
        if self.per_collection_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.per_collection_timeout_ms > self.request_timeout_ms {
            return Err(AppError::Config(format!(
                "per_collection_timeout_ms ({}) exceeds request_timeout_ms ({})",
                self.per_collection_timeout_ms, self.request_timeout_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence_threshold) {
            return Err(AppError::Config(format!(
                "fallback_confidence_threshold must be within 0..=1, got {}",
                self.fallback_confidence_threshold
            )));
        }
        validate_catalog(&self.collections)
    }
}

/// A catalog must be non-empty and its names unique.
pub fn validate_catalog(catalog: &[CollectionInfo]) -> AppResult<()> {
    if catalog.is_empty() {
        return Err(AppError::Config(
            "at least one collection must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for info in catalog {
        if info.name.trim().is_empty() || info.actual_name.trim().is_empty() {
            return Err(AppError::Config(
                "collection name and actual_name must not be empty".to_string(),
            ));
        }
        if !seen.insert(info.name.as_str()) {
            return Err(AppError::Config(format!(
                "duplicate collection name: {}",
                info.name
            )));
        }
    }

    Ok(())
}

/// Load retrieval configuration for a workspace.
///
/// Reads `.advisor/retrieval.yaml` if it exists, otherwise uses the
/// defaults. The result is validated either way.
pub fn load_config(workspace: &Path) -> AppResult<RetrievalConfig> {
    load_config_from(&get_config_path(workspace))
}

/// Load retrieval configuration from an explicit file, falling back to the
/// defaults when it does not exist.
pub fn load_config_from(config_path: &Path) -> AppResult<RetrievalConfig> {
    let config = if config_path.exists() {
        let content = fs::read_to_string(config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: RetrievalConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!(
            "Loaded retrieval config with {} collections from {:?}",
            config.collections.len(),
            config_path
        );
        config
    } else {
        tracing::debug!("Using default retrieval config (no config file found)");
        RetrievalConfig::default()
    };

    config.validate()?;
    Ok(config)
}

/// Get the path to the retrieval config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(ADVISOR_DIR).join("retrieval.yaml")
}

/// The built-in business-services catalog.
pub fn default_catalog() -> Vec<CollectionInfo> {
    vec![
        CollectionInfo::new("visa_oracle", "visa_oracle", 9)
            .with_doc_count(1_612)
            .with_description("Immigration: visas, stay permits, sponsorship")
            .with_keywords(&[
                "visa", "kitas", "kitap", "immigration", "passport", "stay permit",
                "sponsor", "overstay", "voa", "work permit", "retirement", "b211",
            ]),
        CollectionInfo::new("kbli_eye", "kbli_unified", 8)
            .with_doc_count(8_886)
            .with_description("Business classification codes and licensing")
            .with_keywords(&[
                "kbli", "business code", "license", "licence", "nib", "oss",
                "classification", "foreign investment", "pt pma", "company setup",
            ]),
        CollectionInfo::new("tax_updates", "tax_updates", 7)
            .with_doc_count(214)
            .with_description("Recent tax regulation changes and updated rate tables")
            .with_keywords(&[
                "tax", "vat", "ppn", "pph", "rate", "current", "new", "latest",
                "2025", "regulation change", "updated",
            ]),
        CollectionInfo::new("tax_knowledge", "tax_genius", 6)
            .with_doc_count(3_901)
            .with_description("Tax law, filing obligations and treaty rules")
            .with_keywords(&[
                "tax", "vat", "ppn", "pph", "npwp", "income tax", "withholding",
                "tax return", "treaty", "deduction", "filing",
            ]),
        CollectionInfo::new("legal_updates", "legal_updates", 5)
            .with_doc_count(97)
            .with_description("Recently amended laws and regulations")
            .with_keywords(&[
                "law", "regulation", "amendment", "new law", "omnibus", "latest",
                "revised",
            ]),
        CollectionInfo::new("legal_architect", "legal_unified", 4)
            .with_doc_count(5_041)
            .with_description("Corporate, contract and land law")
            .with_keywords(&[
                "law", "legal", "contract", "notary", "deed", "court", "land",
                "hak pakai", "company law", "shareholder",
            ]),
        CollectionInfo::new("property_listings", "property_listings", 3)
            .with_doc_count(29)
            .with_description("Villa and land listings")
            .with_keywords(&[
                "villa", "property", "land", "lease", "leasehold", "freehold",
                "rent", "buy",
            ]),
        CollectionInfo::new("service_pricing", "bali_zero_pricing", 2)
            .with_doc_count(53)
            .with_description("Official service price list")
            .with_keywords(&["price", "pricing", "cost", "fee", "package", "quote"])
            .with_pricing(),
    ]
}
