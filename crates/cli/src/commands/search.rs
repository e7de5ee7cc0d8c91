//! Search command handler.

use super::{print_json, seeded_service};
use advisor_core::{config::AppConfig, AppResult};
use advisor_retrieval::{parse_tier_filter, SearchRequest, SearchResult};
use clap::Args;
use std::path::PathBuf;

/// Search a local document set
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// JSONL file of documents ({id, collection, text, metadata} per line)
    #[arg(long)]
    pub documents: PathBuf,

    /// Caller access level (0-3)
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub level: i32,

    /// Maximum results (default from retrieval config)
    #[arg(short = 'k', long)]
    pub limit: Option<usize>,

    /// Restrict to these tiers (repeatable)
    #[arg(long)]
    pub tier: Vec<String>,

    /// Force a collection instead of routing
    #[arg(long)]
    pub collection: Option<String>,

    /// Search primary and fallbacks, resolving conflicts
    #[arg(long)]
    pub conflicts: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let (retrieval, service) = seeded_service(config, &self.documents).await?;

        let mut request = SearchRequest::new(&self.query, self.level)
            .with_limit(self.limit.unwrap_or(retrieval.default_limit));
        if !self.tier.is_empty() {
            request = request.with_tier_filter(parse_tier_filter(self.tier.as_slice())?);
        }
        if let Some(collection) = &self.collection {
            request = request.with_collection_override(collection);
        }

        if self.conflicts {
            let response = service.search_with_conflict_resolution(&request).await?;
            if self.json {
                return print_json(&response);
            }

            println!(
                "Primary: {}  searched: {}  confidence: {:.2}",
                response.primary_collection,
                response.collections_searched.join(", "),
                response.confidence
            );
            for failure in &response.collections_failed {
                println!("  ! {} failed: {}", failure.collection, failure.reason);
            }
            print_results(&response.results);
            for conflict in &response.conflicts {
                println!(
                    "Conflict on '{}': {} wins ({:?})",
                    conflict.topic, conflict.winner.collection, conflict.rule
                );
                for loser in &conflict.losers {
                    println!("    {} [{}] {:?}", loser.collection, loser.id, loser.disposition);
                }
            }
        } else {
            let response = service.search(&request).await?;
            if self.json {
                return print_json(&response);
            }

            println!(
                "Collection: {}  tiers: {:?}",
                response.collection_used, response.effective_tiers
            );
            print_results(&response.results);
        }

        Ok(())
    }
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>2}. [{:.3}] {} / {}",
            rank + 1,
            result.score,
            result.collection,
            result.id
        );
        println!("    {}", result.text);
    }
}
