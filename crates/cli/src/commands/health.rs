//! Health command handler.

use super::{print_json, seeded_service};
use advisor_core::{config::AppConfig, AppError, AppResult};
use clap::Args;
use std::path::PathBuf;

/// Probe one collection
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Collection name
    pub name: String,

    /// JSONL file of documents ({id, collection, text, metadata} per line)
    #[arg(long)]
    pub documents: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing health command for '{}'", self.name);

        let (_, service) = seeded_service(config, &self.documents).await?;
        let health = service
            .get_collection_health(&self.name)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown collection '{}'", self.name)))?;

        if self.json {
            return print_json(&health);
        }

        println!("Collection: {} ({})", health.name, health.actual_name);
        println!("  Status:   {:?}", health.status);
        println!("  Priority: {}", health.priority);
        println!("  Catalog docs: {}", health.doc_count);
        match health.live_count {
            Some(count) => println!("  Live docs:    {}", count),
            None => println!("  Live docs:    unavailable"),
        }

        Ok(())
    }
}
