//! Collections command handler.

use super::{catalog_service, print_json};
use advisor_core::{config::AppConfig, AppResult};
use advisor_retrieval::CollectionInfo;
use clap::Args;

/// List catalog collections
#[derive(Args, Debug)]
pub struct CollectionsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CollectionsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing collections command");

        let service = catalog_service(config)?;
        let catalog: Vec<&CollectionInfo> = service.collections().catalog().collect();

        if self.json {
            return print_json(&catalog);
        }

        println!("{} collections:", catalog.len());
        for info in catalog {
            let mut flags = Vec::new();
            if info.is_updates() {
                flags.push("updates");
            }
            if info.pricing {
                flags.push("pricing");
            }
            println!(
                "  {:<18} -> {:<18} priority {:>3}  docs {:>6}  {}",
                info.name,
                info.actual_name,
                info.priority,
                info.doc_count,
                flags.join(",")
            );
            if !info.description.is_empty() {
                println!("      {}", info.description);
            }
        }

        Ok(())
    }
}
