//! Route command handler.

use super::{catalog_service, print_json};
use advisor_core::{config::AppConfig, AppResult};
use clap::Args;

/// Show the routing decision for a query
#[derive(Args, Debug)]
pub struct RouteCommand {
    /// Query text
    pub query: String,

    /// Force a collection instead of routing
    #[arg(long)]
    pub collection: Option<String>,

    /// Always include fallback collections
    #[arg(long)]
    pub fallbacks: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RouteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing route command");

        let service = catalog_service(config)?;
        let decision = service.router().route_query(
            &self.query,
            self.collection.as_deref(),
            self.fallbacks,
        );

        if self.json {
            return print_json(&decision);
        }

        println!("Primary:    {}", decision.primary_collection);
        if decision.fallback_collections.is_empty() {
            println!("Fallbacks:  (none)");
        } else {
            println!("Fallbacks:  {}", decision.fallback_collections.join(", "));
        }
        println!("Confidence: {:.2}", decision.confidence);
        println!("Pricing:    {}", decision.is_pricing);

        Ok(())
    }
}
