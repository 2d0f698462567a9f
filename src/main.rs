mod config;
mod models;
mod orchestrator;
mod scrapers;
mod server;
mod store;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use config::Config;
use orchestrator::ScrapeOrchestrator;
use scrapers::BrowserExtractor;
use server::AppState;
use store::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "property-scout", about = "Scrape single property listings into a local store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Scrape one listing URL and print the stored record
    Scrape { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let rules = config.site.rules.clone();
    let extractor = Arc::new(BrowserExtractor::new(config.site, config.browser));
    let orchestrator = ScrapeOrchestrator::new(store.clone(), extractor, rules);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("🏠 Property Scout API");
            server::serve(
                AppState {
                    store,
                    orchestrator,
                },
                config.port,
            )
            .await
        }
        Command::Scrape { url } => {
            info!("Scraping {}", url);
            let outcome = orchestrator.run_scrape(&url).await?;
            if !outcome.extracted {
                info!("Already scraped, showing stored record");
            }
            let property = outcome.record;

            println!("{} ({})", property.title, property.price);
            println!("   {}", property.location);
            println!("   ID: {}  Status: {}", property.id, property.status);
            if !property.image_url.is_empty() {
                println!("   Image: {}", property.image_url);
            }
            println!("   URL: {}", property.url);

            println!("{}", serde_json::to_string_pretty(&property)?);
            Ok(())
        }
    }
}
