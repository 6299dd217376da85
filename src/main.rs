//! NutriScan
//!
//! An MCP server that turns product barcodes into nutrition reports.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutriscan::build_info;
use nutriscan::config::Config;
use nutriscan::db::{self, Database};
use nutriscan::mcp::NutriScanService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nutriscan=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Print startup banner to stderr
    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = Config::from_env();
    eprintln!("Database path: {}", config.database_path.display());
    eprintln!("Product database: {}", config.food_facts_url);
    if !config.has_vision_key() {
        tracing::warn!("ANTHROPIC_API_KEY not set; barcode photos and object counting are disabled");
    }

    // Initialize database
    eprintln!("Initializing database...");
    let database = Database::open_and_migrate(&config.database_path)?;
    let version = database.with_conn(db::migrations::get_schema_version)?;
    eprintln!("Database schema version: {}", version);

    let service = NutriScanService::new(config, database);

    // Create stdio transport
    let transport = (stdin(), stdout());

    // Start the MCP server
    let server = service.serve(transport).await?;

    // Wait for the server to complete
    server.waiting().await?;

    Ok(())
}
