//! Covenant - lease document signing for Haven Property
//!
//! "I signed and sealed the deed, and called witnesses" - Jeremiah 32:10

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use covenant::{
    config::Args,
    db::{MongoClient, MongoStore},
    ingest::{HttpConverter, IngestPipeline},
    server,
    signing::{MemoryStore, SigningConfig, SigningService, SigningStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("covenant={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Covenant - Lease Document Signing");
    info!("  \"I signed and sealed the deed\"");
    info!("======================================");
    info!("Port: {}", args.port);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Converter: {}", args.converter_url);
    info!("Token TTL: {}h", args.token_ttl_hours);
    info!("======================================");

    if args.dev_mode {
        warn!("Dev mode: documents and tokens live in memory only");
        let store = Arc::new(MemoryStore::new());
        serve(args, store).await
    } else {
        let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected successfully");
                client
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };

        let store = match MongoStore::new(mongo).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to prepare collections: {}", e);
                std::process::exit(1);
            }
        };

        serve(args, store).await
    }
}

/// Wire the services and run the HTTP server over the chosen store.
async fn serve<S: SigningStore + 'static>(args: Args, store: Arc<S>) -> anyhow::Result<()> {
    let converter = Arc::new(HttpConverter::new(
        args.converter_url.clone(),
        args.converter_timeout(),
    ));
    let ingest = Arc::new(IngestPipeline::new(converter));

    let signing = Arc::new(SigningService::new(
        SigningConfig {
            token_ttl: args.token_ttl(),
            max_write_retries: args.max_write_retries,
        },
        store,
    ));

    let state = Arc::new(server::AppState::new(args, signing, ingest));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
