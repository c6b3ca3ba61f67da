use clap::Parser;
use page_gate::{
    api::ApiServer,
    config::{ensure_default_config, LoggingConfig},
    content::{ContentResolver, FsContentResolver},
    storage::{StorageFactory, StorageKind},
    validator::{AuditMode, TokenValidator},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "page_gate.toml")]
    config: String,

    /// Storage type: memory, sql
    #[arg(short, long)]
    storage_type: Option<StorageKind>,

    /// Bind address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration, writing defaults on first run
    let mut config = ensure_default_config(&args.config)?;
    if let Some(kind) = args.storage_type {
        config.storage.kind = kind;
    }
    if let Some(bind) = args.bind {
        config.api.bind_address = bind;
    }

    init_tracing(&config.logging);
    info!("Loaded configuration from {}", args.config);

    let store = StorageFactory::new(config.storage.database_path.clone())
        .create(config.storage.kind)?;
    info!("Using {} token store", config.storage.kind);

    let audit_mode = if config.storage.detach_audit {
        AuditMode::Detached
    } else {
        AuditMode::Inline
    };
    let validator = TokenValidator::new(store)
        .with_timeout(config.storage.timeout())
        .with_audit_mode(audit_mode);

    let content = FsContentResolver::new(config.content.directories.clone());
    match content.available_pages().await {
        Ok(pages) if pages.is_empty() => warn!("No protected pages found in content directories"),
        Ok(pages) => info!("Serving {} protected pages: {}", pages.len(), pages.join(", ")),
        Err(e) => warn!("Could not list protected pages: {}", e),
    }

    let api_server = ApiServer::new(validator, Arc::new(content), config.api.bind_address.clone());
    api_server.start().await?;

    Ok(())
}
