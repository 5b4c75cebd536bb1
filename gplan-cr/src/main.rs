//! gplan-cr (Catalog Reconciliation) - admin service for the plant catalog
//!
//! Repairs subcategory assignments, merges duplicate varieties and reports
//! catalog health over HTTP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gplan_common::api::auth::load_shared_secret;
use gplan_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_LOG_LEVEL};
use gplan_cr::reconcile::rules::RuleTable;
use gplan_cr::{build_router, db, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MODULE_NAME: &str = "gplan-cr";
const DEFAULT_PORT: u16 = 5825;
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

#[derive(Debug, Parser)]
#[command(name = "gplan-cr", version, about = "Plant catalog reconciliation service")]
struct Args {
    /// Root folder holding gplan.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Classification rule table (TOML) replacing the built-in one
    #[arg(long)]
    rules_file: Option<PathBuf>,

    /// Explicit database file, overriding <root>/gplan.db
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Config is read before logging exists; its error is reported once the subscriber is up
    let loaded = TomlConfig::load(MODULE_NAME);
    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    // Build identification before any slow startup work
    info!(
        "Starting GardenPlan Catalog Reconciliation (gplan-cr) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = loaded.unwrap_or_else(|e| {
        warn!("{}; using defaults", e);
        TomlConfig::default()
    });

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to prepare root folder")?;

    let db_path = args.database.clone().unwrap_or_else(|| initializer.database_path());
    info!("Database path: {}", db_path.display());

    let pool = match db::connect(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load API shared secret")?;
    if shared_secret == 0 {
        info!("API authentication disabled (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }

    let rules_file = args.rules_file.or(config.rules_file);
    let rules = RuleTable::load(rules_file.as_deref()).context("Failed to load rule table")?;
    info!(
        prefix = rules.prefix_rules().len(),
        attribute = rules.attribute_rules().len(),
        name = rules.name_rules().len(),
        "Rule table loaded"
    );

    let mut state = AppState::new(pool, rules, shared_secret);
    if let Some(limit) = config.sample_limit {
        state = state.with_sample_limit(limit);
    }
    let app = build_router(state);

    let bind_address = config.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS);
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("{}:{}", bind_address, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("gplan-cr listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
