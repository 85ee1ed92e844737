//! Batchwise CLI - Batch lookup and sale reconciliation tools.
//!
//! # Usage
//!
//! ```bash
//! # List the batches of a product
//! bw-cli batches 42
//!
//! # Check a draft sale against the live catalog
//! bw-cli reconcile sale.yaml
//! ```
//!
//! # Commands
//!
//! - `batches` - List batches for a product
//! - `reconcile` - Replay a draft sale and report batch reconciliation per line

#![cfg_attr(not(test), forbid(unsafe_code))]

use batchwise_core::ProductId;
use batchwise_sales::SalesConfig;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bw-cli")]
#[command(author, version, about = "Batchwise CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List batches for a product
    Batches {
        /// Product ID
        product_id: ProductId,
    },
    /// Reconcile a draft sale file against the batch catalog
    Reconcile {
        /// Path to a YAML sale draft
        file: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SalesConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Config errors surface once a command needs the catalog
    let config = SalesConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "batchwise=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SalesConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Batches { product_id } => {
            commands::batches::list(config, product_id).await?;
        }
        Commands::Reconcile { file } => {
            commands::reconcile::run(config, &file).await?;
        }
    }
    Ok(())
}
