//! Storefront Sync CLI - drive the sync client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! sfs products --category women --sort price_asc --pages 2
//! sfs products --query "brand=Acme&isOnSale=true"
//! sfs product linen-shirt
//!
//! # Sign in (password from STOREFRONT_PASSWORD)
//! sfs login --email jane@example.com
//!
//! # Account state
//! sfs cart
//! sfs orders
//! sfs like 42
//!
//! # Print live notifications until Ctrl+C
//! sfs watch --order 1001
//! ```
//!
//! State (guest likes, session, cart, notifications) is kept in
//! `STOREFRONT_STATE_PATH` between invocations.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::catalog::FilterArgs;

#[derive(Parser)]
#[command(name = "sfs")]
#[command(author, version, about = "Storefront sync client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog products
    Products {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show a product by slug
    Product {
        /// Product slug
        slug: String,
    },
    /// Show the category tree
    Categories,
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Sign out
    Logout,
    /// Show the cart
    Cart,
    /// Show the order history
    Orders,
    /// Like or unlike a product
    Like {
        /// Product ID
        product_id: String,
    },
    /// Print live notifications until interrupted
    Watch {
        /// Also follow status updates for an order
        #[arg(short, long)]
        order: Option<String>,
    },
}

/// Initialize Sentry error tracking when `SENTRY_DSN` is set.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN")
        .ok()
        .filter(|v| !v.trim().is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_sync_client=info,storefront_sync_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            sentry_guard
                .is_some()
                .then(|| sentry_tracing::layer().event_filter(sentry_event_filter)),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Products { filter, pages } => commands::catalog::products(filter, pages).await,
        Commands::Product { slug } => commands::catalog::product(&slug).await,
        Commands::Categories => commands::catalog::categories().await,
        Commands::Login { email } => commands::account::login(email).await,
        Commands::Logout => commands::account::logout().await,
        Commands::Cart => commands::account::cart().await,
        Commands::Orders => commands::account::orders().await,
        Commands::Like { product_id } => commands::account::like(product_id).await,
        Commands::Watch { order } => commands::watch::run(order).await,
    }
}
