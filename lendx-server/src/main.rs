//! Lendx Server
//!
//! Realtime lending relayer: streams order-book snapshots, order lifecycle
//! updates and notifications to websocket clients.

mod api;
mod config;
mod consumers;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use lendx_core::broker::{Broker, NatsBroker};
use lendx_core::events::{engine_response_channel, order_message_channel};
use lendx_core::processors::{BulkAggregator, Dispatcher, LendingIntake, watch_changes};
use lendx_core::registry::SubscriptionRegistry;
use lendx_core::store::{ChangeFeed, LendingStore, PgChangeFeed, PgLendingStore};
use lendx_core::user_connections::UserConnections;
use lendx_core::utils::ticker::IntervalTicker;
use lendx_sdk::objects::ws::channels;
use server::{build_router, run_server};
use shutdown::spawn_shutdown_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Lendx - realtime lending relayer gateway
#[derive(Parser, Debug)]
#[command(name = "lendx-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./lendx-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting lendx-server v{}", env!("CARGO_PKG_VERSION"));

    let loaded_config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let broker_settings = &loaded_config.broker;
    let nats = NatsBroker::connect(&broker_settings.url, broker_settings.publish_timeout)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to NATS: {}", e);
            e
        })?;
    let broker: Arc<dyn Broker> = Arc::new(nats.clone());

    let store: Arc<dyn LendingStore> = Arc::new(PgLendingStore::new(db_pool.clone()));
    let feed: Arc<dyn ChangeFeed> = Arc::new(PgChangeFeed::new(db_pool.clone()));
    let order_books = Arc::new(SubscriptionRegistry::new(channels::LENDING_ORDER_BOOK));
    let users = Arc::new(UserConnections::new());

    let aggregator = Arc::new(BulkAggregator::new(store.clone(), order_books.clone()));
    let dispatcher = Dispatcher::new(store.clone(), users.clone(), aggregator.clone())?;
    let intake = LendingIntake::new(
        store.clone(),
        broker.clone(),
        broker_settings.subjects.orders.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_shutdown_handler(shutdown_tx.clone());

    let (response_tx, response_rx) = engine_response_channel();
    let (message_tx, message_rx) = order_message_channel();

    let response_sub = nats.subscribe(&broker_settings.subjects.responses).await?;
    let order_sub = nats.subscribe(&broker_settings.subjects.orders).await?;

    let mut handles = vec![
        tokio::spawn(dispatcher.run(response_rx, shutdown_rx.clone())),
        tokio::spawn(intake.run(message_rx, shutdown_rx.clone())),
        tokio::spawn(consumers::consume_engine_responses(
            response_sub,
            response_tx,
            shutdown_rx.clone(),
        )),
        tokio::spawn(consumers::consume_order_messages(
            order_sub,
            message_tx,
            shutdown_rx.clone(),
        )),
    ];
    handles.extend(watch_changes(
        feed,
        broker,
        &broker_settings.subjects.responses,
        aggregator,
        IntervalTicker::new(loaded_config.flush_interval),
        shutdown_rx.clone(),
    ));

    let state = AppState {
        store,
        order_books,
        users,
        client_queue_capacity: loaded_config.server.client_queue_capacity,
        shutdown: shutdown_rx.clone(),
    };
    let router = build_router(state);

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_rx).await;

    // A bind failure returns before any signal; stop the pipeline either way.
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    nats.flush().await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,async_nats=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
