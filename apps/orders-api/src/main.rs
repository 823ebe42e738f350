//! Orders service: authoritative checkout and status lifecycle behind a
//! small HTTP surface.

mod catalog;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use cm_core::AdminConfig;
use cm_orders::{OrderManager, SqliteOrderStore};
use tracing_subscriber::EnvFilter;

use crate::catalog::{FileAddressBook, FileCatalog};
use crate::http::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_path = std::env::var("ORDERS_DB").unwrap_or_else(|_| "orders.db".into());
    let catalog_path = std::env::var("CATALOG_FILE").context("CATALOG_FILE is required")?;
    let addresses = match std::env::var("ADDRESS_BOOK_FILE") {
        Ok(path) => FileAddressBook::load(path)?,
        Err(_) => FileAddressBook::empty(),
    };

    let store = SqliteOrderStore::open(&db_path)
        .with_context(|| format!("open orders database {db_path}"))?;
    let catalog = FileCatalog::load(&catalog_path)?;
    let manager = Arc::new(OrderManager::new(Arc::new(catalog), Arc::new(store)));

    let state = AppState {
        manager,
        addresses: Arc::new(addresses),
        admin: AdminConfig::from_env(),
    };

    let bind: std::net::SocketAddr = std::env::var("BIND")
        .unwrap_or_else(|_| "0.0.0.0:8081".into())
        .parse()
        .context("parse BIND address")?;
    tracing::info!(event = "orders_api_started", bind = %bind, db = %db_path);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context("bind orders listener")?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve orders api")?;

    tracing::info!(event = "orders_api_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
    }
}
