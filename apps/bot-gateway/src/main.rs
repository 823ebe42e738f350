//! Bot transport gateway.
//!
//! Receives inbound platform updates reliably despite transient network
//! failures, choosing push (webhook) when a public callback URL is
//! reachable and pull (long-poll) otherwise, and dispatches each update
//! exactly where the command handlers expect it.

mod api;
mod config;
mod decode;
mod dispatch;
mod gateway;
mod http;
mod probe;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::api::HttpBotApi;
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::gateway::{DeliveryMode, Gateway};
use crate::http::{WebhookState, router};
use crate::probe::HttpProbe;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    let client = reqwest::Client::new();
    let api = Arc::new(HttpBotApi::new(
        client.clone(),
        config.api_base.clone(),
        config.bot_token.clone(),
    ));
    let dispatcher = Dispatcher::new(api.clone(), config.admin.clone());
    let probe = HttpProbe::new(client, config.probe_timeout);

    // The receiver must be listening before the reachability checks run:
    // they target this binary's own /healthz through the public URL. In
    // poll mode the server keeps answering health checks; no webhook is
    // registered, so nothing posts to /webhook.
    let state = WebhookState {
        dispatcher: Arc::new(dispatcher.clone()),
        secret: config.webhook_secret.clone(),
    };
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .context("bind gateway listener")?;
    tracing::info!(event = "gateway_listening", bind = %config.bind);
    let server = tokio::spawn(
        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .into_future(),
    );

    let mut gateway = Gateway::new(api, dispatcher, config.clone());
    gateway.establish(&probe).await?;

    match gateway.mode().clone() {
        DeliveryMode::WebhookActive(url) => {
            tracing::info!(event = "gateway_started", mode = "webhook", url = %url);
        }
        DeliveryMode::PollActive => {
            tracing::info!(event = "gateway_started", mode = "poll");
            gateway.run_poll_loop(shutdown_signal()).await;
        }
        other => {
            anyhow::bail!("gateway settled in unexpected mode {other:?}");
        }
    }

    server
        .await
        .context("join gateway listener")?
        .context("serve gateway http")?;
    tracing::info!(event = "gateway_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
    }
}
