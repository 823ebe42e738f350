//! Delivery-mode selection and the receive loop.
//!
//! The gateway guarantees at-least-once, in-order dispatch of inbound
//! updates. Mode is chosen once at startup: webhook when a public
//! callback URL is reachable, long-poll otherwise. Transient errors are
//! retried forever inside the active mode and never cause mode
//! flapping; only the shutdown signal stops the loop.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::BotApi;
use crate::config::GatewayConfig;
use crate::decode::decode_update;
use crate::dispatch::Dispatcher;
use crate::probe::{ReachabilityProbe, resolve_public_base};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Unconfigured,
    Probing,
    /// Platform pushes updates to the contained public URL.
    WebhookActive(String),
    /// Gateway pulls updates with long-poll requests.
    PollActive,
    Stopped,
}

pub struct Gateway {
    api: Arc<dyn BotApi>,
    dispatcher: Dispatcher,
    config: GatewayConfig,
    mode: DeliveryMode,
    /// Sequence token of the last fully dispatched update. Advances
    /// only after dispatch completes; a crash in between redelivers.
    last_ack: i64,
}

impl Gateway {
    pub fn new(api: Arc<dyn BotApi>, dispatcher: Dispatcher, config: GatewayConfig) -> Self {
        Self {
            api,
            dispatcher,
            config,
            mode: DeliveryMode::Unconfigured,
            last_ack: 0,
        }
    }

    pub fn mode(&self) -> &DeliveryMode {
        &self.mode
    }

    pub fn last_ack(&self) -> i64 {
        self.last_ack
    }

    /// Probes the webhook candidates and settles the delivery mode.
    ///
    /// First reachable candidate wins and is registered with the
    /// platform. An exhausted candidate list deregisters any stale
    /// webhook (the platform refuses long-poll while one is set) and
    /// falls back to polling.
    pub async fn establish(&mut self, probe: &dyn ReachabilityProbe) -> Result<()> {
        self.mode = DeliveryMode::Probing;
        let resolved = resolve_public_base(
            &self.config.webhook_candidates,
            probe,
            self.config.probe_attempts,
            self.config.probe_backoff,
        )
        .await;

        match resolved {
            Some(base) => {
                let url = format!("{base}/webhook");
                self.api
                    .set_webhook(&url, self.config.webhook_secret.as_deref())
                    .await?;
                info!(event = "delivery_mode", mode = "webhook", url = %url);
                self.mode = DeliveryMode::WebhookActive(url);
            }
            None => {
                self.api.delete_webhook().await?;
                info!(event = "delivery_mode", mode = "poll");
                self.mode = DeliveryMode::PollActive;
            }
        }
        Ok(())
    }

    /// One long-poll iteration. Returns the number of updates fully
    /// dispatched. A transport error leaves `last_ack` untouched so the
    /// same updates are requested again; a dispatch failure stops the
    /// batch at the failed update for the same reason.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .api
            .get_updates(self.last_ack + 1, self.config.poll_timeout_secs)
            .await?;

        let mut dispatched = 0;
        for raw in updates {
            let envelope = decode_update(raw);
            let seq = envelope.seq;
            match self.dispatcher.dispatch(&envelope).await {
                Ok(()) => {
                    self.last_ack = seq;
                    dispatched += 1;
                }
                Err(err) => {
                    warn!(
                        event = "dispatch_failed",
                        seq,
                        chat_id = envelope.chat_id().unwrap_or("-"),
                        error = %err,
                        "update left unacknowledged for redelivery"
                    );
                    break;
                }
            }
        }
        Ok(dispatched)
    }

    /// Runs the continuous pull loop until `shutdown` resolves.
    pub async fn run_poll_loop(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.poll_once() => {
                    if let Err(err) = result {
                        warn!(
                            event = "poll_failed",
                            last_ack = self.last_ack,
                            error = %err,
                            "transient poll failure; retrying"
                        );
                        sleep(self.config.poll_retry_delay).await;
                    }
                }
            }
        }
        self.mode = DeliveryMode::Stopped;
        info!(event = "delivery_mode", mode = "stopped");
    }
}
