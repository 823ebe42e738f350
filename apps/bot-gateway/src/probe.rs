//! Webhook candidate probing.
//!
//! Each candidate public base URL is verified with a bounded HTTP
//! reachability check before the platform is pointed at it: up to
//! `attempts` tries per candidate, a hard timeout per try, and linearly
//! increasing backoff between tries.

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Succeeds iff the candidate base URL answers over public HTTP.
    async fn check(&self, base_url: &str) -> Result<()>;
}

pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self, base_url: &str) -> Result<()> {
        let url = format!("{}/healthz", base_url.trim_end_matches('/'));
        let res = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| anyhow!("probe {url}: {err}"))?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("probe {url}: status {}", res.status()))
        }
    }
}

/// Walks `candidates` in order and returns the first base URL that
/// passes its reachability check, or `None` when the whole list is
/// exhausted (the caller then falls back to long-polling).
pub async fn resolve_public_base(
    candidates: &[String],
    probe: &dyn ReachabilityProbe,
    attempts: u32,
    backoff: Duration,
) -> Option<String> {
    for candidate in candidates {
        for attempt in 1..=attempts {
            match probe.check(candidate).await {
                Ok(()) => {
                    info!(
                        event = "webhook_probe",
                        candidate = %candidate,
                        attempt,
                        "candidate reachable"
                    );
                    return Some(candidate.clone());
                }
                Err(err) => {
                    debug!(
                        event = "webhook_probe",
                        candidate = %candidate,
                        attempt,
                        error = %err,
                        "probe attempt failed"
                    );
                    if attempt < attempts {
                        // Linear backoff: 1x, 2x, 3x the base delay.
                        sleep(backoff * attempt).await;
                    }
                }
            }
        }
        warn!(
            event = "webhook_probe",
            candidate = %candidate,
            attempts,
            "candidate unreachable; trying next"
        );
    }
    None
}
