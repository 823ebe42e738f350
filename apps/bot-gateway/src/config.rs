//! Gateway configuration, read from the environment once at startup.
//! There is no hot reload; a missing platform credential aborts startup.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use cm_core::AdminConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bot_token: String,
    pub api_base: String,
    pub bind: SocketAddr,
    /// Shared secret echoed back by the platform on webhook posts.
    pub webhook_secret: Option<String>,
    /// Ordered public base URL candidates for webhook registration.
    pub webhook_candidates: Vec<String>,
    pub admin: AdminConfig,
    /// Platform-side hold time for one long-poll request.
    pub poll_timeout_secs: u64,
    /// Fixed delay after a transient long-poll failure.
    pub poll_retry_delay: Duration,
    pub probe_attempts: u32,
    pub probe_backoff: Duration,
    pub probe_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("BOT_TOKEN").context("BOT_TOKEN is required")?;
        let api_base = std::env::var("PLATFORM_API_BASE")
            .unwrap_or_else(|_| "https://api.telegram.org".into());
        let bind = std::env::var("BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".into())
            .parse()
            .context("parse BIND address")?;
        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self {
            bot_token,
            api_base,
            bind,
            webhook_secret,
            webhook_candidates: candidate_urls(),
            admin: AdminConfig::from_env(),
            poll_timeout_secs: env_u64("POLL_TIMEOUT_SECS", 25),
            poll_retry_delay: Duration::from_millis(env_u64("POLL_RETRY_DELAY_MS", 3_000)),
            probe_attempts: env_u64("PROBE_ATTEMPTS", 3) as u32,
            probe_backoff: Duration::from_millis(env_u64("PROBE_BACKOFF_MS", 500)),
            probe_timeout: Duration::from_secs(env_u64("PROBE_TIMEOUT_SECS", 5)),
        })
    }
}

/// Candidate sources in priority order: explicit configuration, then
/// the environment-provided hostname, then the deployment hostname.
fn candidate_urls() -> Vec<String> {
    let mut candidates = Vec::new();
    if let Ok(url) = std::env::var("PUBLIC_URL") {
        if !url.trim().is_empty() {
            candidates.push(url.trim_end_matches('/').to_string());
        }
    }
    for var in ["EXTERNAL_HOSTNAME", "DEPLOY_HOSTNAME"] {
        if let Ok(host) = std::env::var(var) {
            let host = host.trim();
            if !host.is_empty() {
                candidates.push(format!("https://{host}"));
            }
        }
    }
    candidates
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_env() {
        for var in [
            "BOT_TOKEN",
            "PLATFORM_API_BASE",
            "BIND",
            "WEBHOOK_SECRET",
            "PUBLIC_URL",
            "EXTERNAL_HOSTNAME",
            "DEPLOY_HOSTNAME",
            "POLL_TIMEOUT_SECS",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn missing_bot_token_is_fatal() {
        let _guard = env_lock().lock().unwrap();
        clear_env();
        let err = GatewayConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn defaults_are_applied() {
        let _guard = env_lock().lock().unwrap();
        clear_env();
        unsafe { std::env::set_var("BOT_TOKEN", "123:abc") };
        let cfg = GatewayConfig::from_env().unwrap();
        assert_eq!(cfg.api_base, "https://api.telegram.org");
        assert_eq!(cfg.poll_timeout_secs, 25);
        assert_eq!(cfg.probe_attempts, 3);
        assert!(cfg.webhook_candidates.is_empty());
        clear_env();
    }

    #[test]
    fn candidates_keep_priority_order() {
        let _guard = env_lock().lock().unwrap();
        clear_env();
        unsafe {
            std::env::set_var("BOT_TOKEN", "123:abc");
            std::env::set_var("PUBLIC_URL", "https://explicit.example/");
            std::env::set_var("EXTERNAL_HOSTNAME", "env.example");
            std::env::set_var("DEPLOY_HOSTNAME", "deploy.example");
        }
        let cfg = GatewayConfig::from_env().unwrap();
        assert_eq!(
            cfg.webhook_candidates,
            vec![
                "https://explicit.example",
                "https://env.example",
                "https://deploy.example",
            ]
        );
        clear_env();
    }
}
