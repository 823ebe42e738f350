//! Thin HTTP client for the bot platform API.
//!
//! No retry or state logic lives here; the gateway owns retry policy
//! and the acknowledgment token.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

/// Raw inbound update as the platform sends it. Decoded into a
/// [`cm_core::UpdateEnvelope`] exactly once, in [`crate::decode`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<RawMessage>,
    #[serde(default)]
    pub callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub message_id: i64,
    pub chat: RawChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCallbackQuery {
    pub id: String,
    #[serde(default)]
    pub message: Option<RawMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-polls for updates with sequence token greater than or equal
    /// to `offset`. Blocks up to `timeout_secs` on the platform side.
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<RawUpdate>>;
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<()>;
    async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()>;
    async fn delete_webhook(&self) -> Result<()>;
    async fn answer_callback(&self, ack_id: &str, text: Option<&str>) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpBotApi {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl HttpBotApi {
    pub fn new(client: Client, api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<T> {
        let res = self
            .client
            .post(self.url(method))
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("platform {method} request"))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("platform {method} {status}: {body}"));
        }
        let body: ApiResponse<T> = res
            .json()
            .await
            .with_context(|| format!("decode platform {method} response"))?;
        if !body.ok {
            return Err(anyhow!(
                "platform {method} failed: {}",
                body.description.unwrap_or_else(|| "unknown error".into())
            ));
        }
        body.result
            .ok_or_else(|| anyhow!("platform {method} returned no result"))
    }
}

const SHORT_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<RawUpdate>> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        // Client-side timeout must outlast the platform's long-poll hold.
        let timeout = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", payload, timeout).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = markup;
        }
        let _: Value = self.call("sendMessage", payload, SHORT_TIMEOUT).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()> {
        let mut payload = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            payload["secret_token"] = json!(secret);
        }
        let _: Value = self.call("setWebhook", payload, SHORT_TIMEOUT).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        let _: Value = self
            .call("deleteWebhook", json!({}), SHORT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, ack_id: &str, text: Option<&str>) -> Result<()> {
        let mut payload = json!({ "callback_query_id": ack_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: Value = self
            .call("answerCallbackQuery", payload, SHORT_TIMEOUT)
            .await?;
        Ok(())
    }
}
