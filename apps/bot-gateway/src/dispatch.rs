//! Interprets one decoded update and produces the outbound action.
//!
//! Stateless per update. Redelivered updates are re-dispatched verbatim:
//! the gateway layer deliberately does not deduplicate by sequence
//! token, so at-least-once delivery means a redelivered `/start` sends
//! the welcome message again. Handlers must stay idempotent in effect
//! (a repeated welcome is harmless; nothing here mutates order state).

use std::sync::Arc;

use anyhow::Result;
use cm_core::{AdminConfig, UpdateEnvelope, UpdateKind};
use serde_json::{Value, json};
use tracing::debug;

use crate::api::BotApi;

const WELCOME_TEXT: &str = "Welcome to the shop! Pick an option below.";
const HELP_TEXT: &str = "Commands:\n/start - open the shop menu\n/help - this message\n\
                         Use the menu buttons to browse the catalog and manage your cart.";
const UNKNOWN_TEXT: &str = "I did not understand that. Send /help for the list of commands.";

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn BotApi>,
    admin: AdminConfig,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BotApi>, admin: AdminConfig) -> Self {
        Self { api, admin }
    }

    /// Handles one update. An error here means the update is not yet
    /// acknowledged and may be redelivered by the platform.
    pub async fn dispatch(&self, update: &UpdateEnvelope) -> Result<()> {
        match &update.kind {
            UpdateKind::Command { chat_id, text } => {
                self.dispatch_command(chat_id, text.trim()).await
            }
            UpdateKind::Callback {
                chat_id,
                action_id,
                ack_id,
                ..
            } => self.dispatch_callback(chat_id, action_id, ack_id).await,
            UpdateKind::Unknown => {
                debug!(seq = update.seq, "ignoring unhandled update kind");
                Ok(())
            }
        }
    }

    async fn dispatch_command(&self, chat_id: &str, text: &str) -> Result<()> {
        match text.split_whitespace().next() {
            Some("/start") => {
                let menu = self.menu_markup(chat_id);
                self.api
                    .send_message(chat_id, WELCOME_TEXT, Some(menu))
                    .await
            }
            Some("/help") => self.api.send_message(chat_id, HELP_TEXT, None).await,
            _ => self.api.send_message(chat_id, UNKNOWN_TEXT, None).await,
        }
    }

    async fn dispatch_callback(&self, chat_id: &str, action_id: &str, ack_id: &str) -> Result<()> {
        // Acknowledge first so the client's button spinner stops even if
        // the follow-up send fails and the update is redelivered.
        self.api.answer_callback(ack_id, None).await?;
        if action_id == "menu:help" {
            self.api.send_message(chat_id, HELP_TEXT, None).await?;
        }
        Ok(())
    }

    /// The admin row is appended only for allow-listed chats. Pure
    /// predicate; no gateway state is touched.
    fn menu_markup(&self, chat_id: &str) -> Value {
        let mut rows = vec![
            vec![json!({"text": "Catalog", "callback_data": "menu:catalog"})],
            vec![json!({"text": "Cart", "callback_data": "menu:cart"})],
            vec![json!({"text": "Help", "callback_data": "menu:help"})],
        ];
        if self.admin.is_admin_chat(chat_id) {
            rows.push(vec![
                json!({"text": "Orders (admin)", "callback_data": "menu:admin_orders"}),
            ]);
        }
        json!({ "inline_keyboard": rows })
    }
}
