use serde::{Deserialize, Serialize};

/// One decoded inbound event from the messaging platform.
///
/// Raw platform JSON is decoded into this closed union exactly once, at
/// the gateway boundary; nothing downstream inspects raw maps. `seq` is
/// the platform-issued sequence token used for at-least-once, in-order
/// acknowledgment: the gateway advances its ack token to `seq` only
/// after the update has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    pub seq: i64,
    #[serde(flatten)]
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateKind {
    /// A slash command or plain text message.
    Command { chat_id: String, text: String },
    /// A button tap on a previously sent message.
    Callback {
        chat_id: String,
        /// Opaque action payload attached to the button.
        action_id: String,
        /// Platform handle used to acknowledge the callback.
        ack_id: String,
        origin_message_id: String,
    },
    /// Anything the gateway does not handle (edits, joins, media).
    Unknown,
}

impl UpdateEnvelope {
    /// Chat scope of the update, if it has one. Used for logging and the
    /// admin predicate.
    pub fn chat_id(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Command { chat_id, .. } | UpdateKind::Callback { chat_id, .. } => {
                Some(chat_id)
            }
            UpdateKind::Unknown => None,
        }
    }
}
