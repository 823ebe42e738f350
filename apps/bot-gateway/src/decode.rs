//! Boundary decode of raw platform updates into the closed envelope
//! union. Nothing past this module looks at raw platform JSON.

use cm_core::{UpdateEnvelope, UpdateKind};

use crate::api::RawUpdate;

pub fn decode_update(raw: RawUpdate) -> UpdateEnvelope {
    let kind = if let Some(cb) = raw.callback_query {
        match (cb.message, cb.data) {
            (Some(origin), Some(action_id)) => UpdateKind::Callback {
                chat_id: origin.chat.id.to_string(),
                action_id,
                ack_id: cb.id,
                origin_message_id: origin.message_id.to_string(),
            },
            // A callback with no origin message or payload cannot be
            // routed anywhere.
            _ => UpdateKind::Unknown,
        }
    } else if let Some(msg) = raw.message {
        match msg.text {
            Some(text) => UpdateKind::Command {
                chat_id: msg.chat.id.to_string(),
                text,
            },
            None => UpdateKind::Unknown,
        }
    } else {
        UpdateKind::Unknown
    };

    UpdateEnvelope {
        seq: raw.update_id,
        kind,
    }
}
