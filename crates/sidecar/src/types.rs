//! Wire types for the sidecar protocol.

use serde::{Deserialize, Serialize};

/// Messages sent from Rust to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    Login {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "authDir", skip_serializing_if = "Option::is_none")]
        auth_dir: Option<String>,
    },
    SendText {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "chatId")]
        chat_id: String,
        text: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    ResolveChatId {
        #[serde(rename = "userId")]
        user_id: String,
        number: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

/// Messages received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        #[serde(rename = "userId")]
        user_id: String,
        qr: String,
    },
    Ready {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Disconnected {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    SendResult {
        #[serde(rename = "requestId")]
        request_id: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    ResolveResult {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "chatId", default)]
        chat_id: Option<String>,
    },
    Error {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
        error: String,
    },
}

impl SidecarMessage {
    /// Request id for reply messages; lifecycle messages have none.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::SendResult { request_id, .. } | Self::ResolveResult { request_id, .. } => {
                Some(request_id)
            },
            _ => None,
        }
    }
}
