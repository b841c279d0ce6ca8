//! [`MessagingClient`] implementation backed by the sidecar link.

use std::{sync::Arc, time::Duration};

use {anyhow::Result, async_trait::async_trait, tracing::warn, uuid::Uuid};

use wagate_sessions::client::{ClientFactory, MessagingClient};

use crate::{
    connection::{SharedHandle, SidecarHandle},
    types::{GatewayMessage, SidecarMessage},
};

/// Default bound on a sidecar request round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One user's handle to the sidecar.
///
/// All clients share the underlying WebSocket link; the sidecar keys
/// protocol state by user id, so each client is exclusive to its user.
pub struct SidecarClient {
    user_id: String,
    sidecar: SharedHandle,
    auth_dir: Option<String>,
    request_timeout: Duration,
}

impl SidecarClient {
    async fn handle(&self) -> Result<SidecarHandle> {
        let sidecar = self.sidecar.read().await;
        match sidecar.as_ref() {
            Some(h) => Ok(h.clone()),
            None => {
                warn!(user_id = %self.user_id, "sidecar not connected");
                Err(anyhow::anyhow!("sidecar not connected"))
            },
        }
    }
}

#[async_trait]
impl MessagingClient for SidecarClient {
    async fn initialize(&self) -> Result<()> {
        let handle = self.handle().await?;
        handle
            .send(GatewayMessage::Login {
                user_id: self.user_id.clone(),
                auth_dir: self.auth_dir.clone(),
            })
            .await
    }

    async fn resolve_chat_id(&self, number: &str) -> Result<Option<String>> {
        let handle = self.handle().await?;
        let request_id = Uuid::new_v4().to_string();

        let reply = handle
            .request(
                &request_id,
                GatewayMessage::ResolveChatId {
                    user_id: self.user_id.clone(),
                    number: number.to_string(),
                    request_id: request_id.clone(),
                },
                self.request_timeout,
            )
            .await?;

        match reply {
            SidecarMessage::ResolveResult { chat_id, .. } => Ok(chat_id),
            other => Err(anyhow::anyhow!("unexpected reply to resolve: {other:?}")),
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let handle = self.handle().await?;
        let request_id = Uuid::new_v4().to_string();

        let reply = handle
            .request(
                &request_id,
                GatewayMessage::SendText {
                    user_id: self.user_id.clone(),
                    chat_id: chat_id.to_string(),
                    text: text.to_string(),
                    request_id: request_id.clone(),
                },
                self.request_timeout,
            )
            .await?;

        match reply {
            SidecarMessage::SendResult { success: true, .. } => Ok(()),
            SidecarMessage::SendResult { error, .. } => Err(anyhow::anyhow!(
                "sidecar send failed: {}",
                error.unwrap_or_else(|| "unknown error".into())
            )),
            other => Err(anyhow::anyhow!("unexpected reply to send: {other:?}")),
        }
    }
}

/// Creates [`SidecarClient`]s over a shared (possibly pending) connection.
pub struct SidecarClientFactory {
    sidecar: SharedHandle,
    auth_base_dir: Option<String>,
    request_timeout: Duration,
}

impl SidecarClientFactory {
    pub fn new(sidecar: SharedHandle) -> Self {
        Self {
            sidecar,
            auth_base_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Base directory for per-user auth state; the sidecar persists each
    /// user's credentials under `<base>/<user_id>`.
    pub fn with_auth_base_dir(mut self, dir: impl Into<String>) -> Self {
        self.auth_base_dir = Some(dir.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn auth_dir_for(&self, user_id: &str) -> Option<String> {
        self.auth_base_dir
            .as_ref()
            .map(|base| format!("{base}/{user_id}"))
    }
}

impl ClientFactory for SidecarClientFactory {
    fn create(&self, user_id: &str) -> Arc<dyn MessagingClient> {
        Arc::new(SidecarClient {
            user_id: user_id.to_string(),
            sidecar: Arc::clone(&self.sidecar),
            auth_dir: self.auth_dir_for(user_id),
            request_timeout: self.request_timeout,
        })
    }
}
