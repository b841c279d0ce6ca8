//! WebSocket connection management and request/reply correlation.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    futures::{SinkExt, StreamExt},
    tokio::sync::{Mutex, RwLock, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, error, info, warn},
};

use crate::types::{GatewayMessage, SidecarMessage};

/// Default sidecar WebSocket port.
pub const DEFAULT_SIDECAR_PORT: u16 = 9876;

/// Outstanding request/reply waiters, keyed by request id.
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<SidecarMessage>>>>;

/// The sidecar link as seen by the rest of the process. `None` until the
/// first successful connect, and again after a connection loss.
pub type SharedHandle = Arc<RwLock<Option<SidecarHandle>>>;

/// Handle for communicating with the sidecar.
#[derive(Clone)]
pub struct SidecarHandle {
    tx: mpsc::Sender<GatewayMessage>,
    pending: PendingMap,
}

impl SidecarHandle {
    /// Send a fire-and-forget message to the sidecar.
    pub async fn send(&self, msg: GatewayMessage) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .context("failed to send message to sidecar")
    }

    /// Send a message and wait (bounded) for the reply carrying `request_id`.
    pub async fn request(
        &self,
        request_id: &str,
        msg: GatewayMessage,
        timeout: Duration,
    ) -> Result<SidecarMessage> {
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(request_id.to_string(), reply_tx);
        }

        if let Err(e) = self.send(msg).await {
            self.pending.lock().await.remove(request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                // Sender dropped: the connection died with the request in flight.
                anyhow::bail!("sidecar connection lost while awaiting reply")
            },
            Err(_) => {
                self.pending.lock().await.remove(request_id);
                anyhow::bail!("sidecar did not reply within {timeout:?}")
            },
        }
    }
}

/// Callback for lifecycle messages from the sidecar.
pub type MessageCallback = Arc<dyn Fn(SidecarMessage) + Send + Sync>;

/// Connect to the sidecar and spawn reader/writer tasks.
///
/// Reply messages complete their pending waiter; everything else goes to
/// `on_message`. The returned receiver fires once when the connection dies.
pub async fn connect_to_sidecar(
    port: u16,
    on_message: MessageCallback,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let url = format!("ws://127.0.0.1:{port}");
    info!(url = %url, "connecting to sidecar");

    let (ws_stream, _) = connect_async(&url)
        .await
        .context("failed to connect to sidecar")?;

    info!("connected to sidecar");

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<GatewayMessage>(32);
    let (disconnect_tx, disconnect_rx) = oneshot::channel();

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let pending_reader = Arc::clone(&pending);

    // Reader task: correlate replies, forward lifecycle messages.
    tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<SidecarMessage>(&text) {
                    Ok(msg) => {
                        if let Some(request_id) = msg.request_id() {
                            let waiter = pending_reader.lock().await.remove(request_id);
                            match waiter {
                                Some(reply_tx) => {
                                    let _ = reply_tx.send(msg);
                                },
                                None => {
                                    debug!(request_id, "reply with no waiter (likely timed out)");
                                },
                            }
                        } else {
                            on_message(msg);
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, text = %text, "failed to parse sidecar message");
                    },
                },
                Ok(Message::Close(_)) => {
                    info!("sidecar connection closed");
                    break;
                },
                Ok(_) => {}, // Ignore ping/pong/binary
                Err(e) => {
                    error!(error = %e, "WebSocket read error");
                    break;
                },
            }
        }

        // Dropping the waiters wakes every in-flight request with an error.
        pending_reader.lock().await.clear();
        let _ = disconnect_tx.send(());
    });

    // Writer task.
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        error!(error = %e, "failed to send message to sidecar");
                        break;
                    }
                    debug!(?msg, "sent message to sidecar");
                },
                Err(e) => {
                    error!(error = %e, "failed to serialize message");
                },
            }
        }
    });

    Ok((SidecarHandle { tx, pending }, disconnect_rx))
}

/// Try to connect to the sidecar with retries.
pub async fn connect_with_retry(
    port: u16,
    on_message: MessageCallback,
    max_retries: u32,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let mut attempt = 0;
    loop {
        match connect_to_sidecar(port, Arc::clone(&on_message)).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(e);
                }
                warn!(
                    attempt,
                    max_retries,
                    error = %e,
                    "failed to connect to sidecar, retrying..."
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Handle wired to an in-memory channel instead of a socket.
    fn test_handle() -> (SidecarHandle, mpsc::Receiver<GatewayMessage>, PendingMap) {
        let (tx, rx) = mpsc::channel(8);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        (
            SidecarHandle {
                tx,
                pending: Arc::clone(&pending),
            },
            rx,
            pending,
        )
    }

    #[tokio::test]
    async fn request_completes_when_reply_arrives() {
        let (handle, mut rx, pending) = test_handle();

        let request = tokio::spawn({
            let handle = handle.clone();
            async move {
                handle
                    .request(
                        "r1",
                        GatewayMessage::SendText {
                            user_id: "alice".into(),
                            chat_id: "1@c.us".into(),
                            text: "hi".into(),
                            request_id: "r1".into(),
                        },
                        Duration::from_secs(5),
                    )
                    .await
            }
        });

        // The outbound message reaches the writer side.
        let sent = rx.recv().await.unwrap();
        assert!(matches!(sent, GatewayMessage::SendText { .. }));

        // Simulate the reader delivering the correlated reply.
        let waiter = pending.lock().await.remove("r1").unwrap();
        waiter
            .send(SidecarMessage::SendResult {
                request_id: "r1".into(),
                success: true,
                error: None,
            })
            .unwrap();

        let reply = request.await.unwrap().unwrap();
        assert!(matches!(reply, SidecarMessage::SendResult {
            success: true,
            ..
        }));
    }

    #[tokio::test]
    async fn request_times_out_and_cleans_up() {
        let (handle, _rx, pending) = test_handle();

        let err = handle
            .request(
                "r2",
                GatewayMessage::ResolveChatId {
                    user_id: "alice".into(),
                    number: "919876543210".into(),
                    request_id: "r2".into(),
                },
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not reply"));
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn dropped_waiter_reports_connection_loss() {
        let (handle, _rx, pending) = test_handle();

        let request = tokio::spawn({
            let handle = handle.clone();
            async move {
                handle
                    .request(
                        "r3",
                        GatewayMessage::Login {
                            user_id: "alice".into(),
                            auth_dir: None,
                        },
                        Duration::from_secs(5),
                    )
                    .await
            }
        });

        // Wait for the waiter to register, then drop it as the reader task
        // does when the connection dies.
        loop {
            if pending.lock().await.remove("r3").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = request.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection lost"));
    }
}
