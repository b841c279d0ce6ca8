//! Session registry: the single source of truth for tenant sessions.

use std::{collections::HashMap, sync::Arc};

use {
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

use wagate_common::{Error, phone};

use crate::{
    client::{ClientFactory, MessagingClient, QrRenderer},
    state::{LifecycleEvent, SessionState},
};

/// Default chat-id domain for direct messages.
const DEFAULT_CHAT_SUFFIX: &str = "@c.us";

/// Answer to a QR status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrStatus {
    /// Session is authenticated.
    Connected,
    /// Session is waiting for the sidecar to emit a QR code.
    Waiting,
    /// A QR code is available for scanning.
    Qr(String),
}

struct SessionEntry {
    state: SessionState,
    client: Arc<dyn MessagingClient>,
}

/// Maps user ids to sessions and owns all state mutation.
///
/// The map lock is held only for lookups and state transitions; sidecar
/// I/O always happens on a cloned client handle outside the lock, so an
/// in-flight send for one user never blocks operations on another.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    factory: Arc<dyn ClientFactory>,
    renderer: Arc<dyn QrRenderer>,
    country_code: String,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        renderer: Arc<dyn QrRenderer>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            renderer,
            country_code: country_code.into(),
        }
    }

    /// Create and initialize a session for `user_id`.
    ///
    /// Idempotent: a second call for a live session is a no-op. The client
    /// is bound synchronously (so the one-client-per-user invariant holds
    /// from the moment the key exists) and initialization runs on a spawned
    /// task; its outcome surfaces later as lifecycle events.
    pub async fn start_session(&self, user_id: &str) {
        let client = {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(user_id) {
                debug!(user_id, "session already started");
                return;
            }
            // Created under the lock so a racing start cannot bind a second
            // client to the same user.
            let client = self.factory.create(user_id);
            sessions.insert(user_id.to_string(), SessionEntry {
                state: SessionState::default(),
                client: Arc::clone(&client),
            });
            client
        };

        info!(user_id, "starting session");
        let owner = user_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = client.initialize().await {
                warn!(user_id = %owner, error = %e, "client initialization failed");
            }
        });
    }

    /// QR status for an already-started session.
    ///
    /// Never-started users fail with `UnknownUser` rather than reporting
    /// `waiting`, so typos don't masquerade as cold sessions.
    pub async fn qr_status(&self, user_id: &str) -> Result<QrStatus, Error> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(user_id)
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;

        Ok(match &entry.state {
            SessionState::Ready => QrStatus::Connected,
            SessionState::AwaitingQr { qr: Some(payload) } => QrStatus::Qr(payload.clone()),
            SessionState::AwaitingQr { qr: None } | SessionState::Disconnected => QrStatus::Waiting,
        })
    }

    /// Whether `user_id` has a session that can send right now.
    pub async fn is_ready(&self, user_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.get(user_id).is_some_and(|e| e.state.is_ready())
    }

    /// Send a text message through `user_id`'s session.
    ///
    /// Readiness is checked before the inputs, so a not-connected session
    /// reports `NotConnected` even for garbage recipients. All validation
    /// happens before the sidecar is touched.
    pub async fn send(&self, user_id: &str, number: &str, message: &str) -> Result<(), Error> {
        let client = {
            let sessions = self.sessions.read().await;
            match sessions.get(user_id) {
                Some(entry) if entry.state.is_ready() => Arc::clone(&entry.client),
                _ => return Err(Error::NotConnected(user_id.to_string())),
            }
        };

        if message.trim().is_empty() {
            return Err(Error::InvalidInput("message"));
        }

        let digits = phone::normalize(number, &self.country_code)?;

        // Resolution is best-effort: a failed or empty lookup falls back to
        // the default chat id and never aborts the send.
        let chat_id = match client.resolve_chat_id(&digits).await {
            Ok(Some(id)) => id,
            Ok(None) => format!("{digits}{DEFAULT_CHAT_SUFFIX}"),
            Err(e) => {
                debug!(user_id, error = %e, "chat id resolution failed, using default");
                format!("{digits}{DEFAULT_CHAT_SUFFIX}")
            },
        };

        debug!(user_id, chat_id, "sending message");
        client
            .send_message(&chat_id, message)
            .await
            .map_err(Error::SendFailed)
    }

    /// Store a freshly rendered QR payload for `user_id`.
    ///
    /// Render failures are logged and leave the session state untouched.
    pub async fn handle_qr(&self, user_id: &str, raw_qr: &str) {
        let payload = match self.renderer.to_image_data(raw_qr) {
            Ok(p) => p,
            Err(e) => {
                warn!(user_id, error = %e, "failed to render QR code");
                return;
            },
        };
        debug!(user_id, "received QR code");
        self.apply_event(user_id, LifecycleEvent::Qr(payload)).await;
    }

    pub async fn handle_ready(&self, user_id: &str) {
        info!(user_id, "session connected");
        self.apply_event(user_id, LifecycleEvent::Ready).await;
    }

    pub async fn handle_disconnected(&self, user_id: &str) {
        warn!(user_id, "session disconnected");
        self.apply_event(user_id, LifecycleEvent::Disconnected).await;
    }

    async fn apply_event(&self, user_id: &str, event: LifecycleEvent) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(user_id) {
            Some(entry) => entry.state.apply(event),
            None => warn!(user_id, "lifecycle event for unknown session"),
        }
    }

    /// All user ids with a live session.
    pub async fn user_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions.keys().cloned().collect()
    }

    /// Re-request initialization for every live session.
    ///
    /// Used after the sidecar link is re-established: existing sessions keep
    /// their client handles and walk the QR/ready cycle again from whatever
    /// auth material the sidecar has persisted.
    pub async fn reinitialize_all(&self) {
        let clients: Vec<(String, Arc<dyn MessagingClient>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(id, e)| (id.clone(), Arc::clone(&e.client)))
                .collect()
        };

        for (user_id, client) in clients {
            if let Err(e) = client.initialize().await {
                warn!(user_id, error = %e, "re-initialization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use {anyhow::Result, async_trait::async_trait, tokio::sync::Mutex};

    use super::*;

    #[derive(Default)]
    struct MockClient {
        init_calls: AtomicUsize,
        send_calls: AtomicUsize,
        sent: Mutex<Vec<(String, String)>>,
        resolve_to: Option<String>,
        resolve_fails: bool,
        send_fails: bool,
    }

    #[async_trait]
    impl MessagingClient for MockClient {
        async fn initialize(&self) -> Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn resolve_chat_id(&self, _number: &str) -> Result<Option<String>> {
            if self.resolve_fails {
                anyhow::bail!("resolution unavailable");
            }
            Ok(self.resolve_to.clone())
        }

        async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if self.send_fails {
                anyhow::bail!("sidecar rejected send");
            }
            self.sent
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct MockFactory {
        client: Arc<MockClient>,
        created: AtomicUsize,
    }

    impl MockFactory {
        fn new(client: MockClient) -> Self {
            Self {
                client: Arc::new(client),
                created: AtomicUsize::new(0),
            }
        }
    }

    impl ClientFactory for MockFactory {
        fn create(&self, _user_id: &str) -> Arc<dyn MessagingClient> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Arc::clone(&self.client) as Arc<dyn MessagingClient>
        }
    }

    struct PassthroughRenderer;

    impl QrRenderer for PassthroughRenderer {
        fn to_image_data(&self, qr: &str) -> Result<String> {
            Ok(format!("img:{qr}"))
        }
    }

    struct FailingRenderer;

    impl QrRenderer for FailingRenderer {
        fn to_image_data(&self, _qr: &str) -> Result<String> {
            anyhow::bail!("render failed")
        }
    }

    fn registry_with(client: MockClient) -> (SessionRegistry, Arc<MockFactory>) {
        let factory = Arc::new(MockFactory::new(client));
        let registry = SessionRegistry::new(
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            Arc::new(PassthroughRenderer),
            "91",
        );
        (registry, factory)
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (registry, factory) = registry_with(MockClient::default());
        registry.start_session("alice").await;
        registry.start_session("alice").await;
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.user_ids().await, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn qr_status_lifecycle() {
        let (registry, _) = registry_with(MockClient::default());
        registry.start_session("alice").await;

        assert_eq!(registry.qr_status("alice").await.unwrap(), QrStatus::Waiting);

        registry.handle_qr("alice", "raw-code").await;
        assert_eq!(
            registry.qr_status("alice").await.unwrap(),
            QrStatus::Qr("img:raw-code".into())
        );

        registry.handle_ready("alice").await;
        assert_eq!(
            registry.qr_status("alice").await.unwrap(),
            QrStatus::Connected
        );
        assert!(registry.is_ready("alice").await);

        registry.handle_disconnected("alice").await;
        assert_eq!(registry.qr_status("alice").await.unwrap(), QrStatus::Waiting);

        registry.handle_qr("alice", "fresh").await;
        assert_eq!(
            registry.qr_status("alice").await.unwrap(),
            QrStatus::Qr("img:fresh".into())
        );
    }

    #[tokio::test]
    async fn unknown_user_fails_qr_status() {
        let (registry, _) = registry_with(MockClient::default());
        assert!(matches!(
            registry.qr_status("nobody").await,
            Err(Error::UnknownUser(_))
        ));
        assert!(!registry.is_ready("nobody").await);
    }

    #[tokio::test]
    async fn send_before_ready_fails_regardless_of_recipient() {
        let (registry, _) = registry_with(MockClient::default());
        registry.start_session("alice").await;

        // Even an unparseable recipient reports NotConnected first.
        assert!(matches!(
            registry.send("alice", "not-a-number", "hi").await,
            Err(Error::NotConnected(_))
        ));
        assert!(matches!(
            registry.send("never-started", "9876543210", "hi").await,
            Err(Error::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn send_validates_inputs_before_touching_client() {
        let (registry, factory) = registry_with(MockClient::default());
        registry.start_session("alice").await;
        registry.handle_ready("alice").await;

        assert!(matches!(
            registry.send("alice", "9876543210", "   ").await,
            Err(Error::InvalidInput("message"))
        ));
        assert!(matches!(
            registry.send("alice", "---", "hello").await,
            Err(Error::InvalidRecipient)
        ));
        assert_eq!(factory.client.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_uses_resolved_chat_id() {
        let (registry, factory) = registry_with(MockClient {
            resolve_to: Some("919876543210@resolved".into()),
            ..MockClient::default()
        });
        registry.start_session("alice").await;
        registry.handle_ready("alice").await;

        registry.send("alice", "9876543210", "hello").await.unwrap();

        let sent = factory.client.sent.lock().await;
        assert_eq!(sent.as_slice(), &[(
            "919876543210@resolved".to_string(),
            "hello".to_string()
        )]);
        assert_eq!(factory.client.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolution_failure_falls_back_to_default_chat_id() {
        let (registry, factory) = registry_with(MockClient {
            resolve_fails: true,
            ..MockClient::default()
        });
        registry.start_session("alice").await;
        registry.handle_ready("alice").await;

        registry.send("alice", "9876543210", "hello").await.unwrap();

        let sent = factory.client.sent.lock().await;
        assert_eq!(sent[0].0, "919876543210@c.us");
    }

    #[tokio::test]
    async fn empty_resolution_falls_back_to_default_chat_id() {
        let (registry, factory) = registry_with(MockClient::default());
        registry.start_session("alice").await;
        registry.handle_ready("alice").await;

        registry.send("alice", "+91 98765 43210", "hello").await.unwrap();

        let sent = factory.client.sent.lock().await;
        assert_eq!(sent[0].0, "919876543210@c.us");
    }

    #[tokio::test]
    async fn send_failure_is_wrapped() {
        let (registry, _) = registry_with(MockClient {
            send_fails: true,
            ..MockClient::default()
        });
        registry.start_session("alice").await;
        registry.handle_ready("alice").await;

        assert!(matches!(
            registry.send("alice", "9876543210", "hello").await,
            Err(Error::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn render_failure_leaves_state_unchanged() {
        let factory = Arc::new(MockFactory::new(MockClient::default()));
        let registry = SessionRegistry::new(
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            Arc::new(FailingRenderer),
            "91",
        );
        registry.start_session("alice").await;
        registry.handle_qr("alice", "raw").await;
        assert_eq!(registry.qr_status("alice").await.unwrap(), QrStatus::Waiting);
    }

    #[tokio::test]
    async fn reinitialize_touches_every_session_once() {
        let (registry, factory) = registry_with(MockClient::default());
        registry.start_session("alice").await;
        registry.start_session("bob").await;

        // Wait for the two spawned initialize tasks to settle.
        while factory.client.init_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        registry.reinitialize_all().await;
        assert_eq!(factory.client.init_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn events_for_unknown_users_are_dropped() {
        let (registry, _) = registry_with(MockClient::default());
        // Must not panic or create phantom sessions.
        registry.handle_ready("ghost").await;
        registry.handle_qr("ghost", "raw").await;
        assert!(registry.user_ids().await.is_empty());
    }
}
