//! Owns the live messaging provider and reacts to its events.
//!
//! At most one provider instance exists at a time. Each instance gets a
//! generation number; events, renders and faults from an instance that has
//! since been discarded are ignored.

use std::{future::Future, sync::Arc, time::Duration};

use {
    tokio::sync::{Mutex, mpsc},
    tracing::{debug, error, info, warn},
};

use taskwire_tasks::{SharedTaskStore, classify};

use crate::{
    connection::{ConnectDecision, ConnectionSnapshot, ConnectionTracker, PairingSnapshot},
    error::{Error, Result},
    provider::{MessagingProvider, ProviderFactory},
    qr::PairingRenderer,
    types::{InboundMessage, ProviderEvent},
};

/// What a connect request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    AlreadyConnected,
    /// A previous request is still initializing.
    AlreadyConnecting,
    /// A new provider was started.
    Connecting,
    /// The provider was discarded while it was still initializing.
    Disconnected,
}

impl ConnectOutcome {
    pub fn status(self) -> &'static str {
        match self {
            Self::AlreadyConnected => "already_connected",
            Self::AlreadyConnecting | Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::AlreadyConnected => "WhatsApp is already connected",
            Self::AlreadyConnecting => "WhatsApp connection is already in progress",
            Self::Connecting => "Initializing WhatsApp connection, scan the QR code when it appears",
            Self::Disconnected => "WhatsApp connection was closed before it finished initializing",
        }
    }
}

struct ActiveProvider {
    generation: u64,
    provider: Arc<dyn MessagingProvider>,
}

#[derive(Default)]
struct Inner {
    tracker: ConnectionTracker,
    active: Option<ActiveProvider>,
    next_generation: u64,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }
}

pub struct WhatsAppManager {
    factory: Arc<dyn ProviderFactory>,
    renderer: Arc<dyn PairingRenderer>,
    tasks: SharedTaskStore,
    inner: Mutex<Inner>,
}

impl WhatsAppManager {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        renderer: Arc<dyn PairingRenderer>,
        tasks: SharedTaskStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            factory,
            renderer,
            tasks,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub async fn status(&self) -> ConnectionSnapshot {
        self.inner.lock().await.tracker.snapshot()
    }

    pub async fn pairing(&self) -> PairingSnapshot {
        self.inner.lock().await.tracker.pairing_snapshot()
    }

    /// Start a provider unless one is already initializing or ready.
    ///
    /// On initialization failure the connection is reset so a later request
    /// starts over with a fresh instance.
    pub async fn connect(self: &Arc<Self>) -> Result<ConnectOutcome> {
        let (generation, provider) = {
            let mut inner = self.inner.lock().await;
            match inner.tracker.begin_connect() {
                ConnectDecision::AlreadyConnected => return Ok(ConnectOutcome::AlreadyConnected),
                ConnectDecision::AlreadyConnecting => {
                    return Ok(ConnectOutcome::AlreadyConnecting);
                },
                ConnectDecision::Start => {},
            }
            inner.next_generation += 1;
            let generation = inner.next_generation;
            let provider = self.factory.create();
            inner.active = Some(ActiveProvider {
                generation,
                provider: Arc::clone(&provider),
            });
            (generation, provider)
        };

        let (events, rx) = mpsc::unbounded_channel();
        self.spawn_supervised(generation, Arc::clone(self).pump(generation, rx));

        info!(generation, "initializing WhatsApp client");
        if let Err(e) = provider.initialize(events).await {
            error!(generation, error = %e, "WhatsApp client failed to initialize");
            self.discard(generation, "initialization failed").await;
            return Err(Error::provider_init(format!("{e:#}")));
        }

        // A disconnect or fatal event may have discarded this instance while
        // it was starting; whatever it acquired since then has no owner.
        if !self.inner.lock().await.is_current(generation) {
            warn!(generation, "WhatsApp client discarded during initialization");
            if let Err(e) = provider.destroy().await {
                warn!(generation, error = %e, "failed to destroy discarded WhatsApp client");
            }
            return Ok(ConnectOutcome::Disconnected);
        }
        Ok(ConnectOutcome::Connecting)
    }

    /// Destroy the live provider, if any, and return to `Disconnected`.
    /// Returns whether a provider was running. Teardown failures are logged;
    /// the connection is reset either way.
    pub async fn disconnect(&self) -> bool {
        let Some(active) = self.take_active().await else {
            return false;
        };
        let generation = active.generation;
        info!(generation, "disconnecting WhatsApp client");
        if let Err(e) = active.provider.destroy().await {
            warn!(generation, error = %e, "error while destroying WhatsApp client");
        }
        true
    }

    /// Give the live provider a bounded chance to release its resources.
    /// Failures are logged, never returned.
    pub async fn shutdown(&self, timeout: Duration) {
        let Some(active) = self.take_active().await else {
            return;
        };
        info!(generation = active.generation, "shutting down WhatsApp client");
        match tokio::time::timeout(timeout, active.provider.destroy()).await {
            Ok(Ok(())) => info!("WhatsApp client released"),
            Ok(Err(e)) => warn!(error = %e, "error while destroying WhatsApp client"),
            Err(_) => warn!(?timeout, "WhatsApp client did not shut down in time"),
        }
    }

    async fn take_active(&self) -> Option<ActiveProvider> {
        let mut inner = self.inner.lock().await;
        inner.tracker.reset();
        inner.active.take()
    }

    /// Run `fut` in its own task. If it panics, the provider of `generation`
    /// is discarded and the connection reset; the process keeps serving.
    fn spawn_supervised<F>(self: &Arc<Self>, generation: u64, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(fut);
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = task.await
                && e.is_panic()
            {
                error!(generation, "WhatsApp event handler panicked, resetting connection");
                manager.discard(generation, "event handler fault").await;
            }
        });
    }

    async fn pump(self: Arc<Self>, generation: u64, mut rx: mpsc::UnboundedReceiver<ProviderEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(generation, event).await;
        }
        debug!(generation, "provider event stream closed");
    }

    async fn handle_event(self: &Arc<Self>, generation: u64, event: ProviderEvent) {
        if !self.inner.lock().await.is_current(generation) {
            debug!(generation, ?event, "ignoring event from discarded client");
            return;
        }

        match event {
            ProviderEvent::PairingCode(code) => {
                info!(generation, "pairing code received");
                {
                    let mut inner = self.inner.lock().await;
                    if !inner.is_current(generation) {
                        return;
                    }
                    inner.tracker.pairing_code_issued(code.clone());
                }
                self.spawn_render(generation, code);
            },
            ProviderEvent::Authenticated => info!(generation, "WhatsApp authenticated"),
            ProviderEvent::Ready => {
                let mut inner = self.inner.lock().await;
                if inner.is_current(generation) {
                    inner.tracker.mark_ready();
                    info!(generation, "WhatsApp client is ready");
                }
            },
            ProviderEvent::AuthFailure(reason) => {
                error!(generation, %reason, "WhatsApp authentication failed");
                self.discard(generation, "authentication failed").await;
            },
            ProviderEvent::Disconnected(reason) => {
                warn!(generation, %reason, "WhatsApp client disconnected");
                self.discard(generation, "disconnected").await;
            },
            ProviderEvent::Error(detail) => {
                let fault = Error::provider(detail);
                error!(generation, error = %fault, "WhatsApp client error");
                self.discard(generation, "provider error").await;
            },
            ProviderEvent::Message(message) => self.ingest(message).await,
        }
    }

    /// Classify an inbound message and keep the resulting task.
    async fn ingest(&self, message: InboundMessage) {
        if message.is_status_broadcast() {
            return;
        }
        let number = message.sender_number();
        let group = message.is_group;
        match classify(&message.body, message.sender_display_name(), number) {
            Some(task) => {
                info!(
                    task_id = %task.id,
                    category = %task.category,
                    sender = number,
                    group,
                    "task extracted from message"
                );
                self.tasks.write().await.add(task);
            },
            None => debug!(sender = number, group, "message is not actionable"),
        }
    }

    /// Render the pairing image off the event path.
    fn spawn_render(self: &Arc<Self>, generation: u64, code: String) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let renderer = Arc::clone(&manager.renderer);
            let input = code.clone();
            let rendered = tokio::task::spawn_blocking(move || renderer.render(&input)).await;

            match rendered {
                Ok(Ok(image)) => {
                    let mut inner = manager.inner.lock().await;
                    if inner.is_current(generation)
                        && inner.tracker.pairing_image_rendered(&code, image)
                    {
                        debug!(generation, "pairing image ready");
                    } else {
                        debug!(generation, "discarding stale pairing image");
                    }
                },
                Ok(Err(e)) => warn!(generation, error = %e, "pairing image rendering failed"),
                Err(e) => warn!(generation, error = %e, "pairing image task failed"),
            }
        });
    }

    /// Reset the connection and drop the provider of `generation`, destroying
    /// it in the background.
    async fn discard(&self, generation: u64, reason: &'static str) {
        let active = {
            let mut inner = self.inner.lock().await;
            if !inner.is_current(generation) {
                return;
            }
            inner.tracker.reset();
            inner.active.take()
        };

        if let Some(active) = active {
            debug!(generation, reason, "discarding WhatsApp client");
            tokio::spawn(async move {
                if let Err(e) = active.provider.destroy().await {
                    warn!(generation, error = %e, "failed to destroy discarded WhatsApp client");
                }
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use {async_trait::async_trait, taskwire_tasks::TaskStore};

    use {
        super::*,
        crate::{connection::ConnectionState, provider::EventSender},
    };

    #[derive(Default)]
    struct FakeProvider {
        fail_init: bool,
        fail_destroy: bool,
        init_delay: Duration,
        events: std::sync::Mutex<Option<EventSender>>,
        destroyed: AtomicUsize,
    }

    impl FakeProvider {
        fn emit(&self, event: ProviderEvent) {
            let events = self.events.lock().unwrap();
            events.as_ref().expect("initialized").send(event).unwrap();
        }
    }

    #[async_trait]
    impl MessagingProvider for FakeProvider {
        async fn initialize(&self, events: EventSender) -> anyhow::Result<()> {
            tokio::time::sleep(self.init_delay).await;
            if self.fail_init {
                anyhow::bail!("browser failed to launch");
            }
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }

        async fn destroy(&self) -> anyhow::Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().take();
            if self.fail_destroy {
                anyhow::bail!("browser already gone");
            }
            Ok(())
        }
    }

    /// Hands out pre-built providers and remembers them.
    #[derive(Default)]
    struct FakeFactory {
        fail_init: bool,
        fail_destroy: bool,
        init_delay: Duration,
        created: std::sync::Mutex<Vec<Arc<FakeProvider>>>,
    }

    impl FakeFactory {
        fn last(&self) -> Arc<FakeProvider> {
            Arc::clone(self.created.lock().unwrap().last().expect("a provider"))
        }

        fn count(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    impl ProviderFactory for FakeFactory {
        fn create(&self) -> Arc<dyn MessagingProvider> {
            let provider = Arc::new(FakeProvider {
                fail_init: self.fail_init,
                fail_destroy: self.fail_destroy,
                init_delay: self.init_delay,
                ..FakeProvider::default()
            });
            self.created.lock().unwrap().push(Arc::clone(&provider));
            provider
        }
    }

    struct StaticRenderer;

    impl PairingRenderer for StaticRenderer {
        fn render(&self, code: &str) -> Result<String> {
            Ok(format!("img:{code}"))
        }
    }

    struct FailingRenderer;

    impl PairingRenderer for FailingRenderer {
        fn render(&self, _code: &str) -> Result<String> {
            Err(Error::render("no encoder"))
        }
    }

    fn manager_with(
        factory: Arc<FakeFactory>,
        renderer: Arc<dyn PairingRenderer>,
    ) -> Arc<WhatsAppManager> {
        WhatsAppManager::new(factory, renderer, TaskStore::shared())
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    async fn state(manager: &WhatsAppManager) -> ConnectionState {
        manager.inner.lock().await.tracker.state()
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));

        assert_eq!(manager.connect().await.unwrap(), ConnectOutcome::Connecting);
        assert_eq!(
            manager.connect().await.unwrap(),
            ConnectOutcome::AlreadyConnecting
        );
        assert_eq!(factory.count(), 1);

        factory.last().emit(ProviderEvent::Ready);
        eventually(|| async { manager.status().await.connected }).await;
        assert_eq!(
            manager.connect().await.unwrap(),
            ConnectOutcome::AlreadyConnected
        );
        assert_eq!(factory.count(), 1);
    }

    #[tokio::test]
    async fn init_failure_resets_state() {
        let factory = Arc::new(FakeFactory {
            fail_init: true,
            ..FakeFactory::default()
        });
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::ProviderInit { ref message } if message.contains("browser")));
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);
        eventually(|| async { factory.last().destroyed.load(Ordering::SeqCst) == 1 }).await;

        // A later attempt builds a fresh instance.
        assert!(manager.connect().await.is_err());
        assert_eq!(factory.count(), 2);
    }

    #[tokio::test]
    async fn pairing_code_is_rendered() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();

        factory.last().emit(ProviderEvent::PairingCode("abc".into()));
        eventually(|| async { manager.pairing().await.qr_image == "img:abc" }).await;

        let pairing = manager.pairing().await;
        assert_eq!(pairing.qr, "abc");
        assert!(pairing.is_initializing);
    }

    #[tokio::test]
    async fn render_failure_keeps_state() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(FailingRenderer));
        manager.connect().await.unwrap();

        factory.last().emit(ProviderEvent::PairingCode("abc".into()));
        eventually(|| async { manager.pairing().await.qr == "abc" }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pairing = manager.pairing().await;
        assert_eq!(pairing.qr_image, "");
        assert_eq!(state(&manager).await, ConnectionState::Initializing);
    }

    #[tokio::test]
    async fn disconnect_event_discards_provider() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();
        let first = factory.last();

        first.emit(ProviderEvent::PairingCode("abc".into()));
        first.emit(ProviderEvent::Ready);
        eventually(|| async { manager.status().await.connected }).await;

        first.emit(ProviderEvent::Disconnected("phone offline".into()));
        eventually(|| async { first.destroyed.load(Ordering::SeqCst) == 1 }).await;
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);
        assert_eq!(manager.pairing().await.qr, "");

        assert_eq!(manager.connect().await.unwrap(), ConnectOutcome::Connecting);
        assert_eq!(factory.count(), 2);
    }

    #[tokio::test]
    async fn auth_failure_and_error_reset() {
        for event in [
            ProviderEvent::AuthFailure("bad session".into()),
            ProviderEvent::Error("socket hang up".into()),
        ] {
            let factory = Arc::new(FakeFactory::default());
            let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
            manager.connect().await.unwrap();
            factory.last().emit(event);
            eventually(|| async { !manager.status().await.initializing }).await;
            assert_eq!(state(&manager).await, ConnectionState::Disconnected);
        }
    }

    #[tokio::test]
    async fn inbound_messages_become_tasks() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();
        let provider = factory.last();

        provider.emit(ProviderEvent::Message(InboundMessage {
            body: "hello there".into(),
            sender_jid: "5511999990000@s.whatsapp.net".into(),
            sender_name: Some("Ana".into()),
            is_group: false,
        }));
        provider.emit(ProviderEvent::Message(InboundMessage {
            body: "Is my status update ready?".into(),
            sender_jid: "status@broadcast".into(),
            sender_name: None,
            is_group: false,
        }));
        provider.emit(ProviderEvent::Message(InboundMessage {
            body: "Can we schedule a call tomorrow?".into(),
            sender_jid: "5511999990000@s.whatsapp.net".into(),
            sender_name: Some("Ana".into()),
            is_group: false,
        }));

        eventually(|| async { manager.tasks.read().await.len() == 1 }).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let store = manager.tasks.read().await;
        let [task] = store.list() else {
            panic!("expected exactly one task");
        };
        assert_eq!(task.candidate_name, "Ana");
        assert_eq!(task.candidate_number, "5511999990000");
        assert_eq!(task.category, taskwire_tasks::Category::Scheduling);
    }

    #[tokio::test]
    async fn fault_barrier_resets_connection() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();
        let generation = manager.inner.lock().await.next_generation;

        manager.spawn_supervised(generation, async {
            let handler: Option<()> = None;
            handler.expect("handler blew up");
        });

        eventually(|| async { state(&manager).await == ConnectionState::Disconnected }).await;
        eventually(|| async { factory.last().destroyed.load(Ordering::SeqCst) == 1 }).await;
        assert_eq!(manager.connect().await.unwrap(), ConnectOutcome::Connecting);
    }

    #[tokio::test]
    async fn events_from_discarded_client_are_ignored() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();
        let stale = manager.inner.lock().await.next_generation;

        assert!(manager.disconnect().await);
        manager.connect().await.unwrap();

        manager.handle_event(stale, ProviderEvent::Ready).await;
        assert_eq!(state(&manager).await, ConnectionState::Initializing);
    }

    #[tokio::test]
    async fn disconnect_and_shutdown() {
        let factory = Arc::new(FakeFactory::default());
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        assert!(!manager.disconnect().await);

        manager.connect().await.unwrap();
        manager.shutdown(Duration::from_secs(1)).await;
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);

        // Nothing left to release.
        manager.shutdown(Duration::from_secs(1)).await;
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_during_initialization() {
        let factory = Arc::new(FakeFactory {
            init_delay: Duration::from_millis(300),
            ..FakeFactory::default()
        });
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));

        let connecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.connect().await }
        });
        eventually(|| async { manager.status().await.initializing }).await;
        assert!(manager.disconnect().await);

        let outcome = connecting.await.unwrap().unwrap();
        assert_eq!(outcome, ConnectOutcome::Disconnected);
        assert_eq!(outcome.status(), "disconnected");
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);

        // Destroyed by the disconnect, then again once initialize returned.
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 2);
        assert!(factory.last().events.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn fatal_event_during_initialization() {
        let factory = Arc::new(FakeFactory {
            init_delay: Duration::from_millis(100),
            ..FakeFactory::default()
        });
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));

        let connecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.connect().await }
        });
        eventually(|| async { manager.status().await.initializing }).await;
        let generation = manager.inner.lock().await.next_generation;
        manager
            .handle_event(generation, ProviderEvent::AuthFailure("bad session".into()))
            .await;

        assert_eq!(
            connecting.await.unwrap().unwrap(),
            ConnectOutcome::Disconnected
        );
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_survives_teardown_failure() {
        let factory = Arc::new(FakeFactory {
            fail_destroy: true,
            ..FakeFactory::default()
        });
        let manager = manager_with(Arc::clone(&factory), Arc::new(StaticRenderer));
        manager.connect().await.unwrap();

        assert!(manager.disconnect().await);
        assert_eq!(factory.last().destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(state(&manager).await, ConnectionState::Disconnected);
        assert_eq!(manager.connect().await.unwrap(), ConnectOutcome::Connecting);
    }
}
