//! WebSocket link to the Baileys sidecar and the [`MessagingProvider`]
//! built on top of it.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    anyhow::Context as _,
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::{
        sync::{Mutex, mpsc, oneshot},
        task::JoinHandle,
    },
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use taskwire_config::WhatsAppConfig;

use crate::{
    error::{Error, Result},
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir},
    provider::{EventSender, MessagingProvider, ProviderFactory},
    types::{GatewayMessage, ProviderEvent, SidecarMessage},
};

const RETRY_DELAY: Duration = Duration::from_millis(500);
const CONNECT_ATTEMPTS: u32 = 10;

/// Invoked for every message decoded from the sidecar.
pub type MessageCallback = Arc<dyn Fn(SidecarMessage) + Send + Sync>;

// ── Socket handle ───────────────────────────────────────────────────────────

/// Open WebSocket connection to the sidecar.
pub struct SidecarHandle {
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SidecarHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn send(&self, message: &GatewayMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.outgoing
            .send(Message::text(json))
            .map_err(|e| Error::sidecar("queue message for sidecar", e))
    }

    /// Send a close frame and stop the socket tasks.
    pub async fn close(self) {
        let _ = self.outgoing.send(Message::Close(None));
        drop(self.outgoing);
        if tokio::time::timeout(Duration::from_secs(2), self.writer)
            .await
            .is_err()
        {
            debug!("sidecar writer did not finish in time");
        }
        self.reader.abort();
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Connect to the sidecar once. The returned receiver fires when the socket
/// closes.
pub async fn connect(
    port: u16,
    callback: MessageCallback,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let url = format!("ws://127.0.0.1:{port}");
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::sidecar(format!("connect to {url}"), e))?;
    let (mut sink, mut stream) = socket.split();

    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    let (closed_tx, closed_rx) = oneshot::channel();
    let connected = Arc::new(AtomicBool::new(true));

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                warn!(error = %e, "failed to write to sidecar socket");
                break;
            }
            if is_close {
                break;
            }
        }
    });

    let reader = tokio::spawn({
        let connected = Arc::clone(&connected);
        async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SidecarMessage>(text.as_str()) {
                            Ok(message) => callback(message),
                            Err(e) => debug!(error = %e, "ignoring unrecognised sidecar message"),
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {},
                    Err(e) => {
                        warn!(error = %e, "sidecar socket error");
                        break;
                    },
                }
            }
            connected.store(false, Ordering::SeqCst);
            let _ = closed_tx.send(());
        }
    });

    info!(port, "connected to WhatsApp sidecar");
    Ok((
        SidecarHandle {
            outgoing,
            connected,
            reader,
            writer,
        },
        closed_rx,
    ))
}

/// [`connect`] with retries while the sidecar process is still booting.
pub async fn connect_with_retry(
    port: u16,
    callback: MessageCallback,
    attempts: u32,
) -> Result<(SidecarHandle, oneshot::Receiver<()>)> {
    let mut attempt = 1;
    loop {
        match connect(port, Arc::clone(&callback)).await {
            Ok(connection) => return Ok(connection),
            Err(e) if attempt < attempts => {
                debug!(attempt, error = %e, "sidecar not reachable yet, retrying");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => return Err(e),
        }
    }
}

// ── Provider ────────────────────────────────────────────────────────────────

/// Messaging provider backed by the Baileys sidecar.
pub struct SidecarProvider {
    config: WhatsAppConfig,
    handle: Mutex<Option<SidecarHandle>>,
    process: Mutex<Option<SidecarProcess>>,
    closing: Arc<AtomicBool>,
}

impl SidecarProvider {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
            process: Mutex::new(None),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn ensure_process(&self) -> anyhow::Result<()> {
        let mut process = self.process.lock().await;
        if let Some(running) = process.as_mut()
            && running.is_running()
        {
            return Ok(());
        }

        let sidecar_dir = find_sidecar_dir(self.config.sidecar_dir.as_deref())?;
        let spawned = SidecarProcess::spawn(&SidecarConfig {
            sidecar_dir,
            port: self.config.sidecar_port,
            auth_dir: self.config.auth_dir.clone(),
        })
        .await?;
        *process = Some(spawned);
        Ok(())
    }
}

/// Forward messages for `account_id` as provider events.
fn event_callback(account_id: String, events: EventSender) -> MessageCallback {
    Arc::new(move |message: SidecarMessage| {
        if message
            .account_id()
            .is_some_and(|id| id != account_id.as_str())
        {
            debug!(account_id = ?message.account_id(), "ignoring message for another account");
            return;
        }
        for event in message.into_events() {
            if events.send(event).is_err() {
                debug!("provider event receiver dropped");
                return;
            }
        }
    })
}

#[async_trait]
impl MessagingProvider for SidecarProvider {
    async fn initialize(&self, events: EventSender) -> anyhow::Result<()> {
        if self.config.auto_start {
            self.ensure_process().await?;
        }

        let callback = event_callback(self.config.account_id.clone(), events.clone());
        let (handle, closed) =
            connect_with_retry(self.config.sidecar_port, callback, CONNECT_ATTEMPTS)
                .await
                .context("WhatsApp sidecar unreachable")?;

        let closing = Arc::clone(&self.closing);
        tokio::spawn(async move {
            if closed.await.is_ok() && !closing.load(Ordering::SeqCst) {
                let _ = events.send(ProviderEvent::Disconnected(
                    "sidecar connection closed".into(),
                ));
            }
        });

        handle.send(&GatewayMessage::Login {
            account_id: self.config.account_id.clone(),
            auth_dir: self.config.auth_dir.clone(),
        })?;
        info!(account_id = %self.config.account_id, "requested WhatsApp login");

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.closing.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.lock().await.take() {
            if handle.is_connected()
                && let Err(e) = handle.send(&GatewayMessage::Logout {
                    account_id: self.config.account_id.clone(),
                })
            {
                debug!(error = %e, "failed to send logout to sidecar");
            }
            handle.close().await;
        }

        if let Some(mut process) = self.process.lock().await.take() {
            debug!(port = process.port(), "releasing sidecar process");
            process.stop().await?;
        }
        Ok(())
    }
}

/// Builds a fresh [`SidecarProvider`] per connection attempt.
pub struct SidecarProviderFactory {
    config: WhatsAppConfig,
}

impl SidecarProviderFactory {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for SidecarProviderFactory {
    fn create(&self) -> Arc<dyn MessagingProvider> {
        Arc::new(SidecarProvider::new(self.config.clone()))
    }
}
