use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait, tokio::sync::mpsc};

use crate::types::ProviderEvent;

/// Channel a provider reports its events on.
pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;

/// External component that owns the WhatsApp Web session.
///
/// Implementations report everything through the [`EventSender`] handed to
/// [`initialize`](MessagingProvider::initialize); the sender is dropped when
/// the provider is destroyed, which ends the event stream.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Start the session. Returns once the provider is up and waiting for
    /// pairing or resuming a stored session.
    async fn initialize(&self, events: EventSender) -> Result<()>;

    /// Release every resource held by the provider.
    async fn destroy(&self) -> Result<()>;
}

/// Creates a fresh provider instance for every connection attempt.
pub trait ProviderFactory: Send + Sync {
    fn create(&self) -> Arc<dyn MessagingProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn() -> Arc<dyn MessagingProvider> + Send + Sync,
{
    fn create(&self) -> Arc<dyn MessagingProvider> {
        self()
    }
}
