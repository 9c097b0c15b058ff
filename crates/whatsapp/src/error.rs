use std::error::Error as StdError;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The messaging provider could not be started.
    #[error("failed to initialize WhatsApp client: {message}")]
    ProviderInit { message: String },

    /// Pairing code could not be turned into an image.
    #[error("failed to render pairing code: {message}")]
    Render { message: String },

    /// Runtime failure reported by the provider.
    #[error("messaging provider fault: {message}")]
    Provider { message: String },

    /// Wrapped source error from the sidecar transport.
    #[error("sidecar operation failed: {context}: {source}")]
    Sidecar {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn provider_init(message: impl std::fmt::Display) -> Self {
        Self::ProviderInit {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn render(message: impl std::fmt::Display) -> Self {
        Self::Render {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn provider(message: impl std::fmt::Display) -> Self {
        Self::Provider {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn sidecar(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Sidecar {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
