//! WhatsApp Web connection management and task extraction.
//!
//! The protocol itself lives in an external messaging provider (a Baileys
//! sidecar process reached over a local WebSocket). This crate tracks the
//! connection lifecycle, relays the pairing QR code and feeds inbound
//! messages to the task classifier.

pub mod connection;
pub mod error;
pub mod manager;
pub mod process;
pub mod provider;
pub mod qr;
pub mod sidecar;
pub mod types;

pub use {
    connection::{ConnectionSnapshot, ConnectionState, ConnectionTracker, PairingSnapshot},
    error::{Error, Result},
    manager::{ConnectOutcome, WhatsAppManager},
    provider::{EventSender, MessagingProvider, ProviderFactory},
    qr::{PairingRenderer, QrPngRenderer},
    sidecar::{SidecarProvider, SidecarProviderFactory},
    types::{InboundMessage, ProviderEvent},
};
