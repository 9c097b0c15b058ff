//! Provider events and the JSON protocol spoken with the Baileys sidecar.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// JID the WhatsApp network uses for status/story broadcasts.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

// ── Provider events ─────────────────────────────────────────────────────────

/// Everything a messaging provider can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// A pairing code was issued and should be shown as a QR image.
    PairingCode(String),
    Authenticated,
    Ready,
    AuthFailure(String),
    Message(InboundMessage),
    Disconnected(String),
    Error(String),
}

/// A chat message received from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub body: String,
    /// Sender JID, e.g. `5511999990000@s.whatsapp.net`.
    pub sender_jid: String,
    /// Push name advertised by the sender, if any.
    pub sender_name: Option<String>,
    pub is_group: bool,
}

impl InboundMessage {
    /// User part of the sender JID.
    pub fn sender_number(&self) -> &str {
        self.sender_jid
            .split_once('@')
            .map_or(self.sender_jid.as_str(), |(user, _)| user)
    }

    /// Push name, falling back to the number.
    pub fn sender_display_name(&self) -> &str {
        self.sender_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.sender_number())
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.sender_jid == STATUS_BROADCAST_JID
    }
}

// ── Sidecar protocol ────────────────────────────────────────────────────────

/// Messages sent by the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        account_id: String,
        qr: String,
    },
    Connected {
        account_id: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    AuthFailure {
        account_id: String,
        reason: String,
    },
    Disconnected {
        account_id: String,
        reason: String,
    },
    LoggedOut {
        account_id: String,
    },
    InboundMessage {
        account_id: String,
        sender_jid: String,
        #[serde(default)]
        sender_name: Option<String>,
        #[serde(default)]
        is_group: bool,
        #[serde(default)]
        body: String,
    },
    Error {
        #[serde(default)]
        account_id: Option<String>,
        error: String,
    },
}

impl SidecarMessage {
    /// Account the message belongs to. Errors without an account apply to
    /// every account.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Qr { account_id, .. }
            | Self::Connected { account_id, .. }
            | Self::AuthFailure { account_id, .. }
            | Self::Disconnected { account_id, .. }
            | Self::LoggedOut { account_id }
            | Self::InboundMessage { account_id, .. } => Some(account_id),
            Self::Error { account_id, .. } => account_id.as_deref(),
        }
    }

    /// Translate into provider events. An open session is both
    /// authenticated and ready.
    pub fn into_events(self) -> Vec<ProviderEvent> {
        match self {
            Self::Qr { qr, .. } => vec![ProviderEvent::PairingCode(qr)],
            Self::Connected { .. } => vec![ProviderEvent::Authenticated, ProviderEvent::Ready],
            Self::AuthFailure { reason, .. } => vec![ProviderEvent::AuthFailure(reason)],
            Self::Disconnected { reason, .. } => vec![ProviderEvent::Disconnected(reason)],
            Self::LoggedOut { .. } => vec![ProviderEvent::Disconnected("logged out".into())],
            Self::InboundMessage {
                sender_jid,
                sender_name,
                is_group,
                body,
                ..
            } => vec![ProviderEvent::Message(InboundMessage {
                body,
                sender_jid,
                sender_name,
                is_group,
            })],
            Self::Error { error, .. } => vec![ProviderEvent::Error(error)],
        }
    }
}

/// Commands sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    Login {
        account_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_dir: Option<PathBuf>,
    },
    Logout {
        account_id: String,
    },
}
