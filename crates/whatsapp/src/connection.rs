//! Connection lifecycle: `disconnected -> initializing -> ready`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Initializing,
    Ready,
}

/// Result of asking the tracker to start a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDecision {
    AlreadyConnected,
    AlreadyConnecting,
    /// The tracker moved to `Initializing`; the caller must start a provider.
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub connected: bool,
    pub initializing: bool,
}

/// Latest pairing artifact as exposed over HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingSnapshot {
    pub qr: String,
    pub qr_image: String,
    pub is_initializing: bool,
}

#[derive(Debug, Clone)]
struct PairingArtifact {
    code: String,
    image: Option<String>,
}

/// Coarse connection state plus the latest pairing code.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    pairing: Option<PairingArtifact>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn is_initializing(&self) -> bool {
        self.state == ConnectionState::Initializing
    }

    /// Move to `Initializing` unless a connection is already live or pending.
    pub fn begin_connect(&mut self) -> ConnectDecision {
        match self.state {
            ConnectionState::Ready => ConnectDecision::AlreadyConnected,
            ConnectionState::Initializing => ConnectDecision::AlreadyConnecting,
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Initializing;
                self.pairing = None;
                ConnectDecision::Start
            },
        }
    }

    /// Record a new pairing code. Any image rendered for a previous code is
    /// dropped.
    pub fn pairing_code_issued(&mut self, code: impl Into<String>) {
        self.pairing = Some(PairingArtifact {
            code: code.into(),
            image: None,
        });
    }

    /// Attach a rendered image, but only if `code` is still the current
    /// pairing code. Returns whether the image was stored.
    pub fn pairing_image_rendered(&mut self, code: &str, image: String) -> bool {
        match self.pairing.as_mut() {
            Some(artifact) if artifact.code == code => {
                artifact.image = Some(image);
                true
            },
            _ => false,
        }
    }

    /// Session is open; the pairing code has served its purpose.
    pub fn mark_ready(&mut self) {
        self.state = ConnectionState::Ready;
        self.pairing = None;
    }

    /// Back to `Disconnected` with every pairing artifact cleared.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.pairing = None;
    }

    pub fn pairing_code(&self) -> Option<&str> {
        self.pairing.as_ref().map(|p| p.code.as_str())
    }

    pub fn pairing_image(&self) -> Option<&str> {
        self.pairing.as_ref().and_then(|p| p.image.as_deref())
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connected: self.is_connected(),
            initializing: self.is_initializing(),
        }
    }

    pub fn pairing_snapshot(&self) -> PairingSnapshot {
        PairingSnapshot {
            qr: self.pairing_code().unwrap_or_default().to_string(),
            qr_image: self.pairing_image().unwrap_or_default().to_string(),
            is_initializing: self.is_initializing(),
        }
    }
}
