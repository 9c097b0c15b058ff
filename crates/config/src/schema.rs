use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default port for the WhatsApp sidecar WebSocket server.
pub const DEFAULT_SIDECAR_PORT: u16 = 3100;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskwireConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on. Overridden by the `PORT` environment variable.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Settings for the WhatsApp Web sidecar provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Directory containing the sidecar `package.json`. Discovered when unset.
    pub sidecar_dir: Option<PathBuf>,
    /// Port the sidecar WebSocket server listens on.
    pub sidecar_port: u16,
    /// Where the sidecar keeps session credentials.
    pub auth_dir: Option<PathBuf>,
    /// Account id passed to the sidecar on login.
    pub account_id: String,
    /// Spawn the sidecar process. When false, attach to one already running.
    pub auto_start: bool,
    /// Upper bound on provider teardown during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: None,
            sidecar_port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
            account_id: "default".into(),
            auto_start: true,
            shutdown_timeout_secs: 10,
        }
    }
}
