//! HTTP gateway: task CRUD and WhatsApp connection control.
//!
//! Lifecycle:
//! 1. Load config and build the shared task store
//! 2. Wire the WhatsApp manager to the sidecar provider
//! 3. Serve the API until Ctrl-C or SIGTERM
//! 4. Give the live WhatsApp client a bounded chance to shut down

pub mod error;
pub mod server;
pub mod state;
pub mod task_routes;
pub mod whatsapp_routes;

pub use {
    error::ApiError,
    server::{build_gateway_app, start_gateway},
    state::AppState,
};
