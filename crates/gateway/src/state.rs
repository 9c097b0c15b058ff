use std::sync::Arc;

use {
    taskwire_tasks::{SharedTaskStore, TaskStore},
    taskwire_whatsapp::{PairingRenderer, ProviderFactory, WhatsAppManager},
};

/// Shared router state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub tasks: SharedTaskStore,
    pub whatsapp: Arc<WhatsAppManager>,
}

impl AppState {
    /// Fresh empty task store with a manager feeding into it.
    pub fn new(factory: Arc<dyn ProviderFactory>, renderer: Arc<dyn PairingRenderer>) -> Self {
        let tasks = TaskStore::shared();
        let whatsapp = WhatsAppManager::new(factory, renderer, Arc::clone(&tasks));
        Self { tasks, whatsapp }
    }
}
