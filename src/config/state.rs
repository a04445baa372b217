// Application state module
// Shared runtime state: configuration, handler index and module registry

use std::sync::Arc;

use super::types::Config;
use crate::handler::index::HandlerIndex;
use crate::modules::{ModuleRegistry, ScriptLoader, ScriptModule};

/// Application state
pub struct AppState {
    pub config: Config,
    pub handlers: HandlerIndex,
    pub registry: Arc<ModuleRegistry<ScriptModule>>,
    pub loader: ScriptLoader,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let api_dir = config.api_dir();
        Self {
            handlers: HandlerIndex::scan(&api_dir),
            loader: ScriptLoader::new(&api_dir),
            registry: Arc::new(ModuleRegistry::new()),
            config,
        }
    }

    pub const fn module_cache(&self) -> bool {
        self.config.dev.module_cache
    }
}
