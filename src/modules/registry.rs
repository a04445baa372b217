//! Process-wide module registry
//!
//! Owns every loaded module keyed by canonical path, together with the
//! direct dependency children recorded when it was loaded, and caches
//! specifier → canonical path resolutions.

use crate::error::LoadError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Produces module instances for the registry
pub trait ModuleLoader {
    type Module;

    /// Load the module at canonical path `id`
    ///
    /// Returns the instance and the canonical ids of the modules it loaded
    /// through `registry` while doing so.
    fn load(
        &self,
        id: &Path,
        registry: &ModuleRegistry<Self::Module>,
    ) -> Result<(Self::Module, Vec<PathBuf>), LoadError>;
}

/// Registry slot for one loaded module
#[derive(Debug)]
pub struct ModuleEntry<M> {
    pub instance: Arc<M>,
    pub children: Vec<PathBuf>,
}

#[derive(Debug)]
struct Inner<M> {
    modules: HashMap<PathBuf, ModuleEntry<M>>,
    resolutions: HashMap<String, PathBuf>,
}

/// Shared module cache
///
/// The lock is never held across a load, so loaders may recurse into the registry.
#[derive(Debug)]
pub struct ModuleRegistry<M> {
    inner: Mutex<Inner<M>>,
}

impl<M> Default for ModuleRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModuleRegistry<M> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                modules: HashMap::new(),
                resolutions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<M>> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Resolve a specifier to a canonical module id, cached
    pub fn resolve(&self, specifier: &str) -> Result<PathBuf, LoadError> {
        if let Some(id) = self.lock().resolutions.get(specifier) {
            return Ok(id.clone());
        }
        let id = Path::new(specifier)
            .canonicalize()
            .map_err(|source| LoadError::Resolve {
                specifier: specifier.to_string(),
                source,
            })?;
        self.lock()
            .resolutions
            .insert(specifier.to_string(), id.clone());
        Ok(id)
    }

    pub fn get(&self, id: &Path) -> Option<Arc<M>> {
        self.lock()
            .modules
            .get(id)
            .map(|entry| Arc::clone(&entry.instance))
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.lock().modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a module; returns the shared instance
    pub fn register(&self, id: PathBuf, instance: M, children: Vec<PathBuf>) -> Arc<M> {
        let instance = Arc::new(instance);
        self.lock().modules.insert(
            id,
            ModuleEntry {
                instance: Arc::clone(&instance),
                children,
            },
        );
        instance
    }

    /// Remove a single module, leaving its children in place
    pub fn evict(&self, id: &Path) -> Option<ModuleEntry<M>> {
        self.lock().modules.remove(id)
    }

    /// Remove a module and every descendant reachable through recorded children
    ///
    /// Returns the number of entries removed. Cycles are visited once.
    pub fn evict_tree(&self, id: &Path) -> usize {
        let mut inner = self.lock();
        let mut visited = HashSet::new();
        let mut pending = vec![id.to_path_buf()];
        let mut removed = 0;
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(entry) = inner.modules.remove(&current) {
                removed += 1;
                pending.extend(entry.children);
            }
        }
        removed
    }

    /// Forget `specifier` so the next load re-executes current source
    ///
    /// Evicts the module tree when it is loaded, and drops every cached
    /// resolution whose key contains `specifier`. Purging something never
    /// loaded evicts nothing.
    pub fn purge(&self, specifier: &str) -> usize {
        let cached = self.lock().resolutions.get(specifier).cloned();
        let id = cached.or_else(|| Path::new(specifier).canonicalize().ok());
        let removed = id.map_or(0, |id| self.evict_tree(&id));
        self.lock()
            .resolutions
            .retain(|key, _| !key.contains(specifier));
        removed
    }

    /// Drop every module and resolution
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.modules.len();
        inner.modules.clear();
        inner.resolutions.clear();
        count
    }

    /// Return the cached module for `specifier`, loading it with `loader` on a miss
    pub fn load_with<L>(&self, specifier: &str, loader: &L) -> Result<Arc<M>, LoadError>
    where
        L: ModuleLoader<Module = M>,
    {
        let id = self.resolve(specifier)?;
        if let Some(instance) = self.get(&id) {
            return Ok(instance);
        }
        let (module, children) = loader.load(&id, self)?;
        Ok(self.register(id, module, children))
    }
}
