//! The name-keyed kernel library registry.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use log::debug;

use crate::config::JitConfig;
use crate::error::LibraryError;
use crate::library::KernelLibrary;

/// Derive a registry name from a shape's structural cache key.
///
/// `ensure_ready` never recompiles an existing entry, so name-based
/// deduplication is only safe when a layout change produces a new name;
/// hashing the cache key guarantees that.
pub fn library_name_for(base: &str, cache_key: &str) -> String {
    let mut hasher = DefaultHasher::new();
    cache_key.hash(&mut hasher);
    format!("{base}_{:016x}", hasher.finish())
}

/// Multiplexes [`KernelLibrary`] entries by name.
///
/// Entry creation is idempotent and happens under the registry lock, so
/// concurrent first requests for one name share a single entry, and the
/// per-entry state lock keeps them from compiling it twice.
#[derive(Debug)]
pub struct LibraryRegistry {
    config: JitConfig,
    entries: Mutex<IndexMap<String, Arc<KernelLibrary>>>,
}

impl LibraryRegistry {
    /// Create an empty registry.
    pub fn new(config: JitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Return the entry named `name`, creating it unbuilt if absent.
    pub fn get_or_create(&self, name: &str) -> Arc<KernelLibrary> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(KernelLibrary::new(name, &self.config)))
            .clone()
    }

    /// Return the entry named `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<Arc<KernelLibrary>> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    /// Get or create the entry, compile it if unbuilt, and load it if not
    /// loaded.
    pub fn ensure_ready(&self, name: &str) -> Result<Arc<KernelLibrary>, LibraryError> {
        let library = self.get_or_create(name);
        library.ensure_ready()?;
        Ok(library)
    }

    /// Announce a live caller of `name`. A no-op for unknown names.
    pub fn register(&self, name: &str) {
        if let Some(library) = self.get(name) {
            library.register();
        }
    }

    /// Retract a live caller of `name`. A no-op for unknown names.
    pub fn deregister(&self, name: &str) {
        if let Some(library) = self.get(name) {
            library.deregister();
        }
    }

    /// Unload `name`'s native handle. Tolerates unknown and never-loaded
    /// names.
    pub fn unload(&self, name: &str) {
        if let Some(library) = self.get(name) {
            library.unload();
        }
    }

    /// Remove an entry, unloading it and deleting its compiled
    /// artifacts. Used when a shape's cache key changes and the entry's
    /// name no longer matches the layout kernels were compiled against.
    pub fn evict(&self, name: &str) -> Option<Arc<KernelLibrary>> {
        let removed = self.entries.lock().unwrap().shift_remove(name);
        if let Some(library) = &removed {
            library.unload();
            library.cleanup_artifacts();
            debug!("evicted kernel library '{name}'");
        }
        removed
    }

    /// Number of entries in the registry.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Tear the registry down: for each entry, block until its reference
    /// count reaches zero, unload it, and delete its compiled artifacts.
    ///
    /// Never forcibly unloads code a caller still references; a caller
    /// that never deregisters blocks teardown forever.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<KernelLibrary>> = {
            let mut entries = self.entries.lock().unwrap();
            entries.drain(..).map(|(_, library)| library).collect()
        };
        for library in drained {
            library.wait_until_unreferenced();
            library.unload();
            library.cleanup_artifacts();
            debug!("retired kernel library '{}'", library.name());
        }
    }
}

impl Drop for LibraryRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
