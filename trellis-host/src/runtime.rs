//! WASM runtime management using Wasmtime.
//!
//! Provides engine configuration, module compilation, and caching for
//! guest UI modules.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use trellis_core::error::{Result, TrellisError};
use wasmtime::{Config, Engine, Module};

/// Configuration for the bridge runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Whether to cache compiled modules by content hash.
    pub cache_modules: bool,
    /// Enable debug info in compiled modules.
    pub debug_info: bool,
    /// Maximum guest linear memory, in 64 KiB pages.
    pub max_memory_pages: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cache_modules: true,
            debug_info: false,
            max_memory_pages: 1024,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration for production use.
    #[must_use]
    pub fn production() -> Self {
        Self {
            cache_modules: true,
            debug_info: false,
            max_memory_pages: 1024,
        }
    }

    /// Create a configuration for testing.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            cache_modules: false,
            debug_info: true,
            max_memory_pages: 256,
        }
    }

    /// Set the guest memory ceiling in pages.
    #[must_use]
    pub fn with_max_memory_pages(mut self, pages: u64) -> Self {
        self.max_memory_pages = pages;
        self
    }

    /// Enable or disable module caching.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_modules = enabled;
        self
    }

    /// Enable or disable debug info.
    #[must_use]
    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }

    fn to_wasmtime_config(&self) -> Config {
        let mut config = Config::new();
        config.debug_info(self.debug_info);
        config.strategy(wasmtime::Strategy::Cranelift);
        config
    }
}

/// A compiled guest module ready for instantiation.
pub struct CompiledModule {
    module: Module,
    hash: u64,
}

impl CompiledModule {
    /// Get the underlying Wasmtime module.
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Get the content hash of this module.
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// Runtime managing the Wasmtime engine and compiled guest modules.
///
/// One runtime can back any number of component instances; the engine is
/// shared and compiled modules are cached by content hash.
pub struct BridgeRuntime {
    engine: Engine,
    config: BridgeConfig,
    module_cache: Mutex<HashMap<u64, Arc<CompiledModule>>>,
}

impl BridgeRuntime {
    /// Create a new runtime with the given configuration.
    ///
    /// # Errors
    /// Returns [`TrellisError::ModuleLoad`] if the engine cannot be built.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let engine =
            Engine::new(&config.to_wasmtime_config()).map_err(|e| TrellisError::ModuleLoad {
                module: "engine".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            engine,
            config,
            module_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Create a runtime with the default configuration.
    ///
    /// # Errors
    /// Returns [`TrellisError::ModuleLoad`] if the engine cannot be built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(BridgeConfig::default())
    }

    /// Get the Wasmtime engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get the runtime configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Compile guest module bytes.
    ///
    /// If caching is enabled and the same bytes were compiled before, the
    /// cached module is returned.
    ///
    /// # Errors
    /// Returns [`TrellisError::ModuleLoad`] if the bytes are not a valid
    /// WASM module.
    pub fn compile(&self, name: &str, wasm_bytes: &[u8]) -> Result<Arc<CompiledModule>> {
        let hash = hash_bytes(wasm_bytes);

        if self.config.cache_modules {
            if let Some(cached) = self.module_cache.lock().get(&hash) {
                return Ok(Arc::clone(cached));
            }
        }

        let module = Module::new(&self.engine, wasm_bytes).map_err(|e| TrellisError::ModuleLoad {
            module: name.to_string(),
            cause: e.to_string(),
        })?;

        let compiled = Arc::new(CompiledModule { module, hash });

        if self.config.cache_modules {
            self.module_cache
                .lock()
                .insert(hash, Arc::clone(&compiled));
        }

        Ok(compiled)
    }

    /// Clear the module cache.
    pub fn clear_cache(&self) {
        self.module_cache.lock().clear();
    }

    /// Get the number of cached modules.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.module_cache.lock().len()
    }
}

/// Compute a cache key for module bytes.
fn hash_bytes(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let config = BridgeConfig::default();
        assert!(config.cache_modules);
        assert!(!config.debug_info);
        assert_eq!(config.max_memory_pages, 1024);
    }

    #[test]
    fn config_testing() {
        let config = BridgeConfig::testing();
        assert!(!config.cache_modules);
        assert!(config.debug_info);
    }

    #[test]
    fn config_builders() {
        let config = BridgeConfig::default()
            .with_cache(false)
            .with_debug_info(true);
        assert!(!config.cache_modules);
        assert!(config.debug_info);
    }

    #[test]
    fn runtime_creation() {
        let runtime = BridgeRuntime::with_defaults().expect("Failed to create runtime");
        assert_eq!(runtime.cache_size(), 0);
    }

    #[test]
    fn hash_bytes_consistency() {
        let data = b"guest module bytes";
        assert_eq!(hash_bytes(data), hash_bytes(data));
        assert_ne!(hash_bytes(data), hash_bytes(b"other bytes"));
    }
}
