//! Process-wide relay state.
//!
//! Engine libraries usually need one-time global setup (SSL, plugin
//! registries).  That setup belongs to the [`EngineFactory`], which guards
//! it itself; [`RelayRuntime`] triggers it on construction and then carries
//! the pieces every session shares: the engine factory, the merged keymap
//! and the config.  Sessions receive it by reference-counted handle.

use std::sync::Arc;

use rdp_relay_core::keymap::{self, KeymapTable};
use tracing::info;

use crate::application::engine::{EngineFactory, RemoteEngine};
use crate::domain::config::RelayConfig;
use crate::domain::error::RelayError;

/// Shared, immutable context handed to every session.
pub struct RelayRuntime {
    factory: Arc<dyn EngineFactory>,
    keymap: Arc<KeymapTable>,
    config: RelayConfig,
}

impl RelayRuntime {
    /// Initialises the engine library (a no-op if `factory` already did)
    /// and loads the configured keymap.
    ///
    /// # Errors
    ///
    /// [`RelayError::BadArgument`] if the keymap name is unknown.
    pub fn new(factory: Arc<dyn EngineFactory>, config: RelayConfig) -> Result<Self, RelayError> {
        info!("initialising remote desktop engine");
        factory.global_init();

        let source = keymap::find(&config.keymap)
            .ok_or_else(|| RelayError::BadArgument(format!("unknown keymap {:?}", config.keymap)))?;
        let table = keymap::load(source);

        Ok(Self {
            factory,
            keymap: Arc::new(table),
            config,
        })
    }

    pub fn create_engine(&self) -> Box<dyn RemoteEngine> {
        self.factory.create()
    }

    pub fn keymap(&self) -> &Arc<KeymapTable> {
        &self.keymap
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::ScriptedEngineFactory;

    #[test]
    fn test_global_init_runs_once_per_factory() {
        // Arrange
        let factory = Arc::new(ScriptedEngineFactory::new());

        // Act
        let _a = RelayRuntime::new(factory.clone(), RelayConfig::default()).unwrap();
        let _b = RelayRuntime::new(factory.clone(), RelayConfig::default()).unwrap();

        // Assert
        assert_eq!(factory.init_count(), 1);
    }

    #[test]
    fn test_every_new_factory_is_initialised() {
        // Arrange
        let first = Arc::new(ScriptedEngineFactory::new());
        let second = Arc::new(ScriptedEngineFactory::new());

        // Act
        let _a = RelayRuntime::new(first.clone(), RelayConfig::default()).unwrap();
        let _b = RelayRuntime::new(second.clone(), RelayConfig::default()).unwrap();

        // Assert
        assert_eq!(first.init_count(), 1);
        assert_eq!(second.init_count(), 1);
    }

    #[test]
    fn test_unknown_keymap_is_rejected() {
        let config = RelayConfig {
            keymap: "klingon".into(),
            ..RelayConfig::default()
        };

        let result = RelayRuntime::new(Arc::new(ScriptedEngineFactory::new()), config);

        assert!(matches!(result, Err(RelayError::BadArgument(_))));
    }

    #[test]
    fn test_default_keymap_is_loaded() {
        let runtime = RelayRuntime::new(Arc::new(ScriptedEngineFactory::new()), RelayConfig::default()).unwrap();

        assert_eq!(runtime.keymap().name(), "en-us-qwerty");
        assert!(runtime.keymap().lookup(0x61).is_some());
    }
}
