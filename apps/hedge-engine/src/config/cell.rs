//! Process-wide current configuration.

use std::sync::{Arc, RwLock};

use super::EngineConfig;

/// Shared current configuration.
///
/// The operator side writes through [`ConfigCell::update`]; the decision
/// pipeline takes one [`ConfigCell::snapshot`] per tick and never sees a
/// change mid-evaluation.
#[derive(Debug, Default)]
pub struct ConfigCell {
    current: RwLock<Arc<EngineConfig>>,
}

impl ConfigCell {
    /// Cell holding `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Configuration in force right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the configuration after validating it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` and keeps the old value when
    /// `config` is invalid.
    pub fn update(&self, config: EngineConfig) -> Result<(), super::ConfigError> {
        super::validate_config(&config)?;
        let next = Arc::new(config);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        Ok(())
    }
}
