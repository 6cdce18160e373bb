//! Backend trait and the store handle the rest of the system holds.

use microclaw_core::StoreError;

use crate::record::Config;

/// Something that can persist a [`Config`] and merge it back.
///
/// `load` merges into the record it is given: fields absent from storage
/// keep whatever value the record already holds.
pub trait StoreBackend {
    fn load(&self, cfg: &mut Config) -> Result<(), StoreError>;
    fn save(&self, cfg: &Config) -> Result<(), StoreError>;
}

/// The live configuration plus the backend that persists it.
pub struct Store {
    pub config: Config,
    backend: Box<dyn StoreBackend>,
}

impl Store {
    /// Open a store over `backend`, loading whatever it has on top of
    /// the defaults.
    pub fn open(backend: Box<dyn StoreBackend>) -> Result<Self, StoreError> {
        let mut config = Config::default();
        backend.load(&mut config)?;
        Ok(Self { config, backend })
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.backend.save(&self.config)
    }

    /// Reload from storage, discarding unsaved changes.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let mut config = Config::default();
        self.backend.load(&mut config)?;
        self.config = config;
        Ok(())
    }
}
