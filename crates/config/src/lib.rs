//! # MicroClaw Config
//!
//! The device's persistent settings and the storage behind them.
//!
//! [`Config`] is a flat record with explicit defaults; it never grows
//! fields at runtime and secrets in it never appear in `Debug` output.
//! Two [`StoreBackend`]s persist it: a single capped JSON document
//! (`store-json`, the default) and a directory of one-file-per-key
//! entries (`store-kv`). Both backends load by merging into an existing
//! record, so a partial store leaves the other fields at their defaults.

mod json;
mod kv;
mod record;
mod store;

pub use json::{JsonStore, FILE_CAP};
pub use kv::KvStore;
pub use record::{AllowList, ChannelCfg, Config, ALLOW_LIST_MAX};
pub use store::{Store, StoreBackend};

use std::path::Path;

use microclaw_core::StoreError;

/// Open a store under `base` with the backend selected at build time.
pub fn open_store(base: &Path) -> Result<Store, StoreError> {
    #[cfg(feature = "store-kv")]
    let backend: Box<dyn StoreBackend> = Box::new(KvStore::new(base.join("kv")));
    #[cfg(not(feature = "store-kv"))]
    let backend: Box<dyn StoreBackend> = Box::new(JsonStore::new(base.join("config.json")));
    Store::open(backend)
}
