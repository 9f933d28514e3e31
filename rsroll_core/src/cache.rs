//! Persisted build state.
//!
//! A [`BuildCache`] carries two stores across builds: serialized
//! module records, reused by the loader when the original source of an
//! id is unchanged, and a per-plugin key-value store with access
//! counters. Counters increment when a cache is loaded into a build
//! and reset to zero on access; entries whose counter reaches the
//! configured expiry are evicted at snapshot time.

use crate::module::{ModuleId, ResolvedId};
use crate::prelude::*;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One module record, stable across builds.
pub struct SerializedModule {
  pub id: ModuleId,
  /// Source as loaded, the cache-hit comparison key.
  pub original_code: String,
  /// Source after `transform` hooks.
  pub code: String,
  /// Resolved static dependencies, specifier to resolution.
  pub resolved_ids: Vec<(String, ResolvedId)>,
  /// Ids of the static dependencies, AST order.
  pub dependencies: Vec<ModuleId>,
  /// Module-scope variables observed as reassigned.
  pub reassigned_names: Vec<String>,
  pub module_side_effects: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A plugin cache slot: an access counter and an opaque value.
pub struct PluginCacheEntry {
  pub counter: u32,
  pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Everything `cache_snapshot` emits and a subsequent build accepts.
pub struct BuildCache {
  pub modules: Vec<SerializedModule>,
  pub plugins: HashMap<String, HashMap<String, PluginCacheEntry>>,
}

#[derive(Debug, Default)]
/// The live per-plugin store backing the cache hooks during a build.
pub struct PluginCache {
  store: HashMap<String, HashMap<String, PluginCacheEntry>>,
}

impl PluginCache {
  pub fn new() -> Self {
    PluginCache {
      store: HashMap::new(),
    }
  }

  /// Adopts the store of a previous build; every surviving entry's
  /// counter is incremented.
  pub fn from_cache(cache: &BuildCache) -> Self {
    let mut store = cache.plugins.clone();
    for entries in store.values_mut() {
      for entry in entries.values_mut() {
        entry.counter += 1;
      }
    }
    PluginCache { store }
  }

  pub fn set(&mut self, plugin: &str, key: &str, value: serde_json::Value) {
    self
      .store
      .entry(plugin.to_string())
      .or_default()
      .insert(key.to_string(), PluginCacheEntry { counter: 0, value });
  }

  pub fn get(&mut self, plugin: &str, key: &str) -> Option<serde_json::Value> {
    let entry = self.store.get_mut(plugin)?.get_mut(key)?;
    entry.counter = 0;
    Some(entry.value.clone())
  }

  pub fn has(&mut self, plugin: &str, key: &str) -> bool {
    match self.store.get_mut(plugin).and_then(|e| e.get_mut(key)) {
      Some(entry) => {
        entry.counter = 0;
        true
      }
      None => false,
    }
  }

  pub fn delete(&mut self, plugin: &str, key: &str) -> bool {
    self
      .store
      .get_mut(plugin)
      .map(|e| e.remove(key).is_some())
      .unwrap_or(false)
  }

  /// Drops entries whose access counter reached `expiry` and returns
  /// the surviving store.
  pub fn sweep(&mut self, expiry: u32) -> HashMap<String, HashMap<String, PluginCacheEntry>> {
    for entries in self.store.values_mut() {
      entries.retain(|_, entry| entry.counter < expiry);
    }
    self.store.retain(|_, entries| !entries.is_empty());
    self.store.clone()
  }
}
