//! Plugin hooks.
//!
//! The engine consumes five hooks: `resolve_id`, `load` and
//! `transform` are asynchronous and awaited by the loader;
//! `module_parsed` and `watch_change` are synchronous notifications
//! dispatched sequentially in plugin order. Hook failures are fatal
//! and attributed to the failing plugin.

use crate::cache::{BuildCache, PluginCache};
use crate::module::{ModuleInfo, ResolvedId};
use crate::prelude::*;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[async_trait]
/// A build plugin. Every hook has a no-op default.
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str;

  /// Maps a specifier to a resolution. The first plugin returning
  /// `Some` wins; `None` falls through to the next plugin and finally
  /// to the filesystem resolver.
  async fn resolve_id(
    &self,
    _specifier: &str,
    _importer: Option<&str>,
    _is_entry: bool,
  ) -> AnyResult<Option<ResolvedId>> {
    Ok(None)
  }

  /// Provides the source text of an id.
  async fn load(&self, _id: &str) -> AnyResult<Option<String>> {
    Ok(None)
  }

  /// Rewrites source text before parsing. Transforms chain in plugin
  /// order.
  async fn transform(&self, _code: &str, _id: &str) -> AnyResult<Option<String>> {
    Ok(None)
  }

  /// Notified after a module is parsed and scanned.
  fn module_parsed(&self, _info: &ModuleInfo) {}

  /// Notified when the host observes a watched file change.
  fn watch_change(&self, _id: &str) {}
}

/// Sequentially dispatches hooks over the configured plugins and owns
/// the plugin cache.
pub struct PluginDriver {
  plugins: Vec<Arc<dyn Plugin>>,
  cache: Mutex<PluginCache>,
}

impl std::fmt::Debug for PluginDriver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PluginDriver")
      .field(
        "plugins",
        &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
      )
      .finish()
  }
}

impl PluginDriver {
  pub fn new(plugins: Vec<Arc<dyn Plugin>>, cache: Option<&BuildCache>) -> Self {
    let cache = match cache {
      Some(cache) => PluginCache::from_cache(cache),
      None => PluginCache::new(),
    };
    PluginDriver {
      plugins,
      cache: Mutex::new(cache),
    }
  }

  fn attribute<T>(
    plugin: &dyn Plugin,
    hook: &'static str,
    result: AnyResult<T>,
  ) -> BuildResult<T> {
    result.map_err(|source| BuildError::Plugin {
      plugin: plugin.name().to_string(),
      hook,
      source,
    })
  }

  pub async fn resolve_id(
    &self,
    specifier: &str,
    importer: Option<&str>,
    is_entry: bool,
  ) -> BuildResult<Option<ResolvedId>> {
    for plugin in &self.plugins {
      let resolved = Self::attribute(
        plugin.as_ref(),
        "resolve_id",
        plugin.resolve_id(specifier, importer, is_entry).await,
      )?;
      if resolved.is_some() {
        return Ok(resolved);
      }
    }
    Ok(None)
  }

  pub async fn load(&self, id: &str) -> BuildResult<Option<String>> {
    for plugin in &self.plugins {
      let loaded =
        Self::attribute(plugin.as_ref(), "load", plugin.load(id).await)?;
      if loaded.is_some() {
        return Ok(loaded);
      }
    }
    Ok(None)
  }

  pub async fn transform(&self, code: String, id: &str) -> BuildResult<String> {
    let mut code = code;
    for plugin in &self.plugins {
      if let Some(transformed) = Self::attribute(
        plugin.as_ref(),
        "transform",
        plugin.transform(&code, id).await,
      )? {
        code = transformed;
      }
    }
    Ok(code)
  }

  pub fn module_parsed(&self, info: &ModuleInfo) {
    for plugin in &self.plugins {
      plugin.module_parsed(info);
    }
  }

  pub fn watch_change(&self, id: &str) {
    for plugin in &self.plugins {
      plugin.watch_change(id);
    }
  }

  pub fn cache(&self) -> &Mutex<PluginCache> {
    &self.cache
  }
}
