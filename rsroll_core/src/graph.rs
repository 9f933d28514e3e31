//! The build orchestrator.
//!
//! [`Graph`] owns the module table, the global scope, the
//! deoptimization tracker and the plugin driver, and drives the four
//! phases: load-and-parse, link, include, chunk. A build is one
//! future; cancelling its token makes the loader stop accepting work
//! and the build resolve to [`BuildError::Cancelled`] without a
//! partial chunk list.

use crate::ast::literal::PathTracker;
use crate::cache::{BuildCache, SerializedModule};
use crate::chunk::{Chunk, generate_chunks};
use crate::diag::Warning;
use crate::include::include;
use crate::link::link;
use crate::loader::ModuleLoader;
use crate::module::{ModuleId, ModuleIdx, ModuleInfo, ModuleRecord};
use crate::opts::{BundleOptions, ManualChunksOption, ModuleSideEffectsOption};
use crate::plugin::PluginDriver;
use crate::prelude::*;
use crate::scope::GlobalScope;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where in the pipeline a build currently is.
pub enum BuildPhase {
  LoadAndParse,
  Analyse,
  Generate,
}

#[derive(Debug, Clone)]
/// One user entry after resolution.
pub struct EntryPoint {
  pub name: Option<String>,
  pub idx: ModuleIdx,
}

/// The build graph and its orchestrator.
pub struct Graph {
  pub(crate) options: BundleOptions,
  plugin_driver: Arc<PluginDriver>,
  pub(crate) modules: Vec<ModuleRecord>,
  pub(crate) module_by_id: HashMap<ModuleId, ModuleIdx>,
  /// Normal modules in execution order, valid after linking.
  pub(crate) sorted_modules: Vec<ModuleIdx>,
  pub(crate) entries: Vec<EntryPoint>,
  phase: BuildPhase,
  pub(crate) global_scope: GlobalScope,
  pub(crate) deopt_tracker: PathTracker,
  watch_files: HashSet<ModuleId>,
  cancel: CancellationToken,
}

impl std::fmt::Debug for Graph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Graph")
      .field("phase", &self.phase)
      .field("modules", &self.modules.len())
      .field("entries", &self.entries.len())
      .finish()
  }
}

impl Graph {
  /// Normalises the options (deprecated settings included) and builds
  /// an empty graph. Under `strict_deprecations` a deprecated option
  /// is fatal.
  pub fn new(mut options: BundleOptions) -> BuildResult<Self> {
    if options.treeshake.pure_external_modules == Some(true) {
      crate::diag::warn_deprecation(
        "The \"treeshake.pure_external_modules\" option is deprecated. \
         Use \"treeshake.module_side_effects: 'no-external'\" instead.",
        options.strict_deprecations,
        options.onwarn.as_ref(),
      )?;
      options.treeshake.module_side_effects = ModuleSideEffectsOption::NoExternal;
    }

    let plugin_driver = Arc::new(PluginDriver::new(
      options.plugins.clone(),
      options.cache.as_ref(),
    ));
    Ok(Graph {
      options,
      plugin_driver,
      modules: vec![],
      module_by_id: HashMap::new(),
      sorted_modules: vec![],
      entries: vec![],
      phase: BuildPhase::LoadAndParse,
      global_scope: GlobalScope::new(),
      deopt_tracker: PathTracker::new(),
      watch_files: HashSet::new(),
      cancel: CancellationToken::new(),
    })
  }

  /// Token that cancels the build when triggered.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn phase(&self) -> BuildPhase {
    self.phase
  }

  /// Runs the full pipeline and returns the chunk descriptors,
  /// regular chunks first, facades after.
  pub async fn build(&mut self) -> BuildResult<Vec<Chunk>> {
    let unresolved = self.options.input.unresolved_entries();
    if unresolved.is_empty() {
      return Err(BuildError::MissingEntries);
    }
    {
      let mut seen = HashSet::new();
      for (name, _) in unresolved.iter().filter(|(n, _)| n.is_some()) {
        let name = name.clone().expect("named entry");
        if !seen.insert(name.clone()) {
          return Err(BuildError::DuplicateEntryName(name));
        }
      }
    }

    self.phase = BuildPhase::LoadAndParse;
    debug!("Build phase: LOAD_AND_PARSE");
    let mut loader = ModuleLoader::new(
      &self.options,
      Arc::clone(&self.plugin_driver),
      self.cancel.clone(),
    );
    let entries = loader.add_entries(unresolved).await?;
    let manual_ids = match &self.options.manual_chunks {
      Some(ManualChunksOption::Map(map)) => loader.add_manual_chunks(map).await?,
      _ => vec![],
    };
    loader.finish_reverse_edges();
    let (modules, module_by_id, watch_files) = loader.into_tables();
    self.modules = modules;
    self.module_by_id = module_by_id;
    self.watch_files = watch_files;

    self.entries = entries
      .into_iter()
      .filter_map(|(name, id)| {
        self
          .module_by_id
          .get(&id)
          .map(|&idx| EntryPoint { name, idx })
      })
      .collect();
    if self.entries.is_empty() {
      return Err(BuildError::MissingEntries);
    }
    let preserve = self.options.preserve_entry_signatures;
    for entry in &self.entries {
      if let Some(module) = self.modules[entry.idx].as_normal_mut() {
        module.is_entry = true;
        module.preserve_signature = preserve;
      }
    }

    self.phase = BuildPhase::Analyse;
    debug!("Build phase: ANALYSE");
    link(self)?;
    include(self);

    let manual_groups: Vec<(String, Vec<ModuleIdx>)> = manual_ids
      .into_iter()
      .map(|(name, ids)| {
        let idxs = ids
          .iter()
          .filter_map(|id| self.module_by_id.get(id).copied())
          .collect();
        (name, idxs)
      })
      .collect();
    let inline_dynamic = self.options.inline_dynamic_imports;
    let chunks = generate_chunks(self, manual_groups, inline_dynamic);

    self.phase = BuildPhase::Generate;
    debug!("Build phase: GENERATE, {} chunks", chunks.len());
    Ok(chunks)
  }

  /// Read-only projection of one record for plugins. Unknown ids are
  /// an error, not a `None`.
  pub fn module_info(&self, id: &str) -> BuildResult<ModuleInfo> {
    match self.module_by_id.get(id) {
      Some(&idx) => Ok(self.modules[idx].info()),
      None => Err(BuildError::UnknownModule(id.to_string())),
    }
  }

  /// Every id the build read from disk (or a plugin provided).
  pub fn watch_files(&self) -> &HashSet<ModuleId> {
    &self.watch_files
  }

  /// Forwards a watched-file change to the plugins, in plugin order.
  pub fn watch_change(&self, id: &str) {
    self.plugin_driver.watch_change(id);
  }

  /// Serialises the module table and sweeps the plugin cache: entries
  /// whose access counter reached `experimental_cache_expiry` are
  /// evicted.
  pub fn cache_snapshot(&mut self) -> BuildCache {
    let modules = self
      .modules
      .iter()
      .filter_map(|record| record.as_normal())
      .map(|module| SerializedModule {
        id: module.id().clone(),
        original_code: module.original_code.clone(),
        code: module.code.clone(),
        resolved_ids: module
          .sources
          .iter()
          .filter_map(|s| {
            module
              .resolved_ids
              .get(s)
              .map(|r| (s.to_string(), r.clone()))
          })
          .collect(),
        dependencies: module
          .sources
          .iter()
          .filter_map(|s| module.resolved_ids.get(s))
          .map(|r| r.id.clone())
          .collect(),
        reassigned_names: module
          .variables
          .iter()
          .filter(|(_, v)| v.reassigned())
          .map(|(_, v)| v.name().to_string())
          .collect(),
        module_side_effects: module.module_side_effects,
      })
      .collect();

    let plugins = self
      .plugin_driver
      .cache()
      .lock()
      .expect("plugin cache lock")
      .sweep(self.options.experimental_cache_expiry);

    BuildCache { modules, plugins }
  }

  /// Routes one warning to the configured handler.
  pub(crate) fn warn(&self, warning: Warning) {
    match &self.options.onwarn {
      Some(handler) => handler(&warning),
      None => warn!("{warning}"),
    }
  }
}
