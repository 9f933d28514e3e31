//! Module loading.
//!
//! The loader drives the load-and-parse phase: a work queue of
//! specifiers, one spawned task per module id (resolve, load,
//! transform, parse, scan; every hook may suspend), and a
//! single-threaded collector loop that drains task results over a
//! channel and materialises records. All mutation of the module table
//! happens on the collector loop, which is what makes the
//! at-most-one-record-per-id invariant hold under concurrency.

use crate::cache::SerializedModule;
use crate::module::{
  ExternalModule, ModuleId, ModuleIdx, ModuleInfo, ModuleRecord, NormalModule,
  ResolvedId,
};
use crate::opts::{BundleOptions, ModuleContextOption, TreeshakeOptions};
use crate::plugin::PluginDriver;
use crate::prelude::*;

use std::sync::Arc;
use swc_atoms::Atom;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

// Re-export
pub use fs::*;
pub(crate) use task::*;

pub mod fs;
pub(crate) mod task;

#[cfg(test)]
mod fs_tests;

/// What a finished module task sends back to the collector loop.
pub(crate) enum Msg {
  Scanned(Box<ScanOutput>),
  Failed(BuildError),
}

/// The read-only context shared by every spawned task.
pub(crate) struct TaskCtx {
  pub plugin_driver: Arc<PluginDriver>,
  pub external: crate::opts::ExternalOption,
  pub treeshake: TreeshakeOptions,
  pub preserve_symlinks: bool,
  pub cached_modules: HashMap<ModuleId, SerializedModule>,
  pub cancel: CancellationToken,
  pub tx: UnboundedSender<Msg>,
}

/// Everything one task produces for one module id.
pub(crate) struct ScanOutput {
  pub id: ModuleId,
  pub original_code: String,
  pub code: String,
  pub ast: swc_ecma_ast::Module,
  pub scan: crate::ast::scan::ScanResult,
  /// Resolution per static source, same order as `scan.sources`.
  pub resolved: Vec<(Atom, ResolvedId)>,
  /// Resolution per dynamic import site, same order as
  /// `scan.dynamic_imports`.
  pub dynamic_resolved: Vec<Option<ResolvedId>>,
  pub from_cache: bool,
}

/// Work-queue driver owning the module table while loading runs.
pub(crate) struct ModuleLoader {
  ctx: Arc<TaskCtx>,
  rx: UnboundedReceiver<Msg>,
  /// Ids with a task spawned or finished; the at-most-one-load guard.
  intended: HashSet<ModuleId>,
  remaining: usize,
  pub modules: Vec<ModuleRecord>,
  pub module_by_id: HashMap<ModuleId, ModuleIdx>,
  pub watch_files: HashSet<ModuleId>,
  /// Side-effect overrides returned by resolve hooks, applied when the
  /// module materialises.
  pending_side_effects: HashMap<ModuleId, bool>,
  context: String,
  module_context: Option<ModuleContextOption>,
}

impl ModuleLoader {
  pub(crate) fn new(
    options: &BundleOptions,
    plugin_driver: Arc<PluginDriver>,
    cancel: CancellationToken,
  ) -> Self {
    let (tx, rx) = unbounded_channel();
    let cached_modules = options
      .cache
      .as_ref()
      .map(|cache| {
        cache
          .modules
          .iter()
          .map(|m| (m.id.clone(), m.clone()))
          .collect()
      })
      .unwrap_or_default();
    let ctx = Arc::new(TaskCtx {
      plugin_driver,
      external: options.external.clone(),
      treeshake: options.treeshake.clone(),
      preserve_symlinks: options.preserve_symlinks,
      cached_modules,
      cancel,
      tx,
    });
    ModuleLoader {
      ctx,
      rx,
      intended: HashSet::new(),
      remaining: 0,
      modules: vec![],
      module_by_id: HashMap::new(),
      watch_files: HashSet::new(),
      pending_side_effects: HashMap::new(),
      context: options.context.clone(),
      module_context: options.module_context.clone(),
    }
  }

  /// Resolves and loads the entry points, then drains the transitive
  /// import closure. Returns `(name, resolved id)` in declaration
  /// order.
  pub(crate) async fn add_entries(
    &mut self,
    unresolved: Vec<(Option<String>, String)>,
  ) -> BuildResult<Vec<(Option<String>, ModuleId)>> {
    let mut entries = vec![];
    for (name, specifier) in unresolved {
      let resolved = resolve_id(&self.ctx, &specifier, None, true).await?;
      if resolved.external {
        return Err(BuildError::UnresolvedEntry(specifier));
      }
      debug!("Resolved entry {:?} -> {:?}", specifier, resolved.id);
      self.spawn_load(&resolved.id, resolved.module_side_effects, None);
      entries.push((name, resolved.id));
    }
    self.drain().await?;
    Ok(entries)
  }

  /// Resolves and loads manual chunk seeds. External seeds cannot be
  /// grouped and are dropped.
  pub(crate) async fn add_manual_chunks(
    &mut self,
    groups: &[(String, Vec<String>)],
  ) -> BuildResult<Vec<(String, Vec<ModuleId>)>> {
    let mut resolved_groups = vec![];
    for (name, seeds) in groups {
      let mut resolved_seeds = vec![];
      for specifier in seeds {
        let resolved = resolve_id(&self.ctx, specifier, None, false).await?;
        if resolved.external {
          trace!("Dropped external manual chunk seed {:?}", specifier);
          continue;
        }
        self.spawn_load(&resolved.id, resolved.module_side_effects, None);
        resolved_seeds.push(resolved.id);
      }
      resolved_groups.push((name.clone(), resolved_seeds));
    }
    self.drain().await?;
    Ok(resolved_groups)
  }

  /// Hands the finished tables to the graph.
  pub(crate) fn into_tables(
    self,
  ) -> (
    Vec<ModuleRecord>,
    HashMap<ModuleId, ModuleIdx>,
    HashSet<ModuleId>,
  ) {
    (self.modules, self.module_by_id, self.watch_files)
  }

  fn spawn_load(
    &mut self,
    id: &ModuleId,
    side_effects: Option<bool>,
    importer: Option<&ModuleId>,
  ) {
    if let Some(v) = side_effects {
      self.pending_side_effects.insert(id.clone(), v);
    }
    if self.module_by_id.contains_key(id) || !self.intended.insert(id.clone()) {
      return;
    }
    self.remaining += 1;
    let task = ModuleTask {
      ctx: Arc::clone(&self.ctx),
      id: id.clone(),
      importer: importer.cloned(),
    };
    tokio::spawn(task.run());
  }

  async fn drain(&mut self) -> BuildResult<()> {
    let cancel = self.ctx.cancel.clone();
    while self.remaining > 0 {
      tokio::select! {
        _ = cancel.cancelled() => {
          return Err(BuildError::Cancelled);
        }
        msg = self.rx.recv() => match msg {
          Some(Msg::Scanned(output)) => self.materialize(*output)?,
          Some(Msg::Failed(e)) => return Err(e),
          None => break,
        },
      }
    }
    Ok(())
  }

  /// Turns one task result into a module record and enqueues its
  /// not-yet-seen dependencies. Runs on the collector loop only.
  fn materialize(&mut self, output: ScanOutput) -> BuildResult<()> {
    self.remaining -= 1;
    debug_assert!(!self.module_by_id.contains_key(&output.id));
    trace!(
      "Materialize module {:?} (cache hit: {})",
      output.id, output.from_cache
    );

    let context = self
      .module_context
      .as_ref()
      .and_then(|mc| mc.context_for(&output.id))
      .unwrap_or_else(|| self.context.clone());

    let idx = self.modules.len();
    let mut module = NormalModule::new(
      output.id.clone(),
      idx,
      output.original_code,
      output.code,
      output.ast,
      output.scan,
      context,
    );
    module.module_side_effects = self
      .pending_side_effects
      .remove(&output.id)
      .unwrap_or_else(|| {
        self
          .ctx
          .treeshake
          .module_side_effects
          .applies_to(&output.id, false)
      });

    let importer_id = output.id.clone();
    for (specifier, resolved) in output.resolved {
      if resolved.external {
        self.ensure_external(&resolved);
      } else {
        self.spawn_load(
          &resolved.id,
          resolved.module_side_effects,
          Some(&importer_id),
        );
      }
      module.resolved_ids.insert(specifier, resolved);
    }
    for (site, resolved) in
      module.dynamic_imports.iter_mut().zip(output.dynamic_resolved)
    {
      site.resolution = resolved;
    }
    let dynamic_externals: Vec<ResolvedId> = module
      .dynamic_imports
      .iter()
      .filter_map(|d| d.resolution.clone())
      .filter(|r| r.external)
      .collect();
    let dynamic_internals: Vec<ResolvedId> = module
      .dynamic_imports
      .iter()
      .filter_map(|d| d.resolution.clone())
      .filter(|r| !r.external)
      .collect();

    self.watch_files.insert(output.id.clone());
    self.module_by_id.insert(output.id.clone(), idx);
    self.modules.push(ModuleRecord::Normal(Box::new(module)));

    for resolved in dynamic_externals {
      self.ensure_external(&resolved);
    }
    for resolved in dynamic_internals {
      self.spawn_load(&resolved.id, resolved.module_side_effects, Some(&importer_id));
    }

    let info = self.module_info_of(idx);
    self.ctx.plugin_driver.module_parsed(&info);
    Ok(())
  }

  fn ensure_external(&mut self, resolved: &ResolvedId) -> ModuleIdx {
    if let Some(idx) = self.module_by_id.get(&resolved.id) {
      return *idx;
    }
    let idx = self.modules.len();
    let side_effects = resolved.module_side_effects.unwrap_or_else(|| {
      self
        .ctx
        .treeshake
        .module_side_effects
        .applies_to(&resolved.id, true)
    });
    self.module_by_id.insert(resolved.id.clone(), idx);
    self.modules.push(ModuleRecord::External(Box::new(
      ExternalModule::new(resolved.id.clone(), idx, side_effects),
    )));
    idx
  }

  fn module_info_of(&self, idx: ModuleIdx) -> ModuleInfo {
    self.modules[idx].info()
  }

  /// Fills `importers`/`dynamic_importers` reverse edges once loading
  /// has drained. Deterministic because it walks the table in
  /// materialisation order.
  pub(crate) fn finish_reverse_edges(&mut self) {
    let mut static_edges: Vec<(ModuleId, ModuleIdx)> = vec![];
    let mut dynamic_edges: Vec<(ModuleId, ModuleIdx)> = vec![];
    for record in &self.modules {
      let module = match record.as_normal() {
        Some(module) => module,
        None => continue,
      };
      for source in &module.sources {
        if let Some(resolved) = module.resolved_ids.get(source) {
          if let Some(target) = self.module_by_id.get(&resolved.id) {
            static_edges.push((module.id().clone(), *target));
          }
        }
      }
      for dynamic in &module.dynamic_imports {
        if let Some(resolved) = &dynamic.resolution {
          if let Some(target) = self.module_by_id.get(&resolved.id) {
            dynamic_edges.push((module.id().clone(), *target));
          }
        }
      }
    }
    for (importer, target) in static_edges {
      match &mut self.modules[target] {
        ModuleRecord::Normal(m) => m.importers.push(importer),
        ModuleRecord::External(m) => {
          m.dynamic_only = false;
          m.importers.push(importer);
        }
      }
    }
    for (importer, target) in dynamic_edges {
      match &mut self.modules[target] {
        ModuleRecord::Normal(m) => m.dynamic_importers.push(importer),
        ModuleRecord::External(m) => m.dynamic_importers.push(importer),
      }
    }
  }
}
