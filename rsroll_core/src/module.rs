//! Module records.
//!
//! Every id a build touches materialises as exactly one record: a
//! [`NormalModule`] that was loaded, parsed and scanned, or an
//! [`ExternalModule`] leaf that is left to the host environment.
//! Records are created by the loader and live until the end of the
//! build; the linker and includer only mutate them.

use crate::variable::VarId;

use swc_atoms::Atom;

// Re-export
pub use external_module::*;
pub use normal_module::*;

pub mod external_module;
pub mod normal_module;

/// Module id: an absolutised path for normal modules, the untouched
/// specifier for external ones.
pub type ModuleId = String;

/// Index of a record in the graph's module table.
pub type ModuleIdx = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
/// What an import binds from the producing module.
pub enum ImportName {
  /// A named export.
  Name(Atom),
  /// The default export.
  Default,
  /// The whole namespace object (`import * as ns`).
  Namespace,
}

#[derive(Debug, Clone)]
/// One entry of a module's import table, keyed by the local name.
pub struct ImportDescription {
  /// The specifier as written in source.
  pub source: Atom,
  pub name: ImportName,
  /// Producing record, attached by the linker.
  pub module: Option<ModuleIdx>,
  /// The exact variable this import binds to, attached by the linker.
  pub bound: Option<(ModuleIdx, VarId)>,
  /// Offset of the import site in the source text.
  pub span_lo: u32,
}

#[derive(Debug, Clone)]
/// One entry of a module's export table, keyed by the exported name.
pub struct ExportDescription {
  /// Local binding the export points at, if it is not a re-export.
  pub local_name: Option<Atom>,
  /// Resolved at scan time for declaration-bound exports, at link time
  /// for export lists.
  pub local_var: Option<VarId>,
  /// Source specifier for re-exports.
  pub source: Option<Atom>,
  /// What the re-export takes from `source`.
  pub imported: Option<ImportName>,
  pub span_lo: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Outcome of resolving one specifier.
pub struct ResolvedId {
  pub id: ModuleId,
  pub external: bool,
  /// Per-module side-effect override returned by a resolve hook.
  pub module_side_effects: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A statement reference after link-time binding.
pub enum BoundRef {
  /// A variable of the owning module.
  Own(VarId),
  /// A variable of another record (normal or external).
  Foreign(ModuleIdx, VarId),
  /// An unresolved global name.
  Global(Atom),
}

#[derive(Debug)]
/// A normal or external record, the graph's table element.
pub enum ModuleRecord {
  Normal(Box<NormalModule>),
  External(Box<ExternalModule>),
}

impl ModuleRecord {
  pub fn id(&self) -> &ModuleId {
    match self {
      ModuleRecord::Normal(m) => m.id(),
      ModuleRecord::External(m) => m.id(),
    }
  }

  pub fn idx(&self) -> ModuleIdx {
    match self {
      ModuleRecord::Normal(m) => m.idx(),
      ModuleRecord::External(m) => m.idx(),
    }
  }

  pub fn is_external(&self) -> bool {
    matches!(self, ModuleRecord::External(_))
  }

  pub fn as_normal(&self) -> Option<&NormalModule> {
    match self {
      ModuleRecord::Normal(m) => Some(m),
      ModuleRecord::External(_) => None,
    }
  }

  pub fn as_normal_mut(&mut self) -> Option<&mut NormalModule> {
    match self {
      ModuleRecord::Normal(m) => Some(m),
      ModuleRecord::External(_) => None,
    }
  }

  pub fn as_external(&self) -> Option<&ExternalModule> {
    match self {
      ModuleRecord::External(m) => Some(m),
      ModuleRecord::Normal(_) => None,
    }
  }

  pub fn as_external_mut(&mut self) -> Option<&mut ExternalModule> {
    match self {
      ModuleRecord::External(m) => Some(m),
      ModuleRecord::Normal(_) => None,
    }
  }

  /// The read-only projection handed to plugins.
  pub fn info(&self) -> ModuleInfo {
    match self {
      ModuleRecord::Normal(module) => ModuleInfo {
        id: module.id().clone(),
        is_entry: module.is_entry,
        is_external: false,
        importers: module.importers.clone(),
        dynamic_importers: module.dynamic_importers.clone(),
        imported_ids: module
          .sources
          .iter()
          .filter_map(|s| module.resolved_ids.get(s))
          .map(|r| r.id.clone())
          .collect(),
        dynamically_imported_ids: module
          .dynamic_imports
          .iter()
          .filter_map(|d| d.resolution.as_ref())
          .map(|r| r.id.clone())
          .collect(),
        module_side_effects: module.module_side_effects,
        code: Some(module.code.clone()),
      },
      ModuleRecord::External(module) => ModuleInfo {
        id: module.id().clone(),
        is_entry: false,
        is_external: true,
        importers: module.importers.clone(),
        dynamic_importers: module.dynamic_importers.clone(),
        imported_ids: vec![],
        dynamically_imported_ids: vec![],
        module_side_effects: module.module_side_effects,
        code: None,
      },
    }
  }
}

#[derive(Debug, Clone)]
/// Read-only projection of a record handed to plugins.
pub struct ModuleInfo {
  pub id: ModuleId,
  pub is_entry: bool,
  pub is_external: bool,
  pub importers: Vec<ModuleId>,
  pub dynamic_importers: Vec<ModuleId>,
  pub imported_ids: Vec<ModuleId>,
  pub dynamically_imported_ids: Vec<ModuleId>,
  pub module_side_effects: bool,
  /// Transformed source, absent for external modules.
  pub code: Option<String>,
}
