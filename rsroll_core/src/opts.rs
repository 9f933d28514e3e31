//! Bundle options.
//!
//! The typed form of every option the engine recognises. Parsing a
//! configuration file into this struct is the host's business.

use crate::cache::BuildCache;
use crate::diag::Warning;
use crate::plugin::Plugin;
use crate::prelude::*;

use std::sync::Arc;

#[derive(Debug, Clone)]
/// The `input` option: a single id, an ordered list, or named entries.
pub enum InputOption {
  Single(String),
  List(Vec<String>),
  /// `(name, id)` pairs, declaration order.
  Named(Vec<(String, String)>),
}

impl InputOption {
  /// Entries as `(name, unresolved id)` pairs, declaration order.
  pub fn unresolved_entries(&self) -> Vec<(Option<String>, String)> {
    match self {
      InputOption::Single(id) => vec![(None, id.clone())],
      InputOption::List(ids) => ids.iter().map(|id| (None, id.clone())).collect(),
      InputOption::Named(pairs) => pairs
        .iter()
        .map(|(name, id)| (Some(name.clone()), id.clone()))
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      InputOption::Single(id) => id.is_empty(),
      InputOption::List(ids) => ids.is_empty(),
      InputOption::Named(pairs) => pairs.is_empty(),
    }
  }
}

impl Default for InputOption {
  fn default() -> Self {
    InputOption::List(vec![])
  }
}

/// Predicate form of the `external` option:
/// `(specifier, importer, is_resolved)`.
pub type ExternalFn = Arc<dyn Fn(&str, Option<&str>, bool) -> bool + Send + Sync>;

#[derive(Clone, Default)]
/// Classifies specifiers as external.
pub struct ExternalOption {
  pub ids: Vec<String>,
  pub patterns: Vec<regex::Regex>,
  pub predicate: Option<ExternalFn>,
}

impl ExternalOption {
  pub fn ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
    ExternalOption {
      ids: ids.into_iter().map(Into::into).collect(),
      ..Default::default()
    }
  }

  pub fn is_external(
    &self,
    specifier: &str,
    importer: Option<&str>,
    is_resolved: bool,
  ) -> bool {
    if self.ids.iter().any(|id| id == specifier) {
      return true;
    }
    if self.patterns.iter().any(|p| p.is_match(specifier)) {
      return true;
    }
    match &self.predicate {
      Some(predicate) => predicate(specifier, importer, is_resolved),
      None => false,
    }
  }
}

impl std::fmt::Debug for ExternalOption {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExternalOption")
      .field("ids", &self.ids)
      .field("patterns", &self.patterns)
      .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
      .finish()
  }
}

#[derive(Clone, Default)]
/// Default liveness of a module's top-level side effects.
pub enum ModuleSideEffectsOption {
  /// Every module may have side effects.
  #[default]
  Always,
  /// External modules are assumed side-effect free.
  NoExternal,
  /// Per-id predicate: `(id, is_external)`.
  Predicate(Arc<dyn Fn(&str, bool) -> bool + Send + Sync>),
}

impl ModuleSideEffectsOption {
  pub fn applies_to(&self, id: &str, external: bool) -> bool {
    match self {
      ModuleSideEffectsOption::Always => true,
      ModuleSideEffectsOption::NoExternal => !external,
      ModuleSideEffectsOption::Predicate(predicate) => predicate(id, external),
    }
  }
}

impl std::fmt::Debug for ModuleSideEffectsOption {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ModuleSideEffectsOption::Always => write!(f, "Always"),
      ModuleSideEffectsOption::NoExternal => write!(f, "NoExternal"),
      ModuleSideEffectsOption::Predicate(_) => write!(f, "Predicate(<fn>)"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How an entry chunk must surface the entry module's exports.
pub enum PreserveEntrySignatures {
  /// The entry's exports need not survive.
  None,
  /// Exactly the entry's exports, nothing more.
  #[default]
  Strict,
  /// The entry's exports must survive, extras are acceptable.
  AllowExtension,
}

#[derive(Debug, Clone)]
/// Tree-shaking toggles.
pub struct TreeshakeOptions {
  pub enabled: bool,
  /// Honour `#__PURE__` annotations.
  pub annotations: bool,
  pub module_side_effects: ModuleSideEffectsOption,
  /// Whether reading an unknown property may be observed.
  pub property_read_side_effects: bool,
  /// Whether a `try` block disables value analysis inside it.
  pub try_catch_deoptimization: bool,
  /// Whether reading an unknown global may be observed.
  pub unknown_global_side_effects: bool,
  /// Deprecated; `true` maps to
  /// [`ModuleSideEffectsOption::NoExternal`].
  pub pure_external_modules: Option<bool>,
}

impl Default for TreeshakeOptions {
  fn default() -> Self {
    TreeshakeOptions {
      enabled: true,
      annotations: true,
      module_side_effects: ModuleSideEffectsOption::Always,
      property_read_side_effects: true,
      try_catch_deoptimization: true,
      unknown_global_side_effects: true,
      pure_external_modules: None,
    }
  }
}

impl TreeshakeOptions {
  pub fn disabled() -> Self {
    TreeshakeOptions {
      enabled: false,
      ..Default::default()
    }
  }
}

impl From<bool> for TreeshakeOptions {
  fn from(enabled: bool) -> Self {
    if enabled {
      TreeshakeOptions::default()
    } else {
      TreeshakeOptions::disabled()
    }
  }
}

#[derive(Clone)]
/// The `moduleContext` option.
pub enum ModuleContextOption {
  Map(HashMap<String, String>),
  Func(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
}

impl ModuleContextOption {
  pub fn context_for(&self, id: &str) -> Option<String> {
    match self {
      ModuleContextOption::Map(map) => map.get(id).cloned(),
      ModuleContextOption::Func(func) => func(id),
    }
  }
}

impl std::fmt::Debug for ModuleContextOption {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ModuleContextOption::Map(map) => f.debug_tuple("Map").field(map).finish(),
      ModuleContextOption::Func(_) => write!(f, "Func(<fn>)"),
    }
  }
}

#[derive(Clone)]
/// The `manualChunks` option.
pub enum ManualChunksOption {
  /// `(chunk name, seed ids)`, declaration order.
  Map(Vec<(String, Vec<String>)>),
  /// Classifier invoked per module id.
  Func(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
}

impl std::fmt::Debug for ManualChunksOption {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ManualChunksOption::Map(map) => f.debug_tuple("Map").field(map).finish(),
      ManualChunksOption::Func(_) => write!(f, "Func(<fn>)"),
    }
  }
}

/// Receiver for warnings.
pub type WarningHandler = Arc<dyn Fn(&Warning) + Send + Sync>;

#[derive(Clone)]
/// Everything `Graph::build` consumes.
pub struct BundleOptions {
  pub input: InputOption,
  pub plugins: Vec<Arc<dyn Plugin>>,
  pub external: ExternalOption,
  /// Default top-level `this` identifier.
  pub context: String,
  pub module_context: Option<ModuleContextOption>,
  pub preserve_symlinks: bool,
  pub preserve_modules: bool,
  pub preserve_entry_signatures: PreserveEntrySignatures,
  pub shim_missing_exports: bool,
  pub treeshake: TreeshakeOptions,
  pub manual_chunks: Option<ManualChunksOption>,
  pub inline_dynamic_imports: bool,
  pub cache: Option<BuildCache>,
  /// Accesses a plugin cache entry survives without being touched.
  pub experimental_cache_expiry: u32,
  pub strict_deprecations: bool,
  pub onwarn: Option<WarningHandler>,
  /// Forwarded to the parser host untouched.
  pub parser_options: Option<serde_json::Value>,
}

impl Default for BundleOptions {
  fn default() -> Self {
    BundleOptions {
      input: InputOption::default(),
      plugins: vec![],
      external: ExternalOption::default(),
      context: "undefined".to_string(),
      module_context: None,
      preserve_symlinks: false,
      preserve_modules: false,
      preserve_entry_signatures: PreserveEntrySignatures::Strict,
      shim_missing_exports: false,
      treeshake: TreeshakeOptions::default(),
      manual_chunks: None,
      inline_dynamic_imports: false,
      cache: None,
      experimental_cache_expiry: 10,
      strict_deprecations: false,
      onwarn: None,
      parser_options: None,
    }
  }
}

impl std::fmt::Debug for BundleOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BundleOptions")
      .field("input", &self.input)
      .field(
        "plugins",
        &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
      )
      .field("external", &self.external)
      .field("context", &self.context)
      .field("preserve_symlinks", &self.preserve_symlinks)
      .field("preserve_modules", &self.preserve_modules)
      .field("preserve_entry_signatures", &self.preserve_entry_signatures)
      .field("shim_missing_exports", &self.shim_missing_exports)
      .field("treeshake", &self.treeshake)
      .field("manual_chunks", &self.manual_chunks)
      .field("inline_dynamic_imports", &self.inline_dynamic_imports)
      .field("strict_deprecations", &self.strict_deprecations)
      .finish()
  }
}

impl BundleOptions {
  /// Single-entry shorthand.
  pub fn with_input(id: impl Into<String>) -> Self {
    BundleOptions {
      input: InputOption::Single(id.into()),
      ..Default::default()
    }
  }

  /// The effective context for one module id.
  pub fn context_for(&self, id: &str) -> String {
    self
      .module_context
      .as_ref()
      .and_then(|mc| mc.context_for(id))
      .unwrap_or_else(|| self.context.clone())
  }
}
