//! Normal (loaded and parsed) modules.

use crate::ast::scan::{DynamicImportSite, ScanResult, StatementPart};
use crate::module::{
  ExportDescription, ImportDescription, ModuleId, ModuleIdx, ResolvedId,
};
use crate::opts::PreserveEntrySignatures;
use crate::prelude::*;
use crate::scope::ScopeTree;
use crate::variable::{VarId, Variable, VariableKind, VariableTable};

use swc_atoms::Atom;

#[derive(Debug)]
/// One `import(...)` site with its resolution, if the argument was a
/// static string.
pub struct DynamicImport {
  pub site: DynamicImportSite,
  pub resolution: Option<ResolvedId>,
}

#[derive(Debug)]
/// An internal source unit.
pub struct NormalModule {
  id: ModuleId,
  idx: ModuleIdx,
  /// Source text as loaded, before `transform` hooks.
  pub original_code: String,
  /// Source text the AST was parsed from.
  pub code: String,
  /// Parsed AST root, consumed by downstream emitters.
  pub ast: swc_ecma_ast::Module,
  pub scopes: ScopeTree,
  pub variables: VariableTable,
  pub parts: Vec<StatementPart>,
  /// Static import/re-export specifiers in AST order.
  pub sources: Vec<Atom>,
  pub import_descriptions: HashMap<Atom, ImportDescription>,
  /// Import locals in declaration order.
  pub import_order: Vec<Atom>,
  pub export_descriptions: HashMap<Atom, ExportDescription>,
  pub export_order: Vec<Atom>,
  pub star_sources: Vec<Atom>,
  pub dynamic_imports: Vec<DynamicImport>,
  /// Specifier to resolution, filled by the loader.
  pub resolved_ids: HashMap<Atom, ResolvedId>,
  pub is_entry: bool,
  pub is_executed: bool,
  pub is_included: bool,
  pub module_side_effects: bool,
  pub preserve_signature: PreserveEntrySignatures,
  pub importers: Vec<ModuleId>,
  pub dynamic_importers: Vec<ModuleId>,
  pub exec_order: u32,
  /// Top-level `this` identifier.
  pub context: String,
  namespace_var: Option<VarId>,
}

impl NormalModule {
  pub fn new(
    id: ModuleId,
    idx: ModuleIdx,
    original_code: String,
    code: String,
    ast: swc_ecma_ast::Module,
    scan: ScanResult,
    context: String,
  ) -> Self {
    let dynamic_imports = scan
      .dynamic_imports
      .into_iter()
      .map(|site| DynamicImport {
        site,
        resolution: None,
      })
      .collect();
    NormalModule {
      id,
      idx,
      original_code,
      code,
      ast,
      scopes: scan.scopes,
      variables: scan.variables,
      parts: scan.parts,
      sources: scan.sources,
      import_descriptions: scan.import_descriptions,
      import_order: scan.import_order,
      export_descriptions: scan.export_descriptions,
      export_order: scan.export_order,
      star_sources: scan.star_sources,
      dynamic_imports,
      resolved_ids: HashMap::new(),
      is_entry: false,
      is_executed: false,
      is_included: false,
      module_side_effects: true,
      preserve_signature: PreserveEntrySignatures::Strict,
      importers: vec![],
      dynamic_importers: vec![],
      exec_order: u32::MAX,
      context,
      namespace_var: None,
    }
  }

  pub fn id(&self) -> &ModuleId {
    &self.id
  }

  pub fn idx(&self) -> ModuleIdx {
    self.idx
  }

  /// Names this module exports itself, declaration order. Star
  /// re-exports contribute at resolution time, not here.
  pub fn exported_names(&self) -> &[Atom] {
    &self.export_order
  }

  pub fn namespace_var(&self) -> Option<VarId> {
    self.namespace_var
  }

  /// The synthetic object of all exports, created on first use.
  pub fn namespace_variable(&mut self) -> VarId {
    match self.namespace_var {
      Some(var) => var,
      None => {
        let var = self.variables.alloc(Variable::new(
          namespace_name(&self.id),
          VariableKind::Namespace,
          ScopeTree::MODULE,
          None,
        ));
        self.namespace_var = Some(var);
        var
      }
    }
  }

  /// The resolution of a static source specifier.
  pub fn resolution_of(&self, source: &Atom) -> Option<&ResolvedId> {
    self.resolved_ids.get(source)
  }
}

/// A valid identifier derived from the file stem, for the namespace
/// object's internal name.
fn namespace_name(id: &str) -> Atom {
  let stem = std::path::Path::new(id)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("namespace");
  let mut name = String::with_capacity(stem.len());
  for (i, c) in stem.chars().enumerate() {
    if c.is_ascii_alphabetic() || c == '_' || c == '$' || (i > 0 && c.is_ascii_digit()) {
      name.push(c);
    } else {
      name.push('_');
    }
  }
  if name.is_empty() {
    name.push_str("namespace");
  }
  Atom::from(name)
}
