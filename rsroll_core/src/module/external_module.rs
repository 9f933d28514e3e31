//! External module leaves.

use crate::module::{ModuleId, ModuleIdx};
use crate::prelude::*;
use crate::scope::ScopeTree;
use crate::variable::{VarId, Variable, VariableKind, VariableTable};

use swc_atoms::Atom;

/// Internal name of the namespace binding of an external module.
pub const EXTERNAL_NAMESPACE: &str = "*";

#[derive(Debug)]
/// A declared-external leaf: never loaded, its bindings are left to
/// the host environment.
pub struct ExternalModule {
  id: ModuleId,
  idx: ModuleIdx,
  pub module_side_effects: bool,
  /// One [`VariableKind::External`] record per imported name.
  pub variables: VariableTable,
  by_name: HashMap<Atom, VarId>,
  /// Reached through dynamic imports only.
  pub dynamic_only: bool,
  pub importers: Vec<ModuleId>,
  pub dynamic_importers: Vec<ModuleId>,
}

impl ExternalModule {
  pub fn new(id: ModuleId, idx: ModuleIdx, module_side_effects: bool) -> Self {
    ExternalModule {
      id,
      idx,
      module_side_effects,
      variables: VariableTable::new(),
      by_name: HashMap::new(),
      dynamic_only: true,
      importers: vec![],
      dynamic_importers: vec![],
    }
  }

  pub fn id(&self) -> &ModuleId {
    &self.id
  }

  pub fn idx(&self) -> ModuleIdx {
    self.idx
  }

  /// The binding for an imported name, created on first use.
  pub fn variable(&mut self, name: &Atom) -> VarId {
    match self.by_name.get(name) {
      Some(var) => *var,
      None => {
        let var = self.variables.alloc(Variable::new(
          name.clone(),
          VariableKind::External,
          ScopeTree::MODULE,
          None,
        ));
        self.by_name.insert(name.clone(), var);
        var
      }
    }
  }

  /// The namespace binding (`import * as ns`), created on first use.
  pub fn namespace_variable(&mut self) -> VarId {
    self.variable(&Atom::from(EXTERNAL_NAMESPACE))
  }

  /// Imported names and whether included code referenced them, in
  /// first-use order.
  pub fn used_names(&self) -> impl Iterator<Item = (&Atom, bool)> {
    self.variables.iter().map(|(_, v)| (v.name(), v.included()))
  }
}
