//! Variable records.
//!
//! Every named binding the engine tracks lives in an arena owned by its
//! module and is addressed by [`VarId`]. Inclusion state is mutated by
//! the includer and is monotone: once a variable is included it stays
//! included for the rest of the build.

use crate::scope::ScopeId;

use swc_atoms::Atom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Index of a variable in its module's [`VariableTable`].
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What kind of binding a variable is.
pub enum VariableKind {
  /// A binding declared by source code.
  Local,
  /// The binding produced by `export default`.
  ExportDefault,
  /// The synthetic object of all exports of a module.
  Namespace,
  /// A name imported from a declared-external module.
  External,
  /// Substitute binding for a missing export.
  Undefined,
}

#[derive(Debug, Clone)]
/// A tracked binding.
pub struct Variable {
  name: Atom,
  kind: VariableKind,
  scope: ScopeId,
  /// Index of the top-level statement that declares it, if any.
  declared_part: Option<usize>,
  included: bool,
  reassigned: bool,
}

impl Variable {
  pub fn new(
    name: Atom,
    kind: VariableKind,
    scope: ScopeId,
    declared_part: Option<usize>,
  ) -> Self {
    Variable {
      name,
      kind,
      scope,
      declared_part,
      included: false,
      reassigned: false,
    }
  }

  pub fn name(&self) -> &Atom {
    &self.name
  }

  pub fn kind(&self) -> VariableKind {
    self.kind
  }

  pub fn scope(&self) -> ScopeId {
    self.scope
  }

  pub fn declared_part(&self) -> Option<usize> {
    self.declared_part
  }

  pub fn included(&self) -> bool {
    self.included
  }

  pub fn include(&mut self) {
    self.included = true;
  }

  pub fn reassigned(&self) -> bool {
    self.reassigned
  }

  pub fn set_reassigned(&mut self) {
    self.reassigned = true;
  }
}

#[derive(Debug, Default)]
/// Arena of the variables owned by one module.
pub struct VariableTable {
  vars: Vec<Variable>,
}

impl VariableTable {
  pub fn new() -> Self {
    VariableTable { vars: vec![] }
  }

  pub fn alloc(&mut self, var: Variable) -> VarId {
    let id = VarId(self.vars.len() as u32);
    self.vars.push(var);
    id
  }

  pub fn get(&self, id: VarId) -> &Variable {
    &self.vars[id.0 as usize]
  }

  pub fn get_mut(&mut self, id: VarId) -> &mut Variable {
    &mut self.vars[id.0 as usize]
  }

  pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
    self
      .vars
      .iter()
      .enumerate()
      .map(|(i, v)| (VarId(i as u32), v))
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}
