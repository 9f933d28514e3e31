//! Lexical scopes.
//!
//! Scopes and variables form a cyclic object graph (child scopes point
//! back at parents, variables point at declaration sites), so both are
//! kept in per-module arenas and referenced by integer ids. The single
//! [`GlobalScope`] is owned by the graph and outlives every module of a
//! build.

use crate::prelude::*;
use crate::variable::VarId;

use once_cell::sync::Lazy;
use swc_atoms::Atom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Index of a scope in its module's [`ScopeTree`].
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What kind of lexical environment a scope is.
pub enum ScopeKind {
  /// The top-level scope of one module.
  Module,
  /// Function bodies, arrow bodies, class member bodies.
  Function,
  /// Blocks, catch clauses, `for` heads.
  Block,
}

#[derive(Debug)]
/// One lexical environment mapping names to variables, with a
/// non-owning back-reference to its parent.
pub struct Scope {
  kind: ScopeKind,
  parent: Option<ScopeId>,
  names: HashMap<Atom, VarId>,
}

impl Scope {
  pub fn kind(&self) -> ScopeKind {
    self.kind
  }

  pub fn parent(&self) -> Option<ScopeId> {
    self.parent
  }

  pub fn names(&self) -> &HashMap<Atom, VarId> {
    &self.names
  }
}

#[derive(Debug)]
/// Scope arena rooted at the module scope.
pub struct ScopeTree {
  scopes: Vec<Scope>,
}

impl ScopeTree {
  /// The module scope is always the first arena entry.
  pub const MODULE: ScopeId = ScopeId(0);

  pub fn new() -> Self {
    ScopeTree {
      scopes: vec![Scope {
        kind: ScopeKind::Module,
        parent: None,
        names: HashMap::new(),
      }],
    }
  }

  /// Creates a child scope and returns its id.
  pub fn push(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
    debug_assert!((parent.0 as usize) < self.scopes.len());
    let id = ScopeId(self.scopes.len() as u32);
    self.scopes.push(Scope {
      kind,
      parent: Some(parent),
      names: HashMap::new(),
    });
    id
  }

  pub fn get(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0 as usize]
  }

  /// Binds `name` in `scope`. Re-declaration keeps the first binding,
  /// matching `var` semantics.
  pub fn declare(&mut self, scope: ScopeId, name: Atom, var: VarId) {
    self.scopes[scope.0 as usize].names.entry(name).or_insert(var);
  }

  /// Looks `name` up through the scope chain starting at `from`.
  pub fn lookup(&self, from: ScopeId, name: &Atom) -> Option<VarId> {
    let mut current = Some(from);
    while let Some(id) = current {
      let scope = &self.scopes[id.0 as usize];
      if let Some(var) = scope.names.get(name) {
        return Some(*var);
      }
      current = scope.parent;
    }
    None
  }

  /// The nearest enclosing function or module scope of `from`.
  pub fn hoist_target(&self, from: ScopeId) -> ScopeId {
    let mut current = from;
    loop {
      let scope = &self.scopes[current.0 as usize];
      match scope.kind {
        ScopeKind::Module | ScopeKind::Function => return current,
        ScopeKind::Block => {
          current = scope.parent.expect("block scope has a parent");
        }
      }
    }
  }

  pub fn len(&self) -> usize {
    self.scopes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scopes.is_empty()
  }
}

impl Default for ScopeTree {
  fn default() -> Self {
    ScopeTree::new()
  }
}

/// Globals whose plain reads never throw and carry no side effects.
fn pure_globals() -> &'static HashSet<&'static str> {
  static VALUE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from_iter([
      "Array",
      "ArrayBuffer",
      "Boolean",
      "DataView",
      "Date",
      "Error",
      "Float32Array",
      "Float64Array",
      "Function",
      "Infinity",
      "Int16Array",
      "Int32Array",
      "Int8Array",
      "JSON",
      "Map",
      "Math",
      "NaN",
      "Number",
      "Object",
      "Promise",
      "Proxy",
      "RangeError",
      "ReferenceError",
      "Reflect",
      "RegExp",
      "Set",
      "String",
      "Symbol",
      "SyntaxError",
      "TypeError",
      "URIError",
      "Uint16Array",
      "Uint32Array",
      "Uint8Array",
      "Uint8ClampedArray",
      "WeakMap",
      "WeakSet",
      "console",
      "globalThis",
      "undefined",
    ])
  });
  &VALUE
}

#[derive(Debug, Default)]
/// The process-lived scope shared by all modules of one build.
///
/// It records the global names that linked code actually references and
/// answers whether a read of a global can be assumed side-effect free.
pub struct GlobalScope {
  referenced: HashSet<Atom>,
}

impl GlobalScope {
  pub fn new() -> Self {
    GlobalScope {
      referenced: HashSet::new(),
    }
  }

  pub fn reference(&mut self, name: &Atom) {
    self.referenced.insert(name.clone());
  }

  pub fn referenced(&self) -> &HashSet<Atom> {
    &self.referenced
  }

  /// Whether reading `name` is known to be harmless.
  pub fn is_pure_global(name: &str) -> bool {
    pure_globals().contains(name)
  }
}
