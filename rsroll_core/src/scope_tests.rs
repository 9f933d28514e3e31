use crate::scope::*;
use crate::variable::{VarId, Variable, VariableKind, VariableTable};

use swc_atoms::Atom;

#[test]
fn lookup1() {
  let mut scopes = ScopeTree::new();
  let mut vars = VariableTable::new();

  let a = vars.alloc(Variable::new(
    Atom::from("a"),
    VariableKind::Local,
    ScopeTree::MODULE,
    Some(0),
  ));
  scopes.declare(ScopeTree::MODULE, Atom::from("a"), a);

  let inner = scopes.push(ScopeKind::Function, ScopeTree::MODULE);
  let shadow = vars.alloc(Variable::new(
    Atom::from("a"),
    VariableKind::Local,
    inner,
    None,
  ));
  scopes.declare(inner, Atom::from("a"), shadow);

  // The inner binding shadows, the outer one is still reachable from
  // the module scope.
  assert_eq!(scopes.lookup(inner, &Atom::from("a")), Some(shadow));
  assert_eq!(scopes.lookup(ScopeTree::MODULE, &Atom::from("a")), Some(a));
  assert_eq!(scopes.lookup(inner, &Atom::from("b")), None);
}

#[test]
fn redeclare1() {
  let mut scopes = ScopeTree::new();
  scopes.declare(ScopeTree::MODULE, Atom::from("v"), VarId(0));
  scopes.declare(ScopeTree::MODULE, Atom::from("v"), VarId(1));
  // First binding wins, like repeated `var`.
  assert_eq!(scopes.lookup(ScopeTree::MODULE, &Atom::from("v")), Some(VarId(0)));
}

#[test]
fn hoist_target1() {
  let mut scopes = ScopeTree::new();
  let function = scopes.push(ScopeKind::Function, ScopeTree::MODULE);
  let block = scopes.push(ScopeKind::Block, function);
  let nested_block = scopes.push(ScopeKind::Block, block);

  assert_eq!(scopes.hoist_target(nested_block), function);
  assert_eq!(scopes.hoist_target(function), function);
  assert_eq!(scopes.hoist_target(ScopeTree::MODULE), ScopeTree::MODULE);
}

#[test]
fn global_scope1() {
  assert!(GlobalScope::is_pure_global("Math"));
  assert!(GlobalScope::is_pure_global("console"));
  assert!(!GlobalScope::is_pure_global("window"));
  assert!(!GlobalScope::is_pure_global("myGlobal"));

  let mut globals = GlobalScope::new();
  globals.reference(&Atom::from("fetch"));
  assert!(globals.referenced().contains(&Atom::from("fetch")));
}
