use crate::ast::literal::*;
use crate::ast::parse::parse_module;
use crate::variable::VarId;

use swc_atoms::Atom;
use swc_ecma_ast as js;

/// The initializer expression of `const x = <code>;`.
fn init_of(code: &str) -> Box<js::Expr> {
  let parsed = parse_module("/t.js", &format!("const x = {code};")).unwrap();
  match parsed.ast.body.into_iter().next().unwrap() {
    js::ModuleItem::Stmt(js::Stmt::Decl(js::Decl::Var(decl))) => {
      decl.decls.into_iter().next().unwrap().init.unwrap()
    }
    other => panic!("Unexpected item: {other:?}"),
  }
}

fn eval(code: &str) -> Option<LiteralValue> {
  literal_value(&init_of(code), &LiteralEnv::new())
}

#[test]
fn fold1() {
  assert_eq!(eval("1 + 2"), Some(LiteralValue::Num(3.0)));
  assert_eq!(eval("2 * 3 - 1"), Some(LiteralValue::Num(5.0)));
  assert_eq!(eval("'a' + 'b'"), Some(LiteralValue::Str(Atom::from("ab"))));
  assert_eq!(eval("!0"), Some(LiteralValue::Bool(true)));
  assert_eq!(eval("null"), Some(LiteralValue::Null));
  assert_eq!(eval("undefined"), Some(LiteralValue::Undefined));
  assert_eq!(eval("`template`"), Some(LiteralValue::Str(Atom::from("template"))));
}

#[test]
fn fold2() {
  assert_eq!(eval("true ? 1 : 2"), Some(LiteralValue::Num(1.0)));
  assert_eq!(eval("false || 'fallback'"), Some(LiteralValue::Str(Atom::from("fallback"))));
  assert_eq!(eval("0 && neverEvaluated"), Some(LiteralValue::Num(0.0)));
  assert_eq!(eval("undefined ?? 5"), Some(LiteralValue::Num(5.0)));
  assert_eq!(eval("1 === 1"), Some(LiteralValue::Bool(true)));
  assert_eq!(eval("typeof 1"), Some(LiteralValue::Str(Atom::from("number"))));
}

#[test]
fn opaque1() {
  assert_eq!(eval("someGlobal"), None);
  assert_eq!(eval("f()"), None);
  assert_eq!(eval("1 + f()"), None);
  // The truthy side of `||` being opaque poisons the fold.
  assert_eq!(eval("1 && f()"), None);
}

#[test]
fn env1() {
  let mut env = LiteralEnv::new();
  env.insert(Atom::from("DEBUG"), LiteralValue::Bool(false));
  let value = literal_value(&init_of("DEBUG ? 'a' : 'b'"), &env);
  assert_eq!(value, Some(LiteralValue::Str(Atom::from("b"))));
}

#[test]
fn truthiness1() {
  assert_eq!(LiteralValue::Num(0.0).truthiness(), Some(false));
  assert_eq!(LiteralValue::Num(f64::NAN).truthiness(), Some(false));
  assert_eq!(LiteralValue::Str(Atom::from("")).truthiness(), Some(false));
  assert_eq!(LiteralValue::Str(Atom::from("x")).truthiness(), Some(true));
  assert_eq!(LiteralValue::Null.truthiness(), Some(false));
}

#[test]
fn path_tracker1() {
  let mut tracker = PathTracker::new();
  assert!(tracker.is_empty());

  tracker.deoptimize(0, VarId(1), Some(Atom::from("prop")));
  assert!(tracker.is_deoptimized(0, VarId(1), Some(&Atom::from("prop"))));
  assert!(!tracker.is_deoptimized(0, VarId(1), Some(&Atom::from("other"))));
  assert!(!tracker.is_deoptimized(0, VarId(1), None));

  // A deoptimized root poisons every member path.
  tracker.deoptimize(0, VarId(2), None);
  assert!(tracker.is_deoptimized(0, VarId(2), Some(&Atom::from("anything"))));
  assert!(tracker.is_deoptimized(0, VarId(2), None));
  assert_eq!(tracker.len(), 2);
}
