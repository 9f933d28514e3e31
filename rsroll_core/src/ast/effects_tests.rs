use crate::ast::effects::*;
use crate::ast::literal::LiteralEnv;
use crate::ast::parse::{ParsedModule, parse_module};
use crate::opts::TreeshakeOptions;

use swc_atoms::Atom;
use swc_ecma_ast as js;

fn parsed(code: &str) -> ParsedModule {
  parse_module("/t.js", code).unwrap()
}

/// Effects of the first statement of `code`, with no known bindings.
fn effects_with(code: &str, treeshake: &TreeshakeOptions) -> bool {
  let parsed = parsed(code);
  let stmt = match parsed.ast.body.first().unwrap() {
    js::ModuleItem::Stmt(stmt) => stmt,
    other => panic!("Expected a statement, got {other:?}"),
  };
  let env = LiteralEnv::new();
  let known = |_: &Atom| false;
  let ctx = EffectsCtx {
    treeshake,
    pure_positions: &parsed.pure_positions,
    env: &env,
    known: &known,
    in_try: false,
  };
  stmt_has_effects(stmt, ctx)
}

fn effects(code: &str) -> bool {
  effects_with(code, &TreeshakeOptions::default())
}

#[test]
fn harmless1() {
  assert!(!effects("1 + 2;"));
  assert!(!effects("const a = 1;"));
  assert!(!effects("function f() { sideEffect(); }"));
  assert!(!effects("const f = () => { sideEffect(); };"));
  assert!(!effects("const o = { a: 1, b: 2 };"));
  assert!(!effects("Math;"));
  assert!(!effects("const t = `a${1}b`;"));
  assert!(!effects(";"));
}

#[test]
fn effectful1() {
  assert!(effects("foo();"));
  assert!(effects("new Thing();"));
  assert!(effects("a = 1;"));
  assert!(effects("a++;"));
  assert!(effects("throw new Error('x');"));
  assert!(effects("delete o.a;"));
  assert!(effects("debugger;"));
  assert!(effects("tag`template`;"));
  assert!(effects("for (const x of xs) {}"));
}

#[test]
fn pure_annotations1() {
  assert!(!effects("/*#__PURE__*/ factory();"));
  assert!(!effects("const a = /*#__PURE__*/ factory();"));
  // Arguments are still evaluated.
  assert!(effects("/*#__PURE__*/ factory(sideEffect());"));

  let mut treeshake = TreeshakeOptions::default();
  treeshake.annotations = false;
  assert!(effects_with("/*#__PURE__*/ factory();", &treeshake));
}

#[test]
fn unknown_globals1() {
  assert!(effects("someGlobal;"));
  let mut treeshake = TreeshakeOptions::default();
  treeshake.unknown_global_side_effects = false;
  assert!(!effects_with("someGlobal;", &treeshake));
}

#[test]
fn property_reads1() {
  assert!(effects("unknownThing.prop;"));
  assert!(!effects("console.log;"));
  let mut treeshake = TreeshakeOptions::default();
  treeshake.property_read_side_effects = false;
  treeshake.unknown_global_side_effects = false;
  assert!(!effects_with("unknownThing.prop;", &treeshake));
}

#[test]
fn branch_pruning1() {
  assert!(!effects("if (false) sideEffect();"));
  assert!(!effects("if (true) 1; else sideEffect();"));
  assert!(effects("if (true) sideEffect();"));
  assert!(effects("if (cond) sideEffect();"));
  assert!(!effects("while (false) sideEffect();"));
  assert!(!effects("const a = false ? sideEffect() : 1;"));
}

#[test]
fn try_catch1() {
  assert!(effects("try { foo(); } catch (e) {}"));
  // With deoptimization on, the annotation inside `try` is ignored.
  assert!(effects("try { /*#__PURE__*/ foo(); } catch (e) {}"));

  let mut treeshake = TreeshakeOptions::default();
  treeshake.try_catch_deoptimization = false;
  assert!(!effects_with("try { /*#__PURE__*/ foo(); } catch (e) {}", &treeshake));
  assert!(!effects_with("try {} catch (e) {}", &treeshake));
}

#[test]
fn destructuring1() {
  assert!(effects("const { a } = unknownThing;"));
  assert!(!effects("const { a } = { a: 1 };"));
  assert!(effects("const [first] = iterate();"));
}

#[test]
fn classes1() {
  assert!(!effects("class A {}"));
  assert!(!effects("class B { method() { sideEffect(); } }"));
  assert!(effects("class C extends mixin() {}"));
  assert!(effects("class D { static { sideEffect(); } }"));
  assert!(effects("class E { static prop = sideEffect(); }"));
  assert!(!effects("class F { prop = sideEffect(); }"));
}
