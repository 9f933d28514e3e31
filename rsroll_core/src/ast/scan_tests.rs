use crate::ast::parse::parse_module;
use crate::ast::scan::{Reference, ScanResult, scan_module};
use crate::module::ImportName;
use crate::opts::TreeshakeOptions;
use crate::scope::ScopeTree;

use swc_atoms::Atom;

fn scan(code: &str) -> ScanResult {
  let parsed = parse_module("/t.js", code).unwrap();
  scan_module(&parsed, &TreeshakeOptions::default())
}

#[test]
fn imports1() {
  let result = scan(
    "import { a as b } from './m';\n\
     import * as ns from './n';\n\
     import d from './o';\n\
     import './p';\n",
  );

  assert_eq!(result.sources, vec![
    Atom::from("./m"),
    Atom::from("./n"),
    Atom::from("./o"),
    Atom::from("./p"),
  ]);
  assert_eq!(result.import_order, vec![
    Atom::from("b"),
    Atom::from("ns"),
    Atom::from("d"),
  ]);

  let b = &result.import_descriptions[&Atom::from("b")];
  assert_eq!(b.source, Atom::from("./m"));
  assert_eq!(b.name, ImportName::Name(Atom::from("a")));

  let ns = &result.import_descriptions[&Atom::from("ns")];
  assert_eq!(ns.name, ImportName::Namespace);

  let d = &result.import_descriptions[&Atom::from("d")];
  assert_eq!(d.name, ImportName::Default);

  // Every import statement is marker-only.
  assert!(result.parts.iter().all(|p| p.import_only && !p.side_effects));
}

#[test]
fn exports1() {
  let result = scan(
    "export const x = 1;\n\
     export { x as y };\n\
     export default 42;\n\
     export * from './s';\n\
     export { z } from './t';\n",
  );

  assert_eq!(result.export_order, vec![
    Atom::from("x"),
    Atom::from("y"),
    Atom::from("default"),
    Atom::from("z"),
  ]);
  assert_eq!(result.star_sources, vec![Atom::from("./s")]);

  let x = &result.export_descriptions[&Atom::from("x")];
  assert!(x.local_var.is_some());

  let y = &result.export_descriptions[&Atom::from("y")];
  assert_eq!(y.local_name, Some(Atom::from("x")));
  assert!(y.local_var.is_none());

  let z = &result.export_descriptions[&Atom::from("z")];
  assert_eq!(z.source, Some(Atom::from("./t")));
  assert_eq!(z.imported, Some(ImportName::Name(Atom::from("z"))));

  let default = &result.export_descriptions[&Atom::from("default")];
  assert!(default.local_var.is_some());
}

#[test]
fn parts1() {
  let result = scan("const a = 1;\nconsole.log(a);\n");

  assert_eq!(result.parts.len(), 2);
  assert_eq!(result.parts[0].declared.len(), 1);
  assert!(!result.parts[0].side_effects);

  assert!(result.parts[1].declared.is_empty());
  assert!(result.parts[1].side_effects);
  let a = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("a"))
    .unwrap();
  assert!(result.parts[1].referenced.contains(&Reference::Own(a)));
}

#[test]
fn shadowing1() {
  let result = scan("const a = 1;\nfunction f(a) { return a + 1; }\n");

  // The parameter shadows the module binding; the function body must
  // not register a module-scope reference.
  assert!(result.parts[1].referenced.is_empty());
}

#[test]
fn free_references1() {
  let result = scan("foo(bar);\n");
  assert_eq!(result.parts[0].referenced, vec![
    Reference::Free(Atom::from("foo")),
    Reference::Free(Atom::from("bar")),
  ]);
}

#[test]
fn namespace_member1() {
  let result = scan("import * as ns from './m';\nconst v = ns.thing;\n");
  assert_eq!(result.parts[1].referenced, vec![Reference::FreeMember(
    Atom::from("ns"),
    Atom::from("thing"),
  )]);
}

#[test]
fn dynamic_imports1() {
  let result = scan(
    "const load = () => import('./dyn');\n\
     import(unknownTarget);\n",
  );

  assert_eq!(result.dynamic_imports.len(), 2);
  assert_eq!(result.dynamic_imports[0].specifier, Some(Atom::from("./dyn")));
  assert_eq!(result.dynamic_imports[0].part, 0);
  assert_eq!(result.dynamic_imports[1].specifier, None);
  // Dynamic sources are not static sources.
  assert!(result.sources.is_empty());
}

#[test]
fn reassignment1() {
  let result = scan("let x = 1;\nx = 2;\nlet y = 3;\n");

  let x = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("x"))
    .unwrap();
  let y = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("y"))
    .unwrap();
  assert!(result.variables.get(x).reassigned());
  assert!(!result.variables.get(y).reassigned());
}

#[test]
fn hoisting1() {
  let result = scan("{ var h = 1; }\nh;\n");

  let h = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("h"))
    .unwrap();
  assert_eq!(result.variables.get(h).scope(), ScopeTree::MODULE);
  assert!(result.parts[1].referenced.contains(&Reference::Own(h)));
}

#[test]
fn hoisting2() {
  // Forward reference to a hoisted function.
  let result = scan("main();\nfunction main() {}\n");

  let main = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("main"))
    .unwrap();
  assert!(result.parts[0].referenced.contains(&Reference::Own(main)));
  assert_eq!(result.parts[1].declared, vec![main]);
}

#[test]
fn export_default_function1() {
  let result = scan("export default function handler() {}\nhandler;\n");

  let handler = result
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from("handler"))
    .unwrap();
  let default = &result.export_descriptions[&Atom::from("default")];
  assert_eq!(default.local_var, Some(handler));
  assert!(result.parts[1].referenced.contains(&Reference::Own(handler)));
}

#[test]
fn const_env_pruning1() {
  // `DEBUG` folds to false, the branch is provably dead.
  let result = scan("const DEBUG = false;\nif (DEBUG) { sideEffect(); }\n");
  assert!(!result.parts[1].side_effects);
}
