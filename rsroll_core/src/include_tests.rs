use crate::diag::WarningCode;
use crate::opts::{BundleOptions, ExternalOption, PreserveEntrySignatures, TreeshakeOptions};
use crate::test::{build, var_included};

#[tokio::test]
async fn dead_export1() {
  // An imported but never referenced binding stays out, and so do the
  // producer's other exports.
  let files = &[
    ("/a.js", "import { y } from './b';\n"),
    ("/b.js", "export const y = 1;\nexport const z = 2;\n"),
  ];
  let mut options = BundleOptions::with_input("/a.js");
  options.preserve_entry_signatures = PreserveEntrySignatures::None;
  let (graph, chunks, warnings) = build(files, options).await;
  chunks.unwrap();

  assert!(!var_included(&graph, "/b.js", "y"));
  assert!(!var_included(&graph, "/b.js", "z"));
  assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn soundness1() {
  // Everything an included statement reads is included, transitively.
  let files = &[
    (
      "/a.js",
      "import { mid } from './b';\nexport const top = mid + 1;\n",
    ),
    (
      "/b.js",
      "const base = 1;\nconst unrelated = 2;\nexport const mid = base;\n",
    ),
  ];
  let (graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  chunks.unwrap();

  assert!(var_included(&graph, "/a.js", "top"));
  assert!(var_included(&graph, "/b.js", "mid"));
  assert!(var_included(&graph, "/b.js", "base"));
  assert!(!var_included(&graph, "/b.js", "unrelated"));
}

#[tokio::test]
async fn side_effects1() {
  // Side-effect statements survive without any export usage.
  let files = &[(
    "/a.js",
    "console.log('boot');\nexport const unused = 1;\n",
  )];
  let mut options = BundleOptions::with_input("/a.js");
  options.preserve_entry_signatures = PreserveEntrySignatures::None;
  let (graph, chunks, _warnings) = build(files, options).await;
  chunks.unwrap();

  let a = *graph.module_by_id.get("/a.js").unwrap();
  let module = graph.modules[a].as_normal().unwrap();
  assert!(module.parts[0].included);
  assert!(!var_included(&graph, "/a.js", "unused"));
}

#[tokio::test]
async fn pure_annotation1() {
  let files = &[(
    "/a.js",
    "const cache = /*#__PURE__*/ build();\nexport const x = 1;\n",
  )];
  let (graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  chunks.unwrap();

  assert!(!var_included(&graph, "/a.js", "cache"));
  assert!(var_included(&graph, "/a.js", "x"));
}

#[tokio::test]
async fn idempotent1() {
  let files = &[
    (
      "/a.js",
      "import { y } from './b';\nconsole.log(y);\nexport const x = y;\n",
    ),
    ("/b.js", "export const y = 1;\nexport const dead = 2;\n"),
  ];
  let (mut graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  chunks.unwrap();

  let snapshot = |graph: &crate::graph::Graph| {
    graph
      .modules
      .iter()
      .filter_map(|r| r.as_normal())
      .map(|m| {
        (
          m.id().clone(),
          m.parts.iter().map(|p| p.included).collect::<Vec<_>>(),
          m.variables.iter().map(|(_, v)| v.included()).collect::<Vec<_>>(),
        )
      })
      .collect::<Vec<_>>()
  };

  let first = snapshot(&graph);
  crate::include::include(&mut graph);
  let second = snapshot(&graph);
  assert_eq!(first, second);
}

#[tokio::test]
async fn unused_external1() {
  let files = &[(
    "/a.js",
    "import { used, unused } from 'ext';\nexport const x = used;\n",
  )];
  let mut options = BundleOptions::with_input("/a.js");
  options.external = ExternalOption::ids(["ext"]);
  let (_graph, chunks, warnings) = build(files, options).await;
  chunks.unwrap();

  let warnings = warnings.lock().unwrap();
  let unused: Vec<_> = warnings
    .iter()
    .filter(|w| w.code == WarningCode::UnusedExternalImport)
    .collect();
  assert_eq!(unused.len(), 1);
  assert_eq!(unused[0].names, vec!["unused".to_string()]);
}

#[tokio::test]
async fn treeshake_off1() {
  let files = &[
    ("/a.js", "import { y } from './b';\n"),
    ("/b.js", "export const y = 1;\nexport const z = 2;\n"),
  ];
  let mut options = BundleOptions::with_input("/a.js");
  options.treeshake = TreeshakeOptions::disabled();
  let (graph, chunks, _warnings) = build(files, options).await;
  chunks.unwrap();

  assert!(var_included(&graph, "/b.js", "y"));
  assert!(var_included(&graph, "/b.js", "z"));

  let b = *graph.module_by_id.get("/b.js").unwrap();
  let module = graph.modules[b].as_normal().unwrap();
  assert!(module.parts.iter().all(|p| p.included));
}

#[tokio::test]
async fn pure_module1() {
  // `moduleSideEffects: false` drops a module whose exports are
  // unused even when it has top-level effects.
  use crate::opts::ModuleSideEffectsOption;
  use std::sync::Arc;

  let files = &[
    ("/a.js", "import './noisy';\nexport const x = 1;\n"),
    ("/noisy.js", "console.log('noise');\nexport const n = 1;\n"),
  ];
  let mut options = BundleOptions::with_input("/a.js");
  options.treeshake.module_side_effects =
    ModuleSideEffectsOption::Predicate(Arc::new(|id, _| !id.contains("noisy")));
  let (graph, chunks, _warnings) = build(files, options).await;
  chunks.unwrap();

  let noisy = *graph.module_by_id.get("/noisy.js").unwrap();
  let module = graph.modules[noisy].as_normal().unwrap();
  assert!(!module.parts[0].included);
  assert!(!module.is_included);
}

#[tokio::test]
async fn dynamic_entry1() {
  // A live dynamic import keeps the target's whole public surface.
  let files = &[
    (
      "/a.js",
      "export function load() { return import('./lazy'); }\n",
    ),
    ("/lazy.js", "export const heavy = 1;\nexport const extra = 2;\n"),
  ];
  let (graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  chunks.unwrap();

  assert!(var_included(&graph, "/lazy.js", "heavy"));
  assert!(var_included(&graph, "/lazy.js", "extra"));

  let lazy = *graph.module_by_id.get("/lazy.js").unwrap();
  assert_eq!(
    graph.modules[lazy].as_normal().unwrap().dynamic_importers,
    vec!["/a.js".to_string()]
  );
}
