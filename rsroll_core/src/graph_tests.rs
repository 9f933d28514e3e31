use crate::diag::WarningCode;
use crate::err::BuildError;
use crate::graph::Graph;
use crate::opts::{
  BundleOptions, InputOption, ModuleSideEffectsOption, PreserveEntrySignatures,
};
use crate::test::{build, var_included, warning_collector};

#[tokio::test]
async fn single_entry1() {
  // One module, no imports.
  let files = &[("/a.js", "export const x = 1;\n")];
  let options = BundleOptions {
    input: InputOption::Named(vec![("main".to_string(), "/a.js".to_string())]),
    ..Default::default()
  };
  let (_graph, chunks, warnings) = build(files, options).await;
  let chunks = chunks.unwrap();

  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].name, "main");
  assert_eq!(chunks[0].entry_modules, vec!["/a.js".to_string()]);
  assert_eq!(chunks[0].ordered_modules, vec!["/a.js".to_string()]);
  assert_eq!(chunks[0].exports.len(), 1);
  assert_eq!(chunks[0].exports[0].exported, "x");
  assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn linear_chain1() {
  let files = &[
    ("/a.js", "import { y } from './b';\nexport const x = y + 1;\n"),
    ("/b.js", "export const y = 1;\n"),
  ];
  let (graph, chunks, warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  let chunks = chunks.unwrap();

  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].ordered_modules, vec![
    "/b.js".to_string(),
    "/a.js".to_string(),
  ]);
  assert!(var_included(&graph, "/a.js", "x"));
  assert!(var_included(&graph, "/b.js", "y"));
  assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dead_export1() {
  let files = &[
    ("/a.js", "import { y } from './b';\n"),
    ("/b.js", "export const y = 1;\nexport const z = 2;\n"),
  ];
  let mut options = BundleOptions::with_input("/a.js");
  options.preserve_entry_signatures = PreserveEntrySignatures::None;
  let (graph, chunks, warnings) = build(files, options).await;
  chunks.unwrap();

  assert!(!var_included(&graph, "/b.js", "z"));
  assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cycle1() {
  let files = &[
    ("/a.js", "import './b';\nexport const x = 1;\n"),
    ("/b.js", "import './a';\n"),
  ];
  let (_graph, chunks, warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  let chunks = chunks.unwrap();

  let warnings = warnings.lock().unwrap();
  let cycle = warnings
    .iter()
    .find(|w| w.code == WarningCode::CircularDependency)
    .expect("cycle warning");
  assert_eq!(cycle.cycle, vec![
    "/a.js".to_string(),
    "/b.js".to_string(),
    "/a.js".to_string(),
  ]);

  // Both modules land in one chunk, post-order first.
  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].ordered_modules, vec![
    "/b.js".to_string(),
    "/a.js".to_string(),
  ]);
}

#[tokio::test]
async fn two_entries1() {
  let files = &[
    (
      "/x.js",
      "import { s } from './shared';\nexport const x = s;\n",
    ),
    (
      "/y.js",
      "import { s } from './shared';\nexport const y = s;\n",
    ),
    ("/shared.js", "export const s = 1;\n"),
  ];
  let options = BundleOptions {
    input: InputOption::Named(vec![
      ("e1".to_string(), "/x.js".to_string()),
      ("e2".to_string(), "/y.js".to_string()),
    ]),
    ..Default::default()
  };
  let (_graph, chunks, _warnings) = build(files, options).await;
  let chunks = chunks.unwrap();

  // Three colours: {e1}, {e2}, {e1,e2}.
  assert_eq!(chunks.len(), 3);
  let shared = chunks
    .iter()
    .find(|c| c.ordered_modules.contains(&"/shared.js".to_string()))
    .expect("shared chunk");
  assert_eq!(shared.ordered_modules, vec!["/shared.js".to_string()]);
}

#[tokio::test]
async fn preserve_modules1() {
  let files = &[
    (
      "/x.js",
      "import { s } from './shared';\nexport const x = s;\n",
    ),
    (
      "/y.js",
      "import { s } from './shared';\nexport const y = s;\n",
    ),
    ("/shared.js", "export const s = 1;\n"),
  ];
  let options = BundleOptions {
    input: InputOption::Named(vec![
      ("e1".to_string(), "/x.js".to_string()),
      ("e2".to_string(), "/y.js".to_string()),
    ]),
    preserve_modules: true,
    ..Default::default()
  };
  let (_graph, chunks, _warnings) = build(files, options).await;
  let chunks = chunks.unwrap();

  assert_eq!(chunks.len(), 3);
  assert!(chunks.iter().all(|c| c.ordered_modules.len() == 1));
}

#[tokio::test]
async fn empty_input1() {
  let (handler, _warnings) = warning_collector();
  let options = BundleOptions {
    input: InputOption::List(vec![]),
    onwarn: Some(handler),
    ..Default::default()
  };
  let mut graph = Graph::new(options).unwrap();
  assert!(matches!(
    graph.build().await.unwrap_err(),
    BuildError::MissingEntries
  ));
}

#[tokio::test]
async fn duplicate_entry_name1() {
  let files = &[("/a.js", "export const x = 1;\n")];
  let options = BundleOptions {
    input: InputOption::Named(vec![
      ("main".to_string(), "/a.js".to_string()),
      ("main".to_string(), "/a.js".to_string()),
    ]),
    ..Default::default()
  };
  let (_graph, chunks, _warnings) = build(files, options).await;
  assert!(matches!(
    chunks.unwrap_err(),
    BuildError::DuplicateEntryName(name) if name == "main"
  ));
}

#[tokio::test]
async fn module_info1() {
  let files = &[
    ("/a.js", "import { y } from './b';\nexport const x = y;\n"),
    ("/b.js", "export const y = 1;\n"),
  ];
  let (graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  chunks.unwrap();

  let info = graph.module_info("/a.js").unwrap();
  assert!(info.is_entry);
  assert!(!info.is_external);
  assert_eq!(info.imported_ids, vec!["/b.js".to_string()]);
  assert!(info.code.is_some());

  let info = graph.module_info("/b.js").unwrap();
  assert_eq!(info.importers, vec!["/a.js".to_string()]);

  assert!(matches!(
    graph.module_info("/missing.js").unwrap_err(),
    BuildError::UnknownModule(_)
  ));
}

#[tokio::test]
async fn cache_roundtrip1() {
  let files = &[
    ("/a.js", "import { y } from './b';\nexport const x = y + 1;\n"),
    ("/b.js", "export const y = 1;\nexport const dead = 2;\n"),
  ];

  let (mut graph, chunks, _warnings) =
    build(files, BundleOptions::with_input("/a.js")).await;
  let first: Vec<Vec<String>> = chunks
    .unwrap()
    .iter()
    .map(|c| c.ordered_modules.clone())
    .collect();

  let cache = graph.cache_snapshot();
  assert_eq!(cache.modules.len(), 2);

  let mut options = BundleOptions::with_input("/a.js");
  options.cache = Some(cache);
  let (_graph, chunks, _warnings) = build(files, options).await;
  let second: Vec<Vec<String>> = chunks
    .unwrap()
    .iter()
    .map(|c| c.ordered_modules.clone())
    .collect();

  // Same membership, same execution order.
  assert_eq!(first, second);
}

#[tokio::test]
async fn cancellation1() {
  let files = &[("/a.js", "export const x = 1;\n")];
  let (handler, _warnings) = warning_collector();
  let mut options = BundleOptions::with_input("/a.js");
  options.onwarn = Some(handler);
  options.plugins.push(crate::test::MemoryPlugin::new(files));

  let mut graph = Graph::new(options).unwrap();
  graph.cancellation_token().cancel();
  assert!(matches!(
    graph.build().await.unwrap_err(),
    BuildError::Cancelled
  ));
}

#[tokio::test]
async fn deprecation1() {
  let mut options = BundleOptions::with_input("/a.js");
  options.treeshake.pure_external_modules = Some(true);
  options.strict_deprecations = true;
  assert!(matches!(
    Graph::new(options).unwrap_err(),
    BuildError::Deprecation(_)
  ));
}

#[tokio::test]
async fn deprecation2() {
  let (handler, warnings) = warning_collector();
  let mut options = BundleOptions::with_input("/a.js");
  options.treeshake.pure_external_modules = Some(true);
  options.onwarn = Some(handler);

  let graph = Graph::new(options).unwrap();
  assert!(matches!(
    graph.options.treeshake.module_side_effects,
    ModuleSideEffectsOption::NoExternal
  ));
  assert!(
    warnings
      .lock()
      .unwrap()
      .iter()
      .any(|w| w.code == WarningCode::DeprecatedFeature)
  );
}

#[tokio::test]
async fn chunk_count1() {
  // There is never less than one chunk per entry.
  let files = &[
    ("/a.js", "export const a = 1;\n"),
    ("/b.js", "export const b = 2;\n"),
  ];
  let options = BundleOptions {
    input: InputOption::List(vec!["/a.js".to_string(), "/b.js".to_string()]),
    ..Default::default()
  };
  let (_graph, chunks, _warnings) = build(files, options).await;
  let chunks = chunks.unwrap();
  assert!(chunks.len() >= 2);
}
