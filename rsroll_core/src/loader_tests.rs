use crate::err::BuildError;
use crate::graph::Graph;
use crate::opts::{BundleOptions, ExternalOption, InputOption};
use crate::test::{build, warning_collector};

use assert_fs::TempDir;
use assert_fs::prelude::*;

fn entry_path(temp: &TempDir, name: &str) -> String {
  temp.child(name).path().display().to_string()
}

#[tokio::test]
async fn load_fs1() {
  let temp = TempDir::new().unwrap();
  temp
    .child("main.js")
    .write_str("import { y } from './dep.js';\nexport const x = y + 1;\n")
    .unwrap();
  temp.child("dep.js").write_str("export const y = 1;\n").unwrap();

  let (handler, _warnings) = warning_collector();
  let options = BundleOptions {
    input: InputOption::Single(entry_path(&temp, "main.js")),
    onwarn: Some(handler),
    ..Default::default()
  };
  let mut graph = Graph::new(options).unwrap();
  let chunks = graph.build().await.unwrap();

  assert_eq!(graph.module_by_id.len(), 2);
  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].ordered_modules.len(), 2);
  // Every loaded file is watched.
  assert_eq!(graph.watch_files().len(), 2);
}

#[tokio::test]
async fn load_fs2() {
  // A diamond loads the shared leaf exactly once.
  let temp = TempDir::new().unwrap();
  temp
    .child("a.js")
    .write_str("import './b.js';\nimport './c.js';\n")
    .unwrap();
  temp.child("b.js").write_str("import './d.js';\n").unwrap();
  temp.child("c.js").write_str("import './d.js';\n").unwrap();
  temp.child("d.js").write_str("export const d = 1;\n").unwrap();

  let (handler, _warnings) = warning_collector();
  let options = BundleOptions {
    input: InputOption::Single(entry_path(&temp, "a.js")),
    onwarn: Some(handler),
    ..Default::default()
  };
  let mut graph = Graph::new(options).unwrap();
  graph.build().await.unwrap();

  assert_eq!(graph.module_by_id.len(), 4);
}

#[tokio::test]
async fn unresolved1() {
  let temp = TempDir::new().unwrap();
  temp
    .child("main.js")
    .write_str("import { gone } from './missing.js';\n")
    .unwrap();

  let (handler, _warnings) = warning_collector();
  let options = BundleOptions {
    input: InputOption::Single(entry_path(&temp, "main.js")),
    onwarn: Some(handler),
    ..Default::default()
  };
  let mut graph = Graph::new(options).unwrap();
  match graph.build().await.unwrap_err() {
    BuildError::UnresolvedImport { specifier, .. } => {
      assert_eq!(specifier, "./missing.js");
    }
    other => panic!("Expected unresolved import, got {other:?}"),
  }
}

#[tokio::test]
async fn unresolved_entry1() {
  let (handler, _warnings) = warning_collector();
  let options = BundleOptions {
    input: InputOption::Single("/no/such/entry.js".to_string()),
    onwarn: Some(handler),
    ..Default::default()
  };
  let mut graph = Graph::new(options).unwrap();
  assert!(matches!(
    graph.build().await.unwrap_err(),
    BuildError::UnresolvedEntry(_)
  ));
}

#[tokio::test]
async fn external1() {
  let files = &[(
    "/main.js",
    "import { helper } from 'ext';\nexport const x = helper();\n",
  )];
  let options = BundleOptions {
    input: InputOption::Single("/main.js".to_string()),
    external: ExternalOption::ids(["ext"]),
    ..Default::default()
  };
  let (graph, chunks, warnings) = build(files, options).await;
  let chunks = chunks.unwrap();

  let ext_idx = *graph.module_by_id.get("ext").expect("external record");
  let ext = graph.modules[ext_idx].as_external().unwrap();
  assert!(!ext.dynamic_only);
  assert_eq!(ext.importers, vec!["/main.js".to_string()]);

  assert!(chunks[0].external_dependencies.contains(&"ext".to_string()));
  assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transform_cache1() {
  // A cache hit skips the transform hooks entirely.
  use crate::plugin::Plugin;
  use async_trait::async_trait;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingTransform(Arc<AtomicUsize>);

  #[async_trait]
  impl Plugin for CountingTransform {
    fn name(&self) -> &'static str {
      "counting"
    }

    async fn transform(&self, _code: &str, _id: &str) -> crate::err::AnyResult<Option<String>> {
      self.0.fetch_add(1, Ordering::SeqCst);
      Ok(None)
    }
  }

  let files = &[("/a.js", "export const x = 1;")];
  let count = Arc::new(AtomicUsize::new(0));

  let mut options = BundleOptions::with_input("/a.js");
  options.plugins.push(Arc::new(CountingTransform(Arc::clone(&count))));
  let (mut graph, chunks, _warnings) = build(files, options).await;
  chunks.unwrap();
  assert_eq!(count.load(Ordering::SeqCst), 1);

  let cache = graph.cache_snapshot();
  let mut options = BundleOptions::with_input("/a.js");
  options.cache = Some(cache);
  options.plugins.push(Arc::new(CountingTransform(Arc::clone(&count))));
  let (_graph, chunks, _warnings) = build(files, options).await;
  chunks.unwrap();
  // Unchanged source: no second transform.
  assert_eq!(count.load(Ordering::SeqCst), 1);
}
