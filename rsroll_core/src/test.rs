//! Shared test helpers.

use crate::chunk::Chunk;
use crate::diag::Warning;
use crate::graph::Graph;
use crate::module::ResolvedId;
use crate::opts::{BundleOptions, WarningHandler};
use crate::plugin::Plugin;
use crate::prelude::*;
use crate::scope::ScopeTree;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use swc_atoms::Atom;

/// Serves virtual modules keyed by absolute ids like `/a.js`.
pub(crate) struct MemoryPlugin {
  files: HashMap<String, String>,
}

impl MemoryPlugin {
  pub(crate) fn new(files: &[(&str, &str)]) -> Arc<Self> {
    Arc::new(MemoryPlugin {
      files: files
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    })
  }
}

/// Joins a specifier against its importer's directory, normalizes `.`
/// and `..`, and completes the `.js` extension.
pub(crate) fn virtual_join(importer: Option<&str>, specifier: &str) -> String {
  let mut segments: Vec<&str> = vec![];
  if !specifier.starts_with('/') {
    if let Some(importer) = importer {
      segments.extend(importer.split('/').filter(|s| !s.is_empty()));
      segments.pop();
    }
  }
  for segment in specifier.split('/') {
    match segment {
      "" | "." => {}
      ".." => {
        segments.pop();
      }
      other => segments.push(other),
    }
  }
  let mut id = String::new();
  for segment in segments {
    id.push('/');
    id.push_str(segment);
  }
  if !id.ends_with(".js") {
    id.push_str(".js");
  }
  id
}

#[async_trait]
impl Plugin for MemoryPlugin {
  fn name(&self) -> &'static str {
    "memory"
  }

  async fn resolve_id(
    &self,
    specifier: &str,
    importer: Option<&str>,
    _is_entry: bool,
  ) -> AnyResult<Option<ResolvedId>> {
    let id = virtual_join(importer, specifier);
    if self.files.contains_key(&id) {
      Ok(Some(ResolvedId {
        id,
        external: false,
        module_side_effects: None,
      }))
    } else {
      Ok(None)
    }
  }

  async fn load(&self, id: &str) -> AnyResult<Option<String>> {
    Ok(self.files.get(id).cloned())
  }
}

/// Captures warnings for assertions.
pub(crate) fn warning_collector() -> (WarningHandler, Arc<Mutex<Vec<Warning>>>) {
  let warnings: Arc<Mutex<Vec<Warning>>> = Arc::new(Mutex::new(vec![]));
  let sink = Arc::clone(&warnings);
  let handler: WarningHandler = Arc::new(move |warning: &Warning| {
    sink.lock().unwrap().push(warning.clone());
  });
  (handler, warnings)
}

/// Builds the given virtual files and returns the graph, the build
/// outcome and the collected warnings.
pub(crate) async fn build(
  files: &[(&str, &str)],
  mut options: BundleOptions,
) -> (Graph, BuildResult<Vec<Chunk>>, Arc<Mutex<Vec<Warning>>>) {
  let (handler, warnings) = warning_collector();
  options.onwarn = Some(handler);
  options.plugins.push(MemoryPlugin::new(files));
  let mut graph = Graph::new(options).expect("options are valid");
  let chunks = graph.build().await;
  (graph, chunks, warnings)
}

/// Whether the module-scope binding `name` of module `id` ended up
/// included.
pub(crate) fn var_included(graph: &Graph, id: &str, name: &str) -> bool {
  let idx = *graph.module_by_id.get(id).expect("module exists");
  let module = graph.modules[idx].as_normal().expect("normal module");
  let var = module
    .scopes
    .lookup(ScopeTree::MODULE, &Atom::from(name))
    .expect("binding exists");
  module.variables.get(var).included()
}
