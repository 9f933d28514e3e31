//! Tree-shaking.
//!
//! Starting from the exports of the entry modules, marks the
//! statements and variables that must be retained and iterates to a
//! fixed point. The marked set only ever grows, so the loop
//! terminates; a pass that includes nothing new is the fixed point.

use crate::diag::{Warning, WarningCode};
use crate::graph::Graph;
use crate::link::{ExportResolution, resolve_export};
use crate::module::{BoundRef, ModuleIdx};
use crate::opts::PreserveEntrySignatures;
use crate::prelude::*;
use crate::variable::{VarId, VariableKind};

use swc_atoms::Atom;
use tracing::{debug, trace};

pub(crate) fn include(graph: &mut Graph) {
  debug!(
    "Include: {} entries, tree-shaking {}",
    graph.entries.len(),
    if graph.options.treeshake.enabled {
      "on"
    } else {
      "off"
    }
  );

  if !graph.options.treeshake.enabled {
    include_everything(graph);
    warn_unused_external_imports(graph);
    return;
  }

  let mut worklist: Vec<(ModuleIdx, VarId)> = vec![];

  // Seed: entries always execute; their public surface is live unless
  // the signature need not be preserved.
  let entries: Vec<ModuleIdx> = graph.entries.iter().map(|e| e.idx).collect();
  for idx in entries {
    if let Some(module) = graph.modules[idx].as_normal_mut() {
      module.is_executed = true;
      module.is_included = true;
    }
    let preserve = graph.modules[idx]
      .as_normal()
      .map(|m| m.preserve_signature)
      .unwrap_or(PreserveEntrySignatures::None);
    if preserve != PreserveEntrySignatures::None {
      include_all_exports(graph, idx, &mut worklist);
    }
  }

  // Fixed point: each pass includes the side-effect statements of
  // executed modules, drains the variable worklist, and propagates
  // executedness through static imports. Any growth runs another
  // pass.
  loop {
    let mut needs_another_pass = false;

    for idx in 0..graph.modules.len() {
      let Some(module) = graph.modules[idx].as_normal() else {
        continue;
      };
      if !module.is_executed || !module.module_side_effects {
        continue;
      }
      let pending: Vec<usize> = module
        .parts
        .iter()
        .filter(|p| p.side_effects && !p.included)
        .map(|p| p.index)
        .collect();
      for part in pending {
        include_part(graph, idx, part, &mut worklist);
        needs_another_pass = true;
      }
    }

    while let Some((idx, var)) = worklist.pop() {
      if include_variable(graph, idx, var, &mut worklist) {
        needs_another_pass = true;
      }
    }

    if propagate_execution(graph) {
      needs_another_pass = true;
    }

    if !needs_another_pass {
      break;
    }
  }

  warn_unused_external_imports(graph);
}

/// Tree-shaking disabled: one pass that marks everything.
fn include_everything(graph: &mut Graph) {
  for record in graph.modules.iter_mut() {
    match record {
      crate::module::ModuleRecord::Normal(module) => {
        module.is_executed = true;
        module.is_included = true;
        for part in module.parts.iter_mut() {
          part.included = true;
        }
        let vars: Vec<VarId> = module.variables.iter().map(|(id, _)| id).collect();
        for var in vars {
          module.variables.get_mut(var).include();
        }
      }
      crate::module::ModuleRecord::External(module) => {
        let vars: Vec<VarId> = module.variables.iter().map(|(id, _)| id).collect();
        for var in vars {
          module.variables.get_mut(var).include();
        }
      }
    }
  }
}

/// Marks one statement live and queues everything it reads. A live
/// dynamic import site makes its target an entry-like root: the
/// consumers of its namespace are unknowable, so its whole public
/// surface stays live.
fn include_part(
  graph: &mut Graph,
  idx: ModuleIdx,
  part: usize,
  worklist: &mut Vec<(ModuleIdx, VarId)>,
) {
  let dynamic_targets = {
    let module = graph.modules[idx].as_normal_mut().expect("normal record");
    if module.parts[part].included {
      return;
    }
    module.parts[part].included = true;
    module.is_included = true;
    trace!("Include statement {} of {:?}", part, module.id());
    for bound in module.parts[part].bound.clone() {
      match bound {
        BoundRef::Own(var) => worklist.push((idx, var)),
        BoundRef::Foreign(target, var) => worklist.push((target, var)),
        BoundRef::Global(_) => {}
      }
    }
    module
      .dynamic_imports
      .iter()
      .filter(|d| d.site.part == part)
      .filter_map(|d| d.resolution.as_ref())
      .map(|r| r.id.clone())
      .collect::<Vec<_>>()
  };

  for id in dynamic_targets {
    let Some(&target) = graph.module_by_id.get(&id) else {
      continue;
    };
    match &mut graph.modules[target] {
      crate::module::ModuleRecord::Normal(module) => {
        module.is_executed = true;
        module.is_included = true;
      }
      crate::module::ModuleRecord::External(module) => {
        let var = module.namespace_variable();
        module.variables.get_mut(var).include();
        continue;
      }
    }
    include_all_exports(graph, target, worklist);
  }
}

/// Marks one variable live. Returns whether it was newly included.
fn include_variable(
  graph: &mut Graph,
  idx: ModuleIdx,
  var: VarId,
  worklist: &mut Vec<(ModuleIdx, VarId)>,
) -> bool {
  let (kind, declared_part, already) = {
    let record = &graph.modules[idx];
    let table = match record {
      crate::module::ModuleRecord::Normal(m) => &m.variables,
      crate::module::ModuleRecord::External(m) => &m.variables,
    };
    let v = table.get(var);
    (v.kind(), v.declared_part(), v.included())
  };
  if already {
    return false;
  }

  match &mut graph.modules[idx] {
    crate::module::ModuleRecord::Normal(module) => {
      module.variables.get_mut(var).include();
      module.is_included = true;
    }
    crate::module::ModuleRecord::External(module) => {
      module.variables.get_mut(var).include();
      return true;
    }
  }

  if let Some(part) = declared_part {
    include_part(graph, idx, part, worklist);
  }

  if kind == VariableKind::Namespace {
    // The namespace object closes over every export of its module.
    include_all_exports(graph, idx, worklist);
  }

  true
}

/// Queues every export of module `idx` (star re-exports included) for
/// inclusion.
fn include_all_exports(
  graph: &mut Graph,
  idx: ModuleIdx,
  worklist: &mut Vec<(ModuleIdx, VarId)>,
) {
  let mut seen = HashSet::new();
  let (names, external_stars) = all_export_names_of(graph, idx, &mut seen);
  for target in external_stars {
    // `export * from` an external module keeps its namespace live.
    let var = graph.modules[target]
      .as_external_mut()
      .expect("external record")
      .namespace_variable();
    graph.modules[target]
      .as_external_mut()
      .expect("external record")
      .variables
      .get_mut(var)
      .include();
  }
  for name in names {
    let mut resolve_set = vec![];
    match resolve_export(
      &mut graph.modules,
      &graph.module_by_id,
      idx,
      &name,
      &mut resolve_set,
    ) {
      ExportResolution::Found(target, var) => worklist.push((target, var)),
      ExportResolution::External(target, external_name) => {
        let var = graph.modules[target]
          .as_external_mut()
          .expect("external record")
          .variable(&external_name);
        worklist.push((target, var));
      }
      ExportResolution::Missing => {}
    }
  }
}

/// Every export name reachable from module `idx`: its own exports plus
/// the (non-default) names of internal star re-export targets. The
/// second list is the external star targets, whose names are
/// unknowable here.
pub(crate) fn all_export_names_of(
  graph: &Graph,
  idx: ModuleIdx,
  seen: &mut HashSet<ModuleIdx>,
) -> (Vec<Atom>, Vec<ModuleIdx>) {
  if !seen.insert(idx) {
    return (vec![], vec![]);
  }
  let Some(module) = graph.modules[idx].as_normal() else {
    return (vec![], vec![]);
  };
  let mut names = module.export_order.clone();
  let mut external_stars = vec![];
  let star_targets: Vec<ModuleIdx> = module
    .star_sources
    .iter()
    .filter_map(|s| module.resolved_ids.get(s))
    .filter_map(|r| graph.module_by_id.get(&r.id).copied())
    .collect();
  for target in star_targets {
    if graph.modules[target].is_external() {
      external_stars.push(target);
      continue;
    }
    let (star_names, star_externals) = all_export_names_of(graph, target, seen);
    for name in star_names {
      if name.as_str() != "default" && !names.contains(&name) {
        names.push(name);
      }
    }
    external_stars.extend(star_externals);
  }
  (names, external_stars)
}

/// An executed module executes its static dependencies. Returns
/// whether anything changed.
fn propagate_execution(graph: &mut Graph) -> bool {
  let mut changed = false;
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    if !module.is_executed {
      continue;
    }
    let deps: Vec<ModuleIdx> = module
      .sources
      .iter()
      .filter_map(|s| module.resolved_ids.get(s))
      .filter_map(|r| graph.module_by_id.get(&r.id).copied())
      .collect();
    for dep in deps {
      if let Some(target) = graph.modules[dep].as_normal_mut() {
        if !target.is_executed {
          target.is_executed = true;
          // An executed module with side effects stays in the output
          // even when none of its bindings are read.
          if target.module_side_effects {
            target.is_included = true;
          }
          changed = true;
        }
      }
    }
  }
  changed
}

/// Imports from external modules whose names were never referenced by
/// included code.
fn warn_unused_external_imports(graph: &mut Graph) {
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_external() else {
      continue;
    };
    if module.importers.is_empty() {
      continue;
    }
    let unused: Vec<String> = module
      .variables
      .iter()
      .filter(|(_, v)| v.name().as_str() != crate::module::EXTERNAL_NAMESPACE)
      .filter(|(_, v)| !v.included())
      .map(|(_, v)| v.name().to_string())
      .collect();
    if unused.is_empty() {
      continue;
    }
    let id = module.id().clone();
    graph.warn(
      Warning::new(
        WarningCode::UnusedExternalImport,
        format!(
          "Imported from external module {:?} but never used: {}",
          id,
          unused.join(", ")
        ),
      )
      .with_id(id)
      .with_names(unused),
    );
  }
}
