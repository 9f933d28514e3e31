//! Linking.
//!
//! Three passes over the loaded module table:
//!
//! 1. bind every import to the exact exported variable of its
//!    producing record, transitively following re-export chains,
//! 2. compute the execution order by depth-first search from the
//!    entries, reporting cycles,
//! 3. bind statement references to the variables they read.
//!
//! Linking never suspends and runs on a single thread.

use crate::diag::{Warning, WarningCode, line_col};
use crate::graph::Graph;
use crate::module::{BoundRef, ImportName, ModuleIdx, ModuleRecord};
use crate::ast::scan::Reference;
use crate::prelude::*;
use crate::scope::ScopeTree;
use crate::variable::{VarId, Variable, VariableKind};

use swc_atoms::Atom;
use tracing::debug;

/// Outcome of resolving one exported name.
pub(crate) enum ExportResolution {
  /// A concrete variable of an internal module.
  Found(ModuleIdx, VarId),
  /// The name comes from an external module.
  External(ModuleIdx, Atom),
  Missing,
}

pub(crate) fn link(graph: &mut Graph) -> BuildResult<()> {
  debug!("Link: {} records", graph.modules.len());
  validate_exports(graph);
  validate_reexports(graph);
  bind_imports(graph);
  sort_modules(graph);
  bind_references(graph);
  Ok(())
}

fn import_name_atom(name: &ImportName) -> Atom {
  match name {
    ImportName::Name(n) => n.clone(),
    ImportName::Default => Atom::from("default"),
    ImportName::Namespace => Atom::from("*"),
  }
}

/// Attaches `local_var` to every export that names a local binding;
/// exports of names that exist neither as bindings nor as imports are
/// substituted with an undefined variable and warned about.
fn validate_exports(graph: &mut Graph) {
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    let names = module.export_order.clone();
    let id = module.id().clone();
    for name in names {
      let Some(description) = graph.modules[idx]
        .as_normal()
        .and_then(|m| m.export_descriptions.get(&name).cloned())
      else {
        continue;
      };
      if description.local_var.is_some() || description.source.is_some() {
        continue;
      }
      let Some(local) = description.local_name.clone() else {
        continue;
      };
      let module = graph.modules[idx].as_normal_mut().expect("normal record");
      if let Some(var) = module.scopes.lookup(ScopeTree::MODULE, &local) {
        module
          .export_descriptions
          .get_mut(&name)
          .expect("validated export")
          .local_var = Some(var);
        continue;
      }
      if module.import_descriptions.contains_key(&local) {
        // Re-export of an imported binding, resolved through the
        // import chain.
        continue;
      }
      // `export { missing }`: bind to undefined and keep going.
      let var = module.variables.alloc(Variable::new(
        local.clone(),
        VariableKind::Undefined,
        ScopeTree::MODULE,
        None,
      ));
      let loc = line_col(&module.code, description.span_lo as usize);
      module
        .export_descriptions
        .get_mut(&name)
        .expect("validated export")
        .local_var = Some(var);
      graph.warn(
        Warning::new(
          WarningCode::NonExistentExport,
          format!("Exported binding {local:?} does not exist"),
        )
        .with_id(id.clone())
        .with_loc(loc)
        .with_names(vec![local.to_string()]),
      );
    }
  }
}

/// Re-exports whose chain resolves to nothing warn once and bind to an
/// undefined substitute, so importers downstream resolve silently.
fn validate_reexports(graph: &mut Graph) {
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    let id = module.id().clone();
    let names: Vec<Atom> = module
      .export_order
      .iter()
      .filter(|name| {
        module
          .export_descriptions
          .get(*name)
          .map(|d| d.source.is_some())
          .unwrap_or(false)
      })
      .cloned()
      .collect();
    for name in names {
      let mut resolve_set = vec![];
      let resolution = resolve_export(
        &mut graph.modules,
        &graph.module_by_id,
        idx,
        &name,
        &mut resolve_set,
      );
      if !matches!(resolution, ExportResolution::Missing) {
        continue;
      }
      let module = graph.modules[idx].as_normal_mut().expect("normal record");
      let span_lo = module
        .export_descriptions
        .get(&name)
        .map(|d| d.span_lo)
        .unwrap_or(0);
      let loc = line_col(&module.code, span_lo as usize);
      let substitute = module.variables.alloc(Variable::new(
        name.clone(),
        VariableKind::Undefined,
        ScopeTree::MODULE,
        None,
      ));
      module
        .export_descriptions
        .get_mut(&name)
        .expect("validated re-export")
        .local_var = Some(substitute);
      graph.warn(
        Warning::new(
          WarningCode::MissingExport,
          format!("Re-exported binding {name:?} could not be resolved"),
        )
        .with_id(id.clone())
        .with_loc(loc)
        .with_names(vec![name.to_string()]),
      );
    }
  }
}

fn namespace_var_of(modules: &mut [ModuleRecord], idx: ModuleIdx) -> VarId {
  match &mut modules[idx] {
    ModuleRecord::Normal(m) => m.namespace_variable(),
    ModuleRecord::External(m) => m.namespace_variable(),
  }
}

/// Resolves `name` against the exports of record `idx`, following
/// re-export chains and star exports. `resolve_set` guards against
/// re-export cycles.
pub(crate) fn resolve_export(
  modules: &mut [ModuleRecord],
  by_id: &HashMap<String, ModuleIdx>,
  idx: ModuleIdx,
  name: &Atom,
  resolve_set: &mut Vec<(ModuleIdx, Atom)>,
) -> ExportResolution {
  if modules[idx].is_external() {
    return ExportResolution::External(idx, name.clone());
  }
  if resolve_set.iter().any(|(i, n)| *i == idx && n == name) {
    // Circular re-export chains resolve to nothing.
    return ExportResolution::Missing;
  }
  resolve_set.push((idx, name.clone()));
  let resolution = resolve_export_inner(modules, by_id, idx, name, resolve_set);
  resolve_set.pop();
  resolution
}

fn resolve_export_inner(
  modules: &mut [ModuleRecord],
  by_id: &HashMap<String, ModuleIdx>,
  idx: ModuleIdx,
  name: &Atom,
  resolve_set: &mut Vec<(ModuleIdx, Atom)>,
) -> ExportResolution {
  let module = modules[idx].as_normal().expect("normal record");
  let description = module.export_descriptions.get(name).cloned();

  if let Some(description) = description {
    if let Some(var) = description.local_var {
      return ExportResolution::Found(idx, var);
    }

    if let Some(source) = &description.source {
      let Some(resolved) = module.resolved_ids.get(source).cloned() else {
        return ExportResolution::Missing;
      };
      let Some(target) = by_id.get(&resolved.id).copied() else {
        return ExportResolution::Missing;
      };
      let imported = description.imported.clone().unwrap_or(ImportName::Name(name.clone()));
      if modules[target].is_external() {
        return ExportResolution::External(target, import_name_atom(&imported));
      }
      return match imported {
        ImportName::Namespace => {
          ExportResolution::Found(target, namespace_var_of(modules, target))
        }
        other => resolve_export(
          modules,
          by_id,
          target,
          &import_name_atom(&other),
          resolve_set,
        ),
      };
    }

    if let Some(local) = &description.local_name {
      // `import {x} from 's'; export {x};`
      if let Some(import) = module.import_descriptions.get(local).cloned() {
        let Some(resolved) = module.resolved_ids.get(&import.source).cloned() else {
          return ExportResolution::Missing;
        };
        let Some(target) = by_id.get(&resolved.id).copied() else {
          return ExportResolution::Missing;
        };
        if modules[target].is_external() {
          return ExportResolution::External(target, import_name_atom(&import.name));
        }
        return match import.name {
          ImportName::Namespace => {
            ExportResolution::Found(target, namespace_var_of(modules, target))
          }
          other => resolve_export(
            modules,
            by_id,
            target,
            &import_name_atom(&other),
            resolve_set,
          ),
        };
      }
      return ExportResolution::Missing;
    }

    return ExportResolution::Missing;
  }

  // Star re-exports never provide the default export.
  if name.as_str() == "default" {
    return ExportResolution::Missing;
  }
  let star_sources = module.star_sources.clone();
  let mut external_star: Option<ModuleIdx> = None;
  for source in star_sources {
    let Some(resolved) = modules[idx]
      .as_normal()
      .and_then(|m| m.resolved_ids.get(&source).cloned())
    else {
      continue;
    };
    let Some(target) = by_id.get(&resolved.id).copied() else {
      continue;
    };
    if modules[target].is_external() {
      external_star.get_or_insert(target);
      continue;
    }
    if let found @ ExportResolution::Found(..) =
      resolve_export(modules, by_id, target, name, resolve_set)
    {
      return found;
    }
  }
  match external_star {
    // The name may exist on the external module; bind it there.
    Some(target) => ExportResolution::External(target, name.clone()),
    None => ExportResolution::Missing,
  }
}

/// Pass 1: attach producing module and concrete variable to every
/// import description.
fn bind_imports(graph: &mut Graph) {
  let shim = graph.options.shim_missing_exports;
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    let id = module.id().clone();
    let locals: Vec<Atom> = module.import_order.clone();
    for local in locals {
      let description = graph.modules[idx]
        .as_normal()
        .and_then(|m| m.import_descriptions.get(&local).cloned())
        .expect("import description");
      let Some(resolved) = graph.modules[idx]
        .as_normal()
        .and_then(|m| m.resolved_ids.get(&description.source).cloned())
      else {
        continue;
      };
      let Some(target) = graph.module_by_id.get(&resolved.id).copied() else {
        continue;
      };

      let bound = if graph.modules[target].is_external() {
        let var = graph.modules[target]
          .as_external_mut()
          .expect("external record")
          .variable(&import_name_atom(&description.name));
        Some((target, var))
      } else {
        match &description.name {
          ImportName::Namespace => {
            Some((target, namespace_var_of(&mut graph.modules, target)))
          }
          other => {
            let name = import_name_atom(other);
            let mut resolve_set = vec![];
            match resolve_export(
              &mut graph.modules,
              &graph.module_by_id,
              target,
              &name,
              &mut resolve_set,
            ) {
              ExportResolution::Found(m, v) => Some((m, v)),
              ExportResolution::External(m, n) => {
                let var = graph.modules[m]
                  .as_external_mut()
                  .expect("external record")
                  .variable(&n);
                Some((m, var))
              }
              ExportResolution::Missing => {
                let target_id = graph.modules[target].id().clone();
                let (loc, substitute) = {
                  let importer =
                    graph.modules[idx].as_normal_mut().expect("normal record");
                  let loc =
                    line_col(&importer.code, description.span_lo as usize);
                  let substitute = importer.variables.alloc(Variable::new(
                    name.clone(),
                    VariableKind::Undefined,
                    ScopeTree::MODULE,
                    None,
                  ));
                  (loc, substitute)
                };
                if shim {
                  // Shims register on the producing module so every
                  // importer shares one binding.
                  let producer =
                    graph.modules[target].as_normal_mut().expect("normal record");
                  let shim_var = producer.variables.alloc(Variable::new(
                    name.clone(),
                    VariableKind::Undefined,
                    ScopeTree::MODULE,
                    None,
                  ));
                  producer.export_descriptions.insert(
                    name.clone(),
                    crate::module::ExportDescription {
                      local_name: None,
                      local_var: Some(shim_var),
                      source: None,
                      imported: None,
                      span_lo: 0,
                    },
                  );
                  producer.export_order.push(name.clone());
                  graph.warn(
                    Warning::new(
                      WarningCode::MissingExport,
                      format!(
                        "{name:?} is not exported by {target_id:?}, a shimmed export was created"
                      ),
                    )
                    .with_id(id.clone())
                    .with_loc(loc)
                    .with_names(vec![name.to_string()]),
                  );
                  Some((target, shim_var))
                } else {
                  graph.warn(
                    Warning::new(
                      WarningCode::MissingExport,
                      format!("{name:?} is not exported by {target_id:?}"),
                    )
                    .with_id(id.clone())
                    .with_loc(loc)
                    .with_names(vec![name.to_string()]),
                  );
                  Some((idx, substitute))
                }
              }
            }
          }
        }
      };

      let module = graph.modules[idx].as_normal_mut().expect("normal record");
      let description = module
        .import_descriptions
        .get_mut(&local)
        .expect("import description");
      description.module = Some(target);
      description.bound = bound;
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  White,
  Grey,
  Black,
}

enum Action {
  Enter(ModuleIdx),
  Exit(ModuleIdx),
}

/// Pass 2: depth-first search from the entries (declaration order),
/// dependencies in AST order. The reversed post-order is the execution
/// order. A grey revisit is a cycle and warned with its full path.
fn sort_modules(graph: &mut Graph) {
  let count = graph.modules.len();
  let mut state = vec![Mark::White; count];
  let mut path: Vec<ModuleIdx> = vec![];
  let mut order: Vec<ModuleIdx> = vec![];
  let mut dynamic_roots: Vec<ModuleIdx> = vec![];
  let mut seen_cycles: HashSet<Vec<ModuleIdx>> = HashSet::new();

  let mut stack: Vec<Action> = graph
    .entries
    .iter()
    .rev()
    .map(|entry| Action::Enter(entry.idx))
    .collect();

  loop {
    while let Some(action) = stack.pop() {
      match action {
        Action::Enter(idx) => match state[idx] {
          Mark::Black => {}
          Mark::Grey => {
            let start = path
              .iter()
              .position(|&p| p == idx)
              .expect("grey module is on the path");
            let mut cycle: Vec<ModuleIdx> = path[start..].to_vec();
            cycle.push(idx);
            let mut key = cycle.clone();
            key.sort_unstable();
            key.dedup();
            if seen_cycles.insert(key) {
              let ids: Vec<String> =
                cycle.iter().map(|&i| graph.modules[i].id().clone()).collect();
              graph.warn(
                Warning::new(
                  WarningCode::CircularDependency,
                  format!("Circular dependency: {}", ids.join(" -> ")),
                )
                .with_cycle(ids),
              );
            }
          }
          Mark::White => {
            state[idx] = Mark::Grey;
            path.push(idx);
            stack.push(Action::Exit(idx));
            if let Some(module) = graph.modules[idx].as_normal() {
              let deps: Vec<ModuleIdx> = module
                .sources
                .iter()
                .filter_map(|s| module.resolved_ids.get(s))
                .filter_map(|r| graph.module_by_id.get(&r.id).copied())
                .collect();
              for dep in deps.iter().rev() {
                stack.push(Action::Enter(*dep));
              }
              dynamic_roots.extend(
                module
                  .dynamic_imports
                  .iter()
                  .filter_map(|d| d.resolution.as_ref())
                  .filter_map(|r| graph.module_by_id.get(&r.id).copied()),
              );
            }
          }
        },
        Action::Exit(idx) => {
          debug_assert_eq!(path.last(), Some(&idx));
          path.pop();
          state[idx] = Mark::Black;
          order.push(idx);
        }
      }
    }

    // Start again from modules imported dynamically.
    let mut pushed = false;
    while let Some(root) = dynamic_roots.pop() {
      if state[root] == Mark::White {
        stack.push(Action::Enter(root));
        pushed = true;
        break;
      }
    }
    if !pushed {
      break;
    }
  }

  for (exec, idx) in order.iter().enumerate() {
    if let Some(module) = graph.modules[*idx].as_normal_mut() {
      module.exec_order = exec as u32;
    }
  }
  graph.sorted_modules = order
    .into_iter()
    .filter(|&idx| !graph.modules[idx].is_external())
    .collect();
}

/// Pass 3: bind each statement's recorded references to concrete
/// variables; unresolved names register on the global scope.
fn bind_references(graph: &mut Graph) {
  for idx in 0..graph.modules.len() {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    let part_refs: Vec<Vec<Reference>> =
      module.parts.iter().map(|p| p.referenced.clone()).collect();

    let mut part_bound: Vec<Vec<BoundRef>> = Vec::with_capacity(part_refs.len());
    for refs in part_refs {
      let mut bound = Vec::with_capacity(refs.len());
      for reference in refs {
        match reference {
          Reference::Own(var) => bound.push(BoundRef::Own(var)),
          Reference::Free(name) => {
            bound.push(bind_free(graph, idx, &name, None));
          }
          Reference::FreeMember(name, member) => {
            bound.push(bind_free(graph, idx, &name, Some(&member)));
          }
        }
      }
      part_bound.push(bound);
    }

    let module = graph.modules[idx].as_normal_mut().expect("normal record");
    for (part, bound) in module.parts.iter_mut().zip(part_bound) {
      part.bound = bound;
    }
  }
}

/// Binds one free name of module `idx`: through its import table when
/// the name is an import local, to the global scope otherwise. A
/// static member read off a namespace import narrows to the single
/// export when it resolves.
fn bind_free(
  graph: &mut Graph,
  idx: ModuleIdx,
  name: &Atom,
  member: Option<&Atom>,
) -> BoundRef {
  let import = graph.modules[idx]
    .as_normal()
    .and_then(|m| m.import_descriptions.get(name).cloned());
  let Some(import) = import else {
    graph.global_scope.reference(name);
    return BoundRef::Global(name.clone());
  };

  let Some((target, var)) = import.bound else {
    // Unresolvable import; treat as global so nothing dangles.
    graph.global_scope.reference(name);
    return BoundRef::Global(name.clone());
  };

  if let (ImportName::Namespace, Some(member)) = (&import.name, member) {
    if !graph.modules[target].is_external() {
      let mut resolve_set = vec![];
      match resolve_export(
        &mut graph.modules,
        &graph.module_by_id,
        target,
        member,
        &mut resolve_set,
      ) {
        ExportResolution::Found(m, v) => return BoundRef::Foreign(m, v),
        ExportResolution::External(m, n) => {
          let ext_var = graph.modules[m]
            .as_external_mut()
            .expect("external record")
            .variable(&n);
          return BoundRef::Foreign(m, ext_var);
        }
        ExportResolution::Missing => {
          // Unknown member: the whole namespace is live from here on.
          graph.deopt_tracker.deoptimize(target, var, Some(member.clone()));
        }
      }
    }
  }

  BoundRef::Foreign(target, var)
}
