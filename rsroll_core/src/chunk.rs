//! Chunking.
//!
//! Colours every included module with the set of entry points that
//! reach it, groups identical colours into chunks, applies manual
//! chunk assignments, links cross-chunk imports and chooses external
//! names for every exported variable. Entries whose public signature
//! the host chunk cannot express get a facade chunk of re-exports.
//!
//! Returned order: all regular chunks first, then all facades.

use crate::diag::{Warning, WarningCode};
use crate::graph::Graph;
use crate::include::all_export_names_of;
use crate::link::{ExportResolution, resolve_export};
use crate::module::{BoundRef, ModuleId, ModuleIdx, ModuleRecord};
use crate::opts::{ManualChunksOption, PreserveEntrySignatures};
use crate::prelude::*;
use crate::variable::VarId;

use itertools::Itertools;
use swc_atoms::Atom;
use tracing::debug;

#[derive(Debug, Clone)]
/// One name a chunk exposes.
pub struct ChunkExport {
  /// Externally visible name, unique within the chunk.
  pub exported: String,
  /// Module the underlying variable lives in (possibly external).
  pub module: ModuleId,
  /// The variable's own name.
  pub local_name: String,
  pub(crate) target: (ModuleIdx, VarId),
}

#[derive(Debug, Clone)]
/// Names a chunk pulls in from another chunk.
pub struct ChunkImport {
  /// Index of the source chunk in the returned list.
  pub from: usize,
  /// `(exported name in the source chunk, local name here)`.
  pub names: Vec<(String, String)>,
}

#[derive(Debug)]
/// A group of modules that will emit together, ready for code
/// generation.
pub struct Chunk {
  pub name: String,
  /// Modules whose public exports must be surfaced by this chunk.
  pub entry_modules: Vec<ModuleId>,
  /// Member modules in execution order.
  pub ordered_modules: Vec<ModuleId>,
  pub external_dependencies: Vec<ModuleId>,
  pub imports: Vec<ChunkImport>,
  /// Chunks loaded through dynamic import sites of member modules.
  pub dynamic_imports: Vec<usize>,
  pub exports: Vec<ChunkExport>,
  pub is_facade: bool,
  /// Entry module a facade preserves.
  pub facade_of: Option<ModuleId>,
  pub(crate) module_idxs: Vec<ModuleIdx>,
}

/// Partitions the included modules into chunks.
pub(crate) fn generate_chunks(
  graph: &mut Graph,
  manual_groups: Vec<(String, Vec<ModuleIdx>)>,
  inline_dynamic: bool,
) -> Vec<Chunk> {
  let included: Vec<ModuleIdx> = graph
    .sorted_modules
    .iter()
    .copied()
    .filter(|&idx| {
      graph.modules[idx]
        .as_normal()
        .map(|m| m.is_included)
        .unwrap_or(false)
    })
    .collect();
  debug!("Chunk: {} included modules", included.len());

  let mut chunks = if graph.options.preserve_modules {
    preserve_modules_chunks(graph, &included)
  } else if inline_dynamic {
    if !manual_groups.is_empty() {
      graph.warn(Warning::new(
        WarningCode::InlineDynamicImports,
        "Manual chunks are ignored when inlining dynamic imports",
      ));
    }
    inline_dynamic_chunks(graph, &included)
  } else {
    colour_chunks(graph, &included, manual_groups)
  };

  link_chunks(graph, &mut chunks);
  let facades = build_facades(graph, &mut chunks);
  chunks.extend(facades);
  chunks
}

fn entry_alias(graph: &Graph, idx: ModuleIdx) -> String {
  graph
    .entries
    .iter()
    .find(|e| e.idx == idx)
    .and_then(|e| e.name.clone())
    .unwrap_or_else(|| file_stem(graph.modules[idx].id()))
}

fn file_stem(id: &str) -> String {
  std::path::Path::new(id)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("chunk")
    .to_string()
}

fn is_entry_idx(graph: &Graph, idx: ModuleIdx) -> bool {
  graph.entries.iter().any(|e| e.idx == idx)
}

/// One chunk per included module.
fn preserve_modules_chunks(graph: &Graph, included: &[ModuleIdx]) -> Vec<Chunk> {
  included
    .iter()
    .map(|&idx| {
      let id = graph.modules[idx].id().clone();
      Chunk {
        name: if is_entry_idx(graph, idx) {
          entry_alias(graph, idx)
        } else {
          file_stem(&id)
        },
        entry_modules: vec![id.clone()],
        ordered_modules: vec![id],
        external_dependencies: vec![],
        imports: vec![],
        dynamic_imports: vec![],
        exports: vec![],
        is_facade: false,
        facade_of: None,
        module_idxs: vec![idx],
      }
    })
    .collect()
}

/// Everything in one chunk.
fn inline_dynamic_chunks(graph: &Graph, included: &[ModuleIdx]) -> Vec<Chunk> {
  let entry_modules: Vec<ModuleId> = graph
    .entries
    .iter()
    .map(|e| graph.modules[e.idx].id().clone())
    .collect();
  let name = graph
    .entries
    .first()
    .map(|e| entry_alias(graph, e.idx))
    .unwrap_or_else(|| "chunk".to_string());
  vec![Chunk {
    name,
    entry_modules,
    ordered_modules: included
      .iter()
      .map(|&idx| graph.modules[idx].id().clone())
      .collect(),
    external_dependencies: vec![],
    imports: vec![],
    dynamic_imports: vec![],
    exports: vec![],
    is_facade: false,
    facade_of: None,
    module_idxs: included.to_vec(),
  }]
}

/// Default mode: reachable-entry-set colouring with manual overrides.
fn colour_chunks(
  graph: &mut Graph,
  included: &[ModuleIdx],
  manual_groups: Vec<(String, Vec<ModuleIdx>)>,
) -> Vec<Chunk> {
  let included_set: HashSet<ModuleIdx> = included.iter().copied().collect();

  // Colour seeds: user entries in declaration order, then dynamic
  // importees as their own roots.
  let mut seeds: Vec<ModuleIdx> = vec![];
  for entry in &graph.entries {
    if !seeds.contains(&entry.idx) {
      seeds.push(entry.idx);
    }
  }
  for &idx in included {
    let Some(module) = graph.modules[idx].as_normal() else {
      continue;
    };
    for dynamic in &module.dynamic_imports {
      if let Some(resolved) = &dynamic.resolution {
        if let Some(target) = graph.module_by_id.get(&resolved.id).copied() {
          if included_set.contains(&target) && !seeds.contains(&target) {
            seeds.push(target);
          }
        }
      }
    }
  }

  let words = seeds.len().div_ceil(64).max(1);
  let mut colors: HashMap<ModuleIdx, Vec<u64>> = HashMap::new();
  for (bit, &seed) in seeds.iter().enumerate() {
    // Forward DFS over static edges from each seed.
    let mut stack = vec![seed];
    let mut visited: HashSet<ModuleIdx> = HashSet::new();
    while let Some(idx) = stack.pop() {
      if !included_set.contains(&idx) || !visited.insert(idx) {
        continue;
      }
      let color = colors.entry(idx).or_insert_with(|| vec![0u64; words]);
      color[bit / 64] |= 1 << (bit % 64);
      if let Some(module) = graph.modules[idx].as_normal() {
        for source in &module.sources {
          if let Some(resolved) = module.resolved_ids.get(source) {
            if let Some(target) = graph.module_by_id.get(&resolved.id).copied() {
              stack.push(target);
            }
          }
        }
      }
    }
  }

  // Manual assignments override colours; first declaration wins.
  let manual = assign_manual_chunks(graph, included, &included_set, manual_groups);

  // Group by manual name or colour, first-seen order over the
  // execution-ordered module list.
  #[derive(Clone, PartialEq, Eq, Hash)]
  enum GroupKey {
    Manual(String),
    Color(Vec<u64>),
  }
  let mut group_order: Vec<GroupKey> = vec![];
  let mut groups: HashMap<GroupKey, Vec<ModuleIdx>> = HashMap::new();
  for &idx in included {
    let key = match manual.get(&idx) {
      Some(name) => GroupKey::Manual(name.clone()),
      None => GroupKey::Color(
        colors
          .get(&idx)
          .cloned()
          .unwrap_or_else(|| vec![0u64; words]),
      ),
    };
    if !groups.contains_key(&key) {
      group_order.push(key.clone());
    }
    groups.entry(key).or_default().push(idx);
  }

  let mut used_names: HashSet<String> = HashSet::new();
  let mut chunks = vec![];
  for key in group_order {
    let members = groups.remove(&key).expect("group exists");
    let entry_members: Vec<ModuleIdx> = members
      .iter()
      .copied()
      .filter(|&idx| is_entry_idx(graph, idx))
      .collect();
    let base_name = match &key {
      GroupKey::Manual(name) => name.clone(),
      GroupKey::Color(_) => match entry_members.first() {
        Some(&entry) => entry_alias(graph, entry),
        None => "chunk".to_string(),
      },
    };
    let mut name = base_name.clone();
    let mut counter = 2;
    while !used_names.insert(name.clone()) {
      name = format!("{base_name}-{counter}");
      counter += 1;
    }
    chunks.push(Chunk {
      name,
      entry_modules: entry_members
        .iter()
        .map(|&idx| graph.modules[idx].id().clone())
        .collect(),
      ordered_modules: members
        .iter()
        .map(|&idx| graph.modules[idx].id().clone())
        .collect(),
      external_dependencies: vec![],
      imports: vec![],
      dynamic_imports: vec![],
      exports: vec![],
      is_facade: false,
      facade_of: None,
      module_idxs: members,
    });
  }
  chunks
}

/// Resolves the manual chunk option into a per-module assignment.
/// Map groups claim everything reachable from their seeds up to the
/// next entry module; first declaration wins and conflicts warn.
fn assign_manual_chunks(
  graph: &Graph,
  included: &[ModuleIdx],
  included_set: &HashSet<ModuleIdx>,
  manual_groups: Vec<(String, Vec<ModuleIdx>)>,
) -> HashMap<ModuleIdx, String> {
  let mut manual: HashMap<ModuleIdx, String> = HashMap::new();

  if let Some(ManualChunksOption::Func(classify)) = &graph.options.manual_chunks {
    for &idx in included {
      if let Some(name) = classify(graph.modules[idx].id()) {
        manual.insert(idx, name);
      }
    }
    return manual;
  }

  let mut conflicts: Vec<(ModuleId, String, String)> = vec![];
  for (name, group_seeds) in &manual_groups {
    for &seed in group_seeds {
      let mut stack = vec![seed];
      let mut visited: HashSet<ModuleIdx> = HashSet::new();
      while let Some(idx) = stack.pop() {
        if !visited.insert(idx) || !included_set.contains(&idx) {
          continue;
        }
        if idx != seed && is_entry_idx(graph, idx) {
          continue;
        }
        match manual.get(&idx) {
          Some(existing) if existing != name => {
            conflicts.push((
              graph.modules[idx].id().clone(),
              existing.clone(),
              name.clone(),
            ));
            continue;
          }
          Some(_) => {}
          None => {
            manual.insert(idx, name.clone());
          }
        }
        if let Some(module) = graph.modules[idx].as_normal() {
          for source in &module.sources {
            if let Some(resolved) = module.resolved_ids.get(source) {
              if let Some(target) = graph.module_by_id.get(&resolved.id).copied()
              {
                stack.push(target);
              }
            }
          }
        }
      }
    }
  }
  for (id, kept, dropped) in conflicts {
    graph.warn(
      Warning::new(
        WarningCode::ManualChunkConflict,
        format!(
          "Module {id:?} is claimed by manual chunks {kept:?} and {dropped:?}; keeping {kept:?}"
        ),
      )
      .with_id(id),
    );
  }
  manual
}

/// The concrete variable behind each export name of an entry module.
fn entry_export_targets(
  graph: &mut Graph,
  idx: ModuleIdx,
) -> Vec<(Atom, ModuleIdx, VarId)> {
  let mut seen = HashSet::new();
  let (names, _external_stars) = all_export_names_of(graph, idx, &mut seen);
  let mut targets = vec![];
  for name in names {
    let mut resolve_set = vec![];
    match resolve_export(
      &mut graph.modules,
      &graph.module_by_id,
      idx,
      &name,
      &mut resolve_set,
    ) {
      ExportResolution::Found(target, var) => targets.push((name, target, var)),
      ExportResolution::External(target, external_name) => {
        let var = graph.modules[target]
          .as_external_mut()
          .expect("external record")
          .variable(&external_name);
        targets.push((name, target, var));
      }
      ExportResolution::Missing => {}
    }
  }
  targets
}

fn variable_home(graph: &Graph, target: ModuleIdx, var: VarId) -> (ModuleId, String) {
  match &graph.modules[target] {
    ModuleRecord::Normal(m) => {
      (m.id().clone(), m.variables.get(var).name().to_string())
    }
    ModuleRecord::External(m) => {
      (m.id().clone(), m.variables.get(var).name().to_string())
    }
  }
}

/// Computes cross-chunk imports, external dependencies and externally
/// visible export names for every chunk.
fn link_chunks(graph: &mut Graph, chunks: &mut [Chunk]) {
  let mut chunk_of: HashMap<ModuleIdx, usize> = HashMap::new();
  for (chunk_idx, chunk) in chunks.iter().enumerate() {
    for &idx in &chunk.module_idxs {
      chunk_of.insert(idx, chunk_idx);
    }
  }

  // Entry exports per chunk, in entry declaration order.
  let mut exports_per_chunk: Vec<Vec<(String, ModuleIdx, VarId)>> =
    vec![vec![]; chunks.len()];
  let entry_idxs: Vec<ModuleIdx> = graph.entries.iter().map(|e| e.idx).collect();
  for entry in entry_idxs {
    let preserve = graph.modules[entry]
      .as_normal()
      .map(|m| m.preserve_signature)
      .unwrap_or(PreserveEntrySignatures::None);
    if preserve == PreserveEntrySignatures::None {
      continue;
    }
    let Some(&chunk_idx) = chunk_of.get(&entry) else {
      continue;
    };
    for (name, target, var) in entry_export_targets(graph, entry) {
      let slot = &mut exports_per_chunk[chunk_idx];
      if !slot.iter().any(|(n, ..)| n.as_str() == name.as_str()) {
        slot.push((name.to_string(), target, var));
      }
    }
  }

  // Dynamic import targets surface their whole signature from their
  // chunk; the importing side consumes the namespace.
  let mut dynamic_entries: Vec<ModuleIdx> = vec![];
  for chunk in chunks.iter() {
    for &member in &chunk.module_idxs {
      let Some(module) = graph.modules[member].as_normal() else {
        continue;
      };
      for dynamic in &module.dynamic_imports {
        if let Some(resolved) = &dynamic.resolution {
          if let Some(target) = graph.module_by_id.get(&resolved.id).copied() {
            if chunk_of.contains_key(&target) && !dynamic_entries.contains(&target)
            {
              dynamic_entries.push(target);
            }
          }
        }
      }
    }
  }
  for entry in dynamic_entries {
    let Some(&chunk_idx) = chunk_of.get(&entry) else {
      continue;
    };
    for (name, target, var) in entry_export_targets(graph, entry) {
      let slot = &mut exports_per_chunk[chunk_idx];
      if !slot.iter().any(|(n, ..)| n.as_str() == name.as_str()) {
        slot.push((name.to_string(), target, var));
      }
    }
  }

  // Cross-chunk references: an included statement reading a variable
  // that lives in another chunk imports it from there; the owning
  // chunk must export it.
  let mut needed: Vec<(usize, usize, ModuleIdx, VarId)> = vec![];
  let mut external_deps: Vec<HashSet<ModuleId>> = vec![HashSet::new(); chunks.len()];
  let mut dynamic_imports: Vec<Vec<usize>> = vec![vec![]; chunks.len()];
  for (chunk_idx, chunk) in chunks.iter().enumerate() {
    for &member in &chunk.module_idxs {
      let Some(module) = graph.modules[member].as_normal() else {
        continue;
      };
      for part in &module.parts {
        if !part.included {
          continue;
        }
        for bound in &part.bound {
          let BoundRef::Foreign(target, var) = bound else {
            continue;
          };
          if graph.modules[*target].is_external() {
            external_deps[chunk_idx].insert(graph.modules[*target].id().clone());
            continue;
          }
          match chunk_of.get(target) {
            Some(&owner) if owner != chunk_idx => {
              needed.push((chunk_idx, owner, *target, *var));
            }
            _ => {}
          }
        }
      }
      // Side-effect imports of external modules keep the dependency
      // even without a used binding.
      for source in &module.sources {
        if let Some(resolved) = module.resolved_ids.get(source) {
          if resolved.external && {
            graph
              .module_by_id
              .get(&resolved.id)
              .and_then(|t| graph.modules[*t].as_external())
              .map(|e| e.module_side_effects)
              .unwrap_or(false)
          } {
            external_deps[chunk_idx].insert(resolved.id.clone());
          }
        }
      }
      for dynamic in &module.dynamic_imports {
        if let Some(resolved) = &dynamic.resolution {
          if let Some(target) = graph.module_by_id.get(&resolved.id).copied() {
            if let Some(&owner) = chunk_of.get(&target) {
              if owner != chunk_idx && !dynamic_imports[chunk_idx].contains(&owner)
              {
                dynamic_imports[chunk_idx].push(owner);
              }
            }
          }
        }
      }
    }
  }

  // A chunk re-exporting a variable that lives elsewhere (an entry
  // whose export chain crosses chunks) pulls it in like any reader.
  for (chunk_idx, slots) in exports_per_chunk.iter().enumerate() {
    for (_, target, var) in slots {
      if let Some(&owner) = chunk_of.get(target) {
        if owner != chunk_idx {
          needed.push((chunk_idx, owner, *target, *var));
        }
      }
    }
  }

  for (_, owner, target, var) in &needed {
    let slot = &mut exports_per_chunk[*owner];
    if !slot.iter().any(|(_, t, v)| t == target && v == var) {
      let (_, local_name) = variable_home(graph, *target, *var);
      slot.push((local_name, *target, *var));
    }
  }

  // Choose externally visible names; collisions get a numeric suffix.
  let mut chosen: HashMap<(ModuleIdx, VarId), (usize, String)> = HashMap::new();
  for (chunk_idx, chunk) in chunks.iter_mut().enumerate() {
    let mut used: HashSet<String> = HashSet::new();
    for (base, target, var) in exports_per_chunk[chunk_idx].drain(..) {
      let base = if base.is_empty() {
        "_".to_string()
      } else {
        base
      };
      let mut exported = base.clone();
      let mut counter = 1;
      while !used.insert(exported.clone()) {
        exported = format!("{base}${counter}");
        counter += 1;
      }
      // Only the owning chunk's name is canonical for import edges.
      let owns = match chunk_of.get(&target) {
        Some(&owner) => owner == chunk_idx,
        None => true,
      };
      if owns {
        chosen
          .entry((target, var))
          .or_insert((chunk_idx, exported.clone()));
      }
      let (module_id, local_name) = variable_home(graph, target, var);
      chunk.exports.push(ChunkExport {
        exported,
        module: module_id,
        local_name,
        target: (target, var),
      });
    }
    chunk.external_dependencies =
      external_deps[chunk_idx].iter().cloned().sorted().collect();
    chunk.dynamic_imports = std::mem::take(&mut dynamic_imports[chunk_idx]);
  }

  // Materialise the import lists from the chosen names.
  let mut imports_per_chunk: Vec<HashMap<usize, Vec<(String, String)>>> =
    vec![HashMap::new(); chunks.len()];
  for (chunk_idx, owner, target, var) in needed {
    let Some((_, exported)) = chosen.get(&(target, var)).cloned() else {
      continue;
    };
    let (_, local) = variable_home(graph, target, var);
    let entry = imports_per_chunk[chunk_idx].entry(owner).or_default();
    if !entry.iter().any(|(e, _)| *e == exported) {
      entry.push((exported, local));
    }
  }
  for (chunk_idx, mut imports) in imports_per_chunk.into_iter().enumerate() {
    let mut froms: Vec<usize> = imports.keys().copied().collect();
    froms.sort_unstable();
    for from in froms {
      let names = imports.remove(&from).expect("import entry");
      chunks[chunk_idx].imports.push(ChunkImport { from, names });
    }
  }
}

/// Synthesises facade chunks for entries whose signature the host
/// chunk cannot expose directly.
fn build_facades(graph: &mut Graph, chunks: &mut [Chunk]) -> Vec<Chunk> {
  let mut chunk_of: HashMap<ModuleIdx, usize> = HashMap::new();
  for (chunk_idx, chunk) in chunks.iter().enumerate() {
    for &idx in &chunk.module_idxs {
      chunk_of.insert(idx, chunk_idx);
    }
  }

  let mut facades = vec![];
  let mut claimed: HashSet<usize> = HashSet::new();
  let entries: Vec<(ModuleIdx, Option<String>)> = graph
    .entries
    .iter()
    .map(|e| (e.idx, e.name.clone()))
    .collect();

  for (entry, name) in entries {
    let preserve = graph.modules[entry]
      .as_normal()
      .map(|m| m.preserve_signature)
      .unwrap_or(PreserveEntrySignatures::None);
    if preserve == PreserveEntrySignatures::None {
      continue;
    }
    let Some(&host) = chunk_of.get(&entry) else {
      continue;
    };

    let targets = entry_export_targets(graph, entry);
    let host_chunk = &chunks[host];
    let expressible = targets.iter().all(|(name, target, var)| {
      host_chunk
        .exports
        .iter()
        .any(|e| e.exported == name.as_str() && e.target == (*target, *var))
    });
    let exact = host_chunk.exports.len() == targets.len();
    let satisfied = expressible
      && match preserve {
        PreserveEntrySignatures::Strict => exact,
        PreserveEntrySignatures::AllowExtension => true,
        PreserveEntrySignatures::None => true,
      };

    if satisfied && claimed.insert(host) {
      continue;
    }

    // The facade only re-exports the entry's surface from the host.
    let entry_id = graph.modules[entry].id().clone();
    let mut names = vec![];
    let mut exports = vec![];
    for (export_name, target, var) in &targets {
      let Some(chosen) = chunks[host]
        .exports
        .iter()
        .find(|e| e.target == (*target, *var))
      else {
        continue;
      };
      names.push((chosen.exported.clone(), chosen.local_name.clone()));
      exports.push(ChunkExport {
        exported: export_name.to_string(),
        module: chosen.module.clone(),
        local_name: chosen.local_name.clone(),
        target: chosen.target,
      });
    }
    facades.push(Chunk {
      name: name.unwrap_or_else(|| file_stem(&entry_id)),
      entry_modules: vec![entry_id.clone()],
      ordered_modules: vec![],
      external_dependencies: vec![],
      imports: vec![ChunkImport { from: host, names }],
      dynamic_imports: vec![],
      exports,
      is_facade: true,
      facade_of: Some(entry_id),
      module_idxs: vec![],
    });
  }
  facades
}
