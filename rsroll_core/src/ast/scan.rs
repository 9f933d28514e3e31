//! Module scanning.
//!
//! One pass over a parsed module produces everything the later phases
//! need: the import/export tables, dynamic import sites, the scope
//! tree with its variable arena, and a summary per top-level statement
//! (declared variables, referenced module-scope/global names, and a
//! side-effect verdict).
//!
//! Scanning is two-phase per scope so hoisting works: bindings are
//! declared first, references are collected second.

use crate::ast::effects::{EffectsCtx, decl_has_effects, expr_has_effects, stmt_has_effects};
use crate::ast::literal::{LiteralEnv, literal_value};
use crate::ast::parse::ParsedModule;
use crate::module::{ExportDescription, ImportDescription, ImportName};
use crate::opts::TreeshakeOptions;
use crate::prelude::*;
use crate::scope::{ScopeId, ScopeKind, ScopeTree};
use crate::variable::{VarId, Variable, VariableKind, VariableTable};

use crate::module::BoundRef;
use swc_atoms::Atom;
use swc_ecma_ast as js;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A reference recorded while scanning one top-level statement.
pub enum Reference {
  /// A module-scope variable of this module.
  Own(VarId),
  /// A name not bound by the scope tree: an import local or a global.
  Free(Atom),
  /// A static member read off a free name (`ns.prop`); lets the
  /// includer narrow namespace usage to a single export.
  FreeMember(Atom, Atom),
}

#[derive(Debug)]
/// Summary of one top-level statement.
pub struct StatementPart {
  pub index: usize,
  /// Module-scope variables this statement declares.
  pub declared: Vec<VarId>,
  pub referenced: Vec<Reference>,
  /// `referenced` after link-time binding.
  pub bound: Vec<BoundRef>,
  pub side_effects: bool,
  pub included: bool,
  /// Import/re-export statements emit no code of their own.
  pub import_only: bool,
  /// Offset of the statement in the source text.
  pub span_lo: u32,
}

#[derive(Debug, Clone)]
/// One `import(...)` site.
pub struct DynamicImportSite {
  /// Top-level statement the site occurs in.
  pub part: usize,
  /// Static specifier, when the argument is a string literal.
  pub specifier: Option<Atom>,
  pub span_lo: u32,
}

#[derive(Debug, Default)]
/// Everything scanning one module produces.
pub struct ScanResult {
  pub scopes: ScopeTree,
  pub variables: VariableTable,
  pub parts: Vec<StatementPart>,
  /// Static import/re-export specifiers, AST order, deduplicated.
  pub sources: Vec<Atom>,
  /// Local name of an import binding to its description.
  pub import_descriptions: HashMap<Atom, ImportDescription>,
  /// Import locals in declaration order.
  pub import_order: Vec<Atom>,
  /// Exported name to its description.
  pub export_descriptions: HashMap<Atom, ExportDescription>,
  /// Exported names in declaration order.
  pub export_order: Vec<Atom>,
  /// Sources of `export * from` statements.
  pub star_sources: Vec<Atom>,
  pub dynamic_imports: Vec<DynamicImportSite>,
}

/// Scans a parsed module.
pub fn scan_module(parsed: &ParsedModule, treeshake: &TreeshakeOptions) -> ScanResult {
  let mut scanner = Scanner {
    offset: parsed.offset,
    treeshake,
    pure_positions: &parsed.pure_positions,
    scopes: ScopeTree::new(),
    variables: VariableTable::new(),
    import_descriptions: HashMap::new(),
    import_order: vec![],
    export_descriptions: HashMap::new(),
    export_order: vec![],
    sources: vec![],
    seen_sources: HashSet::new(),
    star_sources: vec![],
    dynamic_imports: vec![],
    env: LiteralEnv::new(),
    current_part: 0,
    refs: vec![],
  };

  // Phase 1: module-scope declarations, import/export records, the
  // constant-literal environment.
  for (index, item) in parsed.ast.body.iter().enumerate() {
    scanner.declare_item(index, item);
  }

  // Phase 2: references and side-effect verdicts.
  let mut parts = Vec::with_capacity(parsed.ast.body.len());
  for (index, item) in parsed.ast.body.iter().enumerate() {
    parts.push(scanner.scan_item(index, item));
  }

  ScanResult {
    scopes: scanner.scopes,
    variables: scanner.variables,
    parts,
    sources: scanner.sources,
    import_descriptions: scanner.import_descriptions,
    import_order: scanner.import_order,
    export_descriptions: scanner.export_descriptions,
    export_order: scanner.export_order,
    star_sources: scanner.star_sources,
    dynamic_imports: scanner.dynamic_imports,
  }
}

fn export_name_atom(name: &js::ModuleExportName) -> Atom {
  match name {
    js::ModuleExportName::Ident(ident) => ident.sym.clone(),
    js::ModuleExportName::Str(s) => s.value.clone(),
  }
}

struct Scanner<'a> {
  offset: u32,
  treeshake: &'a TreeshakeOptions,
  pure_positions: &'a HashSet<u32>,
  scopes: ScopeTree,
  variables: VariableTable,
  import_descriptions: HashMap<Atom, ImportDescription>,
  import_order: Vec<Atom>,
  export_descriptions: HashMap<Atom, ExportDescription>,
  export_order: Vec<Atom>,
  sources: Vec<Atom>,
  seen_sources: HashSet<Atom>,
  star_sources: Vec<Atom>,
  dynamic_imports: Vec<DynamicImportSite>,
  env: LiteralEnv,
  current_part: usize,
  refs: Vec<Reference>,
}

impl<'a> Scanner<'a> {
  fn rel(&self, pos: swc_common::BytePos) -> u32 {
    pos.0.saturating_sub(self.offset)
  }

  fn add_source(&mut self, source: &Atom) {
    if self.seen_sources.insert(source.clone()) {
      self.sources.push(source.clone());
    }
  }

  fn alloc_var(
    &mut self,
    name: Atom,
    kind: VariableKind,
    scope: ScopeId,
    part: Option<usize>,
  ) -> VarId {
    let var = self
      .variables
      .alloc(Variable::new(name.clone(), kind, scope, part));
    self.scopes.declare(scope, name, var);
    var
  }

  fn add_export(&mut self, name: Atom, description: ExportDescription) {
    if !self.export_descriptions.contains_key(&name) {
      self.export_order.push(name.clone());
    }
    self.export_descriptions.insert(name, description);
  }

  // Phase 1 {

  fn declare_item(&mut self, index: usize, item: &js::ModuleItem) {
    match item {
      js::ModuleItem::ModuleDecl(decl) => self.declare_module_decl(index, decl),
      js::ModuleItem::Stmt(stmt) => self.declare_top_stmt(index, stmt),
    }
  }

  fn declare_module_decl(&mut self, index: usize, decl: &js::ModuleDecl) {
    match decl {
      js::ModuleDecl::Import(import) => {
        self.add_source(&import.src.value);
        for spec in &import.specifiers {
          let (local, name, span_lo) = match spec {
            js::ImportSpecifier::Named(named) => {
              let imported = named
                .imported
                .as_ref()
                .map(export_name_atom)
                .unwrap_or_else(|| named.local.sym.clone());
              (
                named.local.sym.clone(),
                ImportName::Name(imported),
                self.rel(named.span.lo),
              )
            }
            js::ImportSpecifier::Default(default) => (
              default.local.sym.clone(),
              ImportName::Default,
              self.rel(default.span.lo),
            ),
            js::ImportSpecifier::Namespace(ns) => (
              ns.local.sym.clone(),
              ImportName::Namespace,
              self.rel(ns.span.lo),
            ),
          };
          if !self.import_descriptions.contains_key(&local) {
            self.import_order.push(local.clone());
          }
          self.import_descriptions.insert(
            local,
            ImportDescription {
              source: import.src.value.clone(),
              name,
              module: None,
              bound: None,
              span_lo,
            },
          );
        }
      }
      js::ModuleDecl::ExportDecl(export) => {
        let declared = self.declare_top_decl(&export.decl, index);
        for (name, var) in declared {
          self.add_export(
            name.clone(),
            ExportDescription {
              local_name: Some(name),
              local_var: Some(var),
              source: None,
              imported: None,
              span_lo: self.rel(export.span.lo),
            },
          );
        }
      }
      js::ModuleDecl::ExportNamed(named) => {
        if let Some(src) = &named.src {
          self.add_source(&src.value);
        }
        for spec in &named.specifiers {
          let span_lo = self.rel(named.span.lo);
          match spec {
            js::ExportSpecifier::Named(n) => {
              let orig = export_name_atom(&n.orig);
              let exported = n
                .exported
                .as_ref()
                .map(export_name_atom)
                .unwrap_or_else(|| orig.clone());
              let description = match &named.src {
                Some(src) => ExportDescription {
                  local_name: None,
                  local_var: None,
                  source: Some(src.value.clone()),
                  imported: Some(ImportName::Name(orig)),
                  span_lo,
                },
                None => ExportDescription {
                  local_name: Some(orig),
                  local_var: None,
                  source: None,
                  imported: None,
                  span_lo,
                },
              };
              self.add_export(exported, description);
            }
            js::ExportSpecifier::Namespace(ns) => {
              if let Some(src) = &named.src {
                self.add_export(
                  export_name_atom(&ns.name),
                  ExportDescription {
                    local_name: None,
                    local_var: None,
                    source: Some(src.value.clone()),
                    imported: Some(ImportName::Namespace),
                    span_lo,
                  },
                );
              }
            }
            js::ExportSpecifier::Default(d) => {
              if let Some(src) = &named.src {
                self.add_export(
                  d.exported.sym.clone(),
                  ExportDescription {
                    local_name: None,
                    local_var: None,
                    source: Some(src.value.clone()),
                    imported: Some(ImportName::Default),
                    span_lo,
                  },
                );
              }
            }
          }
        }
      }
      js::ModuleDecl::ExportDefaultDecl(export) => {
        let span_lo = self.rel(export.span.lo);
        let (local_name, var) = match &export.decl {
          js::DefaultDecl::Fn(f) => match &f.ident {
            Some(ident) => {
              let var = self.alloc_var(
                ident.sym.clone(),
                VariableKind::Local,
                ScopeTree::MODULE,
                Some(index),
              );
              (Some(ident.sym.clone()), var)
            }
            None => {
              let var = self.variables.alloc(Variable::new(
                Atom::from("default"),
                VariableKind::ExportDefault,
                ScopeTree::MODULE,
                Some(index),
              ));
              (None, var)
            }
          },
          js::DefaultDecl::Class(c) => match &c.ident {
            Some(ident) => {
              let var = self.alloc_var(
                ident.sym.clone(),
                VariableKind::Local,
                ScopeTree::MODULE,
                Some(index),
              );
              (Some(ident.sym.clone()), var)
            }
            None => {
              let var = self.variables.alloc(Variable::new(
                Atom::from("default"),
                VariableKind::ExportDefault,
                ScopeTree::MODULE,
                Some(index),
              ));
              (None, var)
            }
          },
          js::DefaultDecl::TsInterfaceDecl(_) => return,
        };
        self.add_export(
          Atom::from("default"),
          ExportDescription {
            local_name,
            local_var: Some(var),
            source: None,
            imported: None,
            span_lo,
          },
        );
      }
      js::ModuleDecl::ExportDefaultExpr(export) => {
        let var = self.variables.alloc(Variable::new(
          Atom::from("default"),
          VariableKind::ExportDefault,
          ScopeTree::MODULE,
          Some(index),
        ));
        self.add_export(
          Atom::from("default"),
          ExportDescription {
            local_name: None,
            local_var: Some(var),
            source: None,
            imported: None,
            span_lo: self.rel(export.span.lo),
          },
        );
      }
      js::ModuleDecl::ExportAll(export) => {
        self.add_source(&export.src.value);
        self.star_sources.push(export.src.value.clone());
      }
      _ => {}
    }
  }

  /// Declares the bindings of a top-level declaration and returns
  /// their names.
  fn declare_top_decl(&mut self, decl: &js::Decl, index: usize) -> Vec<(Atom, VarId)> {
    let mut declared = vec![];
    match decl {
      js::Decl::Fn(f) => {
        let var = self.alloc_var(
          f.ident.sym.clone(),
          VariableKind::Local,
          ScopeTree::MODULE,
          Some(index),
        );
        declared.push((f.ident.sym.clone(), var));
      }
      js::Decl::Class(c) => {
        let var = self.alloc_var(
          c.ident.sym.clone(),
          VariableKind::Local,
          ScopeTree::MODULE,
          Some(index),
        );
        declared.push((c.ident.sym.clone(), var));
      }
      js::Decl::Var(var_decl) => {
        for declarator in &var_decl.decls {
          let before = declared.len();
          self.declare_pat_into(&declarator.name, ScopeTree::MODULE, index, &mut declared);
          // A single-name `const` with a literal initializer feeds the
          // constant environment used for branch pruning.
          if var_decl.kind == js::VarDeclKind::Const
            && declared.len() == before + 1
            && matches!(declarator.name, js::Pat::Ident(_))
          {
            if let Some(init) = declarator.init.as_deref() {
              if let Some(value) = literal_value(init, &self.env) {
                self.env.insert(declared[before].0.clone(), value);
              }
            }
          }
        }
      }
      js::Decl::Using(using) => {
        for declarator in &using.decls {
          self.declare_pat_into(&declarator.name, ScopeTree::MODULE, index, &mut declared);
        }
      }
      _ => {}
    }
    declared
  }

  fn declare_top_stmt(&mut self, index: usize, stmt: &js::Stmt) {
    match stmt {
      js::Stmt::Decl(decl) => {
        self.declare_top_decl(decl, index);
      }
      // `var` statements nested in top-level blocks hoist to module
      // scope.
      other => self.hoist_nested_vars(other, index),
    }
  }

  fn hoist_nested_vars(&mut self, stmt: &js::Stmt, index: usize) {
    match stmt {
      js::Stmt::Decl(js::Decl::Var(var_decl)) if var_decl.kind == js::VarDeclKind::Var => {
        let mut declared = vec![];
        for declarator in &var_decl.decls {
          self.declare_pat_into(&declarator.name, ScopeTree::MODULE, index, &mut declared);
        }
      }
      js::Stmt::Block(block) => {
        for stmt in &block.stmts {
          self.hoist_nested_vars(stmt, index);
        }
      }
      js::Stmt::If(i) => {
        self.hoist_nested_vars(&i.cons, index);
        if let Some(alt) = &i.alt {
          self.hoist_nested_vars(alt, index);
        }
      }
      js::Stmt::While(w) => self.hoist_nested_vars(&w.body, index),
      js::Stmt::DoWhile(w) => self.hoist_nested_vars(&w.body, index),
      js::Stmt::For(f) => {
        if let Some(js::VarDeclOrExpr::VarDecl(var_decl)) = &f.init {
          if var_decl.kind == js::VarDeclKind::Var {
            let mut declared = vec![];
            for declarator in &var_decl.decls {
              self.declare_pat_into(
                &declarator.name,
                ScopeTree::MODULE,
                index,
                &mut declared,
              );
            }
          }
        }
        self.hoist_nested_vars(&f.body, index);
      }
      js::Stmt::ForIn(f) => {
        self.hoist_for_head(&f.left, index);
        self.hoist_nested_vars(&f.body, index);
      }
      js::Stmt::ForOf(f) => {
        self.hoist_for_head(&f.left, index);
        self.hoist_nested_vars(&f.body, index);
      }
      js::Stmt::Labeled(l) => self.hoist_nested_vars(&l.body, index),
      js::Stmt::Try(t) => {
        for stmt in &t.block.stmts {
          self.hoist_nested_vars(stmt, index);
        }
        if let Some(handler) = &t.handler {
          for stmt in &handler.body.stmts {
            self.hoist_nested_vars(stmt, index);
          }
        }
        if let Some(finalizer) = &t.finalizer {
          for stmt in &finalizer.stmts {
            self.hoist_nested_vars(stmt, index);
          }
        }
      }
      js::Stmt::Switch(s) => {
        for case in &s.cases {
          for stmt in &case.cons {
            self.hoist_nested_vars(stmt, index);
          }
        }
      }
      _ => {}
    }
  }

  fn hoist_for_head(&mut self, head: &js::ForHead, index: usize) {
    if let js::ForHead::VarDecl(var_decl) = head {
      if var_decl.kind == js::VarDeclKind::Var {
        let mut declared = vec![];
        for declarator in &var_decl.decls {
          self.declare_pat_into(&declarator.name, ScopeTree::MODULE, index, &mut declared);
        }
      }
    }
  }

  fn declare_pat_into(
    &mut self,
    pat: &js::Pat,
    scope: ScopeId,
    index: usize,
    declared: &mut Vec<(Atom, VarId)>,
  ) {
    match pat {
      js::Pat::Ident(ident) => {
        let name = ident.id.sym.clone();
        let var = self.alloc_var(name.clone(), VariableKind::Local, scope, Some(index));
        declared.push((name, var));
      }
      js::Pat::Array(arr) => {
        for elem in arr.elems.iter().flatten() {
          self.declare_pat_into(elem, scope, index, declared);
        }
      }
      js::Pat::Rest(rest) => self.declare_pat_into(&rest.arg, scope, index, declared),
      js::Pat::Object(obj) => {
        for prop in &obj.props {
          match prop {
            js::ObjectPatProp::KeyValue(kv) => {
              self.declare_pat_into(&kv.value, scope, index, declared);
            }
            js::ObjectPatProp::Assign(assign) => {
              let name = assign.key.id.sym.clone();
              let var = self.alloc_var(name.clone(), VariableKind::Local, scope, Some(index));
              declared.push((name, var));
            }
            js::ObjectPatProp::Rest(rest) => {
              self.declare_pat_into(&rest.arg, scope, index, declared);
            }
          }
        }
      }
      js::Pat::Assign(assign) => {
        self.declare_pat_into(&assign.left, scope, index, declared);
      }
      js::Pat::Expr(_) | js::Pat::Invalid(_) => {}
    }
  }

  // Phase 1 }

  // Phase 2 {

  fn scan_item(&mut self, index: usize, item: &js::ModuleItem) -> StatementPart {
    self.current_part = index;
    self.refs = vec![];

    let (side_effects, import_only, span_lo) = match item {
      js::ModuleItem::ModuleDecl(decl) => {
        let span_lo = self.rel(decl_span_lo(decl));
        match decl {
          js::ModuleDecl::Import(_)
          | js::ModuleDecl::ExportAll(_) => (false, true, span_lo),
          js::ModuleDecl::ExportNamed(_) => (false, true, span_lo),
          js::ModuleDecl::ExportDecl(export) => {
            let effects = self.item_effects(|ctx| decl_has_effects(&export.decl, ctx));
            self.visit_decl(&export.decl, ScopeTree::MODULE);
            (effects, false, span_lo)
          }
          js::ModuleDecl::ExportDefaultDecl(export) => {
            let effects = match &export.decl {
              js::DefaultDecl::Class(c) => self.item_effects(|ctx| {
                crate::ast::effects::class_has_effects(&c.class, ctx)
              }),
              _ => false,
            };
            match &export.decl {
              js::DefaultDecl::Fn(f) => {
                let fscope = self.scopes.push(ScopeKind::Function, ScopeTree::MODULE);
                if let Some(ident) = &f.ident {
                  self.alloc_var(
                    ident.sym.clone(),
                    VariableKind::Local,
                    fscope,
                    None,
                  );
                }
                self.visit_function_in(&f.function, fscope);
              }
              js::DefaultDecl::Class(c) => {
                self.visit_class(&c.class, ScopeTree::MODULE);
              }
              js::DefaultDecl::TsInterfaceDecl(_) => {}
            }
            (effects, false, span_lo)
          }
          js::ModuleDecl::ExportDefaultExpr(export) => {
            let effects = self.item_effects(|ctx| expr_has_effects(&export.expr, ctx));
            self.visit_expr(&export.expr, ScopeTree::MODULE);
            (effects, false, span_lo)
          }
          _ => (false, true, span_lo),
        }
      }
      js::ModuleItem::Stmt(stmt) => {
        use swc_common::Spanned;
        let span_lo = self.rel(stmt.span().lo);
        let effects = self.item_effects(|ctx| stmt_has_effects(stmt, ctx));
        self.visit_stmt(stmt, ScopeTree::MODULE);
        (effects, false, span_lo)
      }
    };

    let declared = self
      .variables
      .iter()
      .filter(|(_, v)| {
        v.declared_part() == Some(index) && v.scope() == ScopeTree::MODULE
      })
      .map(|(id, _)| id)
      .collect();

    StatementPart {
      index,
      declared,
      referenced: std::mem::take(&mut self.refs),
      bound: vec![],
      side_effects,
      included: false,
      import_only,
      span_lo,
    }
  }

  fn item_effects(&self, check: impl FnOnce(EffectsCtx<'_>) -> bool) -> bool {
    let scopes = &self.scopes;
    let imports = &self.import_descriptions;
    let known = move |name: &Atom| {
      scopes.lookup(ScopeTree::MODULE, name).is_some() || imports.contains_key(name)
    };
    let ctx = EffectsCtx {
      treeshake: self.treeshake,
      pure_positions: self.pure_positions,
      env: &self.env,
      known: &known,
      in_try: false,
    };
    check(ctx)
  }

  fn record_ident_ref(&mut self, sym: &Atom, scope: ScopeId) {
    match self.scopes.lookup(scope, sym) {
      Some(var) => {
        if self.variables.get(var).scope() == ScopeTree::MODULE {
          self.refs.push(Reference::Own(var));
        }
      }
      None => self.refs.push(Reference::Free(sym.clone())),
    }
  }

  fn record_reassignment(&mut self, sym: &Atom, scope: ScopeId) {
    match self.scopes.lookup(scope, sym) {
      Some(var) => {
        self.variables.get_mut(var).set_reassigned();
        self.env.remove(sym);
        if self.variables.get(var).scope() == ScopeTree::MODULE {
          self.refs.push(Reference::Own(var));
        }
      }
      None => self.refs.push(Reference::Free(sym.clone())),
    }
  }

  fn visit_stmt(&mut self, stmt: &js::Stmt, scope: ScopeId) {
    match stmt {
      js::Stmt::Block(block) => {
        let inner = self.enter_block(&block.stmts, scope);
        for stmt in &block.stmts {
          self.visit_stmt(stmt, inner);
        }
      }
      js::Stmt::Empty(_) | js::Stmt::Debugger(_) => {}
      js::Stmt::With(w) => {
        self.visit_expr(&w.obj, scope);
        self.visit_stmt(&w.body, scope);
      }
      js::Stmt::Return(r) => {
        if let Some(arg) = &r.arg {
          self.visit_expr(arg, scope);
        }
      }
      js::Stmt::Labeled(l) => self.visit_stmt(&l.body, scope),
      js::Stmt::Break(_) | js::Stmt::Continue(_) => {}
      js::Stmt::If(i) => {
        self.visit_expr(&i.test, scope);
        self.visit_stmt(&i.cons, scope);
        if let Some(alt) = &i.alt {
          self.visit_stmt(alt, scope);
        }
      }
      js::Stmt::Switch(s) => {
        self.visit_expr(&s.discriminant, scope);
        let mut case_stmts: Vec<&js::Stmt> = vec![];
        for case in &s.cases {
          case_stmts.extend(case.cons.iter());
        }
        let inner = self.scopes.push(ScopeKind::Block, scope);
        self.predeclare_lexical_refs(case_stmts.iter().copied(), inner);
        for case in &s.cases {
          if let Some(test) = &case.test {
            self.visit_expr(test, inner);
          }
          for stmt in &case.cons {
            self.visit_stmt(stmt, inner);
          }
        }
      }
      js::Stmt::Throw(t) => self.visit_expr(&t.arg, scope),
      js::Stmt::Try(t) => {
        let block = self.enter_block(&t.block.stmts, scope);
        for stmt in &t.block.stmts {
          self.visit_stmt(stmt, block);
        }
        if let Some(handler) = &t.handler {
          let catch_scope = self.scopes.push(ScopeKind::Block, scope);
          if let Some(param) = &handler.param {
            self.declare_inner_pat(param, catch_scope);
            self.visit_pat_exprs(param, catch_scope);
          }
          self.predeclare_lexical_refs(handler.body.stmts.iter(), catch_scope);
          for stmt in &handler.body.stmts {
            self.visit_stmt(stmt, catch_scope);
          }
        }
        if let Some(finalizer) = &t.finalizer {
          let inner = self.enter_block(&finalizer.stmts, scope);
          for stmt in &finalizer.stmts {
            self.visit_stmt(stmt, inner);
          }
        }
      }
      js::Stmt::While(w) => {
        self.visit_expr(&w.test, scope);
        self.visit_stmt(&w.body, scope);
      }
      js::Stmt::DoWhile(w) => {
        self.visit_stmt(&w.body, scope);
        self.visit_expr(&w.test, scope);
      }
      js::Stmt::For(f) => {
        let head = self.scopes.push(ScopeKind::Block, scope);
        match &f.init {
          Some(js::VarDeclOrExpr::VarDecl(var_decl)) => {
            self.visit_var_decl(var_decl, head);
          }
          Some(js::VarDeclOrExpr::Expr(expr)) => self.visit_expr(expr, head),
          None => {}
        }
        if let Some(test) = &f.test {
          self.visit_expr(test, head);
        }
        if let Some(update) = &f.update {
          self.visit_expr(update, head);
        }
        self.visit_stmt(&f.body, head);
      }
      js::Stmt::ForIn(f) => self.visit_for_head_body(&f.left, &f.right, &f.body, scope),
      js::Stmt::ForOf(f) => self.visit_for_head_body(&f.left, &f.right, &f.body, scope),
      js::Stmt::Decl(decl) => self.visit_decl(decl, scope),
      js::Stmt::Expr(e) => self.visit_expr(&e.expr, scope),
    }
  }

  fn visit_for_head_body(
    &mut self,
    left: &js::ForHead,
    right: &js::Expr,
    body: &js::Stmt,
    scope: ScopeId,
  ) {
    let head = self.scopes.push(ScopeKind::Block, scope);
    match left {
      js::ForHead::VarDecl(var_decl) => {
        for declarator in &var_decl.decls {
          self.declare_var_pat(&declarator.name, var_decl.kind, head);
          self.visit_pat_exprs(&declarator.name, head);
        }
      }
      js::ForHead::UsingDecl(using) => {
        for declarator in &using.decls {
          self.declare_inner_pat(&declarator.name, head);
        }
      }
      js::ForHead::Pat(pat) => self.visit_assign_pat_targets(pat, head),
    }
    self.visit_expr(right, scope);
    self.visit_stmt(body, head);
  }

  /// Creates a block scope and pre-declares its lexical bindings so
  /// forward references inside the block resolve.
  fn enter_block(&mut self, stmts: &[js::Stmt], parent: ScopeId) -> ScopeId {
    let scope = self.scopes.push(ScopeKind::Block, parent);
    self.predeclare_lexical_refs(stmts.iter(), scope);
    scope
  }

  fn predeclare_lexical_refs<'s>(
    &mut self,
    stmts: impl Iterator<Item = &'s js::Stmt>,
    scope: ScopeId,
  ) {
    for stmt in stmts {
      if let js::Stmt::Decl(decl) = stmt {
        match decl {
          js::Decl::Fn(f) => {
            self.alloc_var(f.ident.sym.clone(), VariableKind::Local, scope, None);
          }
          js::Decl::Class(c) => {
            self.alloc_var(c.ident.sym.clone(), VariableKind::Local, scope, None);
          }
          js::Decl::Var(var_decl)
            if var_decl.kind != js::VarDeclKind::Var =>
          {
            for declarator in &var_decl.decls {
              self.declare_inner_pat(&declarator.name, scope);
            }
          }
          js::Decl::Using(using) => {
            for declarator in &using.decls {
              self.declare_inner_pat(&declarator.name, scope);
            }
          }
          _ => {}
        }
      }
    }
  }

  /// Declares a pattern's names in an inner scope (no statement-part
  /// attribution).
  fn declare_inner_pat(&mut self, pat: &js::Pat, scope: ScopeId) {
    let mut sink = vec![];
    self.declare_pat_inner_into(pat, scope, &mut sink);
  }

  fn declare_pat_inner_into(
    &mut self,
    pat: &js::Pat,
    scope: ScopeId,
    declared: &mut Vec<(Atom, VarId)>,
  ) {
    match pat {
      js::Pat::Ident(ident) => {
        let name = ident.id.sym.clone();
        let var = self.alloc_var(name.clone(), VariableKind::Local, scope, None);
        declared.push((name, var));
      }
      js::Pat::Array(arr) => {
        for elem in arr.elems.iter().flatten() {
          self.declare_pat_inner_into(elem, scope, declared);
        }
      }
      js::Pat::Rest(rest) => self.declare_pat_inner_into(&rest.arg, scope, declared),
      js::Pat::Object(obj) => {
        for prop in &obj.props {
          match prop {
            js::ObjectPatProp::KeyValue(kv) => {
              self.declare_pat_inner_into(&kv.value, scope, declared);
            }
            js::ObjectPatProp::Assign(assign) => {
              let name = assign.key.id.sym.clone();
              let var = self.alloc_var(name.clone(), VariableKind::Local, scope, None);
              declared.push((name, var));
            }
            js::ObjectPatProp::Rest(rest) => {
              self.declare_pat_inner_into(&rest.arg, scope, declared);
            }
          }
        }
      }
      js::Pat::Assign(assign) => {
        self.declare_pat_inner_into(&assign.left, scope, declared);
      }
      js::Pat::Expr(_) | js::Pat::Invalid(_) => {}
    }
  }

  fn declare_var_pat(&mut self, pat: &js::Pat, kind: js::VarDeclKind, scope: ScopeId) {
    match kind {
      js::VarDeclKind::Var => {
        let target = self.scopes.hoist_target(scope);
        if target == ScopeTree::MODULE {
          // Already declared in phase 1.
          return;
        }
        self.declare_inner_pat(pat, target);
      }
      _ => self.declare_inner_pat(pat, scope),
    }
  }

  /// Visits the computed keys and default values inside a binding
  /// pattern.
  fn visit_pat_exprs(&mut self, pat: &js::Pat, scope: ScopeId) {
    match pat {
      js::Pat::Ident(_) | js::Pat::Invalid(_) => {}
      js::Pat::Array(arr) => {
        for elem in arr.elems.iter().flatten() {
          self.visit_pat_exprs(elem, scope);
        }
      }
      js::Pat::Rest(rest) => self.visit_pat_exprs(&rest.arg, scope),
      js::Pat::Object(obj) => {
        for prop in &obj.props {
          match prop {
            js::ObjectPatProp::KeyValue(kv) => {
              if let js::PropName::Computed(c) = &kv.key {
                self.visit_expr(&c.expr, scope);
              }
              self.visit_pat_exprs(&kv.value, scope);
            }
            js::ObjectPatProp::Assign(assign) => {
              if let Some(value) = &assign.value {
                self.visit_expr(value, scope);
              }
            }
            js::ObjectPatProp::Rest(rest) => self.visit_pat_exprs(&rest.arg, scope),
          }
        }
      }
      js::Pat::Assign(assign) => {
        self.visit_pat_exprs(&assign.left, scope);
        self.visit_expr(&assign.right, scope);
      }
      js::Pat::Expr(expr) => self.visit_expr(expr, scope),
    }
  }

  /// Idents inside a destructuring assignment target are
  /// reassignments, not declarations.
  fn visit_assign_pat_targets(&mut self, pat: &js::Pat, scope: ScopeId) {
    match pat {
      js::Pat::Ident(ident) => {
        let sym = ident.id.sym.clone();
        self.record_reassignment(&sym, scope);
      }
      js::Pat::Array(arr) => {
        for elem in arr.elems.iter().flatten() {
          self.visit_assign_pat_targets(elem, scope);
        }
      }
      js::Pat::Rest(rest) => self.visit_assign_pat_targets(&rest.arg, scope),
      js::Pat::Object(obj) => {
        for prop in &obj.props {
          match prop {
            js::ObjectPatProp::KeyValue(kv) => {
              if let js::PropName::Computed(c) = &kv.key {
                self.visit_expr(&c.expr, scope);
              }
              self.visit_assign_pat_targets(&kv.value, scope);
            }
            js::ObjectPatProp::Assign(assign) => {
              let sym = assign.key.id.sym.clone();
              self.record_reassignment(&sym, scope);
              if let Some(value) = &assign.value {
                self.visit_expr(value, scope);
              }
            }
            js::ObjectPatProp::Rest(rest) => {
              self.visit_assign_pat_targets(&rest.arg, scope);
            }
          }
        }
      }
      js::Pat::Assign(assign) => {
        self.visit_assign_pat_targets(&assign.left, scope);
        self.visit_expr(&assign.right, scope);
      }
      js::Pat::Expr(expr) => self.visit_expr(expr, scope),
      js::Pat::Invalid(_) => {}
    }
  }

  fn visit_decl(&mut self, decl: &js::Decl, scope: ScopeId) {
    match decl {
      js::Decl::Fn(f) => {
        if scope != ScopeTree::MODULE
          && self.scopes.lookup(scope, &f.ident.sym).is_none()
        {
          self.alloc_var(f.ident.sym.clone(), VariableKind::Local, scope, None);
        }
        self.visit_function(&f.function, scope);
      }
      js::Decl::Class(c) => {
        if scope != ScopeTree::MODULE
          && self.scopes.lookup(scope, &c.ident.sym).is_none()
        {
          self.alloc_var(c.ident.sym.clone(), VariableKind::Local, scope, None);
        }
        self.visit_class(&c.class, scope);
      }
      js::Decl::Var(var_decl) => self.visit_var_decl(var_decl, scope),
      js::Decl::Using(using) => {
        for declarator in &using.decls {
          if scope != ScopeTree::MODULE {
            self.declare_inner_pat(&declarator.name, scope);
          }
          self.visit_pat_exprs(&declarator.name, scope);
          if let Some(init) = &declarator.init {
            self.visit_expr(init, scope);
          }
        }
      }
      _ => {}
    }
  }

  fn visit_var_decl(&mut self, var_decl: &js::VarDecl, scope: ScopeId) {
    for declarator in &var_decl.decls {
      if scope != ScopeTree::MODULE {
        self.declare_var_pat(&declarator.name, var_decl.kind, scope);
      }
      self.visit_pat_exprs(&declarator.name, scope);
      if let Some(init) = &declarator.init {
        self.visit_expr(init, scope);
      }
    }
  }

  fn visit_function(&mut self, function: &js::Function, scope: ScopeId) {
    let fscope = self.scopes.push(ScopeKind::Function, scope);
    self.visit_function_in(function, fscope);
  }

  fn visit_function_in(&mut self, function: &js::Function, fscope: ScopeId) {
    for param in &function.params {
      self.declare_inner_pat(&param.pat, fscope);
    }
    for param in &function.params {
      self.visit_pat_exprs(&param.pat, fscope);
    }
    if let Some(body) = &function.body {
      self.hoist_inner_vars(&body.stmts, fscope);
      self.predeclare_lexical_refs(body.stmts.iter(), fscope);
      for stmt in &body.stmts {
        self.visit_stmt(stmt, fscope);
      }
    }
  }

  /// Hoists `var` declarations of a function body into the function
  /// scope, descending through nested non-function statements.
  fn hoist_inner_vars(&mut self, stmts: &[js::Stmt], fscope: ScopeId) {
    for stmt in stmts {
      self.hoist_inner_vars_stmt(stmt, fscope);
    }
  }

  fn hoist_inner_vars_stmt(&mut self, stmt: &js::Stmt, fscope: ScopeId) {
    match stmt {
      js::Stmt::Decl(js::Decl::Var(var_decl)) if var_decl.kind == js::VarDeclKind::Var => {
        for declarator in &var_decl.decls {
          self.declare_inner_pat(&declarator.name, fscope);
        }
      }
      js::Stmt::Block(block) => self.hoist_inner_vars(&block.stmts, fscope),
      js::Stmt::If(i) => {
        self.hoist_inner_vars_stmt(&i.cons, fscope);
        if let Some(alt) = &i.alt {
          self.hoist_inner_vars_stmt(alt, fscope);
        }
      }
      js::Stmt::While(w) => self.hoist_inner_vars_stmt(&w.body, fscope),
      js::Stmt::DoWhile(w) => self.hoist_inner_vars_stmt(&w.body, fscope),
      js::Stmt::For(f) => {
        if let Some(js::VarDeclOrExpr::VarDecl(var_decl)) = &f.init {
          if var_decl.kind == js::VarDeclKind::Var {
            for declarator in &var_decl.decls {
              self.declare_inner_pat(&declarator.name, fscope);
            }
          }
        }
        self.hoist_inner_vars_stmt(&f.body, fscope);
      }
      js::Stmt::ForIn(f) => {
        if let js::ForHead::VarDecl(var_decl) = &f.left {
          if var_decl.kind == js::VarDeclKind::Var {
            for declarator in &var_decl.decls {
              self.declare_inner_pat(&declarator.name, fscope);
            }
          }
        }
        self.hoist_inner_vars_stmt(&f.body, fscope);
      }
      js::Stmt::ForOf(f) => {
        if let js::ForHead::VarDecl(var_decl) = &f.left {
          if var_decl.kind == js::VarDeclKind::Var {
            for declarator in &var_decl.decls {
              self.declare_inner_pat(&declarator.name, fscope);
            }
          }
        }
        self.hoist_inner_vars_stmt(&f.body, fscope);
      }
      js::Stmt::Labeled(l) => self.hoist_inner_vars_stmt(&l.body, fscope),
      js::Stmt::Try(t) => {
        self.hoist_inner_vars(&t.block.stmts, fscope);
        if let Some(handler) = &t.handler {
          self.hoist_inner_vars(&handler.body.stmts, fscope);
        }
        if let Some(finalizer) = &t.finalizer {
          self.hoist_inner_vars(&finalizer.stmts, fscope);
        }
      }
      js::Stmt::Switch(s) => {
        for case in &s.cases {
          self.hoist_inner_vars(&case.cons, fscope);
        }
      }
      _ => {}
    }
  }

  fn visit_class(&mut self, class: &js::Class, scope: ScopeId) {
    if let Some(super_class) = &class.super_class {
      self.visit_expr(super_class, scope);
    }
    for member in &class.body {
      match member {
        js::ClassMember::Constructor(ctor) => {
          if let js::PropName::Computed(c) = &ctor.key {
            self.visit_expr(&c.expr, scope);
          }
          let fscope = self.scopes.push(ScopeKind::Function, scope);
          for param in &ctor.params {
            if let js::ParamOrTsParamProp::Param(param) = param {
              self.declare_inner_pat(&param.pat, fscope);
              self.visit_pat_exprs(&param.pat, fscope);
            }
          }
          if let Some(body) = &ctor.body {
            self.hoist_inner_vars(&body.stmts, fscope);
            self.predeclare_lexical_refs(body.stmts.iter(), fscope);
            for stmt in &body.stmts {
              self.visit_stmt(stmt, fscope);
            }
          }
        }
        js::ClassMember::Method(method) => {
          if let js::PropName::Computed(c) = &method.key {
            self.visit_expr(&c.expr, scope);
          }
          self.visit_function(&method.function, scope);
        }
        js::ClassMember::PrivateMethod(method) => {
          self.visit_function(&method.function, scope);
        }
        js::ClassMember::ClassProp(prop) => {
          if let js::PropName::Computed(c) = &prop.key {
            self.visit_expr(&c.expr, scope);
          }
          if let Some(value) = &prop.value {
            let fscope = self.scopes.push(ScopeKind::Function, scope);
            self.visit_expr(value, fscope);
          }
        }
        js::ClassMember::PrivateProp(prop) => {
          if let Some(value) = &prop.value {
            let fscope = self.scopes.push(ScopeKind::Function, scope);
            self.visit_expr(value, fscope);
          }
        }
        js::ClassMember::StaticBlock(block) => {
          let fscope = self.scopes.push(ScopeKind::Function, scope);
          self.hoist_inner_vars(&block.body.stmts, fscope);
          self.predeclare_lexical_refs(block.body.stmts.iter(), fscope);
          for stmt in &block.body.stmts {
            self.visit_stmt(stmt, fscope);
          }
        }
        _ => {}
      }
    }
  }

  fn visit_expr(&mut self, expr: &js::Expr, scope: ScopeId) {
    match expr {
      js::Expr::Ident(ident) => self.record_ident_ref(&ident.sym, scope),
      js::Expr::Lit(_)
      | js::Expr::This(_)
      | js::Expr::MetaProp(_)
      | js::Expr::PrivateName(_)
      | js::Expr::Invalid(_) => {}
      js::Expr::Array(arr) => {
        for elem in arr.elems.iter().flatten() {
          self.visit_expr(&elem.expr, scope);
        }
      }
      js::Expr::Object(obj) => {
        for prop in &obj.props {
          match prop {
            js::PropOrSpread::Spread(spread) => self.visit_expr(&spread.expr, scope),
            js::PropOrSpread::Prop(prop) => match &**prop {
              js::Prop::Shorthand(ident) => self.record_ident_ref(&ident.sym, scope),
              js::Prop::KeyValue(kv) => {
                if let js::PropName::Computed(c) = &kv.key {
                  self.visit_expr(&c.expr, scope);
                }
                self.visit_expr(&kv.value, scope);
              }
              js::Prop::Assign(assign) => self.visit_expr(&assign.value, scope),
              js::Prop::Getter(getter) => {
                if let js::PropName::Computed(c) = &getter.key {
                  self.visit_expr(&c.expr, scope);
                }
                if let Some(body) = &getter.body {
                  let fscope = self.scopes.push(ScopeKind::Function, scope);
                  self.hoist_inner_vars(&body.stmts, fscope);
                  self.predeclare_lexical_refs(body.stmts.iter(), fscope);
                  for stmt in &body.stmts {
                    self.visit_stmt(stmt, fscope);
                  }
                }
              }
              js::Prop::Setter(setter) => {
                if let js::PropName::Computed(c) = &setter.key {
                  self.visit_expr(&c.expr, scope);
                }
                let fscope = self.scopes.push(ScopeKind::Function, scope);
                self.declare_inner_pat(&setter.param, fscope);
                if let Some(body) = &setter.body {
                  self.hoist_inner_vars(&body.stmts, fscope);
                  self.predeclare_lexical_refs(body.stmts.iter(), fscope);
                  for stmt in &body.stmts {
                    self.visit_stmt(stmt, fscope);
                  }
                }
              }
              js::Prop::Method(method) => {
                if let js::PropName::Computed(c) = &method.key {
                  self.visit_expr(&c.expr, scope);
                }
                self.visit_function(&method.function, scope);
              }
            },
          }
        }
      }
      js::Expr::Fn(f) => {
        let fscope = self.scopes.push(ScopeKind::Function, scope);
        if let Some(ident) = &f.ident {
          self.alloc_var(ident.sym.clone(), VariableKind::Local, fscope, None);
        }
        self.visit_function_in(&f.function, fscope);
      }
      js::Expr::Arrow(arrow) => {
        let fscope = self.scopes.push(ScopeKind::Function, scope);
        for pat in &arrow.params {
          self.declare_inner_pat(pat, fscope);
        }
        for pat in &arrow.params {
          self.visit_pat_exprs(pat, fscope);
        }
        match &*arrow.body {
          js::BlockStmtOrExpr::BlockStmt(block) => {
            self.hoist_inner_vars(&block.stmts, fscope);
            self.predeclare_lexical_refs(block.stmts.iter(), fscope);
            for stmt in &block.stmts {
              self.visit_stmt(stmt, fscope);
            }
          }
          js::BlockStmtOrExpr::Expr(expr) => self.visit_expr(expr, fscope),
        }
      }
      js::Expr::Unary(u) => self.visit_expr(&u.arg, scope),
      js::Expr::Update(u) => match &*u.arg {
        js::Expr::Ident(ident) => {
          let sym = ident.sym.clone();
          self.record_reassignment(&sym, scope);
        }
        other => self.visit_expr(other, scope),
      },
      js::Expr::Bin(b) => {
        self.visit_expr(&b.left, scope);
        self.visit_expr(&b.right, scope);
      }
      js::Expr::Assign(assign) => {
        match &assign.left {
          js::AssignTarget::Simple(js::SimpleAssignTarget::Ident(ident)) => {
            let sym = ident.id.sym.clone();
            self.record_reassignment(&sym, scope);
          }
          js::AssignTarget::Simple(js::SimpleAssignTarget::Member(member)) => {
            self.visit_member(member, scope);
          }
          js::AssignTarget::Simple(_) => {}
          js::AssignTarget::Pat(pat) => match pat {
            js::AssignTargetPat::Array(arr) => {
              let pat = js::Pat::Array(arr.clone());
              self.visit_assign_pat_targets(&pat, scope);
            }
            js::AssignTargetPat::Object(obj) => {
              let pat = js::Pat::Object(obj.clone());
              self.visit_assign_pat_targets(&pat, scope);
            }
            js::AssignTargetPat::Invalid(_) => {}
          },
        }
        self.visit_expr(&assign.right, scope);
      }
      js::Expr::Member(member) => self.visit_member(member, scope),
      js::Expr::SuperProp(sp) => {
        if let js::SuperProp::Computed(c) = &sp.prop {
          self.visit_expr(&c.expr, scope);
        }
      }
      js::Expr::Cond(c) => {
        self.visit_expr(&c.test, scope);
        self.visit_expr(&c.cons, scope);
        self.visit_expr(&c.alt, scope);
      }
      js::Expr::Call(call) => {
        if let js::Callee::Import(_) = &call.callee {
          let specifier = call.args.first().and_then(|arg| {
            if arg.spread.is_some() {
              return None;
            }
            match &*arg.expr {
              js::Expr::Lit(js::Lit::Str(s)) => Some(s.value.clone()),
              _ => None,
            }
          });
          self.dynamic_imports.push(DynamicImportSite {
            part: self.current_part,
            specifier,
            span_lo: self.rel(call.span.lo),
          });
        }
        if let js::Callee::Expr(callee) = &call.callee {
          self.visit_expr(callee, scope);
        }
        for arg in &call.args {
          self.visit_expr(&arg.expr, scope);
        }
      }
      js::Expr::New(new) => {
        self.visit_expr(&new.callee, scope);
        for arg in new.args.iter().flatten() {
          self.visit_expr(&arg.expr, scope);
        }
      }
      js::Expr::Seq(seq) => {
        for expr in &seq.exprs {
          self.visit_expr(expr, scope);
        }
      }
      js::Expr::Tpl(tpl) => {
        for expr in &tpl.exprs {
          self.visit_expr(expr, scope);
        }
      }
      js::Expr::TaggedTpl(tagged) => {
        self.visit_expr(&tagged.tag, scope);
        for expr in &tagged.tpl.exprs {
          self.visit_expr(expr, scope);
        }
      }
      js::Expr::Class(c) => {
        self.visit_class(&c.class, scope);
      }
      js::Expr::Yield(y) => {
        if let Some(arg) = &y.arg {
          self.visit_expr(arg, scope);
        }
      }
      js::Expr::Await(a) => self.visit_expr(&a.arg, scope),
      js::Expr::Paren(p) => self.visit_expr(&p.expr, scope),
      js::Expr::OptChain(oc) => match &*oc.base {
        js::OptChainBase::Member(member) => self.visit_member(member, scope),
        js::OptChainBase::Call(call) => {
          self.visit_expr(&call.callee, scope);
          for arg in &call.args {
            self.visit_expr(&arg.expr, scope);
          }
        }
      },
      _ => {}
    }
  }

  fn visit_member(&mut self, member: &js::MemberExpr, scope: ScopeId) {
    if let (js::Expr::Ident(obj), js::MemberProp::Ident(prop)) =
      (&*member.obj, &member.prop)
    {
      match self.scopes.lookup(scope, &obj.sym) {
        Some(var) => {
          if self.variables.get(var).scope() == ScopeTree::MODULE {
            self.refs.push(Reference::Own(var));
          }
        }
        None => {
          self
            .refs
            .push(Reference::FreeMember(obj.sym.clone(), prop.sym.clone()));
        }
      }
      return;
    }
    self.visit_expr(&member.obj, scope);
    if let js::MemberProp::Computed(c) = &member.prop {
      self.visit_expr(&c.expr, scope);
    }
  }

  // Phase 2 }
}

fn decl_span_lo(decl: &js::ModuleDecl) -> swc_common::BytePos {
  use swc_common::Spanned;
  decl.span().lo
}
