//! Side-effect analysis.
//!
//! Decides whether evaluating a statement or expression can be
//! observed. Dispatch is on the node tag; anything unrecognised is
//! treated as effectful. Function bodies are never descended into,
//! they only run when called.

use crate::ast::literal::{LiteralEnv, literal_value};
use crate::opts::TreeshakeOptions;
use crate::prelude::*;
use crate::scope::GlobalScope;

use swc_atoms::Atom;
use swc_ecma_ast as js;

#[derive(Clone, Copy)]
/// Context threaded through the analysis of one top-level statement.
pub struct EffectsCtx<'a> {
  pub treeshake: &'a TreeshakeOptions,
  /// Positions carrying a pure-call annotation.
  pub pure_positions: &'a HashSet<u32>,
  /// Module-scope constants with literal initializers.
  pub env: &'a LiteralEnv,
  /// Whether a name is bound at module scope (declaration or import).
  pub known: &'a dyn Fn(&Atom) -> bool,
  /// Inside a `try` block; with `try_catch_deoptimization` this
  /// disables pure annotations and literal-based branch pruning.
  pub in_try: bool,
}

impl<'a> EffectsCtx<'a> {
  fn deoptimized(&self) -> bool {
    self.in_try && self.treeshake.try_catch_deoptimization
  }

  /// The known truthiness of `expr`, unless value analysis is
  /// deoptimized here.
  fn literal_test(&self, expr: &js::Expr) -> Option<bool> {
    if self.deoptimized() {
      return None;
    }
    literal_value(expr, self.env).and_then(|v| v.truthiness())
  }

  fn is_pure_call(&self, pos: u32) -> bool {
    self.treeshake.annotations
      && !self.deoptimized()
      && self.pure_positions.contains(&pos)
  }
}

pub fn stmt_has_effects(stmt: &js::Stmt, ctx: EffectsCtx<'_>) -> bool {
  match stmt {
    js::Stmt::Block(block) => block.stmts.iter().any(|s| stmt_has_effects(s, ctx)),
    js::Stmt::Empty(_) => false,
    js::Stmt::Debugger(_) => true,
    js::Stmt::With(_) => true,
    js::Stmt::Return(r) => r
      .arg
      .as_deref()
      .map(|e| expr_has_effects(e, ctx))
      .unwrap_or(false),
    js::Stmt::Labeled(l) => stmt_has_effects(&l.body, ctx),
    js::Stmt::Break(_) | js::Stmt::Continue(_) => false,
    js::Stmt::If(i) => {
      let test = expr_has_effects(&i.test, ctx);
      match ctx.literal_test(&i.test) {
        Some(true) => test || stmt_has_effects(&i.cons, ctx),
        Some(false) => {
          test
            || i
              .alt
              .as_deref()
              .map(|s| stmt_has_effects(s, ctx))
              .unwrap_or(false)
        }
        None => {
          test
            || stmt_has_effects(&i.cons, ctx)
            || i
              .alt
              .as_deref()
              .map(|s| stmt_has_effects(s, ctx))
              .unwrap_or(false)
        }
      }
    }
    js::Stmt::Switch(s) => {
      expr_has_effects(&s.discriminant, ctx)
        || s.cases.iter().any(|case| {
          case
            .test
            .as_deref()
            .map(|e| expr_has_effects(e, ctx))
            .unwrap_or(false)
            || case.cons.iter().any(|st| stmt_has_effects(st, ctx))
        })
    }
    js::Stmt::Throw(_) => true,
    js::Stmt::Try(t) => {
      let inner = EffectsCtx {
        in_try: true,
        ..ctx
      };
      t.block.stmts.iter().any(|s| stmt_has_effects(s, inner))
        || t
          .handler
          .as_ref()
          .map(|h| h.body.stmts.iter().any(|s| stmt_has_effects(s, ctx)))
          .unwrap_or(false)
        || t
          .finalizer
          .as_ref()
          .map(|f| f.stmts.iter().any(|s| stmt_has_effects(s, ctx)))
          .unwrap_or(false)
    }
    js::Stmt::While(w) => {
      let test = expr_has_effects(&w.test, ctx);
      match ctx.literal_test(&w.test) {
        Some(false) => test,
        _ => test || stmt_has_effects(&w.body, ctx),
      }
    }
    js::Stmt::DoWhile(w) => {
      expr_has_effects(&w.test, ctx) || stmt_has_effects(&w.body, ctx)
    }
    js::Stmt::For(f) => {
      let init = match &f.init {
        Some(js::VarDeclOrExpr::VarDecl(decl)) => var_decl_has_effects(decl, ctx),
        Some(js::VarDeclOrExpr::Expr(expr)) => expr_has_effects(expr, ctx),
        None => false,
      };
      let test = f
        .test
        .as_deref()
        .map(|e| expr_has_effects(e, ctx))
        .unwrap_or(false);
      if let Some(false) = f.test.as_deref().and_then(|e| ctx.literal_test(e)) {
        return init || test;
      }
      init
        || test
        || f
          .update
          .as_deref()
          .map(|e| expr_has_effects(e, ctx))
          .unwrap_or(false)
        || stmt_has_effects(&f.body, ctx)
    }
    // Iteration protocols may run arbitrary code.
    js::Stmt::ForIn(_) | js::Stmt::ForOf(_) => true,
    js::Stmt::Decl(decl) => decl_has_effects(decl, ctx),
    js::Stmt::Expr(e) => expr_has_effects(&e.expr, ctx),
  }
}

pub fn decl_has_effects(decl: &js::Decl, ctx: EffectsCtx<'_>) -> bool {
  match decl {
    js::Decl::Fn(_) => false,
    js::Decl::Class(c) => class_has_effects(&c.class, ctx),
    js::Decl::Var(decl) => var_decl_has_effects(decl, ctx),
    js::Decl::Using(_) => true,
    _ => true,
  }
}

fn var_decl_has_effects(decl: &js::VarDecl, ctx: EffectsCtx<'_>) -> bool {
  decl.decls.iter().any(|d| {
    let init_effects = d
      .init
      .as_deref()
      .map(|e| expr_has_effects(e, ctx))
      .unwrap_or(false);
    // Destructuring performs property reads on the initializer.
    let destructure_effects = matches!(
      d.name,
      js::Pat::Object(_) | js::Pat::Array(_)
    ) && ctx.treeshake.property_read_side_effects
      && !d.init.as_deref().map(|e| root_is_known(e, ctx)).unwrap_or(false);
    init_effects || destructure_effects || pat_has_effects(&d.name, ctx)
  })
}

/// Effects of evaluating a binding pattern itself (default values,
/// computed keys). The matched value's effects are the caller's
/// business.
fn pat_has_effects(pat: &js::Pat, ctx: EffectsCtx<'_>) -> bool {
  match pat {
    js::Pat::Ident(_) | js::Pat::Invalid(_) => false,
    js::Pat::Array(arr) => arr
      .elems
      .iter()
      .flatten()
      .any(|p| pat_has_effects(p, ctx)),
    js::Pat::Rest(rest) => pat_has_effects(&rest.arg, ctx),
    js::Pat::Object(obj) => obj.props.iter().any(|p| match p {
      js::ObjectPatProp::KeyValue(kv) => {
        prop_name_has_effects(&kv.key, ctx) || pat_has_effects(&kv.value, ctx)
      }
      js::ObjectPatProp::Assign(a) => a
        .value
        .as_deref()
        .map(|e| expr_has_effects(e, ctx))
        .unwrap_or(false),
      js::ObjectPatProp::Rest(rest) => pat_has_effects(&rest.arg, ctx),
    }),
    js::Pat::Assign(a) => {
      pat_has_effects(&a.left, ctx) || expr_has_effects(&a.right, ctx)
    }
    js::Pat::Expr(e) => expr_has_effects(e, ctx),
  }
}

fn prop_name_has_effects(name: &js::PropName, ctx: EffectsCtx<'_>) -> bool {
  match name {
    js::PropName::Computed(c) => expr_has_effects(&c.expr, ctx),
    _ => false,
  }
}

pub fn expr_has_effects(expr: &js::Expr, ctx: EffectsCtx<'_>) -> bool {
  match expr {
    js::Expr::Lit(_)
    | js::Expr::This(_)
    | js::Expr::Fn(_)
    | js::Expr::Arrow(_)
    | js::Expr::MetaProp(_)
    | js::Expr::PrivateName(_)
    | js::Expr::Invalid(_) => false,
    js::Expr::Ident(ident) => ident_read_has_effects(&ident.sym, ctx),
    js::Expr::Paren(p) => expr_has_effects(&p.expr, ctx),
    js::Expr::Seq(seq) => seq.exprs.iter().any(|e| expr_has_effects(e, ctx)),
    js::Expr::Array(arr) => arr.elems.iter().flatten().any(|el| {
      // Spreading anything but an array literal runs an unknown
      // iterator.
      if el.spread.is_some() && !matches!(&*el.expr, js::Expr::Array(_)) {
        return true;
      }
      expr_has_effects(&el.expr, ctx)
    }),
    js::Expr::Object(obj) => {
      obj.props.iter().any(|p| object_prop_has_effects(p, ctx))
    }
    js::Expr::Unary(u) => match u.op {
      // `delete` mutates its target.
      js::UnaryOp::Delete => true,
      _ => expr_has_effects(&u.arg, ctx),
    },
    js::Expr::Update(_) | js::Expr::Assign(_) => true,
    js::Expr::Bin(b) => bin_has_effects(b, ctx),
    js::Expr::Member(m) => member_has_effects(m, ctx),
    js::Expr::SuperProp(_) => true,
    js::Expr::Cond(c) => {
      let test = expr_has_effects(&c.test, ctx);
      match ctx.literal_test(&c.test) {
        Some(true) => test || expr_has_effects(&c.cons, ctx),
        Some(false) => test || expr_has_effects(&c.alt, ctx),
        None => {
          test
            || expr_has_effects(&c.cons, ctx)
            || expr_has_effects(&c.alt, ctx)
        }
      }
    }
    js::Expr::Call(call) => call_has_effects(call, ctx),
    js::Expr::New(new) => {
      // An annotated construction is droppable wholesale; only the
      // arguments are still evaluated.
      if ctx.is_pure_call(new.span.lo.0) {
        new
          .args
          .iter()
          .flatten()
          .any(|a| expr_has_effects(&a.expr, ctx))
      } else {
        true
      }
    }
    js::Expr::Tpl(tpl) => tpl.exprs.iter().any(|e| expr_has_effects(e, ctx)),
    // The tag function runs.
    js::Expr::TaggedTpl(_) => true,
    js::Expr::Class(c) => class_has_effects(&c.class, ctx),
    js::Expr::Yield(_) | js::Expr::Await(_) => true,
    js::Expr::OptChain(oc) => match &*oc.base {
      js::OptChainBase::Member(m) => member_has_effects(m, ctx),
      js::OptChainBase::Call(call) => {
        if ctx.is_pure_call(call.span.lo.0) {
          call.args.iter().any(|a| expr_has_effects(&a.expr, ctx))
        } else {
          true
        }
      }
    },
    _ => true,
  }
}

fn ident_read_has_effects(sym: &Atom, ctx: EffectsCtx<'_>) -> bool {
  if (ctx.known)(sym) || GlobalScope::is_pure_global(sym.as_str()) {
    return false;
  }
  // Reading an undeclared global may throw.
  ctx.treeshake.unknown_global_side_effects
}

fn call_has_effects(call: &js::CallExpr, ctx: EffectsCtx<'_>) -> bool {
  match &call.callee {
    // A dynamic import runs the imported module.
    js::Callee::Import(_) => true,
    js::Callee::Super(_) => true,
    // An annotated call is droppable wholesale; only the arguments
    // are still evaluated.
    js::Callee::Expr(_) => {
      if ctx.is_pure_call(call.span.lo.0) {
        call.args.iter().any(|a| expr_has_effects(&a.expr, ctx))
      } else {
        true
      }
    }
  }
}

fn bin_has_effects(b: &js::BinExpr, ctx: EffectsCtx<'_>) -> bool {
  let left = expr_has_effects(&b.left, ctx);
  match b.op {
    js::BinaryOp::LogicalAnd => match ctx.literal_test(&b.left) {
      Some(false) => left,
      _ => left || expr_has_effects(&b.right, ctx),
    },
    js::BinaryOp::LogicalOr => match ctx.literal_test(&b.left) {
      Some(true) => left,
      _ => left || expr_has_effects(&b.right, ctx),
    },
    // `in`/`instanceof` throw on a non-object right-hand side.
    js::BinaryOp::In | js::BinaryOp::InstanceOf => true,
    _ => left || expr_has_effects(&b.right, ctx),
  }
}

fn member_has_effects(m: &js::MemberExpr, ctx: EffectsCtx<'_>) -> bool {
  let obj = expr_has_effects(&m.obj, ctx);
  let prop = match &m.prop {
    js::MemberProp::Computed(c) => expr_has_effects(&c.expr, ctx),
    _ => false,
  };
  let read = ctx.treeshake.property_read_side_effects && !root_is_known(&m.obj, ctx);
  obj || prop || read
}

fn object_prop_has_effects(prop: &js::PropOrSpread, ctx: EffectsCtx<'_>) -> bool {
  match prop {
    js::PropOrSpread::Spread(spread) => {
      expr_has_effects(&spread.expr, ctx)
        || (ctx.treeshake.property_read_side_effects
          && !root_is_known(&spread.expr, ctx))
    }
    js::PropOrSpread::Prop(prop) => match &**prop {
      js::Prop::Shorthand(ident) => ident_read_has_effects(&ident.sym, ctx),
      js::Prop::KeyValue(kv) => {
        prop_name_has_effects(&kv.key, ctx) || expr_has_effects(&kv.value, ctx)
      }
      // Accessor and method bodies only run when used.
      js::Prop::Getter(g) => prop_name_has_effects(&g.key, ctx),
      js::Prop::Setter(s) => prop_name_has_effects(&s.key, ctx),
      js::Prop::Method(m) => prop_name_has_effects(&m.key, ctx),
      js::Prop::Assign(_) => true,
    },
  }
}

pub(crate) fn class_has_effects(class: &js::Class, ctx: EffectsCtx<'_>) -> bool {
  let heritage = class
    .super_class
    .as_deref()
    .map(|e| expr_has_effects(e, ctx))
    .unwrap_or(false);
  heritage
    || class.body.iter().any(|member| match member {
      js::ClassMember::Constructor(_) => false,
      js::ClassMember::Method(m) => prop_name_has_effects(&m.key, ctx),
      js::ClassMember::PrivateMethod(_) => false,
      js::ClassMember::ClassProp(p) => {
        prop_name_has_effects(&p.key, ctx)
          || (p.is_static
            && p
              .value
              .as_deref()
              .map(|e| expr_has_effects(e, ctx))
              .unwrap_or(false))
      }
      js::ClassMember::PrivateProp(p) => {
        p.is_static
          && p
            .value
            .as_deref()
            .map(|e| expr_has_effects(e, ctx))
            .unwrap_or(false)
      }
      js::ClassMember::StaticBlock(_) => true,
      js::ClassMember::Empty(_) => false,
      _ => true,
    })
}

/// Whether the root of a member chain is a binding the build can see
/// (module-scope, import, or a standard global), i.e. reading a
/// property off it is an ordinary data access.
fn root_is_known(expr: &js::Expr, ctx: EffectsCtx<'_>) -> bool {
  match expr {
    js::Expr::Ident(ident) => {
      (ctx.known)(&ident.sym) || GlobalScope::is_pure_global(ident.sym.as_str())
    }
    js::Expr::This(_) => true,
    js::Expr::Paren(p) => root_is_known(&p.expr, ctx),
    js::Expr::Member(m) => root_is_known(&m.obj, ctx),
    js::Expr::Lit(_) | js::Expr::Array(_) | js::Expr::Object(_) => true,
    _ => false,
  }
}
