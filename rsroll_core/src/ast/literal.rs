//! Compile-time value analysis.
//!
//! `literal_value` folds expressions whose value is fully determined by
//! the source text; everything opaque yields `None`. The
//! [`PathTracker`] is the build-wide set of deoptimized value paths:
//! once a variable (or one of its members) lands in the tracker, value
//! analysis must stop drawing conclusions about it.

use crate::prelude::*;
use crate::variable::VarId;

use swc_atoms::Atom;
use swc_ecma_ast as js;

#[derive(Debug, Clone, PartialEq)]
/// A value known without running the program.
pub enum LiteralValue {
  Bool(bool),
  Num(f64),
  Str(Atom),
  Null,
  Undefined,
}

impl LiteralValue {
  /// `Some(true)`/`Some(false)` when the value coerces to a known
  /// boolean.
  pub fn truthiness(&self) -> Option<bool> {
    match self {
      LiteralValue::Bool(b) => Some(*b),
      LiteralValue::Num(n) => Some(*n != 0.0 && !n.is_nan()),
      LiteralValue::Str(s) => Some(!s.is_empty()),
      LiteralValue::Null | LiteralValue::Undefined => Some(false),
    }
  }

  fn type_of(&self) -> &'static str {
    match self {
      LiteralValue::Bool(_) => "boolean",
      LiteralValue::Num(_) => "number",
      LiteralValue::Str(_) => "string",
      LiteralValue::Null => "object",
      LiteralValue::Undefined => "undefined",
    }
  }
}

/// Environment mapping module-scope `const` bindings to their literal
/// initializers.
pub type LiteralEnv = HashMap<Atom, LiteralValue>;

/// Folds `expr` when its value is fully source-determined, consulting
/// `env` for module-scope constants.
pub fn literal_value(expr: &js::Expr, env: &LiteralEnv) -> Option<LiteralValue> {
  match expr {
    js::Expr::Lit(lit) => literal_of_lit(lit),
    js::Expr::Paren(p) => literal_value(&p.expr, env),
    js::Expr::Ident(ident) => {
      if ident.sym.as_str() == "undefined" {
        Some(LiteralValue::Undefined)
      } else {
        env.get(&ident.sym).cloned()
      }
    }
    js::Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
      .quasis
      .first()
      .and_then(|q| q.cooked.clone())
      .map(LiteralValue::Str),
    js::Expr::Unary(u) => literal_of_unary(u, env),
    js::Expr::Bin(b) => literal_of_bin(b, env),
    js::Expr::Cond(c) => {
      let test = literal_value(&c.test, env)?;
      match test.truthiness()? {
        true => literal_value(&c.cons, env),
        false => literal_value(&c.alt, env),
      }
    }
    js::Expr::Seq(seq) => {
      // Only a fully literal sequence is side-effect free to fold.
      for expr in &seq.exprs {
        literal_value(expr, env)?;
      }
      seq.exprs.last().and_then(|e| literal_value(e, env))
    }
    _ => None,
  }
}

fn literal_of_lit(lit: &js::Lit) -> Option<LiteralValue> {
  match lit {
    js::Lit::Bool(b) => Some(LiteralValue::Bool(b.value)),
    js::Lit::Num(n) => Some(LiteralValue::Num(n.value)),
    js::Lit::Str(s) => Some(LiteralValue::Str(s.value.clone())),
    js::Lit::Null(_) => Some(LiteralValue::Null),
    _ => None,
  }
}

fn literal_of_unary(u: &js::UnaryExpr, env: &LiteralEnv) -> Option<LiteralValue> {
  let arg = literal_value(&u.arg, env)?;
  match u.op {
    js::UnaryOp::Bang => arg.truthiness().map(|t| LiteralValue::Bool(!t)),
    js::UnaryOp::Void => Some(LiteralValue::Undefined),
    js::UnaryOp::TypeOf => Some(LiteralValue::Str(Atom::from(arg.type_of()))),
    js::UnaryOp::Minus => match arg {
      LiteralValue::Num(n) => Some(LiteralValue::Num(-n)),
      _ => None,
    },
    js::UnaryOp::Plus => match arg {
      LiteralValue::Num(n) => Some(LiteralValue::Num(n)),
      LiteralValue::Bool(b) => Some(LiteralValue::Num(if b { 1.0 } else { 0.0 })),
      _ => None,
    },
    _ => None,
  }
}

fn literal_of_bin(b: &js::BinExpr, env: &LiteralEnv) -> Option<LiteralValue> {
  // Short-circuit operators first: the right side may stay opaque.
  match b.op {
    js::BinaryOp::LogicalAnd => {
      let left = literal_value(&b.left, env)?;
      return match left.truthiness()? {
        false => Some(left),
        true => literal_value(&b.right, env),
      };
    }
    js::BinaryOp::LogicalOr => {
      let left = literal_value(&b.left, env)?;
      return match left.truthiness()? {
        true => Some(left),
        false => literal_value(&b.right, env),
      };
    }
    js::BinaryOp::NullishCoalescing => {
      let left = literal_value(&b.left, env)?;
      return match left {
        LiteralValue::Null | LiteralValue::Undefined => {
          literal_value(&b.right, env)
        }
        other => Some(other),
      };
    }
    _ => {}
  }

  let left = literal_value(&b.left, env)?;
  let right = literal_value(&b.right, env)?;
  match (b.op, left, right) {
    (js::BinaryOp::EqEqEq, l, r) => Some(LiteralValue::Bool(l == r)),
    (js::BinaryOp::NotEqEq, l, r) => Some(LiteralValue::Bool(l != r)),
    (js::BinaryOp::Add, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Num(l + r))
    }
    (js::BinaryOp::Add, LiteralValue::Str(l), LiteralValue::Str(r)) => {
      Some(LiteralValue::Str(Atom::from(format!("{l}{r}"))))
    }
    (js::BinaryOp::Sub, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Num(l - r))
    }
    (js::BinaryOp::Mul, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Num(l * r))
    }
    (js::BinaryOp::Div, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Num(l / r))
    }
    (js::BinaryOp::Lt, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Bool(l < r))
    }
    (js::BinaryOp::Gt, LiteralValue::Num(l), LiteralValue::Num(r)) => {
      Some(LiteralValue::Bool(l > r))
    }
    _ => None,
  }
}

#[derive(Debug, Default)]
/// Build-wide set of deoptimized value paths, keyed by owning module
/// index, variable and an optional member segment. A deoptimized root
/// (`member: None`) poisons every member path below it.
pub struct PathTracker {
  deoptimized: HashSet<(usize, VarId, Option<Atom>)>,
}

impl PathTracker {
  pub fn new() -> Self {
    PathTracker {
      deoptimized: HashSet::new(),
    }
  }

  pub fn deoptimize(&mut self, module: usize, var: VarId, member: Option<Atom>) {
    self.deoptimized.insert((module, var, member));
  }

  pub fn is_deoptimized(
    &self,
    module: usize,
    var: VarId,
    member: Option<&Atom>,
  ) -> bool {
    if self.deoptimized.contains(&(module, var, None)) {
      return true;
    }
    match member {
      Some(m) => self.deoptimized.contains(&(module, var, Some(m.clone()))),
      None => false,
    }
  }

  pub fn len(&self) -> usize {
    self.deoptimized.len()
  }

  pub fn is_empty(&self) -> bool {
    self.deoptimized.is_empty()
  }
}
