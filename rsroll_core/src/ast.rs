//! Source parsing and statement-level analysis.
//!
//! The parser itself is a black box (`swc`); everything downstream
//! dispatches on the AST node tag: [`scan`] collects bindings,
//! references and import/export records, [`effects`] decides whether
//! evaluating a node can be observed, [`literal`] folds
//! compile-time-known values.

// Re-export
pub use parse::*;
pub use scan::*;

pub mod effects;
pub mod literal;
pub mod parse;
pub mod scan;

#[cfg(test)]
mod effects_tests;
#[cfg(test)]
mod literal_tests;
#[cfg(test)]
mod scan_tests;
