//! Build diagnostics.
//!
//! Warnings never abort a build. Each one carries a stable code, the
//! earliest known source location and (for hook failures) the plugin it
//! is attributed to; they are routed to the `onwarn` handler configured
//! on [`BundleOptions`](crate::opts::BundleOptions).

use compact_str::CompactString;
use compact_str::ToCompactString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Warning codes the engine emits.
pub enum WarningCode {
  CircularDependency,
  MissingExport,
  NonExistentExport,
  UnusedExternalImport,
  DeprecatedFeature,
  ManualChunkConflict,
  InlineDynamicImports,
}

impl WarningCode {
  pub fn as_str(&self) -> &'static str {
    match self {
      WarningCode::CircularDependency => "CIRCULAR_DEPENDENCY",
      WarningCode::MissingExport => "MISSING_EXPORT",
      WarningCode::NonExistentExport => "NON_EXISTENT_EXPORT",
      WarningCode::UnusedExternalImport => "UNUSED_EXTERNAL_IMPORT",
      WarningCode::DeprecatedFeature => "DEPRECATED_FEATURE",
      WarningCode::ManualChunkConflict => "MANUAL_CHUNK_CONFLICT",
      WarningCode::InlineDynamicImports => "INLINE_DYNAMIC_IMPORTS",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 1-based line, 0-based column.
pub struct Loc {
  pub line: u32,
  pub column: u32,
}

/// Computes the [`Loc`] of a byte offset inside `code`.
pub fn line_col(code: &str, offset: usize) -> Loc {
  let offset = offset.min(code.len());
  let mut line = 1_u32;
  let mut line_start = 0_usize;
  for (i, b) in code.bytes().enumerate() {
    if i >= offset {
      break;
    }
    if b == b'\n' {
      line += 1;
      line_start = i + 1;
    }
  }
  Loc {
    line,
    column: (offset - line_start) as u32,
  }
}

#[derive(Debug, Clone)]
/// A non-fatal diagnostic.
pub struct Warning {
  pub code: WarningCode,
  pub message: CompactString,
  /// Module the warning originates from.
  pub id: Option<String>,
  pub loc: Option<Loc>,
  /// Plugin the warning is attributed to.
  pub plugin: Option<String>,
  /// Module ids forming a cycle, first repeated last.
  pub cycle: Vec<String>,
  /// Binding names the warning refers to.
  pub names: Vec<String>,
}

impl Warning {
  pub fn new(code: WarningCode, message: impl AsRef<str>) -> Self {
    Warning {
      code,
      message: message.as_ref().to_compact_string(),
      id: None,
      loc: None,
      plugin: None,
      cycle: vec![],
      names: vec![],
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_loc(mut self, loc: Loc) -> Self {
    self.loc = Some(loc);
    self
  }

  pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
    self.plugin = Some(plugin.into());
    self
  }

  pub fn with_cycle(mut self, cycle: Vec<String>) -> Self {
    self.cycle = cycle;
    self
  }

  pub fn with_names(mut self, names: Vec<String>) -> Self {
    self.names = names;
    self
  }
}

/// Either warns with `DEPRECATED_FEATURE` through `handler`, or fails
/// the build when strict deprecations are on.
pub fn warn_deprecation(
  message: &str,
  strict: bool,
  handler: Option<&crate::opts::WarningHandler>,
) -> crate::err::BuildResult<()> {
  if strict {
    return Err(crate::err::BuildError::Deprecation(message.to_string()));
  }
  let warning = Warning::new(WarningCode::DeprecatedFeature, message);
  match handler {
    Some(handler) => handler(&warning),
    None => tracing::warn!("{warning}"),
  }
  Ok(())
}

impl std::fmt::Display for Warning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if let Some(plugin) = &self.plugin {
      write!(f, "({plugin}) ")?;
    }
    if let Some(id) = &self.id {
      write!(f, "{id}")?;
      if let Some(loc) = &self.loc {
        write!(f, ":{}:{}", loc.line, loc.column)?;
      }
      write!(f, " ")?;
    }
    write!(f, "[{}] {}", self.code.as_str(), self.message)
  }
}
