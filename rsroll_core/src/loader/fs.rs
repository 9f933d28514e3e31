//! Default filesystem resolve and load.
//!
//! Used when no plugin claims a specifier or id. Only plain ES module
//! files are understood; package resolution belongs to resolver
//! plugins.

use crate::module::ModuleId;
use crate::prelude::*;

use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

static FILE_EXTENSIONS: &[&str] = &["js", "mjs"];

fn transform(path: PathBuf) -> AnyResult<ModuleId> {
  path
    .into_os_string()
    .into_string()
    .map_err(|p| anyhow::anyhow!("Module path is not valid unicode: {p:?}"))
}

/// Canonicalises a candidate path into a module id. With
/// `preserve_symlinks` the path is absolutised lexically; otherwise
/// symlinks are followed.
fn canonicalize(path: &Path, preserve_symlinks: bool) -> AnyResult<PathBuf> {
  if preserve_symlinks {
    Ok(path.absolutize()?.to_path_buf())
  } else {
    Ok(std::fs::canonicalize(path)?)
  }
}

/// Completes a path against the known file extensions.
fn existing_file(path: &Path) -> Option<PathBuf> {
  if path.is_file() {
    return Some(path.to_path_buf());
  }
  if path.extension().is_none() {
    for ext in FILE_EXTENSIONS {
      let ext_path = path.with_extension(ext);
      if ext_path.is_file() {
        return Some(ext_path);
      }
    }
  }
  // Directory imports use the 'index.[ext]' convention.
  if path.is_dir() {
    for ext in FILE_EXTENSIONS {
      let index_path = path.join(format!("index.{ext}"));
      if index_path.is_file() {
        return Some(index_path);
      }
    }
  }
  None
}

/// Resolves a specifier against its importer on the local filesystem.
pub async fn resolve_file(
  specifier: &str,
  importer: Option<&str>,
  preserve_symlinks: bool,
) -> AnyResult<ModuleId> {
  // Full file path.
  if Path::new(specifier).is_absolute() {
    let path = existing_file(Path::new(specifier))
      .ok_or_else(|| anyhow::anyhow!("Module path not found: {specifier:?}"))?;
    return transform(canonicalize(&path, preserve_symlinks)?);
  }

  // Relative file path, against the importer directory or the current
  // working directory for entries.
  let base = match importer {
    Some(importer) => Path::new(importer)
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| PathBuf::from(".")),
    None => std::env::current_dir()?,
  };
  if specifier.starts_with("./") || specifier.starts_with("../") || importer.is_none() {
    let candidate = base.join(specifier);
    let path = existing_file(&candidate).ok_or_else(|| {
      anyhow::anyhow!("Module path not found: {:?}", candidate.display())
    })?;
    return transform(canonicalize(&path, preserve_symlinks)?);
  }

  // Bare specifiers are a resolver plugin's business.
  anyhow::bail!("Module specifier not found: {specifier:?}")
}

/// Loads the source text of a resolved id.
pub async fn load_file(id: &str) -> AnyResult<String> {
  Ok(tokio::fs::read_to_string(id).await?)
}
