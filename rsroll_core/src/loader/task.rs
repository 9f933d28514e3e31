//! One load-and-scan task per module id.

use crate::ast::parse::parse_module;
use crate::ast::scan::scan_module;
use crate::loader::{Msg, ScanOutput, TaskCtx, fs};
use crate::module::{ModuleId, ResolvedId};
use crate::prelude::*;

use std::sync::Arc;
use tracing::trace;

/// Resolves `specifier` through the hook chain: the `external` option
/// on the raw specifier, the plugin hooks, then the filesystem
/// resolver, with the `external` option re-checked on the resolved id.
pub(crate) async fn resolve_id(
  ctx: &TaskCtx,
  specifier: &str,
  importer: Option<&str>,
  is_entry: bool,
) -> BuildResult<ResolvedId> {
  if !is_entry && ctx.external.is_external(specifier, importer, false) {
    return Ok(ResolvedId {
      id: specifier.to_string(),
      external: true,
      module_side_effects: None,
    });
  }

  if let Some(resolved) = ctx
    .plugin_driver
    .resolve_id(specifier, importer, is_entry)
    .await?
  {
    if !resolved.external
      && !is_entry
      && ctx.external.is_external(&resolved.id, importer, true)
    {
      return Ok(ResolvedId {
        external: true,
        ..resolved
      });
    }
    return Ok(resolved);
  }

  match fs::resolve_file(specifier, importer, ctx.preserve_symlinks).await {
    Ok(id) => {
      let external = !is_entry && ctx.external.is_external(&id, importer, true);
      Ok(ResolvedId {
        id,
        external,
        module_side_effects: None,
      })
    }
    Err(_) => match importer {
      _ if is_entry => Err(BuildError::UnresolvedEntry(specifier.to_string())),
      Some(importer) => Err(BuildError::UnresolvedImport {
        specifier: specifier.to_string(),
        importer: importer.to_string(),
      }),
      None => Err(BuildError::UnresolvedEntry(specifier.to_string())),
    },
  }
}

/// Loads, transforms, parses, scans and dependency-resolves one id.
pub(crate) struct ModuleTask {
  pub ctx: Arc<TaskCtx>,
  pub id: ModuleId,
  /// First importer that reached this id, for load diagnostics.
  pub importer: Option<ModuleId>,
}

impl ModuleTask {
  pub(crate) async fn run(self) {
    let tx = self.ctx.tx.clone();
    match self.run_inner().await {
      Ok(output) => {
        let _ = tx.send(Msg::Scanned(output));
      }
      Err(e) => {
        let _ = tx.send(Msg::Failed(e));
      }
    }
  }

  async fn run_inner(&self) -> BuildResult<Box<ScanOutput>> {
    if self.ctx.cancel.is_cancelled() {
      return Err(BuildError::Cancelled);
    }

    let original_code = match self.ctx.plugin_driver.load(&self.id).await? {
      Some(code) => code,
      None => fs::load_file(&self.id).await.map_err(|source| {
        BuildError::Load {
          id: self.id.clone(),
          importer: self
            .importer
            .clone()
            .unwrap_or_else(|| "<entry>".to_string()),
          source,
        }
      })?,
    };

    // A cache hit (same original source) reuses the transformed code
    // and skips the transform hooks.
    let (code, from_cache) = match self.ctx.cached_modules.get(&self.id) {
      Some(cached) if cached.original_code == original_code => {
        trace!("Module cache hit: {:?}", self.id);
        (cached.code.clone(), true)
      }
      _ => (
        self
          .ctx
          .plugin_driver
          .transform(original_code.clone(), &self.id)
          .await?,
        false,
      ),
    };

    // Parse and scan are synchronous; nothing suspends past here until
    // dependency resolution.
    let parsed = parse_module(&self.id, &code)?;
    let scan = scan_module(&parsed, &self.ctx.treeshake);

    let static_jobs = scan
      .sources
      .iter()
      .map(|specifier| resolve_id(&self.ctx, specifier.as_str(), Some(&self.id), false));
    let mut resolved = Vec::with_capacity(scan.sources.len());
    for (specifier, result) in scan
      .sources
      .iter()
      .zip(futures::future::join_all(static_jobs).await)
    {
      resolved.push((specifier.clone(), result?));
    }

    let dynamic_jobs = scan.dynamic_imports.iter().map(|site| async {
      match &site.specifier {
        Some(specifier) => {
          resolve_id(&self.ctx, specifier.as_str(), Some(&self.id), false)
            .await
            .map(Some)
        }
        None => Ok(None),
      }
    });
    let mut dynamic_resolved = Vec::with_capacity(scan.dynamic_imports.len());
    for result in futures::future::join_all(dynamic_jobs).await {
      dynamic_resolved.push(result?);
    }

    Ok(Box::new(ScanOutput {
      id: self.id.clone(),
      original_code,
      code,
      ast: parsed.ast,
      scan,
      resolved,
      dynamic_resolved,
      from_cache,
    }))
  }
}
