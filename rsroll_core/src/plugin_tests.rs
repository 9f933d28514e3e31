use crate::module::ResolvedId;
use crate::plugin::*;
use crate::prelude::*;

use async_trait::async_trait;
use std::sync::Arc;

struct FixedResolver {
  name: &'static str,
  id: &'static str,
}

#[async_trait]
impl Plugin for FixedResolver {
  fn name(&self) -> &'static str {
    self.name
  }

  async fn resolve_id(
    &self,
    _specifier: &str,
    _importer: Option<&str>,
    _is_entry: bool,
  ) -> AnyResult<Option<ResolvedId>> {
    Ok(Some(ResolvedId {
      id: self.id.to_string(),
      external: false,
      module_side_effects: None,
    }))
  }
}

struct Suffixer(&'static str);

#[async_trait]
impl Plugin for Suffixer {
  fn name(&self) -> &'static str {
    "suffixer"
  }

  async fn transform(&self, code: &str, _id: &str) -> AnyResult<Option<String>> {
    Ok(Some(format!("{code}{}", self.0)))
  }
}

struct Failing;

#[async_trait]
impl Plugin for Failing {
  fn name(&self) -> &'static str {
    "failing"
  }

  async fn load(&self, _id: &str) -> AnyResult<Option<String>> {
    anyhow::bail!("boom")
  }
}

#[tokio::test]
async fn resolve_order1() {
  // The first plugin returning `Some` wins.
  let driver = PluginDriver::new(
    vec![
      Arc::new(FixedResolver {
        name: "first",
        id: "/first.js",
      }),
      Arc::new(FixedResolver {
        name: "second",
        id: "/second.js",
      }),
    ],
    None,
  );
  let resolved = driver.resolve_id("./x", None, false).await.unwrap().unwrap();
  assert_eq!(resolved.id, "/first.js");
}

#[tokio::test]
async fn transform_chain1() {
  let driver = PluginDriver::new(
    vec![Arc::new(Suffixer(";//a")), Arc::new(Suffixer(";//b"))],
    None,
  );
  let code = driver.transform("x".to_string(), "/x.js").await.unwrap();
  assert_eq!(code, "x;//a;//b");
}

#[tokio::test]
async fn attribution1() {
  let driver = PluginDriver::new(vec![Arc::new(Failing)], None);
  let err = driver.load("/x.js").await.unwrap_err();
  match err {
    BuildError::Plugin { plugin, hook, .. } => {
      assert_eq!(plugin, "failing");
      assert_eq!(hook, "load");
    }
    other => panic!("Expected a plugin error, got {other:?}"),
  }
}
