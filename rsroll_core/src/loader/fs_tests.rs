use crate::loader::fs::{load_file, resolve_file};

use assert_fs::TempDir;
use assert_fs::prelude::*;

#[tokio::test]
async fn resolve1() {
  let temp = TempDir::new().unwrap();
  temp.child("main.js").write_str("export const x = 1;").unwrap();
  temp.child("dep.js").write_str("export const y = 2;").unwrap();

  let importer = temp.child("main.js").path().display().to_string();

  // Exact file.
  let id = resolve_file("./dep.js", Some(&importer), false).await.unwrap();
  assert!(id.ends_with("dep.js"));

  // Extension completion.
  let id = resolve_file("./dep", Some(&importer), false).await.unwrap();
  assert!(id.ends_with("dep.js"));
}

#[tokio::test]
async fn resolve2() {
  let temp = TempDir::new().unwrap();
  temp.child("main.js").write_str("").unwrap();
  temp.child("pkg/index.js").write_str("export default 1;").unwrap();

  let importer = temp.child("main.js").path().display().to_string();

  // Directory imports land on index.js.
  let id = resolve_file("./pkg", Some(&importer), false).await.unwrap();
  assert!(id.ends_with("index.js"));
}

#[tokio::test]
async fn resolve3() {
  let temp = TempDir::new().unwrap();
  temp.child("main.js").write_str("").unwrap();
  let importer = temp.child("main.js").path().display().to_string();

  // Missing relative target.
  assert!(resolve_file("./missing", Some(&importer), false).await.is_err());
  // Bare specifiers belong to resolver plugins.
  assert!(resolve_file("lodash", Some(&importer), false).await.is_err());
}

#[tokio::test]
async fn resolve4() {
  let temp = TempDir::new().unwrap();
  temp.child("a.js").write_str("").unwrap();
  let importer = temp.child("a.js").path().display().to_string();
  temp.child("b.js").write_str("").unwrap();

  // Lexical absolutisation does not touch the filesystem's links.
  let preserved = resolve_file("./b.js", Some(&importer), true).await.unwrap();
  let followed = resolve_file("./b.js", Some(&importer), false).await.unwrap();
  assert!(preserved.ends_with("b.js"));
  assert!(followed.ends_with("b.js"));
}

#[tokio::test]
async fn load1() {
  let temp = TempDir::new().unwrap();
  temp.child("mod.js").write_str("export const x = 1;").unwrap();

  let id = temp.child("mod.js").path().display().to_string();
  let source = load_file(&id).await.unwrap();
  assert_eq!(source, "export const x = 1;");

  assert!(load_file("/definitely/not/here.js").await.is_err());
}
