use crate::diag::*;

#[test]
fn line_col1() {
  let code = "const a = 1;\nconst b = 2;\nconst c = 3;\n";
  assert_eq!(line_col(code, 0), Loc { line: 1, column: 0 });
  assert_eq!(line_col(code, 6), Loc { line: 1, column: 6 });
  assert_eq!(line_col(code, 13), Loc { line: 2, column: 0 });
  assert_eq!(line_col(code, 19), Loc { line: 2, column: 6 });
  // Past the end clamps to the last position.
  assert_eq!(line_col(code, 10_000).line, 4);
}

#[test]
fn warning_display1() {
  let warning = Warning::new(WarningCode::MissingExport, "\"x\" is not exported")
    .with_id("/a.js")
    .with_loc(Loc { line: 3, column: 7 })
    .with_plugin("memory");
  assert_eq!(
    warning.to_string(),
    "(memory) /a.js:3:7 [MISSING_EXPORT] \"x\" is not exported"
  );
}

#[test]
fn warning_display2() {
  let warning = Warning::new(WarningCode::CircularDependency, "cycle");
  assert_eq!(warning.to_string(), "[CIRCULAR_DEPENDENCY] cycle");
}

#[test]
fn warning_codes1() {
  assert_eq!(WarningCode::CircularDependency.as_str(), "CIRCULAR_DEPENDENCY");
  assert_eq!(WarningCode::MissingExport.as_str(), "MISSING_EXPORT");
  assert_eq!(
    WarningCode::UnusedExternalImport.as_str(),
    "UNUSED_EXTERNAL_IMPORT"
  );
  assert_eq!(WarningCode::DeprecatedFeature.as_str(), "DEPRECATED_FEATURE");
}
