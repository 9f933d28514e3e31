//! Black-box source parsing.
//!
//! `parse_module` is the only place the engine touches the parser. It
//! runs under a fixed options set (latest ECMAScript, module goal, no
//! JSX/TypeScript) so that every module of a build is parsed the same
//! way.

use crate::prelude::*;

use swc_common::comments::{Comment, SingleThreadedComments};
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap, Spanned};
use swc_ecma_ast::EsVersion;
use swc_ecma_parser::lexer::Lexer;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax};

/// A parsed module plus the side tables the analysis passes need.
#[derive(Debug)]
pub struct ParsedModule {
  pub ast: swc_ecma_ast::Module,
  /// Absolute byte positions annotated by a `#__PURE__`/`@__PURE__`
  /// comment (the position of the annotated call).
  pub pure_positions: HashSet<u32>,
  /// Base of the absolute spans in `ast`; subtract to get an offset
  /// into the source text.
  pub offset: u32,
}

/// Parses `code` as an ES module. Parse failure is fatal and reported
/// with the earliest error location.
pub fn parse_module(id: &str, code: &str) -> BuildResult<ParsedModule> {
  let cm: Lrc<SourceMap> = Lrc::default();
  let fm = cm.new_source_file(
    Lrc::new(FileName::Custom(id.to_string())),
    code.to_string(),
  );
  let comments = SingleThreadedComments::default();

  let lexer = Lexer::new(
    Syntax::Es(EsSyntax::default()),
    EsVersion::latest(),
    StringInput::from(&*fm),
    Some(&comments),
  );
  let mut parser = Parser::new_from(lexer);
  let parsed = parser.parse_module();
  drop(parser);

  match parsed {
    Ok(ast) => Ok(ParsedModule {
      ast,
      pure_positions: collect_pure_positions(comments),
      offset: fm.start_pos.0,
    }),
    Err(e) => {
      let loc = cm.lookup_char_pos(e.span().lo);
      Err(BuildError::Parse {
        id: id.to_string(),
        line: loc.line as u32,
        column: loc.col_display as u32,
        message: e.kind().msg().to_string(),
      })
    }
  }
}

fn is_pure_annotation(comment: &Comment) -> bool {
  let text = comment.text.as_str();
  text.contains("#__PURE__") || text.contains("@__PURE__")
}

/// A pure annotation is a leading comment; the comment map keys leading
/// comments by the position of the token they precede, which is exactly
/// the call position the annotation applies to.
fn collect_pure_positions(comments: SingleThreadedComments) -> HashSet<u32> {
  let mut positions = HashSet::new();
  let (leading, _trailing) = comments.take_all();
  for (pos, list) in leading.borrow().iter() {
    if list.iter().any(is_pure_annotation) {
      positions.insert(pos.0);
    }
  }
  positions
}
