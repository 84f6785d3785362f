//! Front end for the paw language.
//!
//! - The scanner is a pull-based tokenizer over a buffered UTF-8 reader and
//!   implements automatic semicolon insertion.
//! - The parser is recursive descent and returns an owned syntax tree
//!   together with diagnostics delivered through a handler.
//! - The printer reprints a tree as source text that re-parses to an
//!   equivalent tree.

pub mod ast;
pub mod error;
pub mod pos;
pub mod printer;
pub mod scanner;
pub mod token;

mod parser;
mod source;

use std::io::Read;
use std::rc::Rc;

// Re-exports for convenience
pub use crate::ast::File;
pub use crate::error::SyntaxError;
pub use crate::pos::{Pos, PosBase};
pub use crate::printer::{fprint, printed, Form};
pub use crate::scanner::Scanner;

/// Parses a source file read from `src`, reporting diagnostics through
/// `errh`.
///
/// Recoverable errors still produce a (partial) tree; the result is `Err`
/// only when no usable tree exists, e.g. when the `space` header is missing.
pub fn parse(
    base: &Rc<PosBase>,
    src: impl Read,
    errh: impl FnMut(SyntaxError),
) -> Result<File, SyntaxError> {
    let mut src = src;
    let mut errh = errh;
    parser::parse_reader(base, &mut src, &mut errh)
}

/// Parses in-memory source text; `filename` is used for positions.
pub fn parse_str(
    filename: &str,
    src: &str,
    errh: impl FnMut(SyntaxError),
) -> Result<File, SyntaxError> {
    let base = PosBase::new_file(filename);
    parse(&base, src.as_bytes(), errh)
}

/// Parses a single expression. The filename reported in positions is empty.
///
/// A trailing newline (one inserted semicolon) is tolerated; any other
/// trailing tokens are an error.
pub fn parse_expr(src: &str) -> Result<ast::Expr, SyntaxError> {
    parser::parse_expr_str(src)
}
