use thiserror::Error;

use crate::pos::Pos;

/// A diagnostic produced while scanning or parsing.
///
/// `msg` carries the full detail including the `syntax error: ` prefix where
/// applicable; rendering prepends the position as `file:line:col`.
#[derive(Debug, Clone, Error)]
#[error("{pos}: {msg}")]
pub struct SyntaxError {
    pub pos: Pos,
    pub msg: String,
}

/// Handler for scanner-level diagnostics: physical line, column, message.
///
/// Messages never start with `/` for real errors; that first byte is reserved
/// for comment and directive surfacings, so a single handler can multiplex
/// both streams.
pub type ScanHandler<'a> = Box<dyn FnMut(u32, u32, &str) + 'a>;
