//! Printing of syntax trees in source format.
//!
//! The printer queues whitespace (semicolons, blanks, newlines, indentation)
//! and flushes it lazily before the next non-whitespace token. A pending
//! semicolon is dropped when the next token is `)`, `}` or end of output, or
//! when a newline follows a token that triggers automatic semicolon
//! insertion, so reprinting an inserted semicolon and re-scanning the output
//! yields the same token stream.

use std::io::{self, Write};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::ast::*;
use crate::token::{Operator, Token};

/// Print formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Form {
    /// Keep linebreaks.
    #[default]
    Default,
    /// Use spaces instead of linebreaks where possible.
    Line,
    /// Like [`Form::Line`] but print `…` for non-empty function and
    /// composite literal bodies.
    Short,
}

/// Prints node x to w in the specified form and returns the number of bytes
/// written.
pub fn fprint(w: &mut dyn Write, x: &dyn PrintNode, form: Form) -> io::Result<usize> {
    let mut p = Printer {
        output: w,
        written: 0,
        form,
        linebreaks: form == Form::Default,
        indent: 0,
        nlcount: 0,
        pending: SmallVec::new(),
        last_tok: None,
    };
    x.print_node(&mut p)?;
    p.flush(Token::EOF)?;
    Ok(p.written)
}

/// Prints x in [`Form::Short`] and returns the text. Used in diagnostics.
pub fn printed(x: &dyn PrintNode) -> String {
    let mut buf = Vec::new();
    match fprint(&mut buf, x, Form::Short) {
        Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
        Err(err) => format!("<<< ERROR: {err}"),
    }
}

/// A node the printer can render. Implemented by the syntax tree families.
pub trait PrintNode {
    fn print_node(&self, p: &mut Printer<'_>) -> io::Result<()>;
}

impl PrintNode for File {
    fn print_node(&self, p: &mut Printer<'_>) -> io::Result<()> {
        p.print_file(self)
    }
}

impl PrintNode for Decl {
    fn print_node(&self, p: &mut Printer<'_>) -> io::Result<()> {
        p.print_decl_raw(self)
    }
}

impl PrintNode for Stmt {
    fn print_node(&self, p: &mut Printer<'_>) -> io::Result<()> {
        p.print_stmt(self)
    }
}

impl PrintNode for Expr {
    fn print_node(&self, p: &mut Printer<'_>) -> io::Result<()> {
        p.print_expr(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtrlSymbol {
    None,
    Semi,
    Blank,
    Newline,
    Indent,
    Outdent,
}

#[derive(Debug, Clone, Copy)]
struct Whitespace {
    last: Option<Token>,
    kind: CtrlSymbol,
}

pub struct Printer<'a> {
    output: &'a mut dyn Write,
    written: usize, // number of bytes written
    form: Form,
    linebreaks: bool, // print linebreaks instead of semis

    indent: usize,  // current indentation level
    nlcount: usize, // number of consecutive newlines

    pending: SmallVec<[Whitespace; 8]>, // pending whitespace
    last_tok: Option<Token>, // last token processed (after any pending semi)
}

// If implies_semi returns true for a non-blank line's final token, a
// semicolon is automatically inserted. Vice versa, a semicolon may be
// omitted in those cases.
fn implies_semi(tok: Option<Token>) -> bool {
    matches!(
        tok,
        Some(
            Token::Name
                | Token::Literal
                | Token::Break
                | Token::Continue
                | Token::Return
                | Token::IncOp
                | Token::Rparen
                | Token::Rbrack
                | Token::Rbrace
        )
    )
}

fn group_for(d: &Decl) -> (Token, Option<&Rc<Group>>) {
    match d {
        Decl::Import(d) => (Token::Import, d.group.as_ref()),
        Decl::Type(d) => (Token::Type, d.group.as_ref()),
        Decl::Var(d) => (Token::Var, d.group.as_ref()),
        Decl::Func(_) => (Token::Func, None),
        Decl::Oper(_) => (Token::Oper, None),
    }
}

const TAB_BYTES: &[u8] = b"\t\t\t\t\t\t\t\t";

impl<'a> Printer<'a> {
    // =========================================================================
    // Output plumbing

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.output.write_all(data)?;
        self.written += data.len();
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        debug_assert!(!data.is_empty(), "expected non-empty output");
        if self.nlcount > 0 && self.indent > 0 {
            // write indentation
            let mut n = self.indent;
            while n > TAB_BYTES.len() {
                self.write(TAB_BYTES)?;
                n -= TAB_BYTES.len();
            }
            self.write(&TAB_BYTES[..n])?;
        }
        self.write(data)?;
        self.nlcount = 0;
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn add_whitespace(&mut self, kind: CtrlSymbol) {
        self.pending.push(Whitespace {
            last: self.last_tok,
            kind,
        });
        match kind {
            CtrlSymbol::Semi => self.last_tok = Some(Token::Semi),
            CtrlSymbol::Newline => self.last_tok = None,
            _ => {}
        }
    }

    fn flush(&mut self, next: Token) -> io::Result<()> {
        // eliminate semis and redundant whitespace
        let mut saw_newline = next == Token::EOF;
        let mut saw_paren = next == Token::Rparen || next == Token::Rbrace;
        for i in (0..self.pending.len()).rev() {
            match self.pending[i].kind {
                CtrlSymbol::Semi => {
                    let mut k = CtrlSymbol::Semi;
                    if saw_paren {
                        saw_paren = false;
                        k = CtrlSymbol::None; // eliminate semi
                    } else if saw_newline && implies_semi(self.pending[i].last) {
                        saw_newline = false;
                        k = CtrlSymbol::None; // eliminate semi
                    }
                    self.pending[i].kind = k;
                }
                CtrlSymbol::Newline => saw_newline = true,
                _ => {}
            }
        }

        // print pending
        let pending = std::mem::take(&mut self.pending);
        let mut prev = CtrlSymbol::None;
        for ws in &pending {
            match ws.kind {
                CtrlSymbol::None => {}
                CtrlSymbol::Semi => {
                    self.write_str(";")?;
                    self.nlcount = 0;
                    prev = CtrlSymbol::Semi;
                }
                CtrlSymbol::Blank => {
                    // at most one blank
                    if prev != CtrlSymbol::Blank {
                        self.write_bytes(b" ")?;
                        self.nlcount = 0;
                        prev = CtrlSymbol::Blank;
                    }
                }
                CtrlSymbol::Newline => {
                    const MAX_EMPTY_LINES: usize = 1;
                    if self.nlcount <= MAX_EMPTY_LINES {
                        self.write(b"\n")?;
                        self.nlcount += 1;
                        prev = CtrlSymbol::Newline;
                    }
                }
                CtrlSymbol::Indent => self.indent += 1,
                CtrlSymbol::Outdent => {
                    debug_assert!(self.indent > 0, "negative indentation");
                    self.indent = self.indent.saturating_sub(1);
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Token emission

    fn token(&mut self, tok: Token) -> io::Result<()> {
        debug_assert!(tok != Token::Name, "name tokens carry text");
        if tok == Token::Semi {
            // delay printing of semi
            self.add_whitespace(CtrlSymbol::Semi);
            return Ok(());
        }
        self.flush(tok)?;
        self.write_str(&tok.to_string())?;
        self.nlcount = 0;
        self.last_tok = Some(tok);
        Ok(())
    }

    fn name_str(&mut self, s: &str) -> io::Result<()> {
        self.flush(Token::Name)?;
        self.write_str(s)?;
        self.nlcount = 0;
        self.last_tok = Some(Token::Name);
        Ok(())
    }

    fn oper(&mut self, op: Operator) -> io::Result<()> {
        self.flush(Token::Op)?;
        self.write_str(&op.to_string())?;
        self.nlcount = 0;
        self.last_tok = Some(Token::Op);
        Ok(())
    }

    fn ctrl(&mut self, kind: CtrlSymbol) {
        let kind = if kind == CtrlSymbol::Newline && !self.linebreaks {
            CtrlSymbol::Blank
        } else {
            kind
        };
        self.add_whitespace(kind);
    }

    // =========================================================================
    // Files and declarations

    fn print_file(&mut self, f: &File) -> io::Result<()> {
        self.token(Token::Space)?;
        self.ctrl(CtrlSymbol::Blank);
        self.name_str(&f.space_name.value)?;
        if !f.decls.is_empty() {
            self.token(Token::Semi)?;
            self.ctrl(CtrlSymbol::Newline);
            self.ctrl(CtrlSymbol::Newline);
            self.print_decl_list(&f.decls)?;
        }
        Ok(())
    }

    fn print_decl_list(&mut self, list: &[Decl]) -> io::Result<()> {
        let mut i0 = 0;
        let mut tok = None;
        let mut group: Option<Rc<Group>> = None;
        for (i, x) in list.iter().enumerate() {
            let (s, g) = group_for(x);
            if g.is_none() || !Group::same(g, group.as_ref()) {
                if i0 < i {
                    self.print_decl(&list[i0..i])?;
                    self.token(Token::Semi)?;
                    self.ctrl(CtrlSymbol::Newline);
                    // print empty line between different declaration groups,
                    // different kinds of declarations, or between functions
                    if !Group::same(g, group.as_ref()) || Some(s) != tok || s == Token::Func {
                        self.ctrl(CtrlSymbol::Newline);
                    }
                    i0 = i;
                }
                tok = Some(s);
                group = g.map(Rc::clone);
            }
        }
        self.print_decl(&list[i0..])
    }

    // print_decl prints a single ungrouped declaration, or a maximal run of
    // declarations sharing one group tag as "kw ( ... )".
    fn print_decl(&mut self, list: &[Decl]) -> io::Result<()> {
        let (tok, group) = group_for(&list[0]);

        if group.is_none() {
            debug_assert_eq!(list.len(), 1, "ungrouped declarations print one at a time");
            return self.print_decl_raw(&list[0]);
        }

        self.token(tok)?;
        self.ctrl(CtrlSymbol::Blank);
        self.token(Token::Lparen)?;
        if !list.is_empty() {
            self.ctrl(CtrlSymbol::Newline);
            self.ctrl(CtrlSymbol::Indent);
            for d in list {
                self.print_decl_raw(d)?;
                self.token(Token::Semi)?;
                self.ctrl(CtrlSymbol::Newline);
            }
            self.ctrl(CtrlSymbol::Outdent);
        }
        self.token(Token::Rparen)
    }

    fn print_decl_raw(&mut self, d: &Decl) -> io::Result<()> {
        match d {
            Decl::Import(d) => {
                if d.group.is_none() {
                    self.token(Token::Import)?;
                    self.ctrl(CtrlSymbol::Blank);
                }
                if let Some(path) = &d.path {
                    self.name_str(&path.value)?;
                }
            }

            Decl::Type(d) => {
                if d.group.is_none() {
                    self.token(Token::Type)?;
                    self.ctrl(CtrlSymbol::Blank);
                }
                self.name_str(&d.name.value)?;
                self.ctrl(CtrlSymbol::Blank);
                if d.alias {
                    self.token(Token::Assign)?;
                    self.ctrl(CtrlSymbol::Blank);
                }
                self.print_expr(&d.ty)?;
            }

            Decl::Var(d) => {
                if d.group.is_none() {
                    self.token(Token::Var)?;
                    self.ctrl(CtrlSymbol::Blank);
                }
                self.name_str(&d.name.value)?;
                if let Some(ty) = &d.ty {
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_expr(ty)?;
                }
                if let Some(value) = &d.value {
                    self.ctrl(CtrlSymbol::Blank);
                    self.token(Token::Assign)?;
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_expr(value)?;
                }
            }

            Decl::Func(d) => {
                self.token(Token::Func)?;
                self.ctrl(CtrlSymbol::Blank);
                self.name_str(&d.name.value)?;
                self.print_param_list(&d.params)?;
                if let Some(ret) = &d.ret {
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_expr(ret)?;
                }
                if let Some(body) = &d.body {
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_block(body)?;
                }
            }

            Decl::Oper(d) => {
                self.token(Token::Oper)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_oper_param(&d.left)?;
                self.ctrl(CtrlSymbol::Blank);
                match d.op.overload_name() {
                    Some(name) => self.name_str(name)?,
                    None => self.name_str(&d.op.to_string())?,
                }
                self.ctrl(CtrlSymbol::Blank);
                self.print_oper_param(&d.right)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_expr(&d.ret)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_block(&d.body)?;
            }
        }
        Ok(())
    }

    fn print_param_list(&mut self, params: &[Field]) -> io::Result<()> {
        self.token(Token::Lparen)?;
        for (i, f) in params.iter().enumerate() {
            if i > 0 {
                self.token(Token::Comma)?;
                self.ctrl(CtrlSymbol::Blank);
            }
            self.print_field(f)?;
        }
        self.token(Token::Rparen)
    }

    fn print_oper_param(&mut self, f: &Field) -> io::Result<()> {
        self.token(Token::Lparen)?;
        self.print_field(f)?;
        self.token(Token::Rparen)
    }

    fn print_field(&mut self, f: &Field) -> io::Result<()> {
        if let Some(name) = &f.name {
            self.name_str(&name.value)?;
            self.ctrl(CtrlSymbol::Blank);
        }
        self.print_expr(&f.ty)
    }

    // =========================================================================
    // Statements

    fn print_stmt(&mut self, s: &Stmt) -> io::Result<()> {
        match s {
            Stmt::Empty(_) => {
                // nothing to print
            }

            Stmt::Expr(s) => self.print_expr(&s.x)?,

            Stmt::IncDec(s) => {
                self.print_expr(&s.x)?;
                let op = s.op.to_string();
                self.flush(Token::IncOp)?;
                self.write_str(&op)?;
                self.write_str(&op)?;
                self.nlcount = 0;
                self.last_tok = Some(Token::IncOp);
            }

            Stmt::Break(_) => self.token(Token::Break)?,

            Stmt::Continue(_) => self.token(Token::Continue)?,

            Stmt::Return(s) => {
                self.token(Token::Return)?;
                if let Some(result) = &s.result {
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_expr(result)?;
                }
            }

            Stmt::Decl(s) => self.print_decl(&s.decls)?,

            Stmt::Define(s) => {
                self.print_expr(&s.lhs)?;
                self.ctrl(CtrlSymbol::Blank);
                self.token(Token::Define)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_expr(&s.rhs)?;
            }

            Stmt::Assign(s) => {
                self.print_expr(&s.lhs)?;
                self.ctrl(CtrlSymbol::Blank);
                if let Some(op) = s.op {
                    self.oper(op)?;
                }
                self.token(Token::Assign)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_expr(&s.rhs)?;
            }

            Stmt::If(s) => {
                self.token(Token::If)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_expr(&s.cond)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_block(&s.block)?;
                if let Some(els) = &s.els {
                    self.ctrl(CtrlSymbol::Blank);
                    self.token(Token::Else)?;
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_stmt(els)?;
                }
            }

            Stmt::While(s) => {
                self.token(Token::While)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_expr(&s.cond)?;
                self.ctrl(CtrlSymbol::Blank);
                self.print_block(&s.body)?;
            }

            Stmt::For(s) => {
                self.token(Token::For)?;
                self.ctrl(CtrlSymbol::Blank);
                if s.init.is_none() && s.post.is_none() {
                    if let Some(cond) = &s.cond {
                        self.print_expr(cond)?;
                        self.ctrl(CtrlSymbol::Blank);
                    }
                } else {
                    if let Some(init) = &s.init {
                        self.print_stmt(init)?;
                    }
                    self.token(Token::Semi)?;
                    self.ctrl(CtrlSymbol::Blank);
                    if let Some(cond) = &s.cond {
                        self.print_expr(cond)?;
                    }
                    self.token(Token::Semi)?;
                    self.ctrl(CtrlSymbol::Blank);
                    if let Some(post) = &s.post {
                        self.print_stmt(post)?;
                        self.ctrl(CtrlSymbol::Blank);
                    }
                }
                self.print_block(&s.body)?;
            }

            Stmt::Block(b) => self.print_block(b)?,
        }
        Ok(())
    }

    fn print_block(&mut self, b: &BlockStmt) -> io::Result<()> {
        self.token(Token::Lbrace)?;
        if self.form == Form::Short {
            self.ctrl(CtrlSymbol::Blank);
            if !b.stmts.is_empty() {
                self.name_str("…")?;
                self.ctrl(CtrlSymbol::Blank);
            }
        } else if !b.stmts.is_empty() {
            self.ctrl(CtrlSymbol::Newline);
            self.ctrl(CtrlSymbol::Indent);
            self.print_stmt_list(&b.stmts, true)?;
            self.ctrl(CtrlSymbol::Outdent);
            self.ctrl(CtrlSymbol::Newline);
        }
        self.token(Token::Rbrace)
    }

    fn print_stmt_list(&mut self, list: &[Stmt], braces: bool) -> io::Result<()> {
        for (i, x) in list.iter().enumerate() {
            self.print_stmt(x)?;
            self.token(Token::Semi)?;
            if i + 1 < list.len() {
                self.ctrl(CtrlSymbol::Newline);
            } else if braces && matches!(x, Stmt::Empty(_)) {
                // print an extra semicolon if the last statement is an empty
                // statement and we are in a braced block because one
                // semicolon is automatically removed
                self.token(Token::Semi)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expressions

    fn print_expr(&mut self, x: &Expr) -> io::Result<()> {
        match x {
            Expr::Bad(_) => self.name_str("<bad expr>")?,

            Expr::Name(n) => self.name_str(&n.value)?,

            Expr::Lit(l) => self.name_str(&l.value)?,

            Expr::Paren(x) => {
                self.token(Token::Lparen)?;
                self.print_expr(&x.x)?;
                self.token(Token::Rparen)?;
            }

            Expr::Selector(x) => {
                self.print_expr(&x.x)?;
                self.token(Token::Dot)?;
                self.name_str(&x.sel.value)?;
            }

            Expr::Index(x) => {
                self.print_expr(&x.x)?;
                self.token(Token::Lbrack)?;
                self.print_expr(&x.index)?;
                self.token(Token::Rbrack)?;
            }

            Expr::Call(x) => {
                self.print_expr(&x.func)?;
                self.token(Token::Lparen)?;
                self.print_expr_list(&x.args)?;
                self.token(Token::Rparen)?;
            }

            Expr::Operation(x) => match &x.y {
                None => {
                    // unary expr
                    self.oper(x.op)?;
                    // keep "- -x" from turning into "--x"
                    if let Expr::Operation(inner) = &*x.x {
                        if inner.y.is_none()
                            && inner.op == x.op
                            && matches!(x.op, Operator::Add | Operator::Sub)
                        {
                            self.ctrl(CtrlSymbol::Blank);
                        }
                    }
                    self.print_expr(&x.x)?;
                }
                Some(y) => {
                    // binary expr
                    self.print_expr(&x.x)?;
                    self.ctrl(CtrlSymbol::Blank);
                    self.oper(x.op)?;
                    self.ctrl(CtrlSymbol::Blank);
                    self.print_expr(y)?;
                }
            },

            Expr::SliceType(x) => {
                self.token(Token::Lbrack)?;
                self.token(Token::Rbrack)?;
                self.print_expr(&x.elem)?;
            }

            Expr::SliceLit(x) => {
                self.token(Token::Lbrack)?;
                self.token(Token::Rbrack)?;
                self.print_expr(&x.elem_type)?;
                self.token(Token::Lbrace)?;
                if self.form == Form::Short {
                    if !x.elems.is_empty() {
                        self.name_str("…")?;
                    }
                } else {
                    self.print_expr_list(&x.elems)?;
                }
                self.token(Token::Rbrace)?;
            }
        }
        Ok(())
    }

    fn print_expr_list(&mut self, list: &[Expr]) -> io::Result<()> {
        for (i, x) in list.iter().enumerate() {
            if i > 0 {
                self.token(Token::Comma)?;
                self.ctrl(CtrlSymbol::Blank);
            }
            self.print_expr(x)?;
        }
        Ok(())
    }
}
