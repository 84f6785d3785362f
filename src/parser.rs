//! Recursive-descent parser.
//!
//! The parser pulls tokens from the scanner one at a time and builds an owned
//! [`File`] tree. Diagnostics are delivered synchronously through the
//! caller's handler; recoverable errors produce `Bad` nodes or skip ahead to
//! a follow set, and only a missing `space` header aborts the parse.
//!
//! The scanner handler doubles as the line-directive channel: surfaced
//! comment text (first byte `/`) carrying a `line filename:l[:c]` payload
//! installs a new position base for subsequent positions.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use crate::ast::*;
use crate::error::{ScanHandler, SyntaxError};
use crate::pos::{Pos, PosBase, COL_BASE, POS_MAX};
use crate::printer;
use crate::scanner::{Scanner, DIRECTIVES};
use crate::token::{contains, tokset, LitKind, Operator, Token};

// Statement starts: when inside a function, error recovery stops at these in
// addition to the explicit follow list.
const STOPSET: u64 = tokset(&[
    Token::Break,
    Token::Continue,
    Token::For,
    Token::While,
    Token::If,
    Token::Return,
    Token::Type,
    Token::Var,
]);

// =============================================================================
// Parser state and error plumbing
// =============================================================================

// State shared between the parser and the scanner's diagnostic handler: the
// position base chain and the user's error callback.
struct Shared<'a> {
    file: Rc<PosBase>,
    base: Rc<PosBase>,
    errh: &'a mut dyn FnMut(SyntaxError),
    first: Option<SyntaxError>,
}

fn report(shared: &RefCell<Shared<'_>>, pos: Pos, msg: String) {
    let err = SyntaxError { pos, msg };
    let mut s = shared.borrow_mut();
    if s.first.is_none() {
        s.first = Some(err.clone());
    }
    (s.errh)(err);
}

fn pos_in(shared: &RefCell<Shared<'_>>, line: u32, col: u32) -> Pos {
    let s = shared.borrow();
    Pos::new(Rc::clone(&s.base), line, col)
}

fn report_at(shared: &RefCell<Shared<'_>>, line: u32, col: u32, msg: &str) {
    let pos = pos_in(shared, line, col);
    report(shared, pos, msg.to_string());
}

// The text of a surfaced comment, without delimiters.
fn comment_text(msg: &str) -> &str {
    if let Some(body) = msg.strip_prefix("/*") {
        body.strip_suffix("*/").unwrap_or(body)
    } else {
        &msg[2..] // line comment (excluding "//")
    }
}

fn handle_scan_event(shared: &RefCell<Shared<'_>>, line: u32, col: u32, msg: &str) {
    if !msg.starts_with('/') {
        report_at(shared, line, col, msg);
        return;
    }

    // otherwise it must be a comment containing a line directive
    let text = comment_text(msg);
    if let Some(args) = text.strip_prefix("line ") {
        let line_comment = msg.as_bytes()[1] == b'/';
        if line_comment && col != COL_BASE {
            // //line directives are only recognized at the start of a line
            return;
        }
        // position immediately following the comment
        let pos = {
            let s = shared.borrow();
            if line_comment {
                // the newline still belongs to the comment
                Pos::new(Rc::clone(&s.file), line + 1, COL_BASE)
            } else {
                Pos::new(Rc::clone(&s.file), line, col + msg.len() as u32)
            }
        };
        update_base(shared, pos, line, col + 2 + 5, args); // +2+5 to skip over "//" and "line "
    }
}

// update_base installs a new position base from the directive payload
// `filename:line` or `filename:line:col`, scanning numbers from the right so
// that filenames may contain colons.
fn update_base(shared: &RefCell<Shared<'_>>, pos: Pos, tline: u32, tcol: u32, text: &str) {
    let (i, n, ok) = trailing_digits(text);
    if i == 0 {
        return; // ignore (not a line directive)
    }
    // i > 0
    if !ok {
        // text has a suffix :xxx but xxx is not a number
        report_at(
            shared,
            tline,
            tcol + i,
            &format!("invalid line number: {}", &text[i as usize..]),
        );
        return;
    }

    let line;
    let mut col = 0;
    let mut digits_start = i;
    let mut filename_end = i as usize - 1;
    let (i2, n2, ok2) = trailing_digits(&text[..i as usize - 1]);
    if ok2 {
        // filename:line:col
        digits_start = i2;
        line = n2;
        col = n;
        if col == 0 || col > POS_MAX {
            report_at(
                shared,
                tline,
                tcol + i,
                &format!("invalid column number: {}", &text[i as usize..]),
            );
            return;
        }
        filename_end = i2 as usize - 1;
    } else {
        // filename:line
        line = n;
    }

    let line_text = if ok2 {
        &text[digits_start as usize..i as usize - 1]
    } else {
        &text[digits_start as usize..]
    };
    if line == 0 || line > POS_MAX {
        report_at(
            shared,
            tline,
            tcol + digits_start,
            &format!("invalid line number: {line_text}"),
        );
        return;
    }

    let filename = if text[..filename_end].is_empty() {
        // an empty filename reuses the previous one
        shared.borrow().base.filename().to_string()
    } else {
        text[..filename_end].to_string()
    };

    shared.borrow_mut().base = PosBase::new_line(pos, filename, line, col);
}

// trailing_digits splits off a trailing ":<number>"; the returned index
// points just past the rightmost ':' (0 if there is none).
fn trailing_digits(text: &str) -> (u32, u32, bool) {
    match text.rfind(':') {
        None => (0, 0, false),
        Some(i) => match text[i + 1..].parse::<u32>() {
            Ok(n) => ((i + 1) as u32, n, true),
            Err(_) => ((i + 1) as u32, 0, false),
        },
    }
}

fn tokstring(tok: Token) -> String {
    match tok {
        Token::Comma => "comma".to_string(),
        Token::Semi => "semicolon or newline".to_string(),
        _ => tok.to_string(),
    }
}

// =============================================================================
// Entry points
// =============================================================================

pub(crate) fn parse_reader<'a>(
    base: &Rc<PosBase>,
    src: &'a mut dyn Read,
    errh: &'a mut dyn FnMut(SyntaxError),
) -> Result<File, SyntaxError> {
    let shared = Rc::new(RefCell::new(Shared {
        file: Rc::clone(base),
        base: Rc::clone(base),
        errh,
        first: None,
    }));

    let h = Rc::clone(&shared);
    let scan_errh: ScanHandler<'a> = Box::new(move |line, col, msg| {
        handle_scan_event(&h, line, col, msg);
    });

    let mut p = Parser {
        scanner: Scanner::new(src, scan_errh, DIRECTIVES),
        shared: Rc::clone(&shared),
        fnest: 0,
    };
    p.next();
    let file = p.file_or_none();

    let mut s = shared.borrow_mut();
    match file {
        Some(f) => Ok(f),
        None => Err(s.first.take().unwrap_or_else(|| SyntaxError {
            pos: base.pos(),
            msg: "syntax error: empty input".to_string(),
        })),
    }
}

pub(crate) fn parse_expr_str(src: &str) -> Result<Expr, SyntaxError> {
    let base = PosBase::new_file("");
    let mut bytes = src.as_bytes();
    let mut sink = |_err: SyntaxError| {};
    let shared = Rc::new(RefCell::new(Shared {
        file: Rc::clone(&base),
        base: Rc::clone(&base),
        errh: &mut sink,
        first: None,
    }));

    let h = Rc::clone(&shared);
    let scan_errh: ScanHandler<'_> = Box::new(move |line, col, msg| {
        handle_scan_event(&h, line, col, msg);
    });

    let mut p = Parser {
        scanner: Scanner::new(&mut bytes, scan_errh, DIRECTIVES),
        shared: Rc::clone(&shared),
        fnest: 0,
    };
    p.next();
    let x = p.expr();

    // If a semicolon was inserted (at a newline or at EOF), consume it;
    // report an error if there are more tokens.
    if p.tok() == Token::Semi && p.scanner.literal() != "semicolon" {
        p.next();
    }
    p.want(Token::EOF);

    let mut s = shared.borrow_mut();
    match s.first.take() {
        None => Ok(x),
        Some(err) => Err(err),
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    scanner: Scanner<'a>,
    shared: Rc<RefCell<Shared<'a>>>,
    fnest: u32, // function nesting level, for error recovery
}

impl<'a> Parser<'a> {
    fn tok(&self) -> Token {
        self.scanner.token()
    }

    fn next(&mut self) {
        self.scanner.next();
    }

    fn pos(&self) -> Pos {
        self.pos_at(self.scanner.line(), self.scanner.col())
    }

    fn pos_at(&self, line: u32, col: u32) -> Pos {
        pos_in(&self.shared, line, col)
    }

    fn error_at(&mut self, pos: Pos, msg: String) {
        report(&self.shared, pos, msg);
    }

    fn syntax_error_at(&mut self, pos: Pos, msg: &str) {
        let suffix = if msg.is_empty() {
            String::new()
        } else if msg.starts_with("in ") || msg.starts_with("at ") || msg.starts_with("after ") {
            format!(" {msg}")
        } else if msg.starts_with("expected ") {
            format!(", {msg}")
        } else {
            // plain error - message does not mention the current token
            self.error_at(pos, format!("syntax error: {msg}"));
            return;
        };

        // determine token string
        let tok = match self.tok() {
            Token::Name | Token::Semi => self.scanner.literal().to_string(),
            Token::Literal => format!("literal {}", self.scanner.literal()),
            Token::Op => self.scanner.op().to_string(),
            Token::AssignOp => format!("{}=", self.scanner.op()),
            Token::IncOp => {
                let op = self.scanner.op().to_string();
                format!("{op}{op}")
            }
            t => tokstring(t),
        };

        self.error_at(pos, format!("syntax error: unexpected {tok}{suffix}"));
    }

    fn syntax_error(&mut self, msg: &str) {
        self.syntax_error_at(self.pos(), msg)
    }

    // got consumes the current token iff it is tok.
    fn got(&mut self, tok: Token) -> bool {
        if self.tok() == tok {
            self.next();
            return true;
        }
        false
    }

    fn want(&mut self, tok: Token) {
        if !self.got(tok) {
            self.syntax_error(&format!("expected {}", tokstring(tok)));
            self.advance(&[]);
        }
    }

    // got_assign is like got(Assign) but also accepts ":=" (and reports an
    // error) for better error messages.
    fn got_assign(&mut self) -> bool {
        match self.tok() {
            Token::Define => {
                self.syntax_error("expected =");
                self.next();
                true
            }
            Token::Assign => {
                self.next();
                true
            }
            _ => false,
        }
    }

    // advance consumes tokens until it finds one in the follow list.
    // The set is always extended by EOF and, inside a function body, by the
    // statement-start tokens; an empty list is a no-op.
    fn advance(&mut self, followlist: &[Token]) {
        if followlist.is_empty() {
            return;
        }
        let mut followset: u64 = 1 << Token::EOF as u64;
        if self.fnest > 0 {
            followset |= STOPSET;
        }
        for &tok in followlist {
            followset |= 1 << tok as u64;
        }
        while !contains(followset, self.tok()) {
            self.next();
        }
    }

    // -------------------------------------------------------------------------
    // Declarations

    // SourceFile = "space" Name ";" { TopLevelDecl ";" } .
    fn file_or_none(&mut self) -> Option<File> {
        let pos = self.pos();

        if !self.got(Token::Space) {
            self.syntax_error("space statement must be first");
            return None;
        }
        let space_name = self.name();
        self.want(Token::Semi);

        // { TopLevelDecl ";" }
        let mut decls = Vec::new();
        while self.tok() != Token::EOF {
            match self.tok() {
                Token::Import => {
                    self.next();
                    self.append_group(&mut decls, Parser::import_decl);
                }
                Token::Var => {
                    self.next();
                    self.append_group(&mut decls, Parser::var_decl);
                }
                Token::Type => {
                    self.next();
                    self.append_group(&mut decls, Parser::type_decl);
                }
                Token::Func => {
                    self.next();
                    decls.push(self.func_decl());
                }
                Token::Oper => {
                    self.next();
                    decls.push(self.oper_decl());
                }
                _ => {
                    if self.tok() == Token::Lbrace
                        && matches!(decls.last(), Some(Decl::Func(f)) if f.body.is_none())
                    {
                        // opening { of function declaration on next line
                        self.syntax_error("unexpected semicolon or newline before {");
                    } else {
                        self.syntax_error("non-declaration statement outside function body");
                    }
                    self.advance(&[
                        Token::Import,
                        Token::Type,
                        Token::Var,
                        Token::Func,
                        Token::Oper,
                    ]);
                    continue;
                }
            }

            if self.tok() != Token::EOF && !self.got(Token::Semi) {
                self.syntax_error("after top level declaration");
                self.advance(&[
                    Token::Import,
                    Token::Type,
                    Token::Var,
                    Token::Func,
                    Token::Oper,
                ]);
            }
        }

        let eof = self.pos();
        Some(File {
            pos,
            space_name,
            decls,
            eof,
        })
    }

    // append_group appends one declaration, or a parenthesized group of
    // declarations sharing a fresh group tag, to decls.
    fn append_group(
        &mut self,
        decls: &mut Vec<Decl>,
        f: fn(&mut Self, Option<Rc<Group>>) -> Decl,
    ) {
        if self.tok() == Token::Lparen {
            let g = Group::new();
            self.next();
            self.list("grouped declaration", Token::Semi, Token::Rparen, |p| {
                decls.push(f(p, Some(Rc::clone(&g))));
                false
            });
        } else {
            decls.push(f(self, None));
        }
    }

    // list parses a possibly empty, sep-separated list, calling f for each
    // element and stopping at close (or EOF). sep is optional before close.
    fn list(
        &mut self,
        context: &str,
        sep: Token,
        close: Token,
        mut f: impl FnMut(&mut Self) -> bool,
    ) -> Pos {
        let mut done = false;
        while self.tok() != Token::EOF && self.tok() != close && !done {
            done = f(self);
            // sep is optional before close
            if !self.got(sep) && self.tok() != close {
                self.syntax_error(&format!(
                    "in {}; possibly missing {} or {}",
                    context,
                    tokstring(sep),
                    tokstring(close)
                ));
                self.advance(&[Token::Rparen, Token::Rbrack, Token::Rbrace]);
                if self.tok() != close {
                    // position could be better but we don't want f called again
                    return self.pos();
                }
            }
        }
        let pos = self.pos();
        self.want(close);
        pos
    }

    // ImportSpec = StringLit .
    fn import_decl(&mut self, group: Option<Rc<Group>>) -> Decl {
        let pos = self.pos();
        let path = self.oliteral();
        let mut d = ImportDecl { pos, group, path };
        match &mut d.path {
            None => {
                self.syntax_error("missing import path");
                self.advance(&[Token::Semi, Token::Rparen]);
            }
            Some(path) => {
                if !path.bad && path.kind != LitKind::String {
                    self.syntax_error_at(path.pos.clone(), "import path must be a string");
                    path.bad = true;
                }
            }
        }
        Decl::Import(d)
    }

    // TypeSpec = Name [ "=" ] Type .
    fn type_decl(&mut self, group: Option<Rc<Group>>) -> Decl {
        let pos = self.pos();
        let name = self.name();
        let alias = self.got_assign();
        let ty = match self.type_or_none() {
            Some(ty) => ty,
            None => {
                let bad = self.bad_expr("in type declaration");
                self.syntax_error("in type declaration");
                self.advance(&[Token::Semi, Token::Rparen]);
                bad
            }
        };
        Decl::Type(TypeDecl {
            pos,
            group,
            name,
            alias,
            ty,
        })
    }

    // VarSpec = Name ( Type [ "=" Expr ] | "=" Expr ) .
    fn var_decl(&mut self, group: Option<Rc<Group>>) -> Decl {
        let pos = self.pos();
        let name = self.name();
        let mut ty = None;
        let mut value = None;
        if self.got_assign() {
            value = Some(self.expr());
        } else {
            ty = Some(self.type_());
            if self.got_assign() {
                value = Some(self.expr());
            }
        }
        Decl::Var(VarDecl {
            pos,
            group,
            name,
            ty,
            value,
        })
    }

    // FuncDecl = Name "(" [ ParamList ] ")" [ Type ] [ Block ] .
    fn func_decl(&mut self) -> Decl {
        let pos = self.pos();
        let name = self.name();
        let params = self.param_list();
        let ret = self.type_or_none();
        let body = if self.tok() == Token::Lbrace {
            Some(self.func_body())
        } else {
            None
        };
        Decl::Func(FuncDecl {
            pos,
            group: None,
            name,
            params,
            ret,
            body,
        })
    }

    // OperDecl = "(" Name Name ")" OpName "(" Name Name ")" Type Block .
    fn oper_decl(&mut self) -> Decl {
        let pos = self.pos();
        let left = self.oper_param();

        let op = if self.tok() == Token::Name {
            match Operator::from_overload_name(self.scanner.literal()) {
                Some(op) => {
                    self.next();
                    op
                }
                None => {
                    let lit = self.scanner.literal().to_string();
                    self.syntax_error(&format!("{lit} is not an overloadable operator"));
                    self.next();
                    Operator::Add
                }
            }
        } else {
            self.syntax_error("expected operator name");
            Operator::Add
        };

        let right = self.oper_param();
        let ret = self.type_();
        let body = if self.tok() == Token::Lbrace {
            self.func_body()
        } else {
            self.syntax_error("expected operator body");
            let pos = self.pos();
            BlockStmt {
                pos: pos.clone(),
                stmts: Vec::new(),
                rbrace: pos,
            }
        };

        Decl::Oper(OperDecl {
            pos,
            group: None,
            left,
            op,
            right,
            ret,
            body,
        })
    }

    // "(" Name Name ")"
    fn oper_param(&mut self) -> Field {
        self.want(Token::Lparen);
        let pos = self.pos();
        let name = self.name();
        let ty = Expr::Name(self.name());
        self.want(Token::Rparen);
        Field {
            pos,
            name: Some(name),
            ty,
        }
    }

    // ParamList = Param { "," Param } .
    fn param_list(&mut self) -> Vec<Field> {
        let mut params = Vec::new();
        self.want(Token::Lparen);
        self.list("parameter list", Token::Comma, Token::Rparen, |p| {
            params.push(p.param_decl());
            false
        });
        params
    }

    // Param = Name Type .
    fn param_decl(&mut self) -> Field {
        let pos = self.pos();
        let name = self.name();
        let ty = self.type_();
        Field {
            pos,
            name: Some(name),
            ty,
        }
    }

    // -------------------------------------------------------------------------
    // Statements

    fn func_body(&mut self) -> BlockStmt {
        self.fnest += 1;
        let body = self.block_stmt("");
        self.fnest -= 1;
        body
    }

    fn block_stmt(&mut self, context: &str) -> BlockStmt {
        let pos = self.pos();

        // braces are mandatory
        if !self.got(Token::Lbrace) {
            self.syntax_error(&format!("expected {{ after {context}"));
            self.advance(&[Token::Name, Token::Rbrace]);
            let rbrace = self.pos();
            if self.got(Token::Rbrace) {
                return BlockStmt {
                    pos,
                    stmts: Vec::new(),
                    rbrace,
                };
            }
        }

        let stmts = self.stmt_list();
        let rbrace = self.pos();
        self.want(Token::Rbrace);
        BlockStmt { pos, stmts, rbrace }
    }

    fn stmt_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while self.tok() != Token::EOF && self.tok() != Token::Rbrace {
            let Some(s) = self.stmt_or_none() else {
                break;
            };
            stmts.push(s);
            // ";" is optional before "}"
            if !self.got(Token::Semi) && self.tok() != Token::Rbrace {
                self.syntax_error("at end of statement");
                self.advance(&[Token::Semi, Token::Rbrace]);
                self.got(Token::Semi); // avoid spurious empty statement
            }
        }
        stmts
    }

    fn stmt_or_none(&mut self) -> Option<Stmt> {
        let pos = self.pos();

        match self.tok() {
            Token::Name => {
                let lhs = self.expr();
                Some(self.simple_stmt(Some(lhs)))
            }

            Token::Var => Some(self.decl_stmt(Parser::var_decl)),

            Token::Type => Some(self.decl_stmt(Parser::type_decl)),

            Token::Lbrace => Some(Stmt::Block(self.block_stmt(""))),

            // operands and unary operators start an expression statement
            Token::Literal | Token::Lparen | Token::Lbrack | Token::Op | Token::Star => {
                Some(self.simple_stmt(None))
            }

            Token::For => Some(self.for_stmt()),

            Token::While => Some(self.while_stmt()),

            Token::If => Some(self.if_stmt()),

            Token::Break => {
                self.next();
                Some(Stmt::Break(BreakStmt { pos }))
            }

            Token::Continue => {
                self.next();
                Some(Stmt::Continue(ContinueStmt { pos }))
            }

            Token::Return => {
                self.next();
                let mut result = None;
                if self.tok() != Token::Semi && self.tok() != Token::Rbrace {
                    result = Some(self.expr());
                }
                Some(Stmt::Return(ReturnStmt { pos, result }))
            }

            // do not consume the ';' here: the statement list treats it as
            // the separator terminating the (zero-width) empty statement
            Token::Semi => Some(Stmt::Empty(EmptyStmt { pos })),

            _ => None,
        }
    }

    fn decl_stmt(&mut self, f: fn(&mut Self, Option<Rc<Group>>) -> Decl) -> Stmt {
        let pos = self.pos();
        self.next(); // Type or Var
        let mut decls = Vec::new();
        self.append_group(&mut decls, f);
        Stmt::Decl(DeclStmt { pos, decls })
    }

    // SimpleStmt = Expr [ (AssignOp | "=") Expr | ":=" Expr | IncOp ] .
    fn simple_stmt(&mut self, lhs: Option<Expr>) -> Stmt {
        let lhs = match lhs {
            Some(x) => x,
            None => self.expr(),
        };
        let pos = lhs.pos();

        match self.tok() {
            Token::AssignOp => {
                // lhs op= rhs
                let op = self.scanner.op();
                self.next();
                let rhs = self.expr();
                Stmt::Assign(AssignStmt {
                    pos,
                    lhs,
                    op: Some(op),
                    rhs,
                })
            }

            Token::IncOp => {
                // lhs++ or lhs--
                let op = self.scanner.op();
                self.next();
                Stmt::IncDec(IncDecStmt { pos, x: lhs, op })
            }

            Token::Assign => {
                self.next();
                let rhs = self.expr();
                Stmt::Assign(AssignStmt {
                    pos,
                    lhs,
                    op: None,
                    rhs,
                })
            }

            Token::Define => {
                self.next();
                let rhs = self.expr();
                Stmt::Define(DefineStmt { pos, lhs, rhs })
            }

            _ => Stmt::Expr(ExprStmt { pos, x: lhs }),
        }
    }

    fn if_stmt(&mut self) -> Stmt {
        let pos = self.pos();
        let (init, cond, _) = self.header(Token::If);
        if let Some(init) = init {
            self.syntax_error_at(init.pos(), "initializer not allowed in if statement");
        }
        let cond = cond.unwrap_or_else(|| self.bad_expr("missing condition"));
        let block = self.block_stmt("if clause");

        let mut els = None;
        if self.got(Token::Else) {
            match self.tok() {
                Token::If => els = Some(Box::new(self.if_stmt())),
                Token::Lbrace => els = Some(Box::new(Stmt::Block(self.block_stmt("")))),
                _ => {
                    self.syntax_error("else must be followed by if or statement block");
                    self.advance(&[Token::Name, Token::Rbrace]);
                }
            }
        }

        Stmt::If(IfStmt {
            pos,
            cond,
            block,
            els,
        })
    }

    fn while_stmt(&mut self) -> Stmt {
        let pos = self.pos();
        let (init, cond, _) = self.header(Token::While);
        if let Some(init) = init {
            self.syntax_error_at(init.pos(), "initializer not allowed in while statement");
        }
        let cond = cond.unwrap_or_else(|| self.bad_expr("missing condition"));
        let body = self.block_stmt("while clause");
        Stmt::While(WhileStmt { pos, cond, body })
    }

    fn for_stmt(&mut self) -> Stmt {
        let pos = self.pos();
        let (init, cond, post) = self.header(Token::For);
        let body = self.block_stmt("for clause");
        Stmt::For(ForStmt {
            pos,
            init: init.map(Box::new),
            cond,
            post: post.map(Box::new),
            body,
        })
    }

    // header parses a for/if/while header, tracking the Init -> Cond -> Post
    // transitions on observed semicolons. Only "for" uses all three parts.
    fn header(&mut self, keyword: Token) -> (Option<Stmt>, Option<Expr>, Option<Stmt>) {
        self.want(keyword);

        let mut init = None;
        let mut cond = None;
        let mut post = None;

        if self.tok() == Token::Lbrace {
            // empty header: no condition
            if keyword == Token::If || keyword == Token::While {
                self.syntax_error(&format!("missing condition in {keyword} statement"));
                cond = Some(self.bad_expr("missing condition"));
            }
            return (init, cond, post);
        }

        let mut cond_stmt = None;
        if self.tok() != Token::Semi {
            // accept potential var decl but complain
            if self.got(Token::Var) {
                self.syntax_error(&format!(
                    "var declaration not allowed in {keyword} initializer"
                ));
            }
            cond_stmt = Some(self.simple_stmt(None));
        }

        let mut semi_pos = None;
        let mut semi_lit = String::new();
        if self.tok() == Token::Semi {
            semi_pos = Some(self.pos());
            semi_lit = self.scanner.literal().to_string();
            self.next();
            if keyword == Token::For {
                init = cond_stmt.take();
                if self.tok() != Token::Semi {
                    if self.tok() == Token::Lbrace {
                        self.syntax_error("expected for loop condition");
                        return (init, cond, post);
                    }
                    cond_stmt = Some(self.simple_stmt(None));
                }
                self.want(Token::Semi);
                if self.tok() != Token::Lbrace {
                    let s = self.simple_stmt(None);
                    if let Stmt::Define(d) = &s {
                        self.syntax_error_at(
                            d.pos.clone(),
                            "cannot declare in post statement of for loop",
                        );
                    }
                    post = Some(s);
                }
            } else {
                init = cond_stmt.take();
                if self.tok() != Token::Lbrace {
                    cond_stmt = Some(self.simple_stmt(None));
                }
            }
        }

        // unpack cond_stmt
        match cond_stmt {
            None => {
                if let Some(semi_pos) = semi_pos {
                    if keyword == Token::If || keyword == Token::While {
                        if semi_lit != "semicolon" {
                            self.syntax_error_at(
                                semi_pos.clone(),
                                &format!("unexpected {semi_lit}, expected {{ after {keyword} clause"),
                            );
                        } else {
                            self.syntax_error_at(
                                semi_pos.clone(),
                                &format!("missing condition in {keyword} statement"),
                            );
                        }
                        cond = Some(Expr::Bad(BadExpr {
                            pos: semi_pos,
                            reason: "missing condition".to_string(),
                        }));
                    }
                }
            }
            Some(Stmt::Expr(s)) => cond = Some(s.x),
            Some(s) => {
                self.syntax_error_at(
                    s.pos(),
                    &format!("cannot use {} as value", printer::printed(&s)),
                );
            }
        }

        (init, cond, post)
    }

    // -------------------------------------------------------------------------
    // Expressions

    fn expr(&mut self) -> Expr {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, prec: u8) -> Expr {
        let mut x = self.unary_expr();
        while (self.tok() == Token::Op || self.tok() == Token::Star)
            && self.scanner.prec() > prec
        {
            let pos = self.pos();
            let op = self.scanner.op();
            let tprec = self.scanner.prec();
            self.next();
            let y = self.binary_expr(tprec);
            // later passes only see ">" comparisons: "x < y" becomes "y > x"
            x = if op == Operator::Lss {
                Expr::Operation(Operation {
                    pos,
                    op: Operator::Gtr,
                    x: Box::new(y),
                    y: Some(Box::new(x)),
                })
            } else {
                Expr::Operation(Operation {
                    pos,
                    op,
                    x: Box::new(x),
                    y: Some(Box::new(y)),
                })
            };
        }
        x
    }

    fn unary_expr(&mut self) -> Expr {
        match self.tok() {
            Token::Op => {
                let op = self.scanner.op();
                if matches!(op, Operator::Add | Operator::Sub | Operator::Not) {
                    let pos = self.pos();
                    self.next();
                    let x = self.unary_expr();
                    return Expr::Operation(Operation {
                        pos,
                        op,
                        x: Box::new(x),
                        y: None,
                    });
                }
            }
            Token::Star => {
                let pos = self.pos();
                self.next();
                let x = self.unary_expr();
                return Expr::Operation(Operation {
                    pos,
                    op: Operator::Mul,
                    x: Box::new(x),
                    y: None,
                });
            }
            _ => {}
        }
        self.pexpr()
    }

    // Primary = Operand { Selector | Index | Call } .
    fn pexpr(&mut self) -> Expr {
        let mut x = self.operand();

        loop {
            let pos = x.pos();
            match self.tok() {
                Token::Dot => {
                    self.next();
                    let sel = self.name();
                    x = Expr::Selector(SelectorExpr {
                        pos,
                        x: Box::new(x),
                        sel,
                    });
                }

                Token::Lbrack => {
                    self.next();
                    let index = self.expr();
                    self.want(Token::Rbrack);
                    x = Expr::Index(IndexExpr {
                        pos,
                        x: Box::new(x),
                        index: Box::new(index),
                    });
                }

                Token::Lparen => {
                    self.next();
                    let mut args = Vec::new();
                    self.list("argument list", Token::Comma, Token::Rparen, |p| {
                        args.push(p.expr());
                        false
                    });
                    x = Expr::Call(CallExpr {
                        pos,
                        func: Box::new(x),
                        args,
                    });
                }

                _ => break,
            }
        }

        x
    }

    // Operand = Name | Literal | SliceLit | "(" Expr ")" .
    fn operand(&mut self) -> Expr {
        match self.tok() {
            Token::Name => Expr::Name(self.name()),

            Token::Literal => match self.oliteral() {
                Some(lit) => Expr::Lit(lit),
                None => unreachable!("literal token without literal"),
            },

            Token::Lparen => {
                let pos = self.pos();
                self.next();
                let x = self.expr();
                self.want(Token::Rparen);
                Expr::Paren(ParenExpr {
                    pos,
                    x: Box::new(x),
                })
            }

            Token::Lbrack => {
                // "[" "]" Type, optionally followed by a composite literal body
                let (pos, elem) = self.slice_type();
                if self.got(Token::Lbrace) {
                    let mut elems = Vec::new();
                    self.list("composite literal", Token::Comma, Token::Rbrace, |p| {
                        elems.push(p.expr());
                        false
                    });
                    Expr::SliceLit(SliceLit {
                        pos,
                        elem_type: elem,
                        elems,
                    })
                } else {
                    Expr::SliceType(SliceTypeExpr { pos, elem })
                }
            }

            _ => {
                let x = self.bad_expr("expected expression");
                self.syntax_error("expected expression");
                self.advance(&[Token::Rparen, Token::Rbrack, Token::Rbrace]);
                x
            }
        }
    }

    // -------------------------------------------------------------------------
    // Types

    fn type_(&mut self) -> Expr {
        match self.type_or_none() {
            Some(ty) => ty,
            None => {
                let ty = self.bad_expr("expected type");
                self.syntax_error("expected type");
                self.advance(&[]);
                ty
            }
        }
    }

    // Type = Name | SliceType .
    fn type_or_none(&mut self) -> Option<Expr> {
        match self.tok() {
            Token::Name => Some(Expr::Name(self.name())),
            Token::Lbrack => {
                let (pos, elem) = self.slice_type();
                Some(Expr::SliceType(SliceTypeExpr { pos, elem }))
            }
            _ => None,
        }
    }

    // SliceType = "[" "]" Type .
    fn slice_type(&mut self) -> (Pos, Box<Expr>) {
        let pos = self.pos();
        self.want(Token::Lbrack);
        self.want(Token::Rbrack);
        let elem = self.type_();
        (pos, Box::new(elem))
    }

    // -------------------------------------------------------------------------
    // Common productions

    fn name(&mut self) -> Name {
        if self.tok() == Token::Name {
            let n = Name::new(self.pos(), self.scanner.literal());
            self.next();
            return n;
        }

        let n = Name::new(self.pos(), "_");
        self.syntax_error("expected name");
        self.advance(&[]);
        n
    }

    fn oliteral(&mut self) -> Option<BasicLit> {
        if self.tok() == Token::Literal {
            let b = BasicLit {
                pos: self.pos(),
                value: self.scanner.literal().to_string(),
                kind: self.scanner.kind(),
                bad: self.scanner.bad(),
            };
            self.next();
            return Some(b);
        }
        None
    }

    fn bad_expr(&mut self, reason: &str) -> Expr {
        Expr::Bad(BadExpr {
            pos: self.pos(),
            reason: reason.to_string(),
        })
    }
}
