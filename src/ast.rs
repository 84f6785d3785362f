//! Syntax tree.
//!
//! There are three main classes of nodes: declarations, statements, and
//! expressions (type syntax is expression syntax). The node names usually
//! match the corresponding grammar production names. Every node records the
//! position of the first character of the source text it covers.
//!
//! Trees are fully owned: once a [`File`] is returned by the parser it is
//! independent of scanner and reader state, and no node is shared between
//! siblings.

use std::rc::Rc;

use crate::pos::Pos;
use crate::token::{LitKind, Operator};

/// A parsed source file.
///
/// `SourceFile = "space" Name ";" { TopLevelDecl ";" } EOF .`
#[derive(Debug)]
pub struct File {
    pub pos: Pos,
    pub space_name: Name,
    pub decls: Vec<Decl>,
    pub eof: Pos,
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug)]
pub enum Decl {
    Import(ImportDecl),
    Type(TypeDecl),
    Var(VarDecl),
    Func(FuncDecl),
    Oper(OperDecl),
}

impl Decl {
    pub fn pos(&self) -> Pos {
        match self {
            Decl::Import(d) => d.pos.clone(),
            Decl::Type(d) => d.pos.clone(),
            Decl::Var(d) => d.pos.clone(),
            Decl::Func(d) => d.pos.clone(),
            Decl::Oper(d) => d.pos.clone(),
        }
    }

    /// The group tag, for declarations that may appear in a parenthesized
    /// group.
    pub fn group(&self) -> Option<&Rc<Group>> {
        match self {
            Decl::Import(d) => d.group.as_ref(),
            Decl::Type(d) => d.group.as_ref(),
            Decl::Var(d) => d.group.as_ref(),
            Decl::Func(d) => d.group.as_ref(),
            Decl::Oper(d) => d.group.as_ref(),
        }
    }
}

/// `import "path"`
#[derive(Debug)]
pub struct ImportDecl {
    pub pos: Pos,
    pub group: Option<Rc<Group>>,
    pub path: Option<BasicLit>, // None means no path
}

/// `type Name [=] Type`
#[derive(Debug)]
pub struct TypeDecl {
    pub pos: Pos,
    pub group: Option<Rc<Group>>,
    pub name: Name,
    pub alias: bool,
    pub ty: Expr,
}

/// `var Name [Type] [= Expr]`
#[derive(Debug)]
pub struct VarDecl {
    pub pos: Pos,
    pub group: Option<Rc<Group>>,
    pub name: Name,
    pub ty: Option<Expr>,      // None means no type
    pub value: Option<Expr>,   // None means no initializer
}

/// `func Name(params) [Type] [Block]`
#[derive(Debug)]
pub struct FuncDecl {
    pub pos: Pos,
    pub group: Option<Rc<Group>>,
    pub name: Name,
    pub params: Vec<Field>,
    pub ret: Option<Expr>,       // None means no return type
    pub body: Option<BlockStmt>, // None means no body (forward declaration)
}

/// `oper (x T) add (y U) R Block`
#[derive(Debug)]
pub struct OperDecl {
    pub pos: Pos,
    pub group: Option<Rc<Group>>,
    pub left: Field,
    pub op: Operator,
    pub right: Field,
    pub ret: Expr,
    pub body: BlockStmt,
}

/// Identity tag shared by the declarations of one parenthesized group.
/// Two declarations belong to the same group iff their tags are the same
/// allocation (`Rc::ptr_eq`).
#[derive(Debug)]
pub struct Group(());

impl Group {
    pub fn new() -> Rc<Group> {
        Rc::new(Group(()))
    }

    pub fn same(a: Option<&Rc<Group>>, b: Option<&Rc<Group>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug)]
pub enum Stmt {
    Expr(ExprStmt),
    Empty(EmptyStmt),
    IncDec(IncDecStmt),
    Continue(ContinueStmt),
    Break(BreakStmt),
    Return(ReturnStmt),
    Decl(DeclStmt),
    Define(DefineStmt),
    Assign(AssignStmt),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    Block(BlockStmt),
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Expr(s) => s.pos.clone(),
            Stmt::Empty(s) => s.pos.clone(),
            Stmt::IncDec(s) => s.pos.clone(),
            Stmt::Continue(s) => s.pos.clone(),
            Stmt::Break(s) => s.pos.clone(),
            Stmt::Return(s) => s.pos.clone(),
            Stmt::Decl(s) => s.pos.clone(),
            Stmt::Define(s) => s.pos.clone(),
            Stmt::Assign(s) => s.pos.clone(),
            Stmt::If(s) => s.pos.clone(),
            Stmt::For(s) => s.pos.clone(),
            Stmt::While(s) => s.pos.clone(),
            Stmt::Block(s) => s.pos.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ExprStmt {
    pub pos: Pos,
    pub x: Expr,
}

#[derive(Debug)]
pub struct EmptyStmt {
    pub pos: Pos,
}

/// `x++` or `x--`; op is [`Operator::Add`] or [`Operator::Sub`].
#[derive(Debug)]
pub struct IncDecStmt {
    pub pos: Pos,
    pub x: Expr,
    pub op: Operator,
}

#[derive(Debug)]
pub struct ContinueStmt {
    pub pos: Pos,
}

#[derive(Debug)]
pub struct BreakStmt {
    pub pos: Pos,
}

#[derive(Debug)]
pub struct ReturnStmt {
    pub pos: Pos,
    pub result: Option<Expr>, // None means no explicit result
}

#[derive(Debug)]
pub struct DeclStmt {
    pub pos: Pos,
    pub decls: Vec<Decl>,
}

/// `lhs := rhs`
#[derive(Debug)]
pub struct DefineStmt {
    pub pos: Pos,
    pub lhs: Expr,
    pub rhs: Expr,
}

/// `lhs = rhs` or `lhs op= rhs`; `op == None` means plain assignment.
#[derive(Debug)]
pub struct AssignStmt {
    pub pos: Pos,
    pub lhs: Expr,
    pub op: Option<Operator>,
    pub rhs: Expr,
}

#[derive(Debug)]
pub struct IfStmt {
    pub pos: Pos,
    pub cond: Expr,
    pub block: BlockStmt,
    pub els: Option<Box<Stmt>>, // a Block or another If, or None
}

#[derive(Debug)]
pub struct ForStmt {
    pub pos: Pos,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: BlockStmt,
}

#[derive(Debug)]
pub struct WhileStmt {
    pub pos: Pos,
    pub cond: Expr,
    pub body: BlockStmt,
}

#[derive(Debug)]
pub struct BlockStmt {
    pub pos: Pos,
    pub stmts: Vec<Stmt>,
    pub rbrace: Pos,
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Debug)]
pub enum Expr {
    /// Placeholder for an expression that failed to parse correctly and
    /// where we can't provide a better node.
    Bad(BadExpr),
    Name(Name),
    Lit(BasicLit),
    Paren(ParenExpr),
    Selector(SelectorExpr),
    Index(IndexExpr),
    Call(CallExpr),
    Operation(Operation),
    SliceType(SliceTypeExpr),
    SliceLit(SliceLit),
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Bad(x) => x.pos.clone(),
            Expr::Name(x) => x.pos.clone(),
            Expr::Lit(x) => x.pos.clone(),
            Expr::Paren(x) => x.pos.clone(),
            Expr::Selector(x) => x.pos.clone(),
            Expr::Index(x) => x.pos.clone(),
            Expr::Call(x) => x.pos.clone(),
            Expr::Operation(x) => x.pos.clone(),
            Expr::SliceType(x) => x.pos.clone(),
            Expr::SliceLit(x) => x.pos.clone(),
        }
    }
}

#[derive(Debug)]
pub struct BadExpr {
    pub pos: Pos,
    pub reason: String,
}

#[derive(Debug)]
pub struct Name {
    pub pos: Pos,
    pub value: String,
}

#[derive(Debug)]
pub struct BasicLit {
    pub pos: Pos,
    pub value: String,
    pub kind: LitKind,
    pub bad: bool, // true means the literal value has syntax errors
}

#[derive(Debug)]
pub struct ParenExpr {
    pub pos: Pos,
    pub x: Box<Expr>,
}

/// `X.Sel`
#[derive(Debug)]
pub struct SelectorExpr {
    pub pos: Pos,
    pub x: Box<Expr>,
    pub sel: Name,
}

/// `X[Index]`
#[derive(Debug)]
pub struct IndexExpr {
    pub pos: Pos,
    pub x: Box<Expr>,
    pub index: Box<Expr>,
}

/// `Func(Args[0], Args[1], ...)`
#[derive(Debug)]
pub struct CallExpr {
    pub pos: Pos,
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
}

/// Unary (`y == None`) or binary operation.
#[derive(Debug)]
pub struct Operation {
    pub pos: Pos,
    pub op: Operator,
    pub x: Box<Expr>,
    pub y: Option<Box<Expr>>,
}

/// `[]Elem`
#[derive(Debug)]
pub struct SliceTypeExpr {
    pub pos: Pos,
    pub elem: Box<Expr>,
}

/// `[]ElemType{Elems...}`
#[derive(Debug)]
pub struct SliceLit {
    pub pos: Pos,
    pub elem_type: Box<Expr>,
    pub elems: Vec<Expr>,
}

/// A named parameter; `name == None` means an anonymous parameter.
#[derive(Debug)]
pub struct Field {
    pub pos: Pos,
    pub name: Option<Name>,
    pub ty: Expr,
}

impl Name {
    pub fn new(pos: Pos, value: impl Into<String>) -> Name {
        Name {
            pos,
            value: value.into(),
        }
    }
}
