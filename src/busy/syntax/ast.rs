pub use crate::core::refs::AssignOp;

/// One parsed BUSY file, statements in source order.
#[derive(Debug, Default)]
pub struct File {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    Submod(Submod),
    Class(ClassDecl),
    Let(LetDecl),
}

/// `submod X = ./dir`
#[derive(Debug)]
pub struct Submod {
    pub name: String,
    pub path: String,
    pub row: u32,
    pub col: u32,
}

/// `class Name : Base { defaults }`
#[derive(Debug)]
pub struct ClassDecl {
    pub name: String,
    pub base: Vec<String>,
    pub body: Vec<RawEntry>,
    pub row: u32,
    pub col: u32,
}

/// `let name [!] : Type { entries }`
#[derive(Debug)]
pub struct LetDecl {
    pub name: String,
    pub exported: bool,
    pub ty: Vec<String>,
    pub body: Vec<RawEntry>,
    pub row: u32,
    pub col: u32,
}

/// `[public] .field (=|+=) value...`
#[derive(Debug)]
pub struct RawEntry {
    pub public: bool,
    pub field: String,
    pub op: AssignOp,
    pub values: Vec<RawValue>,
    pub row: u32,
    pub col: u32,
}

/// An unresolved literal; identifiers become references and paths
/// become absolute only during evaluation.
#[derive(Clone, PartialEq, Debug)]
pub enum RawValue {
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Symbol(String),
    Path(String),
    Ident(Vec<String>),
}
