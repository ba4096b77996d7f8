use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    InstanceOf,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone)]
pub enum PropertyName {
    Static(String),
    Computed(Expr),
}

#[derive(Debug, Clone)]
pub enum ObjectMember {
    Value(PropertyName, Expr),
    Getter(PropertyName, Rc<FunctionDef>),
    Setter(PropertyName, Rc<FunctionDef>),
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub is_arrow: bool,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    StringLit(Rc<str>),
    Boolean(bool),
    Null,
    /// Array hole or `void`-free undefined literal.
    Undefined,
    Var(String),
    This,
    Array(Vec<Expr>),
    Object(Vec<ObjectMember>),
    Function(Rc<FunctionDef>),
    Unary(UnaryOp, Box<Expr>),
    /// `++x`, `x--`, ...
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    CompoundAssign(BinaryOp, Box<Expr>, Box<Expr>),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    Comma(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn is_assignment_target(&self) -> bool {
        matches!(self, Expr::Var(_) | Expr::Property(..) | Expr::Index(..))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Declaration(VarKind, Vec<(String, Option<Expr>)>),
    FunctionDeclaration(Rc<FunctionDef>),
    Expr(Expr),
    Return(Option<Expr>),
    If(Expr, Box<Statement>, Option<Box<Statement>>),
    While(Expr, Box<Statement>),
    DoWhile(Box<Statement>, Expr),
    For {
        init: Option<Box<Statement>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Statement>,
    },
    Break,
    Continue,
    Block(Vec<Statement>),
    Throw(Expr),
    Try {
        block: Vec<Statement>,
        param: Option<String>,
        handler: Option<Vec<Statement>>,
        finalizer: Option<Vec<Statement>>,
    },
    Empty,
}
