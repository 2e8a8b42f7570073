use std::{fmt, rc::Rc};

use crate::diagnostics::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Negate,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Sqrt,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Concat,
    In,
    Range,
    RangeInclusive,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOp::Not => "!",
            PrefixOp::Negate => "-",
            PrefixOp::Sqrt => "$",
        })
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Pow => "^",
            InfixOp::Sqrt => "$",
            InfixOp::Less => "<",
            InfixOp::Greater => ">",
            InfixOp::LessEqual => "<=",
            InfixOp::GreaterEqual => ">=",
            InfixOp::Equal => "==",
            InfixOp::NotEqual => "!=",
            InfixOp::And => "and",
            InfixOp::Or => "or",
            InfixOp::Concat => "++",
            InfixOp::In => "in",
            InfixOp::Range => "..",
            InfixOp::RangeInclusive => "..=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var {
        name: String,
        value: Expr,
        constant: bool,
    },
    Return(Option<Expr>),
    Expr(Expr),
    Block(Block),
    For {
        item: String,
        index: Option<String>,
        iterable: Expr,
        body: Block,
    },
    While {
        condition: Expr,
        body: Block,
    },
    Break,
    Continue,
    Class {
        name: String,
        superclass: Option<String>,
        body: Block,
    },
    ModuleLoad {
        name: String,
        members: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Null,
    Identifier(String),
    SelfRef,
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Pipe {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Function(Rc<FunctionLiteral>),
    Call {
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Property {
        object: Box<Expr>,
        name: String,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    Switch {
        subject: Box<Expr>,
        cases: Vec<SwitchCase>,
    },
    Error(Box<Expr>),
    Catch {
        body: Block,
        handler: Option<CatchHandler>,
    },
}

/// Parameters and body of a `fn` literal, shared with every closure built
/// from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub pattern: CasePattern,
    pub guard: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CasePattern {
    /// Compared against the subject by deep equality.
    Value(Expr),
    /// Binds the subject under this name for the guard and body.
    Binding(String),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchHandler {
    pub name: String,
    pub body: Block,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::Index { .. } | ExprKind::Property { .. }
        )
    }
}
