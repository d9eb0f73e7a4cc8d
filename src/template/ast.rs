//! Compiled template program.

use crate::types::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Undefined,
    /// The data object the template is rendered against.
    Scope,
    /// A `for` or `let` binding, by its slot in the environment.
    Var(usize),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Interpolate(Expr),
    Escape(Expr),
    If {
        branches: Vec<Branch>,
        otherwise: Vec<Node>,
    },
    For {
        iterable: Expr,
        with_index: bool,
        body: Vec<Node>,
    },
    /// Pushes a new binding; its slot was fixed at compile time.
    Let(Expr),
}

impl Node {
    /// Total number of nodes in this subtree.
    pub fn count(&self) -> usize {
        let nested = |nodes: &[Node]| nodes.iter().map(Node::count).sum::<usize>();
        1 + match self {
            Node::If {
                branches,
                otherwise,
            } => branches.iter().map(|b| nested(&b.body)).sum::<usize>() + nested(otherwise),
            Node::For { body, .. } => nested(body),
            _ => 0,
        }
    }
}
