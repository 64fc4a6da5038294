//! Expression AST nodes.

use std::fmt;

use crate::ast::stmt::Block;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Variable reference: foo
    Identifier(String),
    /// Integer literal: 42
    IntLiteral(i64),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// String literal: "hello"
    StringLiteral(String),
    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),
    /// Hash literal: {k: v, ...}; pairs are kept in source order
    Hash(Vec<(Expr, Expr)>),

    /// Prefix operation: !a, -a
    Prefix { operator: UnaryOp, right: Box<Expr> },

    /// Infix operation: a + b
    Infix {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional: if (cond) { ... } else { ... }
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },

    /// Function literal: fn(a, b) { ... }
    Function {
        parameters: Vec<String>,
        body: Block,
    },

    /// Call: f(a, b)
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Index access: a[i]
    Index { object: Box<Expr>, index: Box<Expr> },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Negate => write!(f, "-"),
        }
    }
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Greater,
    Equal,
    NotEqual,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::IntLiteral(n) => write!(f, "{}", n),
            ExprKind::BoolLiteral(b) => write!(f, "{}", b),
            ExprKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            ExprKind::Array(elements) => {
                write!(f, "[{}]", join(elements))
            }
            ExprKind::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            ExprKind::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            ExprKind::Infix {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            ExprKind::Function { parameters, body } => {
                write!(f, "fn({}) {}", parameters.join(", "), body)
            }
            ExprKind::Call {
                function,
                arguments,
            } => write!(f, "{}({})", function, join(arguments)),
            ExprKind::Index { object, index } => write!(f, "({}[{}])", object, index),
        }
    }
}

fn join(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(Expr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
