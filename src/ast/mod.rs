//! Abstract syntax tree for Monkey programs.
//!
//! Every node renders back to canonical source text via `Display`; the
//! compiler relies on that rendering to order hash-literal pairs
//! deterministically.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{Block, Program, Stmt, StmtKind};
