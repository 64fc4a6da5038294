//! Monkey: a small dynamically-typed language compiled to bytecode and
//! executed by a stack-based virtual machine.
//!
//! # Pipeline
//!
//! Source text -> tokens (`lexer`) -> AST (`parser`) -> instructions plus
//! constants (`bytecode::compiler`) -> execution (`bytecode::vm`). The
//! `repl` module wires the pieces together interactively and persists
//! bindings across lines.

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod span;
pub mod value;

use bytecode::{Bytecode, Compiler, Vm};
use error::MonkeyError;
use lexer::Scanner;
use parser::Parser;
use value::Value;

/// Compile source text to bytecode with a fresh compiler.
pub fn compile_source(source: &str) -> Result<Bytecode, MonkeyError> {
    let tokens = Scanner::new(source)
        .scan_tokens()
        .map_err(|err| MonkeyError::Parse(vec![err.into()]))?;
    let program = Parser::new(tokens).parse().map_err(MonkeyError::Parse)?;

    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Compile and run source text, returning the last popped stack element
/// (the value of the final expression statement).
pub fn run_source(source: &str) -> Result<Value, MonkeyError> {
    let bytecode = compile_source(source)?;
    let mut machine = Vm::new(bytecode);
    machine.run()?;
    Ok(machine.last_popped_stack_element().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_source() {
        assert_eq!(run_source("1 + 2").expect("run"), Value::Integer(3));
    }

    #[test]
    fn test_run_source_parse_error() {
        let err = run_source("let x 5;").unwrap_err();
        assert!(err.to_string().starts_with("Parser Error: "));
    }

    #[test]
    fn test_run_source_compile_error() {
        let err = run_source("nope").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compilation failed: undefined variable: nope"
        );
    }

    #[test]
    fn test_run_source_runtime_error() {
        let err = run_source("5 + true").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Executing bytecode failed: unsupported types for binary operation: INTEGER + BOOLEAN"
        );
    }
}
