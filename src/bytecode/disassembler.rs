//! Bytecode listings for the `--disasm` CLI path.

use std::fmt::Write;

use crate::bytecode::compiler::Bytecode;
use crate::value::Value;

/// Render a full bytecode listing: the constant pool, the main instruction
/// stream, and the body of every function constant.
pub fn disassemble(bytecode: &Bytecode) -> String {
    let mut output = String::new();

    writeln!(&mut output, "== constants ==").unwrap();
    for (i, constant) in bytecode.constants.iter().enumerate() {
        writeln!(&mut output, "{:04} {}", i, constant_str(constant)).unwrap();
    }

    writeln!(&mut output, "== main ==").unwrap();
    write!(&mut output, "{}", bytecode.instructions).unwrap();

    for (i, constant) in bytecode.constants.iter().enumerate() {
        if let Value::Function(func) = constant {
            writeln!(
                &mut output,
                "== fn@{} (locals: {}, params: {}) ==",
                i, func.num_locals, func.num_parameters
            )
            .unwrap();
            write!(&mut output, "{}", func.instructions).unwrap();
        }
    }

    output
}

fn constant_str(constant: &Value) -> String {
    match constant {
        Value::String(s) => format!("{:?}", s),
        Value::Function(_) => "<compiled fn>".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn disassemble_source(source: &str) -> String {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let program = Parser::new(tokens).parse().expect("parser error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        disassemble(&compiler.bytecode())
    }

    #[test]
    fn test_disassemble_simple() {
        let output = disassemble_source("let x = 42;");
        assert!(output.contains("0000 42"));
        assert!(output.contains("Constant 0"));
        assert!(output.contains("SetGlobal 0"));
    }

    #[test]
    fn test_disassemble_function_bodies() {
        let output = disassemble_source("let add = fn(a, b) { a + b; };");
        assert!(output.contains("<compiled fn>"));
        assert!(output.contains("== fn@0 (locals: 2, params: 2) =="));
        assert!(output.contains("GetLocal 0"));
        assert!(output.contains("Add"));
        assert!(output.contains("ReturnValue"));
    }
}
