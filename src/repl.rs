//! Interactive read-compile-run loop.
//!
//! Compiler state (symbol table, constant pool) and the VM globals array
//! persist across lines, so `let` bindings survive from prompt to prompt.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::{Compiler, SymbolTable, Vm, GLOBALS_SIZE};
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::value::builtins::BUILTINS;
use crate::value::Value;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".monkey_history";

pub struct Repl {
    symbols: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
}

impl Repl {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Self {
            symbols,
            constants: Vec::new(),
            globals: vec![Value::Null; GLOBALS_SIZE],
        }
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }

    pub fn run(&mut self) {
        let mut rl = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(_) => {
                // No terminal editor available (e.g. piped stdin).
                self.run_basic();
                return;
            }
        };

        let history_path = Self::history_path();
        let _ = rl.load_history(&history_path);

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    self.execute_line(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("error: {}", err);
                    break;
                }
            }
        }

        let _ = rl.save_history(&history_path);
    }

    fn run_basic(&mut self) {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("{}", PROMPT);
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        self.execute_line(line);
                    }
                }
            }
        }
    }

    fn execute_line(&mut self, line: &str) {
        let tokens = match Scanner::new(line).scan_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                println!("Parser Error: {}", err);
                return;
            }
        };

        let program = match Parser::new(tokens).parse() {
            Ok(program) => program,
            Err(errors) => {
                for err in errors {
                    println!("Parser Error: {}", err);
                }
                return;
            }
        };

        let symbols = std::mem::take(&mut self.symbols);
        let constants = std::mem::take(&mut self.constants);
        let mut compiler = Compiler::with_state(symbols, constants);
        let result = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        // Keep the (possibly partially extended) state either way.
        (self.symbols, self.constants) = compiler.into_state();

        if let Err(err) = result {
            println!("Compilation failed: {}", err);
            return;
        }

        let globals = std::mem::take(&mut self.globals);
        let mut machine = Vm::with_globals(bytecode, globals);
        match machine.run() {
            Ok(()) => println!("{}", machine.last_popped_stack_element().inspect()),
            Err(err) => println!("Executing bytecode failed: {}", err),
        }
        self.globals = machine.into_globals();
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
