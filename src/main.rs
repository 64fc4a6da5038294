//! Monkey CLI: run script files, evaluate one-liners, or start the REPL.

use std::env;
use std::fs;
use std::process;

use monkey::bytecode::{disassemble, Vm};
use monkey::error::MonkeyError;
use monkey::repl::Repl;
use monkey::{compile_source, run_source};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Start the REPL
    Repl,
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
    /// Print the compiled bytecode of a file instead of running it
    Disasm { file: String },
}

fn print_usage() {
    eprintln!("Monkey {} - bytecode compiler & VM", VERSION);
    eprintln!();
    eprintln!("Usage: monkey [options] [script.monkey]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>        Evaluate code and print the result");
    eprintln!("  --disasm <file>  Print compiled bytecode instead of running");
    eprintln!("  --help, -h       Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  monkey                    Start the interactive REPL");
    eprintln!("  monkey script.monkey      Run a script file");
    eprintln!("  monkey -e \"1 + 2\"         Evaluate an expression");
}

fn parse_args() -> Command {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut command = Command::Repl;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "-e" => {
                i += 1;
                match args.get(i) {
                    Some(code) => command = Command::Eval { code: code.clone() },
                    None => {
                        eprintln!("-e requires an argument");
                        process::exit(64);
                    }
                }
            }
            "--disasm" => {
                i += 1;
                match args.get(i) {
                    Some(file) => command = Command::Disasm { file: file.clone() },
                    None => {
                        eprintln!("--disasm requires a file argument");
                        process::exit(64);
                    }
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("unknown option: {}", arg);
                print_usage();
                process::exit(64);
            }
            file => {
                command = Command::Run {
                    file: file.to_string(),
                };
            }
        }
        i += 1;
    }

    command
}

fn main() {
    match parse_args() {
        Command::Repl => Repl::new().run(),
        Command::Run { file } => run_file(&file),
        Command::Eval { code } => run_eval(&code),
        Command::Disasm { file } => run_disasm(&file),
    }
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("error: cannot read '{}': {}", path, err);
        process::exit(66);
    })
}

fn exit_code(err: &MonkeyError) -> i32 {
    match err {
        MonkeyError::Runtime(_) => 70,
        _ => 65,
    }
}

fn run_file(path: &str) {
    let source = read_file(path);
    let bytecode = match compile_source(&source) {
        Ok(bytecode) => bytecode,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(exit_code(&err));
        }
    };

    let mut machine = Vm::new(bytecode);
    if let Err(err) = machine.run() {
        let err = MonkeyError::from(err);
        eprintln!("{}", err);
        process::exit(exit_code(&err));
    }
}

fn run_eval(code: &str) {
    match run_source(code) {
        Ok(value) => println!("{}", value.inspect()),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(exit_code(&err));
        }
    }
}

fn run_disasm(path: &str) {
    let source = read_file(path);
    match compile_source(&source) {
        Ok(bytecode) => print!("{}", disassemble(&bytecode)),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(exit_code(&err));
        }
    }
}
