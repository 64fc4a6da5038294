//! Bytecode compiler: transforms AST into instructions plus constants.

use std::rc::Rc;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::bytecode::instruction::{make, Instructions, Op};
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::value::builtins::BUILTINS;
use crate::value::{CompiledFunction, Value};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// The compiler's output: an instruction stream and its constant pool.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// Operand written into jump instructions before their target is known.
const JUMP_PLACEHOLDER: usize = 9999;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

/// One function body being compiled. The last and previous emitted
/// instructions are tracked so trailing `Pop`s can be peeked and patched.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Create a compiler with a fresh symbol table seeded with the builtins.
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Self::with_state(symbols, Vec::new())
    }

    /// Create a compiler that continues from an existing symbol table and
    /// constant pool. The REPL uses this to persist state across lines.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Hand the symbol table and constants back, for the next `with_state`.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    /// Compile a program into the current scope.
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop, &[]);
            }

            StmtKind::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbols.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    _ => self.emit(Op::SetLocal, &[symbol.index]),
                };
            }

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => {
                let idx = self.add_constant(Value::Integer(*n));
                self.emit(Op::Constant, &[idx]);
            }

            ExprKind::StringLiteral(s) => {
                let idx = self.add_constant(Value::String(Rc::new(s.clone())));
                self.emit(Op::Constant, &[idx]);
            }

            ExprKind::BoolLiteral(b) => {
                if *b {
                    self.emit(Op::True, &[]);
                } else {
                    self.emit(Op::False, &[]);
                }
            }

            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }

            ExprKind::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    UnaryOp::Not => self.emit(Op::Bang, &[]),
                    UnaryOp::Negate => self.emit(Op::Minus, &[]),
                };
            }

            ExprKind::Infix {
                operator,
                left,
                right,
            } => {
                // `<` has no opcode of its own: swap the operands and
                // compare with GreaterThan.
                if *operator == BinaryOp::Less {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Op::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Subtract => Op::Sub,
                    BinaryOp::Multiply => Op::Mul,
                    BinaryOp::Divide => Op::Div,
                    BinaryOp::Greater => Op::GreaterThan,
                    BinaryOp::Equal => Op::Equal,
                    BinaryOp::NotEqual => Op::NotEqual,
                    BinaryOp::Less => unreachable!("handled above"),
                };
                self.emit(op, &[]);
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                let jump_not_truthy = self.emit(Op::JumpNotTruthy, &[JUMP_PLACEHOLDER]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }

                let jump = self.emit(Op::Jump, &[JUMP_PLACEHOLDER]);

                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_not_truthy, after_consequence);

                match alternative {
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                    Some(alt) => {
                        self.compile_block(alt)?;
                        if self.last_instruction_is(Op::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump, after_alternative);
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }

            ExprKind::Hash(pairs) => {
                // Sort by the key expression's rendered text so the emitted
                // bytecode is independent of pair order.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|pair| pair.0.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }

            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }

            ExprKind::Function { parameters, body } => {
                self.enter_scope();

                for parameter in parameters {
                    self.symbols.define(parameter);
                }

                self.compile_block(body)?;

                // An implicit return of the last expression, or null for an
                // empty body.
                if self.last_instruction_is(Op::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Op::ReturnValue) {
                    self.emit(Op::Return, &[]);
                }

                let free_symbols = self.symbols.free_symbols().to_vec();
                let num_locals = self.symbols.num_definitions();
                let instructions = self.leave_scope();

                for symbol in &free_symbols {
                    self.load_symbol(symbol);
                }

                let func = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                };
                let idx = self.add_constant(Value::Function(Rc::new(func)));
                self.emit(Op::Closure, &[idx, free_symbols.len()]);
            }

            ExprKind::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    // ===== Scope management =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.symbols.enter_scope();
    }

    fn leave_scope(&mut self) -> Instructions {
        self.symbols.leave_scope();
        self.scopes
            .pop()
            .map(|scope| scope.instructions)
            .unwrap_or_default()
    }

    // ===== Bytecode emission =====

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, bytes: &[u8]) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.0.extend_from_slice(bytes);
        position
    }

    fn set_last_instruction(&mut self, op: Op, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction { op, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.current_scope()
            .last
            .is_some_and(|last| last.op == op)
    }

    /// Truncate the stream to drop a trailing `Pop`.
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last {
            scope.instructions.0.truncate(last.position);
            scope.last = scope.previous;
        }
    }

    /// Rewrite a trailing `Pop` into `ReturnValue` in place.
    fn replace_last_pop_with_return(&mut self) {
        let Some(last) = self.current_scope().last else {
            return;
        };
        self.replace_instruction(last.position, &make(Op::ReturnValue, &[]));
        self.current_scope_mut().last = Some(EmittedInstruction {
            op: Op::ReturnValue,
            position: last.position,
        });
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let scope = self.current_scope_mut();
        scope.instructions.0[position..position + new_instruction.len()]
            .copy_from_slice(new_instruction);
    }

    /// Re-encode the instruction at `position` with a new operand. Safe
    /// because operand widths are fixed per opcode.
    fn change_operand(&mut self, position: usize, operand: usize) {
        if let Some(op) = Op::from_u8(self.current_instructions().0[position]) {
            self.replace_instruction(position, &make(op, &[operand]));
        }
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
        };
    }

    fn current_instructions(&self) -> &Instructions {
        &self.current_scope().instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler has no scope")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler has no scope")
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
