//! Stack-based virtual machine for executing bytecode.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_u16, Instructions, Op};
use crate::error::RuntimeError;
use crate::value::builtins::{Builtin, BUILTINS};
use crate::value::{Closure, CompiledFunction, HashPairs, Value};

/// Maximum value-stack depth.
pub const STACK_SIZE: usize = 2048;
/// Number of global binding slots.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// A call frame: one active closure invocation.
#[derive(Debug)]
struct Frame {
    closure: Rc<Closure>,
    /// Offset of the next byte to fetch in the closure's instructions.
    ip: usize,
    /// Stack index where this frame's locals begin.
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}

/// The virtual machine. Owns its stack, globals, and frames for the
/// duration of `run`; popped stack slots are left in place so the last
/// popped value stays readable.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Next free stack slot; the top of the stack is `sp - 1`.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Create a VM reusing an existing globals array. The REPL uses this to
    /// persist bindings across lines.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_fn = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            func: Rc::new(main_fn),
            free: Vec::new(),
        };

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(Rc::new(main_closure), 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Hand the globals array back, for the next `with_globals`.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The slot just past the stack pointer: the value most recently
    /// popped. This is how the REPL reads an expression statement's result.
    pub fn last_popped_stack_element(&self) -> &Value {
        &self.stack[self.sp]
    }

    /// Execute the loaded bytecode to completion, or until the first
    /// runtime error. Globals survive an error so an embedding REPL can
    /// keep its state.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() {
            let byte = self.fetch_u8();
            let op = Op::from_u8(byte)
                .ok_or_else(|| RuntimeError::general(format!("opcode {} undefined", byte)))?;

            match op {
                Op::Constant => {
                    let idx = self.fetch_u16() as usize;
                    let value = self.constant(idx)?;
                    self.push(value)?;
                }

                Op::Pop => {
                    self.pop();
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.execute_binary_operation(op)?;
                }

                Op::True => self.push(Value::TRUE)?,
                Op::False => self.push(Value::FALSE)?,
                Op::Null => self.push(Value::NULL)?,

                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Op::Bang => {
                    let operand = self.pop();
                    self.push(Value::from_bool(!operand.is_truthy()))?;
                }

                Op::Minus => {
                    let operand = self.pop();
                    match operand {
                        Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                        other => {
                            return Err(RuntimeError::UnknownPrefixOperator {
                                op: "-",
                                operand: other.value_type(),
                            })
                        }
                    }
                }

                Op::Jump => {
                    let target = self.fetch_u16() as usize;
                    self.current_frame_mut().ip = target;
                }

                Op::JumpNotTruthy => {
                    let target = self.fetch_u16() as usize;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }

                Op::SetGlobal => {
                    let idx = self.fetch_u16() as usize;
                    self.globals[idx] = self.pop();
                }

                Op::GetGlobal => {
                    let idx = self.fetch_u16() as usize;
                    let value = self.globals[idx].clone();
                    self.push(value)?;
                }

                Op::SetLocal => {
                    let slot = self.fetch_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    self.stack[base + slot] = self.pop();
                }

                Op::GetLocal => {
                    let slot = self.fetch_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack[base + slot].clone();
                    self.push(value)?;
                }

                Op::GetBuiltin => {
                    let idx = self.fetch_u8() as usize;
                    let builtin = BUILTINS
                        .get(idx)
                        .ok_or_else(|| RuntimeError::general(format!("builtin {} undefined", idx)))?;
                    self.push(Value::Builtin(builtin))?;
                }

                Op::GetFree => {
                    let idx = self.fetch_u8() as usize;
                    let value = self.current_frame().closure.free[idx].clone();
                    self.push(value)?;
                }

                Op::Array => {
                    let count = self.fetch_u16() as usize;
                    let elements = self.take_from_stack(count);
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                Op::Hash => {
                    let count = self.fetch_u16() as usize;
                    let values = self.take_from_stack(count);
                    let mut pairs: HashPairs = IndexMap::with_capacity(count / 2);
                    for pair in values.chunks_exact(2) {
                        let key = pair[0].clone();
                        let hash_key = key
                            .hash_key()
                            .ok_or_else(|| RuntimeError::UnusableHashKey(key.value_type()))?;
                        pairs.insert(hash_key, (key, pair[1].clone()));
                    }
                    self.push(Value::Hash(Rc::new(pairs)))?;
                }

                Op::Index => {
                    let index = self.pop();
                    let object = self.pop();
                    self.execute_index(object, index)?;
                }

                Op::Call => {
                    let argc = self.fetch_u8() as usize;
                    self.call_value(argc)?;
                }

                Op::ReturnValue => {
                    let value = self.pop();
                    if self.return_from_frame(value)? {
                        return Ok(());
                    }
                }

                Op::Return => {
                    if self.return_from_frame(Value::NULL)? {
                        return Ok(());
                    }
                }

                Op::Closure => {
                    let const_idx = self.fetch_u16() as usize;
                    let num_free = self.fetch_u8() as usize;
                    self.push_closure(const_idx, num_free)?;
                }
            }
        }

        Ok(())
    }

    // ===== Dispatch helpers =====

    fn execute_binary_operation(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Add => l.wrapping_add(*r),
                    Op::Sub => l.wrapping_sub(*r),
                    Op::Mul => l.wrapping_mul(*r),
                    Op::Div => {
                        if *r == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    _ => unreachable!("non-arithmetic opcode {:?}", op),
                };
                self.push(Value::Integer(result))
            }
            (Value::String(l), Value::String(r)) if op == Op::Add => {
                let mut joined = String::with_capacity(l.len() + r.len());
                joined.push_str(l);
                joined.push_str(r);
                self.push(Value::String(Rc::new(joined)))
            }
            _ => Err(RuntimeError::UnsupportedBinary {
                op: op_symbol(op),
                left: left.value_type(),
                right: right.value_type(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Equal => l == r,
                    Op::NotEqual => l != r,
                    Op::GreaterThan => l > r,
                    _ => unreachable!("non-comparison opcode {:?}", op),
                };
                self.push(Value::from_bool(result))
            }
            (Value::Boolean(l), Value::Boolean(r)) if op != Op::GreaterThan => {
                self.push(Value::from_bool(match op {
                    Op::Equal => l == r,
                    _ => l != r,
                }))
            }
            (Value::Null, Value::Null) if op != Op::GreaterThan => {
                self.push(Value::from_bool(op == Op::Equal))
            }
            (Value::String(l), Value::String(r)) if op != Op::GreaterThan => {
                self.push(Value::from_bool(match op {
                    Op::Equal => l == r,
                    _ => l != r,
                }))
            }
            _ if left.value_type() != right.value_type() => Err(RuntimeError::TypeMismatch {
                op: op_symbol(op),
                left: left.value_type(),
                right: right.value_type(),
            }),
            _ => Err(RuntimeError::UnsupportedBinary {
                op: op_symbol(op),
                left: left.value_type(),
                right: right.value_type(),
            }),
        }
    }

    fn execute_index(&mut self, object: Value, index: Value) -> VmResult<()> {
        match object {
            Value::Array(elements) => {
                let idx = match index {
                    Value::Integer(n) => n,
                    _ => return Err(RuntimeError::NonIntegerIndex),
                };
                if idx < 0 || idx as usize >= elements.len() {
                    return self.push(Value::NULL);
                }
                let value = elements[idx as usize].clone();
                self.push(value)
            }
            Value::Hash(pairs) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey(index.value_type()))?;
                let value = match pairs.get(&key) {
                    Some((_, value)) => value.clone(),
                    None => Value::NULL,
                };
                self.push(value)
            }
            other => Err(RuntimeError::IndexNotSupported(other.value_type())),
        }
    }

    fn call_value(&mut self, argc: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Builtin(builtin) => self.call_builtin(builtin, argc),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> VmResult<()> {
        if argc != closure.func.num_parameters {
            return Err(RuntimeError::WrongArity {
                want: closure.func.num_parameters,
                got: argc,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }

        // Arguments already sit on the stack and become locals 0..argc-1;
        // the remaining local slots are reserved above them.
        let base_pointer = self.sp - argc;
        let next_sp = base_pointer + closure.func.num_locals;
        if next_sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = next_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, argc: usize) -> VmResult<()> {
        let args = self.stack[self.sp - argc..self.sp].to_vec();
        let result = (builtin.func)(&args)?;
        // Discard the arguments and the builtin itself.
        self.sp = self.sp - argc - 1;
        self.push(result)
    }

    /// Pop the current frame and push `value` as the call's result.
    /// Returns true when the popped frame was the outermost one.
    fn return_from_frame(&mut self, value: Value) -> VmResult<bool> {
        let frame = self.frames.pop().expect("no active frame");
        if self.frames.is_empty() {
            // Top-level return: expose the value and stop the machine.
            self.stack[frame.base_pointer] = value;
            self.sp = frame.base_pointer;
            return Ok(true);
        }
        // Drop the locals and the callee in one step.
        self.sp = frame.base_pointer - 1;
        self.push(value)?;
        Ok(false)
    }

    fn push_closure(&mut self, const_idx: usize, num_free: usize) -> VmResult<()> {
        let constant = self.constant(const_idx)?;
        let func = match constant {
            Value::Function(func) => func,
            other => return Err(RuntimeError::NotAFunction(other.value_type())),
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Value::Closure(Rc::new(Closure { func, free })))
    }

    // ===== Fetch & stack primitives =====

    fn fetch_u8(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active frame");
        let byte = frame.closure.func.instructions.0[frame.ip];
        frame.ip += 1;
        byte
    }

    fn fetch_u16(&mut self) -> u16 {
        let frame = self.frames.last_mut().expect("no active frame");
        let value = read_u16(&frame.closure.func.instructions.0[frame.ip..]);
        frame.ip += 2;
        value
    }

    fn constant(&self, idx: usize) -> VmResult<Value> {
        self.constants
            .get(idx)
            .cloned()
            .ok_or_else(|| RuntimeError::general(format!("constant {} undefined", idx)))
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// Decrement the stack pointer and read the slot without clearing it;
    /// `last_popped_stack_element` depends on the value staying in place.
    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    /// Copy the top `count` values off the stack, bottom-to-top.
    fn take_from_stack(&mut self, count: usize) -> Vec<Value> {
        let values = self.stack[self.sp - count..self.sp].to_vec();
        self.sp -= count;
        values
    }
}

fn op_symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Equal => "==",
        Op::NotEqual => "!=",
        Op::GreaterThan => ">",
        _ => "?",
    }
}
