//! Runtime values shared by the compiler (constants) and the VM.

pub mod builtins;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::Instructions;
use crate::value::builtins::Builtin;

/// The hash payload: derived key -> (original key, mapped value).
/// The original key is kept so `inspect` can render it.
pub type HashPairs = IndexMap<HashKey, (Value, Value)>;

/// Type tags, used in error messages and hash-key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Boolean,
    Null,
    String,
    Array,
    Hash,
    Function,
    Closure,
    Builtin,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "INTEGER",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Null => "NULL",
            ValueType::String => "STRING",
            ValueType::Array => "ARRAY",
            ValueType::Hash => "HASH",
            ValueType::Function => "COMPILED_FUNCTION",
            ValueType::Closure => "CLOSURE",
            ValueType::Builtin => "BUILTIN",
        };
        write!(f, "{}", name)
    }
}

/// A Monkey runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<String>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashPairs>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
}

impl Value {
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);
    pub const NULL: Value = Value::Null;

    pub fn from_bool(b: bool) -> Value {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Null => ValueType::Null,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Hash(_) => ValueType::Hash,
            Value::Function(_) => ValueType::Function,
            Value::Closure(_) => ValueType::Closure,
            Value::Builtin(_) => ValueType::Builtin,
        }
    }

    /// Everything except `false` and `null` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// Derive the hash key for this value. Only integers, booleans, and
    /// strings are hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey {
                tag: ValueType::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                tag: ValueType::Boolean,
                value: *b as u64,
            }),
            Value::String(s) => {
                // DefaultHasher::new() is keyless SipHash: equal byte
                // sequences always produce equal digests.
                let mut hasher = DefaultHasher::new();
                s.as_bytes().hash(&mut hasher);
                Some(HashKey {
                    tag: ValueType::String,
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }

    /// The REPL-facing rendering of this value.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, pair)| b.get(key).is_some_and(|other| pair.1 == other.1))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(_) => write!(f, "<compiled fn>"),
            Value::Closure(_) => write!(f, "<closure>"),
            Value::Builtin(_) => write!(f, "builtin function"),
        }
    }
}

/// A derived hash key: type tag plus a 64-bit digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub tag: ValueType,
    pub value: u64,
}

/// A function compiled to bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function bundled with its captured free variables.
/// Captures are frozen by value when the closure is created.
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Value {
        Value::String(Rc::new(s.to_string()))
    }

    #[test]
    fn test_string_hash_keys() {
        let hello1 = string("Hello World");
        let hello2 = string("Hello World");
        let diff1 = string("My name is johnny");
        let diff2 = string("My name is johnny");

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_eq!(diff1.hash_key(), diff2.hash_key());
        assert_ne!(hello1.hash_key(), diff1.hash_key());
    }

    #[test]
    fn test_integer_and_boolean_hash_keys() {
        assert_eq!(
            Value::Integer(-1).hash_key(),
            Some(HashKey {
                tag: ValueType::Integer,
                value: (-1i64) as u64,
            })
        );
        assert_eq!(
            Value::TRUE.hash_key(),
            Some(HashKey {
                tag: ValueType::Boolean,
                value: 1,
            })
        );
        assert_eq!(
            Value::FALSE.hash_key(),
            Some(HashKey {
                tag: ValueType::Boolean,
                value: 0,
            })
        );
    }

    #[test]
    fn test_unhashable_values() {
        assert_eq!(Value::Null.hash_key(), None);
        assert_eq!(Value::Array(Rc::new(Vec::new())).hash_key(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(string("").is_truthy());
        assert!(!Value::FALSE.is_truthy());
        assert!(!Value::NULL.is_truthy());
    }

    #[test]
    fn test_inspect() {
        assert_eq!(Value::Integer(5).inspect(), "5");
        assert_eq!(Value::TRUE.inspect(), "true");
        assert_eq!(Value::NULL.inspect(), "null");
        assert_eq!(string("hi").inspect(), "hi");

        let array = Value::Array(Rc::new(vec![Value::Integer(1), string("two")]));
        assert_eq!(array.inspect(), "[1, two]");

        let mut pairs = HashPairs::new();
        let key = string("one");
        pairs.insert(
            key.hash_key().expect("hashable"),
            (key, Value::Integer(1)),
        );
        assert_eq!(Value::Hash(Rc::new(pairs)).inspect(), "{one: 1}");
    }
}
