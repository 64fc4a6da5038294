//! Builtin functions callable from Monkey programs.
//!
//! The registry order is fixed: `GetBuiltin` operands index into it.

use std::rc::Rc;

use lazy_static::lazy_static;

use crate::error::RuntimeError;
use crate::value::Value;

pub type BuiltinFunction = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A host function exposed to Monkey programs.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFunction,
}

lazy_static! {
    /// The builtin registry, in `GetBuiltin` index order.
    pub static ref BUILTINS: Vec<Builtin> = vec![
        Builtin { name: "len", func: len },
        Builtin { name: "puts", func: puts },
        Builtin { name: "first", func: first },
        Builtin { name: "last", func: last },
        Builtin { name: "rest", func: rest },
        Builtin { name: "push", func: push },
    ];
}

fn check_arity(args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::BuiltinArity {
            got: args.len(),
            want,
        });
    }
    Ok(())
}

fn expect_array<'a>(args: &'a [Value], name: &str) -> Result<&'a Rc<Vec<Value>>, RuntimeError> {
    match &args[0] {
        Value::Array(elements) => Ok(elements),
        other => Err(RuntimeError::general(format!(
            "argument to `{}` must be ARRAY, got {}",
            name,
            other.value_type()
        ))),
    }
}

fn len(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.len() as i64)),
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        other => Err(RuntimeError::general(format!(
            "argument to `len` not supported, got {}",
            other.value_type()
        ))),
    }
}

fn puts(args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        println!("{}", arg.inspect());
    }
    Ok(Value::NULL)
}

fn first(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let elements = expect_array(args, "first")?;
    Ok(elements.first().cloned().unwrap_or(Value::NULL))
}

fn last(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let elements = expect_array(args, "last")?;
    Ok(elements.last().cloned().unwrap_or(Value::NULL))
}

fn rest(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let elements = expect_array(args, "rest")?;
    if elements.is_empty() {
        return Ok(Value::NULL);
    }
    Ok(Value::Array(Rc::new(elements[1..].to_vec())))
}

fn push(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 2)?;
    let elements = expect_array(args, "push")?;
    let mut extended = Vec::with_capacity(elements.len() + 1);
    extended.extend_from_slice(elements);
    extended.push(args[1].clone());
    Ok(Value::Array(Rc::new(extended)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(values))
    }

    fn string(s: &str) -> Value {
        Value::String(Rc::new(s.to_string()))
    }

    #[test]
    fn test_len() {
        assert_eq!(len(&[string("")]), Ok(Value::Integer(0)));
        assert_eq!(len(&[string("four")]), Ok(Value::Integer(4)));
        assert_eq!(
            len(&[array(vec![Value::Integer(1), Value::Integer(2)])]),
            Ok(Value::Integer(2))
        );
        assert_eq!(
            len(&[Value::Integer(1)]).unwrap_err().to_string(),
            "argument to `len` not supported, got INTEGER"
        );
        assert_eq!(
            len(&[string("a"), string("b")]).unwrap_err().to_string(),
            "wrong number of arguments. Got 2, want 1."
        );
    }

    #[test]
    fn test_first_and_last() {
        let values = array(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(first(&[values.clone()]), Ok(Value::Integer(1)));
        assert_eq!(last(&[values]), Ok(Value::Integer(2)));
        assert_eq!(first(&[array(Vec::new())]), Ok(Value::NULL));
        assert_eq!(last(&[array(Vec::new())]), Ok(Value::NULL));
        assert_eq!(
            first(&[Value::Integer(1)]).unwrap_err().to_string(),
            "argument to `first` must be ARRAY, got INTEGER"
        );
    }

    #[test]
    fn test_rest() {
        let values = array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        assert_eq!(
            rest(&[values]),
            Ok(array(vec![Value::Integer(2), Value::Integer(3)]))
        );
        assert_eq!(rest(&[array(Vec::new())]), Ok(Value::NULL));
    }

    #[test]
    fn test_push_does_not_mutate() {
        let original = array(vec![Value::Integer(1)]);
        let pushed = push(&[original.clone(), Value::Integer(2)]).expect("push");
        assert_eq!(
            pushed,
            array(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(original, array(vec![Value::Integer(1)]));
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<&str> = BUILTINS.iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["len", "puts", "first", "last", "rest", "push"]);
    }
}
