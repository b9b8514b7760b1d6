//! Functions every expression can call without importing them.

use std::cmp::Ordering;

use crate::error::EvalError;
use crate::value::{Func, Value};

pub const NAMES: &[&str] = &["len", "str", "int", "float", "bool", "abs", "min", "max"];

/// The builtin called `name`, if there is one.
pub fn lookup(name: &str) -> Option<Value> {
    let func = match name {
        "len" => Func::new("len", len),
        "str" => Func::new("str", |args| Ok(Value::Str(one("str", args)?.to_string()))),
        "int" => Func::new("int", int),
        "float" => Func::new("float", float),
        "bool" => Func::new("bool", |args| Ok(Value::Bool(one("bool", args)?.is_truthy()))),
        "abs" => Func::new("abs", abs),
        "min" => Func::new("min", |args| extreme("min", args, Ordering::Less)),
        "max" => Func::new("max", |args| extreme("max", args, Ordering::Greater)),
        _ => return None,
    };
    Some(Value::Func(func))
}

fn fail(func: &str, message: impl Into<String>) -> EvalError {
    EvalError::Call { func: func.to_string(), message: message.into() }
}

fn one(func: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(fail(func, format!("takes exactly one argument ({} given)", count))),
    }
}

fn len(args: Vec<Value>) -> Result<Value, EvalError> {
    match one("len", args)? {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(fail("len", format!("object of type '{}' has no len()", other.type_name()))),
    }
}

fn int(args: Vec<Value>) -> Result<Value, EvalError> {
    match one("int", args)? {
        Value::Float(x) if x.is_finite() => {
            // `as` saturates; anything outside [-2^63, 2^63) has no exact i64.
            let t = x.trunc();
            if (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&t) {
                Ok(Value::Int(t as i64))
            } else {
                Err(EvalError::Overflow)
            }
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| fail("int", format!("invalid literal: {:?}", s))),
        other => other
            .as_int()
            .map(Value::Int)
            .ok_or_else(|| fail("int", format!("cannot convert '{}'", other.type_name()))),
    }
}

fn float(args: Vec<Value>) -> Result<Value, EvalError> {
    match one("float", args)? {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| fail("float", format!("invalid literal: {:?}", s))),
        other => other
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| fail("float", format!("cannot convert '{}'", other.type_name()))),
    }
}

fn abs(args: Vec<Value>) -> Result<Value, EvalError> {
    match one("abs", args)? {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => match other.as_int() {
            Some(i) => i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow),
            None => Err(fail("abs", format!("bad operand type '{}'", other.type_name()))),
        },
    }
}

/// `min`/`max` over either one list argument or two or more arguments.
fn extreme(func: &str, args: Vec<Value>, keep: Ordering) -> Result<Value, EvalError> {
    let candidates = if args.len() == 1 {
        match args.into_iter().next() {
            Some(Value::List(items)) => items,
            _ => return Err(fail(func, "expected a list or at least two arguments")),
        }
    } else {
        args
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            Some(current) if candidate.compare(&current)? != keep => current,
            _ => candidate,
        });
    }
    best.ok_or_else(|| fail(func, "arg is an empty sequence"))
}
