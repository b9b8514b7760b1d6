//! Evaluation of lowered [`Code`] against an invocation frame.
//!
//! An [`Evaluator`] can run in *recording* mode, in which every
//! `(object, attribute)` pair read through attribute access is logged. The
//! binding runtime subscribes to exactly that set.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use loom_lang::expr::{BinaryOp, BoolOp, UnaryOp};

use crate::code::Code;
use crate::error::EvalError;
use crate::object::{ObjectId, ObjectRef};
use crate::value::Value;

// ── Frame ─────────────────────────────────────────────────────────────────

/// The slots of one invocation of a compiled template.
///
/// Every name a template introduces owns one slot, written once when the name
/// comes into scope. Bindings keep the frame alive and read it again on every
/// re-evaluation.
#[derive(Debug, Default)]
pub struct Frame {
    slots: RefCell<Vec<Value>>,
}

impl Frame {
    pub fn new(size: usize) -> Rc<Frame> {
        Rc::new(Frame { slots: RefCell::new(vec![Value::None; size]) })
    }

    pub fn get(&self, slot: usize) -> Value {
        self.slots.borrow().get(slot).cloned().unwrap_or_default()
    }

    pub fn set(&self, slot: usize, value: Value) {
        let mut slots = self.slots.borrow_mut();
        if slot >= slots.len() {
            slots.resize(slot + 1, Value::None);
        }
        slots[slot] = value;
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Dependencies ──────────────────────────────────────────────────────────

/// `(object, attribute)` pairs read during one evaluation, deduplicated, in
/// first-read order.
#[derive(Debug, Default)]
pub struct Dependencies {
    reads: Vec<(ObjectRef, String)>,
}

impl Dependencies {
    fn record(&mut self, object: &ObjectRef, attr: &str) {
        let seen = self.reads.iter().any(|(o, a)| o.id() == object.id() && a == attr);
        if !seen {
            self.reads.push((object.clone(), attr.to_string()));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectRef, &str)> {
        self.reads.iter().map(|(o, a)| (o, a.as_str()))
    }

    pub fn contains(&self, object: ObjectId, attr: &str) -> bool {
        self.reads.iter().any(|(o, a)| o.id() == object && a == attr)
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────

pub struct Evaluator<'f> {
    frame: &'f Frame,
    args: Option<Value>,
    recorder: Option<Dependencies>,
}

impl<'f> Evaluator<'f> {
    pub fn new(frame: &'f Frame) -> Self {
        Self { frame, args: None, recorder: None }
    }

    /// Make `args` available to [`Code::Args`].
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Record every attribute read from here on.
    pub fn recording(mut self) -> Self {
        self.recorder = Some(Dependencies::default());
        self
    }

    /// The reads recorded so far (empty when not recording).
    pub fn into_dependencies(self) -> Dependencies {
        self.recorder.unwrap_or_default()
    }

    pub fn eval(&mut self, code: &Code) -> Result<Value, EvalError> {
        match code {
            Code::Const(value) => Ok(value.clone()),
            Code::Slot(slot) => Ok(self.frame.get(*slot)),
            Code::Args => Ok(self.args.clone().unwrap_or_default()),
            Code::List(items) => {
                let values = items.iter().map(|c| self.eval(c)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Code::Attr { value, attr } => {
                let base = self.eval(value)?;
                self.getattr(&base, attr)
            }
            Code::Index { value, index } => {
                let base = self.eval(value)?;
                let index = self.eval(index)?;
                subscript(&base, &index)
            }
            Code::Call { func, args } => {
                let callee = self.eval(func)?;
                let args = args.iter().map(|c| self.eval(c)).collect::<Result<Vec<_>, _>>()?;
                match callee {
                    Value::Func(f) => f.call(args),
                    other => Err(EvalError::NotCallable(other.type_name().to_string())),
                }
            }
            Code::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, operand)
            }
            Code::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Code::BoolOp { op, left, right } => {
                let left = self.eval(left)?;
                match (op, left.is_truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Code::IfElse { body, test, orelse } => {
                if self.eval(test)?.is_truthy() { self.eval(body) } else { self.eval(orelse) }
            }
        }
    }

    fn getattr(&mut self, base: &Value, attr: &str) -> Result<Value, EvalError> {
        let missing = || EvalError::MissingAttribute { type_name: base.type_name().to_string(), attr: attr.to_string() };
        let Value::Object(object) = base else {
            return Err(missing());
        };
        // Record before reading: a binding must hear about the attribute
        // appearing later even if this read fails.
        if let Some(recorder) = &mut self.recorder {
            recorder.record(object, attr);
        }
        object.get(attr).ok_or_else(missing)
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

fn type_error(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, v) => match v.as_int() {
            Some(i) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            None => Err(EvalError::Type(format!("bad operand type for unary -: '{}'", v.type_name()))),
        },
    }
}

fn index_of(index: i64, len: usize) -> Result<usize, EvalError> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

/// `base[index]` for lists and strings; negative indices count from the end.
pub fn subscript(base: &Value, index: &Value) -> Result<Value, EvalError> {
    let Some(i) = index.as_int() else {
        return Err(EvalError::Type(format!("indices must be integers, not '{}'", index.type_name())));
    };
    match base {
        Value::List(items) => Ok(items[index_of(i, items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[index_of(i, chars.len())?].to_string()))
        }
        other => Err(EvalError::Type(format!("'{}' object is not subscriptable", other.type_name()))),
    }
}

/// `items * times`. A count that would not fit in memory is an error, not an
/// allocation failure.
fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, EvalError> {
    let times = usize::try_from(times.max(0)).map_err(|_| EvalError::TooLarge)?;
    if items.is_empty() || times == 0 {
        return Ok(Vec::new());
    }
    let len = items.len().checked_mul(times).ok_or(EvalError::TooLarge)?;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| EvalError::TooLarge)?;
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn repeat_str(s: &str, times: i64) -> Result<String, EvalError> {
    let bytes = repeat(s.as_bytes(), times)?;
    String::from_utf8(bytes).map_err(|_| EvalError::TooLarge)
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    ints: fn(i64, i64) -> Result<i64, EvalError>,
    floats: fn(f64, f64) -> Result<f64, EvalError>,
) -> Result<Value, EvalError> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        if !matches!(left, Value::Float(_)) && !matches!(right, Value::Float(_)) {
            return ints(a, b).map(Value::Int);
        }
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => floats(a, b).map(Value::Float),
        _ => Err(type_error(op.symbol(), left, right)),
    }
}

fn floor_div_int(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) { Ok(q - 1) } else { Ok(q) }
}

fn mod_int(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) { Ok(r + b) } else { Ok(r) }
}

fn mod_float(a: f64, b: f64) -> Result<f64, EvalError> {
    if b == 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { Ok(r + b) } else { Ok(r) }
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => Ok(Value::List([a.as_slice(), b.as_slice()].concat())),
            _ => arithmetic(op, left, right, |a, b| a.checked_add(b).ok_or(EvalError::Overflow), |a, b| Ok(a + b)),
        },
        BinaryOp::Sub => {
            arithmetic(op, left, right, |a, b| a.checked_sub(b).ok_or(EvalError::Overflow), |a, b| Ok(a - b))
        }
        BinaryOp::Mul => match (left, right) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => repeat_str(s, *n).map(Value::Str),
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                repeat(items, *n).map(Value::List)
            }
            _ => arithmetic(op, left, right, |a, b| a.checked_mul(b).ok_or(EvalError::Overflow), |a, b| Ok(a * b)),
        },
        BinaryOp::Div => match (left.as_float(), right.as_float()) {
            (Some(_), Some(b)) if b == 0.0 => Err(EvalError::ZeroDivision),
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(type_error("/", left, right)),
        },
        BinaryOp::FloorDiv => arithmetic(op, left, right, floor_div_int, |a, b| {
            if b == 0.0 { Err(EvalError::ZeroDivision) } else { Ok((a / b).floor()) }
        }),
        BinaryOp::Mod => arithmetic(op, left, right, mod_int, mod_float),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => Ok(Value::Bool(left.compare(right)? == Ordering::Less)),
        BinaryOp::LtE => Ok(Value::Bool(left.compare(right)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(left.compare(right)? == Ordering::Greater)),
        BinaryOp::GtE => Ok(Value::Bool(left.compare(right)? != Ordering::Less)),
        BinaryOp::In => contains(right, left).map(Value::Bool),
        BinaryOp::NotIn => contains(right, left).map(|b| Value::Bool(!b)),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match (container, item) {
        (Value::List(items), _) => Ok(items.contains(item)),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(type_error("in", item, container)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use loom_lang::Expression;

    /// Evaluate `src` with `m` in slot 0.
    fn eval_with(src: &str, m: &ObjectRef) -> Result<Value, EvalError> {
        let expr = Expression::parse(src).unwrap().expr;
        let code = Code::lower(&expr, &mut |name| match name {
            "m" => Some(Code::Slot(0)),
            other => crate::builtins::lookup(other).map(Code::Const),
        })
        .unwrap();
        let frame = Frame::new(1);
        frame.set(0, Value::Object(m.clone()));
        Evaluator::new(&frame).eval(&code)
    }

    fn eval(src: &str) -> Result<Value, EvalError> {
        eval_with(src, &Object::new("Model"))
    }

    #[test]
    fn arithmetic_follows_python() {
        assert_eq!(eval("7 // 2").unwrap(), Value::Int(3));
        assert_eq!(eval("-7 // 2").unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(2));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("1 + 2.5").unwrap(), Value::Float(3.5));
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Int(14));
        assert_eq!(eval("-7.5 % 2").unwrap(), Value::Float(0.5));
    }

    #[test]
    fn sequences() {
        assert_eq!(eval("'ab' + 'c'").unwrap(), Value::from("abc"));
        assert_eq!(eval("'ab' * 2").unwrap(), Value::from("abab"));
        assert_eq!(eval("[1, 2] + [3]").unwrap(), Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
        assert_eq!(eval("[1, 2, 3][-1]").unwrap(), Value::Int(3));
        assert_eq!(eval("'abc'[1]").unwrap(), Value::from("b"));
        assert_eq!(eval("2 in [1, 2]").unwrap(), Value::Bool(true));
        assert_eq!(eval("'x' not in 'abc'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        assert_eq!(eval("0 or 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval("0 and 1 / 0").unwrap(), Value::Int(0));
        assert_eq!(eval("'a' if 1 < 2 else 'b'").unwrap(), Value::from("a"));
        assert_eq!(eval("not []").unwrap(), Value::Bool(true));
    }

    #[test]
    fn errors() {
        assert_eq!(eval("1 / 0").unwrap_err(), EvalError::ZeroDivision);
        assert_eq!(eval("1 % 0").unwrap_err(), EvalError::ZeroDivision);
        assert!(matches!(eval("[1][3]").unwrap_err(), EvalError::IndexOutOfRange { index: 3, len: 1 }));
        assert!(matches!(eval("1 + 'a'").unwrap_err(), EvalError::Type(_)));
        assert!(matches!(eval("m.missing").unwrap_err(), EvalError::MissingAttribute { .. }));
        assert!(matches!(eval("1()").unwrap_err(), EvalError::NotCallable(_)));
        assert_eq!(eval("9223372036854775807 + 1").unwrap_err(), EvalError::Overflow);
    }

    #[test]
    fn huge_repetition_is_an_error() {
        let m = Object::with_attrs("Model", [("n", i64::MAX)]);
        assert_eq!(eval_with("len([1, 2] * m.n)", &m).unwrap_err(), EvalError::TooLarge);
        assert_eq!(eval_with("m.n * 'ab'", &m).unwrap_err(), EvalError::TooLarge);
        assert_eq!(eval_with("[] * m.n", &m).unwrap(), Value::List(vec![]));
        assert_eq!(eval_with("'' * m.n", &m).unwrap(), Value::from(""));
        assert_eq!(eval("[0] * -3").unwrap(), Value::List(vec![]));
        assert_eq!(eval("'é' * 2").unwrap(), Value::from("éé"));
    }

    #[test]
    fn recording_collects_attribute_reads() {
        let m = Object::with_attrs("Model", [("a", Value::Bool(true)), ("x", Value::Int(1)), ("y", Value::Int(2))]);
        let expr = Expression::parse("m.x if m.a else m.y + m.x").unwrap().expr;
        let code = Code::lower(&expr, &mut |_| Some(Code::Slot(0))).unwrap();
        let frame = Frame::new(1);
        frame.set(0, Value::Object(m.clone()));

        let mut evaluator = Evaluator::new(&frame).recording();
        assert_eq!(evaluator.eval(&code).unwrap(), Value::Int(1));
        let deps = evaluator.into_dependencies();
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(m.id(), "a"));
        assert!(deps.contains(m.id(), "x"));
        assert!(!deps.contains(m.id(), "y"));
    }

    #[test]
    fn failed_read_is_still_recorded() {
        let m = Object::new("Model");
        let expr = Expression::parse("m.later").unwrap().expr;
        let code = Code::lower(&expr, &mut |_| Some(Code::Slot(0))).unwrap();
        let frame = Frame::new(1);
        frame.set(0, Value::Object(m.clone()));
        let mut evaluator = Evaluator::new(&frame).recording();
        assert!(evaluator.eval(&code).is_err());
        assert!(evaluator.into_dependencies().contains(m.id(), "later"));
    }

    #[test]
    fn args_resolve_to_notification_record() {
        let frame = Frame::new(0);
        let args = Object::with_attrs("ChangeArgs", [("new", 3)]);
        let code = Code::Attr { value: Box::new(Code::Args), attr: "new".into() };
        let value = Evaluator::new(&frame).with_args(Value::Object(args)).eval(&code).unwrap();
        assert_eq!(value, Value::Int(3));
    }
}
