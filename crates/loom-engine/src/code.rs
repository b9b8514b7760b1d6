//! Executable form of a host expression.
//!
//! [`Code`] is an [`Expr`] with every free name already resolved: either to a
//! numbered slot of the invocation [`Frame`](crate::eval::Frame), to the
//! change record of a notification, or to a constant (globals, builtins).
//! Resolution happens once, at compile time, so evaluation never looks a name
//! up by string.

use loom_lang::expr::{BinaryOp, BoolOp, Expr, UnaryOp};

use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Code {
    Const(Value),
    /// A slot of the invocation frame.
    Slot(usize),
    /// The change record of the notification being handled (`args` in `>>`).
    Args,
    List(Vec<Code>),
    Attr { value: Box<Code>, attr: String },
    Index { value: Box<Code>, index: Box<Code> },
    Call { func: Box<Code>, args: Vec<Code> },
    Unary { op: UnaryOp, operand: Box<Code> },
    Binary { left: Box<Code>, op: BinaryOp, right: Box<Code> },
    BoolOp { op: BoolOp, left: Box<Code>, right: Box<Code> },
    IfElse { body: Box<Code>, test: Box<Code>, orelse: Box<Code> },
}

impl Code {
    /// Lower `expr`, resolving each name through `resolve`.
    ///
    /// Fails with the first name `resolve` does not know.
    pub fn lower(expr: &Expr, resolve: &mut dyn FnMut(&str) -> Option<Code>) -> Result<Code, String> {
        Ok(match expr {
            Expr::Int(i) => Code::Const(Value::Int(*i)),
            Expr::Float(x) => Code::Const(Value::Float(*x)),
            Expr::Str(s) => Code::Const(Value::Str(s.clone())),
            Expr::Bool(b) => Code::Const(Value::Bool(*b)),
            Expr::None => Code::Const(Value::None),
            Expr::Name(name) => return resolve(name).ok_or_else(|| name.clone()),
            Expr::List(items) => Code::List(lower_all(items, resolve)?),
            Expr::Attr { value, attr } => Code::Attr { value: lower_boxed(value, resolve)?, attr: attr.clone() },
            Expr::Index { value, index } => {
                Code::Index { value: lower_boxed(value, resolve)?, index: lower_boxed(index, resolve)? }
            }
            Expr::Call { func, args } => {
                Code::Call { func: lower_boxed(func, resolve)?, args: lower_all(args, resolve)? }
            }
            Expr::Unary { op, operand } => Code::Unary { op: *op, operand: lower_boxed(operand, resolve)? },
            Expr::Binary { left, op, right } => Code::Binary {
                left: lower_boxed(left, resolve)?,
                op: *op,
                right: lower_boxed(right, resolve)?,
            },
            Expr::BoolOp { op, left, right } => Code::BoolOp {
                op: *op,
                left: lower_boxed(left, resolve)?,
                right: lower_boxed(right, resolve)?,
            },
            Expr::IfElse { body, test, orelse } => Code::IfElse {
                body: lower_boxed(body, resolve)?,
                test: lower_boxed(test, resolve)?,
                orelse: lower_boxed(orelse, resolve)?,
            },
        })
    }

    /// `Some((base, attr))` when this is an attribute access, the only shape
    /// a `:=` binding can write back through.
    pub fn as_attr_path(&self) -> Option<(&Code, &str)> {
        match self {
            Code::Attr { value, attr } => Some((value.as_ref(), attr.as_str())),
            _ => None,
        }
    }
}

fn lower_boxed(expr: &Expr, resolve: &mut dyn FnMut(&str) -> Option<Code>) -> Result<Box<Code>, String> {
    Code::lower(expr, resolve).map(Box::new)
}

fn lower_all(exprs: &[Expr], resolve: &mut dyn FnMut(&str) -> Option<Code>) -> Result<Vec<Code>, String> {
    exprs.iter().map(|e| Code::lower(e, resolve)).collect()
}
