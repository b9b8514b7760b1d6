use std::fmt;

/// Failure while evaluating a host expression or applying its result.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operand types do not support the operation.
    Type(String),
    ZeroDivision,
    /// Integer arithmetic left the `i64` range.
    Overflow,
    /// A repeated sequence too large to allocate.
    TooLarge,
    MissingAttribute { type_name: String, attr: String },
    IndexOutOfRange { index: i64, len: usize },
    NotCallable(String),
    /// A builtin or native function rejected its arguments.
    Call { func: String, message: String },
    /// A `:=` expression whose base is not an object cannot be written back.
    NotAssignable(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Type(msg) => write!(f, "type error: {}", msg),
            EvalError::ZeroDivision => f.write_str("division by zero"),
            EvalError::Overflow => f.write_str("integer overflow"),
            EvalError::TooLarge => f.write_str("result too large to allocate"),
            EvalError::MissingAttribute { type_name, attr } => {
                write!(f, "'{}' object has no attribute '{}'", type_name, attr)
            }
            EvalError::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for length {}", index, len)
            }
            EvalError::NotCallable(type_name) => write!(f, "'{}' object is not callable", type_name),
            EvalError::Call { func, message } => write!(f, "{}(): {}", func, message),
            EvalError::NotAssignable(what) => write!(f, "cannot write back through {}", what),
        }
    }
}

impl std::error::Error for EvalError {}
