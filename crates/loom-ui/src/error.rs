use std::fmt;

use loom_engine::EvalError;
use loom_lang::SyntaxError;
use loom_lang::ast::Pos;

use crate::registry::LookupError;

/// Where in the source a failure happened: the node's position and its
/// source line rendered back from the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub pos: Pos,
    pub line: String,
}

impl Location {
    pub(crate) fn new(pos: Pos, line: impl Into<String>) -> Self {
        Self { pos, line: line.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: `{}`", self.pos, self.line)
    }
}

// ── CompileError ──────────────────────────────────────────────────────────

/// Raised while compiling, before any object is constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Syntax(SyntaxError),
    /// A name used before the point where it becomes visible, or never bound.
    Name { name: String, at: Location },
    /// A `:=` whose right-hand side is not a `base.attr` path.
    Delegate { at: Location },
    /// A parameter default failed to evaluate.
    Default { define: String, param: String, source: EvalError },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(e) => e.fmt(f),
            CompileError::Name { name, at } => write!(f, "name '{}' is not defined {}", name, at),
            CompileError::Delegate { at } => {
                write!(f, "`:=` needs an attribute path such as `model.value` {}", at)
            }
            CompileError::Default { define, param, source } => {
                write!(f, "default for parameter '{}' of {} failed: {}", param, define, source)
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Syntax(e) => Some(e),
            CompileError::Default { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SyntaxError> for CompileError {
    fn from(e: SyntaxError) -> Self {
        CompileError::Syntax(e)
    }
}

// ── RuntimeError ──────────────────────────────────────────────────────────

/// Raised while a compiled template constructs its tree.
///
/// Construction is not transactional: instances built before the failure
/// are left as they are and belong to nobody.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    Lookup(LookupError),
    Eval { source: EvalError, at: Option<Location> },
    /// `-> a, b` over a construct that produced a different number of instances.
    Unpack { expected: usize, found: usize, at: Location },
    /// A capture whose attribute the construct neither exports nor carries.
    Capture { attr: String, at: Location },
    /// An assignment target that does not denote an object.
    Target { message: String, at: Location },
    /// A define called with arguments that do not fit its parameters.
    Arguments { define: String, message: String },
    /// A factory that could not build its instance.
    Factory { type_name: String, message: String },
}

impl RuntimeError {
    pub(crate) fn eval(source: EvalError, at: &Location) -> Self {
        RuntimeError::Eval { source, at: Some(at.clone()) }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Lookup(e) => e.fmt(f),
            RuntimeError::Eval { source, at: Some(at) } => write!(f, "{} {}", source, at),
            RuntimeError::Eval { source, at: None } => source.fmt(f),
            RuntimeError::Unpack { expected, found, at } => {
                write!(f, "cannot unpack {} instance(s) into {} names {}", found, expected, at)
            }
            RuntimeError::Capture { attr, at } => write!(f, "nothing to capture as '{}' {}", attr, at),
            RuntimeError::Target { message, at } => write!(f, "{} {}", message, at),
            RuntimeError::Arguments { define, message } => write!(f, "{}(): {}", define, message),
            RuntimeError::Factory { type_name, message } => write!(f, "cannot build {}: {}", type_name, message),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Lookup(e) => Some(e),
            RuntimeError::Eval { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<LookupError> for RuntimeError {
    fn from(e: LookupError) -> Self {
        RuntimeError::Lookup(e)
    }
}

impl From<EvalError> for RuntimeError {
    fn from(source: EvalError) -> Self {
        RuntimeError::Eval { source, at: None }
    }
}
