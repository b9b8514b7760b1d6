//! Syntax tree shared by the parser and the builder API.
//!
//! Both front ends produce these nodes and the compiler accepts nothing else.
//! Source positions are carried for diagnostics only and never take part in
//! equality, so a parsed tree and a built tree compare equal when their shapes
//! match.

use std::fmt;

use crate::expr::Expr;

// ── Pos ───────────────────────────────────────────────────────────────────

/// 1-based line/column of a node in its source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── Expression ────────────────────────────────────────────────────────────

/// An embedded host expression: its source text plus the parsed form.
///
/// Parsed eagerly (so malformed code fails at parse/build time) but never
/// evaluated by this crate.
#[derive(Debug, Clone)]
pub struct Expression {
    /// Source text, verbatim from the file or as passed to the builder.
    pub source: String,
    pub expr: Expr,
    pub pos: Pos,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

// ── Operator ──────────────────────────────────────────────────────────────

/// The four binding operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`: evaluate once at construction.
    Default,
    /// `:=`: two-way sync between the target and an attribute path.
    Delegate,
    /// `<<`: one-way, re-evaluated whenever a dependency changes.
    Bind,
    /// `>>`: evaluate for side effect whenever the target changes.
    Notify,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Default => "=",
            Operator::Delegate => ":=",
            Operator::Bind => "<<",
            Operator::Notify => ">>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Operator::Default),
            ":=" => Some(Operator::Delegate),
            "<<" => Some(Operator::Bind),
            ">>" => Some(Operator::Notify),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Target ────────────────────────────────────────────────────────────────

/// Base of a `Getattr` target: `name` or `name[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetBase {
    Name(String),
    Index { name: String, index: i64 },
}

impl TargetBase {
    /// The namespace name the base refers to.
    pub fn name(&self) -> &str {
        match self {
            TargetBase::Name(name) | TargetBase::Index { name, .. } => name,
        }
    }
}

/// Left-hand side of an assignment. Exactly three addressing modes exist:
/// `attr`, `name.attr` and `name[index].attr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Attribute of the enclosing construct.
    Name(String),
    Getattr { base: TargetBase, attr: String },
}

impl Target {
    /// The attribute written by this target.
    pub fn attr(&self) -> &str {
        match self {
            Target::Name(attr) | Target::Getattr { attr, .. } => attr,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => f.write_str(name),
            Target::Getattr { base: TargetBase::Name(name), attr } => write!(f, "{}.{}", name, attr),
            Target::Getattr { base: TargetBase::Index { name, index }, attr } => {
                write!(f, "{}[{}].{}", name, index, attr)
            }
        }
    }
}

// ── Assignment ────────────────────────────────────────────────────────────

/// One binding statement: `target OP expression`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: Target,
    pub op: Operator,
    pub value: Expression,
    pub pos: Pos,
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.op == other.op && self.value == other.value
    }
}

// ── Construct ─────────────────────────────────────────────────────────────

/// A call argument of a construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Keyword { name: String, value: Expression },
}

/// `local_name = attribute_name` inside a construct's capture list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub local: String,
    pub attr: String,
}

/// An item inside a construct block.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyItem {
    Assignment(Assignment),
    Construct(Construct),
}

/// Instantiation of one widget type (or of a Define used as a type).
///
/// ```loom
/// Field(value = "x") -> field [inner = text]:
///     value := model.name
/// ```
#[derive(Debug, Clone)]
pub struct Construct {
    /// Resolved against a registry when the compiled code runs, never here.
    pub type_name: String,
    /// Positional arguments first, then keyword arguments, in source order.
    pub arguments: Vec<Argument>,
    /// Local aliases for the instance(s) this construct produces.
    pub unpack: Vec<String>,
    pub captures: Vec<Capture>,
    pub body: Vec<BodyItem>,
    pub pos: Pos,
}

impl PartialEq for Construct {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.arguments == other.arguments
            && self.unpack == other.unpack
            && self.captures == other.captures
            && self.body == other.body
    }
}

impl Construct {
    pub fn positional_args(&self) -> impl Iterator<Item = &Expression> {
        self.arguments.iter().filter_map(|a| match a {
            Argument::Positional(e) => Some(e),
            Argument::Keyword { .. } => None,
        })
    }

    pub fn keyword_args(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.arguments.iter().filter_map(|a| match a {
            Argument::Keyword { name, value } => Some((name.as_str(), value)),
            Argument::Positional(_) => None,
        })
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.body.iter().filter_map(|b| match b {
            BodyItem::Assignment(a) => Some(a),
            BodyItem::Construct(_) => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &Construct> {
        self.body.iter().filter_map(|b| match b {
            BodyItem::Construct(c) => Some(c),
            BodyItem::Assignment(_) => None,
        })
    }
}

// ── Define ────────────────────────────────────────────────────────────────

/// Parameter list of a Define. `defaults` align with the *last*
/// `defaults.len()` names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub names: Vec<String>,
    pub defaults: Vec<Expression>,
}

impl Parameters {
    /// Default expression for the parameter at `index`, if it has one.
    pub fn default_for(&self, index: usize) -> Option<&Expression> {
        let first_default = self.names.len().checked_sub(self.defaults.len())?;
        index.checked_sub(first_default).and_then(|i| self.defaults.get(i))
    }
}

/// A named, parameterised construction template: `defn Name(params):`.
#[derive(Debug, Clone)]
pub struct Define {
    pub name: String,
    pub parameters: Parameters,
    pub body: Vec<Construct>,
    pub pos: Pos,
}

impl PartialEq for Define {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.parameters == other.parameters && self.body == other.body
    }
}

// ── Module ────────────────────────────────────────────────────────────────

/// A top-level item of a source unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Define(Define),
    Construct(Construct),
}

/// The result of parsing one source unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
}

impl Module {
    pub fn defines(&self) -> impl Iterator<Item = &Define> {
        self.items.iter().filter_map(|i| match i {
            Item::Define(d) => Some(d),
            Item::Construct(_) => None,
        })
    }

    pub fn define(&self, name: &str) -> Option<&Define> {
        self.defines().find(|d| d.name == name)
    }

    pub fn constructs(&self) -> impl Iterator<Item = &Construct> {
        self.items.iter().filter_map(|i| match i {
            Item::Construct(c) => Some(c),
            Item::Define(_) => None,
        })
    }
}
