//! Programmatic construction of the AST, for embedding UI definitions in Rust
//! code without going through source text.
//!
//! Every entry point validates eagerly: expression strings are parsed and
//! names are checked the moment a node is built, with the same rules the
//! parser applies. A tree built here is indistinguishable from a parsed one.
//!
//! ```rust
//! use loom_lang::ast::{Construct, Define};
//! use loom_lang::builder::{bind, delegate};
//!
//! # fn main() -> Result<(), loom_lang::SyntaxError> {
//! let form = Define::new("Form")?
//!     .param("model")?
//!     .construct(
//!         Construct::new("Field")?
//!             .unpack("field")?
//!             .assign(delegate("value", "model.name")?)
//!             .assign(bind("enabled", "model.editable")?),
//!     );
//! assert_eq!(form.body[0].assignments().count(), 2);
//! # Ok(())
//! # }
//! ```

use crate::ast::{Argument, Assignment, BodyItem, Capture, Construct, Define, Expression, Operator, Parameters, Pos};
use crate::error::SyntaxError;
use crate::lexer::{Lexer, Token};
use crate::target::parse_target;

/// Check that `name` lexes as exactly one identifier token, as the parser
/// would require in the same position.
fn check_identifier(name: &str) -> Result<String, SyntaxError> {
    let invalid = || SyntaxError::new(format!("{:?} is not a valid identifier", name), 1, 1).with_snippet(name);
    let tokens = Lexer::new(name).tokenize().map_err(|_| invalid())?;
    match tokens.as_slice() {
        [first, rest @ ..]
            if matches!(&first.token, Token::Ident(id) if id == name)
                && rest.iter().all(|t| matches!(t.token, Token::Newline | Token::Eof)) =>
        {
            Ok(name.to_string())
        }
        _ => Err(invalid()),
    }
}

// ── Define ────────────────────────────────────────────────────────────────

impl Define {
    pub fn new(name: &str) -> Result<Self, SyntaxError> {
        Ok(Define { name: check_identifier(name)?, parameters: Parameters::default(), body: Vec::new(), pos: Pos::default() })
    }

    /// `Define(name, args, defaults, body)` in one call; `defaults` align
    /// with the trailing `args`.
    pub fn with_parameters(name: &str, args: &[&str], defaults: &[&str]) -> Result<Self, SyntaxError> {
        if defaults.len() > args.len() {
            return Err(SyntaxError::new(
                format!("{} defaults given for {} parameters", defaults.len(), args.len()),
                1,
                1,
            )
            .with_snippet(name));
        }
        let first_default = args.len() - defaults.len();
        let mut define = Define::new(name)?;
        for (i, arg) in args.iter().enumerate() {
            define = match i.checked_sub(first_default) {
                Some(d) => define.param_with_default(arg, defaults[d])?,
                None => define.param(arg)?,
            };
        }
        Ok(define)
    }

    pub fn param(mut self, name: &str) -> Result<Self, SyntaxError> {
        let name = self.check_new_param(name)?;
        if !self.parameters.defaults.is_empty() {
            return Err(SyntaxError::new(format!("parameter {:?} without a default follows a default", name), 1, 1)
                .with_snippet(name));
        }
        self.parameters.names.push(name);
        Ok(self)
    }

    pub fn param_with_default(mut self, name: &str, default: &str) -> Result<Self, SyntaxError> {
        let name = self.check_new_param(name)?;
        self.parameters.defaults.push(Expression::parse(default)?);
        self.parameters.names.push(name);
        Ok(self)
    }

    fn check_new_param(&self, name: &str) -> Result<String, SyntaxError> {
        let name = check_identifier(name)?;
        if self.parameters.names.contains(&name) {
            return Err(SyntaxError::new(format!("duplicate parameter {:?}", name), 1, 1).with_snippet(name));
        }
        Ok(name)
    }

    pub fn construct(mut self, construct: Construct) -> Self {
        self.body.push(construct);
        self
    }
}

// ── Construct ─────────────────────────────────────────────────────────────

impl Construct {
    pub fn new(type_name: &str) -> Result<Self, SyntaxError> {
        Ok(Construct {
            type_name: check_identifier(type_name)?,
            arguments: Vec::new(),
            unpack: Vec::new(),
            captures: Vec::new(),
            body: Vec::new(),
            pos: Pos::default(),
        })
    }

    /// Add a positional argument expression.
    pub fn arg(mut self, code: &str) -> Result<Self, SyntaxError> {
        if self.arguments.iter().any(|a| matches!(a, Argument::Keyword { .. })) {
            return Err(SyntaxError::new("positional argument follows keyword argument", 1, 1).with_snippet(code));
        }
        self.arguments.push(Argument::Positional(Expression::parse(code)?));
        Ok(self)
    }

    /// Add a keyword argument expression. Order is preserved.
    pub fn kwarg(mut self, name: &str, code: &str) -> Result<Self, SyntaxError> {
        let name = check_identifier(name)?;
        if self.keyword_args().any(|(k, _)| k == name) {
            return Err(SyntaxError::new(format!("keyword argument {:?} repeated", name), 1, 1).with_snippet(name));
        }
        let value = Expression::parse(code)?;
        self.arguments.push(Argument::Keyword { name, value });
        Ok(self)
    }

    pub fn unpack(mut self, name: &str) -> Result<Self, SyntaxError> {
        self.unpack.push(check_identifier(name)?);
        Ok(self)
    }

    pub fn capture(mut self, local: &str, attr: &str) -> Result<Self, SyntaxError> {
        self.captures.push(Capture { local: check_identifier(local)?, attr: check_identifier(attr)? });
        Ok(self)
    }

    pub fn child(mut self, child: Construct) -> Self {
        self.body.push(BodyItem::Construct(child));
        self
    }

    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.body.push(BodyItem::Assignment(assignment));
        self
    }
}

// ── Assignment ────────────────────────────────────────────────────────────

impl Assignment {
    /// Build `lhs op rhs`, validating `lhs` with the parser's matcher.
    pub fn new(lhs: &str, op: Operator, rhs: &str) -> Result<Self, SyntaxError> {
        let target = parse_target(lhs)?;
        let value = Expression::parse(rhs)?;
        Ok(Assignment { target, op, value, pos: Pos::default() })
    }
}

/// `lhs = rhs`
pub fn simple(lhs: &str, rhs: &str) -> Result<Assignment, SyntaxError> {
    Assignment::new(lhs, Operator::Default, rhs)
}

/// `lhs := rhs`
pub fn delegate(lhs: &str, rhs: &str) -> Result<Assignment, SyntaxError> {
    Assignment::new(lhs, Operator::Delegate, rhs)
}

/// `lhs << rhs`
pub fn bind(lhs: &str, rhs: &str) -> Result<Assignment, SyntaxError> {
    Assignment::new(lhs, Operator::Bind, rhs)
}

/// `lhs >> rhs`
pub fn notify(lhs: &str, rhs: &str) -> Result<Assignment, SyntaxError> {
    Assignment::new(lhs, Operator::Notify, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    #[test]
    fn builder_matches_parser() -> Result<(), SyntaxError> {
        let built = Define::with_parameters("Form", &["model", "title"], &["'Untitled'"])?.construct(
            Construct::new("Window")?
                .unpack("win")?
                .assign(bind("title", "title + ' - ' + model.name")?)
                .child(
                    Construct::new("Field")?
                        .kwarg("value", "model.name")?
                        .unpack("field")?
                        .capture("inner", "text")?
                        .assign(delegate("value", "model.name")?)
                        .assign(notify("value", "model.log(args.new)")?),
                )
                .assign(simple("items[2].value", "1")?),
        );

        let parsed = parse_str(
            "defn Form(model, title='Untitled'):\n\
             \x20   Window -> win:\n\
             \x20       title << title+' - '+model.name\n\
             \x20       Field(value=model.name) -> field [inner = text]:\n\
             \x20           value := model.name\n\
             \x20           value >> model.log(args.new)\n\
             \x20       items[2].value = 1\n",
        )?;
        assert_eq!(parsed.define("Form"), Some(&built));
        Ok(())
    }

    #[test]
    fn lhs_rejected_like_parser() {
        assert!(bind("a.b.c", "1").is_err());
        assert!(bind("a[x].b", "1").is_err());
        assert!(bind("a.b", "1").is_ok());
    }

    #[test]
    fn expressions_fail_fast() {
        assert!(Construct::new("W").unwrap().arg("1 +").is_err());
        assert!(Construct::new("W").unwrap().kwarg("value", "(").is_err());
        assert!(Define::new("F").unwrap().param_with_default("a", "x y").is_err());
        assert!(simple("a", "").is_err());
    }

    #[test]
    fn identifiers_validated() {
        assert!(Construct::new("Window").is_ok());
        assert!(Construct::new("if").is_err());
        assert!(Construct::new("two words").is_err());
        assert!(Construct::new("W").unwrap().unpack("a.b").is_err());
        assert!(Define::new("F").unwrap().param("1x").is_err());
    }

    #[test]
    fn parameter_ordering_enforced() {
        let d = Define::new("F").unwrap().param_with_default("a", "1").unwrap();
        assert!(d.param("b").is_err());
        assert!(Define::with_parameters("F", &["a"], &["1", "2"]).is_err());
        assert!(Define::new("F").unwrap().param("a").unwrap().param("a").is_err());
    }

    #[test]
    fn positional_after_keyword_rejected() {
        let c = Construct::new("W").unwrap().kwarg("a", "1").unwrap();
        assert!(c.arg("2").is_err());
    }
}
