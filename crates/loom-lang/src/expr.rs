//! Host expressions: the right-hand side of bindings and construct arguments.
//!
//! A small Python-flavoured language. This module only parses it; evaluation
//! lives in the engine.

use crate::ast::{Expression, Pos};
use crate::error::SyntaxError;
use crate::lexer::{Lexer, Token};
use crate::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtE => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtE => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Expr>),
    Name(String),
    Attr { value: Box<Expr>, attr: String },
    Index { value: Box<Expr>, index: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    BoolOp { op: BoolOp, left: Box<Expr>, right: Box<Expr> },
    /// `body if test else orelse`
    IfElse { body: Box<Expr>, test: Box<Expr>, orelse: Box<Expr> },
}

impl Expr {
    /// Every free name referenced by the expression, in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Name(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Bool(_) | Expr::None => {}
            Expr::List(items) => items.iter().for_each(|e| e.collect_names(out)),
            Expr::Attr { value, .. } => value.collect_names(out),
            Expr::Index { value, index } => {
                value.collect_names(out);
                index.collect_names(out);
            }
            Expr::Call { func, args } => {
                func.collect_names(out);
                args.iter().for_each(|e| e.collect_names(out));
            }
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { left, right, .. } | Expr::BoolOp { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Expr::IfElse { body, test, orelse } => {
                body.collect_names(out);
                test.collect_names(out);
                orelse.collect_names(out);
            }
        }
    }
}

impl Expression {
    /// Parse a standalone expression snippet.
    ///
    /// Used by the builder API; positions in errors are relative to the
    /// snippet and the snippet itself is attached to the error.
    pub fn parse(code: &str) -> Result<Expression, SyntaxError> {
        let code = code.trim();
        let attach = |e: SyntaxError| e.with_snippet(code);
        let tokens = Lexer::new(code).tokenize().map_err(attach)?;
        let mut parser = Parser::new(code, tokens);
        let expression = parser.parse_expression().map_err(attach)?;
        parser.expect_end_of_snippet().map_err(attach)?;
        Ok(expression)
    }
}

// ── Expression grammar ────────────────────────────────────────────────────
//
//   test       := or_expr ['if' or_expr 'else' test]
//   or_expr    := and_expr ('or' and_expr)*
//   and_expr   := not_expr ('and' not_expr)*
//   not_expr   := 'not' not_expr | comparison
//   comparison := sum [comp_op sum]
//   sum        := term (('+' | '-') term)*
//   term       := factor (('*' | '/' | '//' | '%') factor)*
//   factor     := ('-' | '+') factor | postfix
//   postfix    := atom ('.' NAME | '[' test ']' | '(' [test (',' test)*] ')')*

impl<'s> Parser<'s> {
    /// Parse one expression and capture its exact source text.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let (line, col) = self.current_pos();
        let start = self.current_start();
        let expr = self.parse_test()?;
        let source = self.source_since(start);
        Ok(Expression { source, expr, pos: Pos::new(line, col) })
    }

    fn parse_test(&mut self) -> Result<Expr, SyntaxError> {
        let body = self.parse_or()?;
        if self.peek() != &Token::If {
            return Ok(body);
        }
        self.advance();
        let test = self.parse_or()?;
        self.expect_token(&Token::Else)?;
        let orelse = self.parse_test()?;
        Ok(Expr::IfElse { body: Box::new(body), test: Box::new(test), orelse: Box::new(orelse) })
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BoolOp { op: BoolOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BoolOp { op: BoolOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        if self.peek() == &Token::Not {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.parse_comparison()
    }

    /// Comparisons do not chain: `a < b < c` is rejected rather than read as
    /// `(a < b) < c`.
    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_sum()?;
        let Some((op, width)) = self.peek_comparison() else {
            return Ok(left);
        };
        for _ in 0..width {
            self.advance();
        }
        let right = self.parse_sum()?;
        if self.peek_comparison().is_some() {
            return Err(self.err("chained comparisons are not supported; write `a < b and b < c`"));
        }
        Ok(Expr::Binary { left: Box::new(left), op, right: Box::new(right) })
    }

    /// The comparison operator at the cursor and how many tokens it spans.
    fn peek_comparison(&self) -> Option<(BinaryOp, usize)> {
        let op = match self.peek() {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Less => BinaryOp::Lt,
            Token::LessEq => BinaryOp::LtE,
            Token::Greater => BinaryOp::Gt,
            Token::GreaterEq => BinaryOp::GtE,
            Token::In => BinaryOp::In,
            Token::Not if self.peek_ahead(1) == &Token::In => return Some((BinaryOp::NotIn, 2)),
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_sum(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::SlashSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                let operand = self.parse_factor()?;
                Ok(match operand {
                    Expr::Int(v) => Expr::Int(-v),
                    Expr::Float(v) => Expr::Float(-v),
                    other => Expr::Unary { op: UnaryOp::Neg, operand: Box::new(other) },
                })
            }
            Token::Plus => {
                self.advance();
                self.parse_factor()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let attr = self.expect_ident()?;
                    expr = Expr::Attr { value: Box::new(expr), attr };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_test()?;
                    self.expect_token(&Token::RBracket)?;
                    expr = Expr::Index { value: Box::new(expr), index: Box::new(index) };
                }
                Token::LParen => {
                    self.advance();
                    let args = self.parse_expr_list(&Token::RParen)?;
                    expr = Expr::Call { func: Box::new(expr), args };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, SyntaxError> {
        match self.advance() {
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::Str(mut s) => {
                // adjacent string literals concatenate
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(s))
            }
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::None => Ok(Expr::None),
            Token::Ident(name) => Ok(Expr::Name(name)),
            Token::LParen => {
                let inner = self.parse_test()?;
                self.expect_token(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.parse_expr_list(&Token::RBracket)?)),
            tok => Err(self.err_prev(format!("expected an expression, got {:?}", tok))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_expr_list(&mut self, close: &Token) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == close {
                self.advance();
                break;
            }
            items.push(self.parse_test()?);
            match self.advance() {
                Token::Comma => {}
                tok if &tok == close => break,
                tok => return Err(self.err_prev(format!("expected ',' or {:?}, got {:?}", close, tok))),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> Expr {
        Expression::parse(code).unwrap().expr
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.into()))
    }

    #[test]
    fn precedence_mul_over_add() {
        assert_eq!(
            parse("a + b * 2"),
            Expr::Binary {
                left: name("a"),
                op: BinaryOp::Add,
                right: Box::new(Expr::Binary { left: name("b"), op: BinaryOp::Mul, right: Box::new(Expr::Int(2)) }),
            }
        );
    }

    #[test]
    fn attribute_chain_and_call() {
        assert_eq!(
            parse("m.f(x)[0]"),
            Expr::Index {
                value: Box::new(Expr::Call {
                    func: Box::new(Expr::Attr { value: name("m"), attr: "f".into() }),
                    args: vec![Expr::Name("x".into())],
                }),
                index: Box::new(Expr::Int(0)),
            }
        );
    }

    #[test]
    fn conditional_expression() {
        let e = parse("'on' if m.active else 'off'");
        assert!(matches!(e, Expr::IfElse { .. }));
        assert_eq!(e.names(), vec!["m"]);
    }

    #[test]
    fn not_in_and_boolean_ops() {
        let e = parse("x not in items and not done or y");
        assert!(matches!(e, Expr::BoolOp { op: BoolOp::Or, .. }));
        assert_eq!(e.names(), vec!["x", "items", "done", "y"]);
    }

    #[test]
    fn comparisons_do_not_chain() {
        assert!(matches!(parse("a < b"), Expr::Binary { op: BinaryOp::Lt, .. }));
        assert!(matches!(parse("a not in b"), Expr::Binary { op: BinaryOp::NotIn, .. }));
        assert!(matches!(parse("a < b and b < c"), Expr::BoolOp { op: BoolOp::And, .. }));
        for chained in ["a < b < c", "a == b != c", "x in xs not in ys"] {
            let err = Expression::parse(chained).unwrap_err();
            assert!(err.message.contains("chained comparisons"), "{chained:?}: {}", err.message);
        }
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(parse("-3"), Expr::Int(-3));
        assert_eq!(parse("-x"), Expr::Unary { op: UnaryOp::Neg, operand: name("x") });
    }

    #[test]
    fn multiline_list_snippet() {
        let e = Expression::parse("[\n    a,\n    b,\n]").unwrap();
        assert_eq!(e.expr, Expr::List(vec![Expr::Name("a".into()), Expr::Name("b".into())]));
    }

    #[test]
    fn source_text_is_trimmed_snippet() {
        assert_eq!(Expression::parse("  m.x * 2 ").unwrap().source, "m.x * 2");
    }

    #[test]
    fn equality_ignores_whitespace() {
        assert_eq!(Expression::parse("m.x*2").unwrap(), Expression::parse("m.x * 2").unwrap());
    }

    #[test]
    fn malformed_snippets_fail_fast() {
        for bad in ["", "a +", "(a", "a b", "f(,)", "x if y", "a = 1", "1 +* 2"] {
            let err = Expression::parse(bad).unwrap_err();
            assert_eq!(err.snippet.as_deref(), Some(bad.trim()), "{bad:?}");
        }
    }
}
