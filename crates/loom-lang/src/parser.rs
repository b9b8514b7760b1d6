use crate::ast::{
    Argument, Assignment, BodyItem, Capture, Construct, Define, Item, Module, Operator, Parameters, Pos,
};
use crate::error::SyntaxError;
use crate::lexer::{Lexer, Token, TokenWithPos};
use crate::target::parse_target;

// ── Parser ────────────────────────────────────────────────────────────────

pub struct Parser<'s> {
    src: &'s str,
    tokens: Vec<TokenWithPos>,
    pos: usize,
    /// Byte offset just past the last consumed token.
    prev_end: usize,
}

impl<'s> Parser<'s> {
    pub fn new(src: &'s str, tokens: Vec<TokenWithPos>) -> Self {
        Self { src, tokens, pos: 0, prev_end: 0 }
    }

    pub(crate) fn current_pos(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.col))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.col)))
            .unwrap_or((1, 1))
    }

    fn prev_pos(&self) -> (usize, usize) {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| (t.line, t.col))
            .unwrap_or_else(|| self.current_pos())
    }

    pub(crate) fn current_start(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.start).unwrap_or(self.src.len())
    }

    /// Source text from byte `start` up to the end of the last consumed token.
    pub(crate) fn source_since(&self, start: usize) -> String {
        self.src.get(start..self.prev_end.max(start)).unwrap_or_default().to_string()
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    /// Look at the token `offset` positions ahead of current without consuming.
    pub(crate) fn peek_ahead(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let Some(t) = self.tokens.get(self.pos) else { return Token::Eof };
        let tok = t.token.clone();
        self.prev_end = t.end;
        self.pos += 1;
        tok
    }

    /// Error positioned at the next unconsumed token.
    pub(crate) fn err(&self, msg: impl Into<String>) -> SyntaxError {
        let (line, col) = self.current_pos();
        SyntaxError::new(msg, line, col)
    }

    /// Error positioned at the token just consumed.
    pub(crate) fn err_prev(&self, msg: impl Into<String>) -> SyntaxError {
        let (line, col) = self.prev_pos();
        SyntaxError::new(msg, line, col)
    }

    pub(crate) fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            tok => Err(self.err_prev(format!("expected identifier, got {:?}", tok))),
        }
    }

    pub(crate) fn expect_token(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        let got = self.advance();
        if &got == expected {
            Ok(())
        } else {
            Err(self.err_prev(format!("expected {:?}, got {:?}", expected, got)))
        }
    }

    /// A snippet must be fully consumed, allowing only the trailing layout
    /// tokens the lexer adds.
    pub(crate) fn expect_end_of_snippet(&mut self) -> Result<(), SyntaxError> {
        while self.peek() == &Token::Newline {
            self.advance();
        }
        match self.peek() {
            Token::Eof => Ok(()),
            tok => Err(self.err(format!("unexpected {:?} after expression", tok))),
        }
    }

    fn expect_line_end(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            tok => Err(self.err(format!("expected end of line, got {:?}", tok))),
        }
    }

    // ── Module ────────────────────────────────────────────────────────────

    pub fn parse_module(&mut self) -> Result<Module, SyntaxError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Defn => items.push(Item::Define(self.parse_define()?)),
                Token::Ident(_) => items.push(Item::Construct(self.parse_construct()?)),
                Token::Indent => return Err(self.err("unexpected indent")),
                tok => {
                    return Err(self.err(format!("expected `defn` or a widget type at top level, got {:?}", tok)));
                }
            }
        }
        Ok(Module { items })
    }

    // ── Define ────────────────────────────────────────────────────────────

    /// `defn Name(a, b = expr):` followed by an indented block of constructs.
    fn parse_define(&mut self) -> Result<Define, SyntaxError> {
        let (line, col) = self.current_pos();
        self.advance(); // consume `defn`
        let name = self.expect_ident()?;
        self.expect_token(&Token::LParen)?;
        let parameters = self.parse_parameters()?;
        self.expect_token(&Token::Colon)?;
        self.expect_token(&Token::Newline)?;
        self.expect_token(&Token::Indent)?;

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Pass => {
                    self.advance();
                    self.expect_line_end()?;
                }
                Token::Ident(_) => body.push(self.parse_construct()?),
                tok => {
                    return Err(self.err(format!("expected a widget type in defn body, got {:?}", tok)));
                }
            }
        }
        Ok(Define { name, parameters, body, pos: Pos::new(line, col) })
    }

    fn parse_parameters(&mut self) -> Result<Parameters, SyntaxError> {
        let mut params = Parameters::default();
        loop {
            if self.peek() == &Token::RParen {
                self.advance();
                break;
            }
            let name = self.expect_ident()?;
            if params.names.contains(&name) {
                return Err(self.err_prev(format!("duplicate parameter {:?}", name)));
            }
            if self.peek() == &Token::Equal {
                self.advance();
                params.defaults.push(self.parse_expression()?);
            } else if !params.defaults.is_empty() {
                return Err(self.err_prev(format!("parameter {:?} without a default follows a default", name)));
            }
            params.names.push(name);
            match self.advance() {
                Token::Comma => {}
                Token::RParen => break,
                tok => return Err(self.err_prev(format!("expected ',' or ')', got {:?}", tok))),
            }
        }
        Ok(params)
    }

    // ── Construct ─────────────────────────────────────────────────────────

    /// `Type(args) -> a, b [local = attr]:` plus an optional indented block.
    fn parse_construct(&mut self) -> Result<Construct, SyntaxError> {
        let (line, col) = self.current_pos();
        let type_name = self.expect_ident()?;

        let arguments = if self.peek() == &Token::LParen {
            self.advance();
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        let mut unpack = Vec::new();
        if self.peek() == &Token::Arrow {
            self.advance();
            unpack.push(self.expect_ident()?);
            while self.peek() == &Token::Comma {
                self.advance();
                unpack.push(self.expect_ident()?);
            }
        }

        let captures = if self.peek() == &Token::LBracket {
            self.advance();
            self.parse_captures()?
        } else {
            Vec::new()
        };

        let body = if self.peek() == &Token::Colon {
            self.advance();
            self.parse_block()?
        } else {
            self.expect_line_end()?;
            Vec::new()
        };

        Ok(Construct { type_name, arguments, unpack, captures, body, pos: Pos::new(line, col) })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        loop {
            if self.peek() == &Token::RParen {
                self.advance();
                break;
            }
            let is_keyword = matches!(self.peek(), Token::Ident(_)) && self.peek_ahead(1) == &Token::Equal;
            if is_keyword {
                let name = self.expect_ident()?;
                self.advance(); // consume `=`
                let value = self.parse_expression()?;
                if args.iter().any(|a| matches!(a, Argument::Keyword { name: n, .. } if *n == name)) {
                    return Err(self.err_prev(format!("keyword argument {:?} repeated", name)));
                }
                args.push(Argument::Keyword { name, value });
                seen_keyword = true;
            } else {
                if seen_keyword {
                    return Err(self.err("positional argument follows keyword argument"));
                }
                args.push(Argument::Positional(self.parse_expression()?));
            }
            match self.advance() {
                Token::Comma => {}
                Token::RParen => break,
                tok => return Err(self.err_prev(format!("expected ',' or ')', got {:?}", tok))),
            }
        }
        Ok(args)
    }

    fn parse_captures(&mut self) -> Result<Vec<Capture>, SyntaxError> {
        let mut captures = Vec::new();
        loop {
            if self.peek() == &Token::RBracket {
                self.advance();
                break;
            }
            let local = self.expect_ident()?;
            self.expect_token(&Token::Equal)?;
            let attr = self.expect_ident()?;
            captures.push(Capture { local, attr });
            match self.advance() {
                Token::Comma => {}
                Token::RBracket => break,
                tok => return Err(self.err_prev(format!("expected ',' or ']', got {:?}", tok))),
            }
        }
        Ok(captures)
    }

    // ── Block ─────────────────────────────────────────────────────────────

    /// Parse `NEWLINE INDENT item+ DEDENT` where each item is an assignment,
    /// a nested construct or `pass`.
    ///
    /// Disambiguation: a line is an assignment iff a binding operator occurs
    /// on it outside any brackets.
    fn parse_block(&mut self) -> Result<Vec<BodyItem>, SyntaxError> {
        self.expect_token(&Token::Newline)?;
        if self.peek() != &Token::Indent {
            return Err(self.err("expected an indented block"));
        }
        self.advance();

        let mut items = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Pass => {
                    self.advance();
                    self.expect_line_end()?;
                }
                Token::Ident(_) if self.line_is_assignment() => {
                    items.push(BodyItem::Assignment(self.parse_assignment()?));
                }
                Token::Ident(_) => items.push(BodyItem::Construct(self.parse_construct()?)),
                Token::Indent => return Err(self.err("unexpected indent")),
                tok => {
                    return Err(self.err(format!(
                        "unexpected {:?} in block; expected an assignment or a widget type",
                        tok
                    )));
                }
            }
        }
        Ok(items)
    }

    fn line_is_assignment(&self) -> bool {
        let mut depth = 0usize;
        for t in &self.tokens[self.pos..] {
            match &t.token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Newline | Token::Eof => return false,
                Token::Colon if depth == 0 => return false,
                tok if depth == 0 && tok.is_binding_op() => return true,
                _ => {}
            }
        }
        false
    }

    // ── Assignment ────────────────────────────────────────────────────────

    fn parse_assignment(&mut self) -> Result<Assignment, SyntaxError> {
        let (line, col) = self.current_pos();

        // The left-hand side is validated as its exact source text so that the
        // parser and the builder API share one matcher, whitespace included.
        let start = self.current_start();
        while !self.peek().is_binding_op() && self.peek() != &Token::Eof {
            self.advance();
        }
        let lhs = self.source_since(start);
        let target = parse_target(&lhs).map_err(|mut e| {
            e.line = line;
            e.col = col;
            e
        })?;

        let op = match self.advance() {
            Token::Equal => Operator::Default,
            Token::ColonEqual => Operator::Delegate,
            Token::LessLess => Operator::Bind,
            Token::GreaterGreater => Operator::Notify,
            tok => return Err(self.err_prev(format!("expected a binding operator, got {:?}", tok))),
        };
        let value = self.parse_expression()?;
        self.expect_line_end()?;
        Ok(Assignment { target, op, value, pos: Pos::new(line, col) })
    }
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse a `.loom` source string into a [`Module`].
pub fn parse_str(src: &str) -> Result<Module, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(src, tokens).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Target, TargetBase};
    use crate::expr::Expr;

    fn construct(src: &str) -> Construct {
        let module = parse_str(src).unwrap();
        module.constructs().next().cloned().unwrap()
    }

    #[test]
    fn construct_header_parts() {
        let c = construct("Field(1, value = m.x) -> field, other [inner = text]:\n    pass\n");
        assert_eq!(c.type_name, "Field");
        assert_eq!(c.positional_args().count(), 1);
        assert_eq!(c.keyword_args().map(|(k, _)| k).collect::<Vec<_>>(), vec!["value"]);
        assert_eq!(c.unpack, vec!["field", "other"]);
        assert_eq!(c.captures, vec![Capture { local: "inner".into(), attr: "text".into() }]);
        assert!(c.body.is_empty());
        assert_eq!(c.pos, Pos::new(1, 1));
    }

    #[test]
    fn body_mixes_assignments_and_children() {
        let c = construct("Window:\n    title = 'x'\n    Label:\n        text << m.name\n    w.value := m.x\n");
        assert_eq!(c.assignments().count(), 2);
        let label = c.children().next().unwrap();
        let a = label.assignments().next().unwrap();
        assert_eq!(a.op, Operator::Bind);
        assert_eq!(a.value.source, "m.name");
        assert_eq!(a.pos, Pos::new(4, 9));
    }

    #[test]
    fn lhs_accepted_exactly_when_builder_accepts_it() {
        for lhs in ["value", "w.value", "items[-1].text", "value . x", "items [0].text", "w. value", "a.b.c"] {
            let parsed = parse_str(&format!("Slider:\n    {} = 1\n", lhs)).is_ok();
            let built = crate::builder::simple(lhs, "1").is_ok();
            assert_eq!(parsed, built, "{lhs:?}");
        }
        let err = parse_str("Slider:\n    value . x = 1\n").unwrap_err();
        assert_eq!((err.line, err.col), (2, 5));
    }

    #[test]
    fn construct_without_block() {
        let module = parse_str("Window:\n    Label\n    Label -> l\n").unwrap();
        let w = module.constructs().next().unwrap();
        assert_eq!(w.children().count(), 2);
    }

    #[test]
    fn define_with_defaults() {
        let module = parse_str("defn Form(model, title = 'Untitled'):\n    Window:\n        title << title\n").unwrap();
        let d = module.define("Form").unwrap();
        assert_eq!(d.parameters.names, vec!["model", "title"]);
        assert_eq!(d.parameters.defaults[0].expr, Expr::Str("Untitled".into()));
        assert_eq!(d.body.len(), 1);
    }

    #[test]
    fn all_lhs_modes() {
        let c = construct("W:\n    a = 1\n    b.c = 2\n    d[3].e = 3\n");
        let targets: Vec<_> = c.assignments().map(|a| a.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                Target::Name("a".into()),
                Target::Getattr { base: TargetBase::Name("b".into()), attr: "c".into() },
                Target::Getattr { base: TargetBase::Index { name: "d".into(), index: 3 }, attr: "e".into() },
            ]
        );
    }

    #[test]
    fn keyword_equal_inside_parens_is_not_an_assignment() {
        let c = construct("W:\n    Field(value = 1)\n");
        assert_eq!(c.children().count(), 1);
    }

    #[test]
    fn multi_line_expression_in_brackets() {
        let c = construct("W:\n    items = [\n        1,\n        2,\n    ]\n    x = 3\n");
        assert_eq!(c.assignments().count(), 2);
    }

    #[test]
    fn parse_is_idempotent() {
        let src = "defn F(m):\n    W -> w:\n        value << m.x * 2\n";
        assert_eq!(parse_str(src).unwrap(), parse_str(src).unwrap());
    }

    #[test]
    fn error_positions() {
        let err = parse_str("W:\n    a.b.c = 1\n").unwrap_err();
        assert_eq!((err.line, err.col), (2, 5));
        let err = parse_str("W:\n    a = \n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test] fn err_index_not_numeric() { parse_str("W:\n    a[x].b = 1\n").unwrap_err(); }
    #[test] fn err_missing_block() { parse_str("W:\nX\n").unwrap_err(); }
    #[test] fn err_top_level_indent() { parse_str("  W\n").unwrap_err(); }
    #[test] fn err_default_order() { parse_str("defn F(a = 1, b):\n    W\n").unwrap_err(); }
    #[test] fn err_duplicate_param() { parse_str("defn F(a, a):\n    W\n").unwrap_err(); }
    #[test] fn err_positional_after_keyword() { parse_str("W(a = 1, 2)\n").unwrap_err(); }
    #[test] fn err_bad_expression() { parse_str("W:\n    a << m.\n").unwrap_err(); }
    #[test] fn err_trailing_tokens() { parse_str("W:\n    a = 1 2\n").unwrap_err(); }
    #[test] fn err_assignment_at_top_level() { parse_str("a = 1\n").unwrap_err(); }
}
