use crate::error::SyntaxError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    // Keywords
    Defn,
    Pass,
    If,
    Else,
    And,
    Or,
    Not,
    In,
    True,
    False,
    None,
    // Binding operators
    /// `=`
    Equal,
    /// `:=`
    ColonEqual,
    /// `<<`
    LessLess,
    /// `>>`
    GreaterGreater,
    // Expression operators
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    // Punctuation
    Colon,
    Comma,
    Dot,
    Arrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    // Layout
    Newline,
    Indent,
    Dedent,
    // Sentinel
    Eof,
}

impl Token {
    /// True for the four binding operators `=`, `:=`, `<<`, `>>`.
    pub fn is_binding_op(&self) -> bool {
        matches!(self, Token::Equal | Token::ColonEqual | Token::LessLess | Token::GreaterGreater)
    }
}

/// A token with its 1-based position and byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPos {
    pub token: Token,
    pub line: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────

/// Indentation-aware tokenizer.
///
/// Leading whitespace of each logical line becomes `Indent` / `Dedent`
/// tokens. Newlines inside `()` or `[]` are ignored, as are blank lines and
/// `#` comments.
pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    /// Open bracket depth; layout tokens are suppressed while > 0.
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, col: 1, depth: 0, indents: vec![0], at_line_start: true }
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithPos>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            if self.at_line_start {
                self.at_line_start = false;
                if !self.lex_indentation(&mut tokens)? {
                    continue;
                }
            }
            self.skip_inline_whitespace();

            let Some(ch) = self.peek() else { break };
            if ch == '\n' {
                let (line, col, start) = (self.line, self.col, self.pos);
                self.advance();
                if self.depth == 0 {
                    tokens.push(TokenWithPos { token: Token::Newline, line, col, start, end: start + 1 });
                    self.at_line_start = true;
                }
                continue;
            }
            let tok = self.next_token()?;
            tokens.push(tok);
        }

        // Close the final logical line and any open blocks.
        let (line, col, end) = (self.line, self.col, self.pos);
        let needs_newline = !matches!(
            tokens.last(),
            None | Some(TokenWithPos { token: Token::Newline, .. })
        );
        if needs_newline {
            tokens.push(TokenWithPos { token: Token::Newline, line, col, start: end, end });
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(TokenWithPos { token: Token::Dedent, line, col, start: end, end });
        }
        tokens.push(TokenWithPos { token: Token::Eof, line, col, start: end, end });
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn err(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError::new(msg, self.line, self.col)
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
    }

    fn skip_inline_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('#') => self.skip_comment(),
                Some('\\') if self.peek_second() == Some('\n') => {
                    // explicit line continuation
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Measure the indentation of a new line and emit layout tokens.
    ///
    /// Returns `false` when the line was blank or comment-only and has been
    /// consumed entirely.
    fn lex_indentation(&mut self, tokens: &mut Vec<TokenWithPos>) -> Result<bool, SyntaxError> {
        let mut width = 0;
        loop {
            match self.peek() {
                Some(' ') => width += 1,
                Some('\t') => width = (width / 8 + 1) * 8,
                Some('\r') => {}
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return Ok(true),
            Some('\n') => {
                self.advance();
                self.at_line_start = true;
                return Ok(false);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.advance();
                }
                self.at_line_start = true;
                return Ok(false);
            }
            Some(_) => {}
        }

        let (line, col, start) = (self.line, self.col, self.pos);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            tokens.push(TokenWithPos { token: Token::Indent, line, col, start, end: start });
        } else if width < current {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                tokens.push(TokenWithPos { token: Token::Dedent, line, col, start, end: start });
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.err("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn next_token(&mut self) -> Result<TokenWithPos, SyntaxError> {
        let (line, col, start) = (self.line, self.col, self.pos);
        let token = self.lex_token()?;
        Ok(TokenWithPos { token, line, col, start, end: self.pos })
    }

    fn lex_token(&mut self) -> Result<Token, SyntaxError> {
        let Some(ch) = self.peek() else { return Ok(Token::Eof) };
        let next = self.peek_second();

        let two = |lexer: &mut Self, tok: Token| -> Result<Token, SyntaxError> {
            lexer.advance();
            lexer.advance();
            Ok(tok)
        };
        let one = |lexer: &mut Self, tok: Token| -> Result<Token, SyntaxError> {
            lexer.advance();
            Ok(tok)
        };

        match (ch, next) {
            (':', Some('=')) => two(self, Token::ColonEqual),
            (':', _) => one(self, Token::Colon),
            ('=', Some('=')) => two(self, Token::EqEq),
            ('=', _) => one(self, Token::Equal),
            ('<', Some('<')) => two(self, Token::LessLess),
            ('<', Some('=')) => two(self, Token::LessEq),
            ('<', _) => one(self, Token::Less),
            ('>', Some('>')) => two(self, Token::GreaterGreater),
            ('>', Some('=')) => two(self, Token::GreaterEq),
            ('>', _) => one(self, Token::Greater),
            ('!', Some('=')) => two(self, Token::NotEq),
            ('-', Some('>')) => two(self, Token::Arrow),
            ('-', _) => one(self, Token::Minus),
            ('+', _) => one(self, Token::Plus),
            ('*', _) => one(self, Token::Star),
            ('/', Some('/')) => two(self, Token::SlashSlash),
            ('/', _) => one(self, Token::Slash),
            ('%', _) => one(self, Token::Percent),
            (',', _) => one(self, Token::Comma),
            ('.', _) => one(self, Token::Dot),
            ('(', _) | ('[', _) => {
                self.depth += 1;
                one(self, if ch == '(' { Token::LParen } else { Token::LBracket })
            }
            (')', _) | (']', _) => {
                if self.depth == 0 {
                    return Err(self.err(format!("unmatched {:?}", ch)));
                }
                self.depth -= 1;
                one(self, if ch == ')' { Token::RParen } else { Token::RBracket })
            }
            ('"', _) | ('\'', _) => self.lex_string(ch),
            (c, _) if c.is_ascii_digit() => self.lex_number(),
            (c, _) if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_ident_or_keyword()),
            (other, _) => Err(self.err(format!("unexpected character {:?}", other))),
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, SyntaxError> {
        self.advance(); // consume opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\\') => s.push('\\'),
                    Some('\'') => s.push('\''),
                    Some('"') => s.push('"'),
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => return Err(self.err("unterminated escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn lex_number(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.advance();
        }
        // `2.value` is an index followed by attribute access, not a float.
        let is_float = self.peek() == Some('.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit());
        if is_float {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.advance();
            }
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.err(format!("invalid number {:?}", text)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.err(format!("integer literal {:?} out of range", text)))
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        match &self.src[start..self.pos] {
            "defn" => Token::Defn,
            "pass" => Token::Pass,
            "if" => Token::If,
            "else" => Token::Else,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            word => Token::Ident(word.to_string()),
        }
    }
}
