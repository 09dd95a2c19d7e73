//! Tokenizer for Sakura source files.
//!
//! Line-oriented text with `#` comments. Identifiers may contain `-`; there
//! is no arithmetic in the language, so the only other uses of `-` are the
//! value-entry dash, the `->` arrow and a negative number sign.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Dash,
    Arrow,
    Colon,
    Comma,
    Semicolon,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    KwIf,
    KwElse,
    KwFor,
    KwIn,
    KwParallel,
    KwSequential,
    KwSubtree,
    KwTrue,
    KwFalse,
    KwNull,
    Eof,
}

impl TokenKind {
    /// Short description for "expected X but found Y" messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier \"{}\"", name),
            TokenKind::Str(text) => format!("string \"{}\"", text),
            TokenKind::Int(value) => format!("number {}", value),
            TokenKind::Float(value) => format!("number {}", value),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::LBracket => "\"[\"".to_string(),
            TokenKind::RBracket => "\"]\"".to_string(),
            TokenKind::LBrace => "\"{\"".to_string(),
            TokenKind::RBrace => "\"}\"".to_string(),
            TokenKind::LParen => "\"(\"".to_string(),
            TokenKind::RParen => "\")\"".to_string(),
            TokenKind::Dash => "\"-\"".to_string(),
            TokenKind::Arrow => "\"->\"".to_string(),
            TokenKind::Colon => "\":\"".to_string(),
            TokenKind::Comma => "\",\"".to_string(),
            TokenKind::Semicolon => "\";\"".to_string(),
            TokenKind::Assign => "\"=\"".to_string(),
            TokenKind::Equal => "\"==\"".to_string(),
            TokenKind::NotEqual => "\"!=\"".to_string(),
            TokenKind::Less => "\"<\"".to_string(),
            TokenKind::LessEqual => "\"<=\"".to_string(),
            TokenKind::Greater => "\">\"".to_string(),
            TokenKind::GreaterEqual => "\">=\"".to_string(),
            TokenKind::KwIf => "\"if\"".to_string(),
            TokenKind::KwElse => "\"else\"".to_string(),
            TokenKind::KwFor => "\"for\"".to_string(),
            TokenKind::KwIn => "\"in\"".to_string(),
            TokenKind::KwParallel => "\"parallel\"".to_string(),
            TokenKind::KwSequential => "\"sequential\"".to_string(),
            TokenKind::KwSubtree => "\"subtree\"".to_string(),
            TokenKind::KwTrue => "\"true\"".to_string(),
            TokenKind::KwFalse => "\"false\"".to_string(),
            TokenKind::KwNull => "\"null\"".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
    /// Span length in characters.
    pub length: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                    length: 0,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ':' => self.single(TokenKind::Colon),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '=' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::Equal
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::NotEqual
                    } else {
                        return Err(self.error("unexpected character \"!\"", line, column, 1));
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::LessEqual
                    } else {
                        TokenKind::Less
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    }
                }
                '-' => {
                    if self.peek_at(1) == Some('>') {
                        self.advance();
                        self.advance();
                        TokenKind::Arrow
                    } else if self.peek_at(1).is_some_and(|next| next.is_ascii_digit()) {
                        self.lex_number()?
                    } else {
                        self.single(TokenKind::Dash)
                    }
                }
                '"' => self.lex_string(line, column)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_ident(),
                other => {
                    return Err(self.error(
                        &format!("unexpected character \"{}\"", other),
                        line,
                        column,
                        1,
                    ));
                }
            };

            let length = self.column.saturating_sub(column).max(1);
            tokens.push(Token {
                kind,
                line,
                column,
                length,
            });
        }
    }

    fn error(&self, message: &str, line: usize, column: usize, length: usize) -> ParseError {
        ParseError::new(message, line, column, length, self.source)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn lex_string(&mut self, line: usize, column: usize) -> Result<TokenKind, ParseError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    // The span deliberately runs past the end of the line so
                    // the error renders the unclosed-string hint.
                    return Err(self.error(
                        "invalid string-literal",
                        line,
                        column,
                        text.chars().count() + 2,
                    ));
                }
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Str(text));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        other => {
                            return Err(self.error(
                                &format!(
                                    "unknown escape sequence \"\\{}\"",
                                    other.unwrap_or(' ')
                                ),
                                self.line,
                                self.column.saturating_sub(2),
                                2,
                            ));
                        }
                    }
                }
                Some(_) => {
                    let c = self.advance().unwrap_or_default();
                    text.push(c);
                }
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, ParseError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error("invalid number-literal", line, column, text.len()))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error("invalid number-literal", line, column, text.len()))
        }
    }

    fn lex_ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                // A trailing "->" must stay an arrow, not an ident tail.
                if c == '-' && self.peek_at(1) == Some('>') {
                    break;
                }
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match text.as_str() {
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "for" => TokenKind::KwFor,
            "in" => TokenKind::KwIn,
            "parallel" => TokenKind::KwParallel,
            "sequential" => TokenKind::KwSequential,
            "subtree" => TokenKind::KwSubtree,
            "true" => TokenKind::KwTrue,
            "false" => TokenKind::KwFalse,
            "null" => TokenKind::KwNull,
            _ => TokenKind::Ident(text),
        }
    }
}
