//! Parser for the Sakura surface grammar.
//!
//! One source file parses into one [`TreeItem`]: an `[id]` header, declared
//! parameters as `- key = value` lines, then a statement list forming an
//! implicit sequential body.
//!
//! ```text
//! [greet-tree]
//! - who = "world"
//!
//! special("say hello") {
//!     -> print {
//!         - text = "hello {{who}}"
//!     }
//! }
//! ```
//!
//! Statements are blossom groups (`type ("id") { ... }`), `parallel`/
//! `sequential` blocks, `if (a == b)` branches, `for` loops (`for (i = a;
//! i < b)` ranges and `for (x in xs)` iteration) and `subtree ("id")` calls.
//! A bare identifier in value position desugars to the interpolation string
//! `"{{ident}}"`, so the item tree stores plain value maps.

mod lexer;

use std::collections::HashSet;
use std::fmt;

use lexer::{Lexer, Token, TokenKind};

use crate::item::{
    BlossomGroupItem, BlossomItem, Comparator, Condition, Expression, ForEachItem, ForItem,
    IfItem, ParallelItem, SakuraItem, SequentialItem, SubtreeItem, TreeItem,
};
use crate::value::{Value, ValueMap};

/// A rejected source file, with the position and fragment of the offence.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    /// The offending slice of the source line, when the span fits on it.
    pub fragment: Option<String>,
}

impl ParseError {
    pub(crate) fn new(
        message: &str,
        line: usize,
        column: usize,
        length: usize,
        source: &str,
    ) -> Self {
        let fragment = source.lines().nth(line.saturating_sub(1)).and_then(|text| {
            let chars: Vec<char> = text.chars().collect();
            let start = column.saturating_sub(1);
            let end = start + length.max(1);
            if end <= chars.len() {
                Some(chars[start..end].iter().collect())
            } else {
                None
            }
        });

        Self {
            message: message.to_string(),
            line,
            column,
            length,
            fragment,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows = vec![
            ("component", "sakura-parser".to_string()),
            ("source", "while parsing sakura-file".to_string()),
            ("message", self.message.clone()),
            ("line-number", self.line.to_string()),
        ];
        match &self.fragment {
            Some(fragment) => {
                rows.push(("position in line", self.column.to_string()));
                rows.push(("broken part in string", format!("\"{}\"", fragment)));
            }
            None => {
                rows.push((
                    "position in line",
                    "UNKNOWN POSITION (maybe a string was not closed)".to_string(),
                ));
            }
        }
        write!(f, "{}", crate::error::render_rows(&rows))
    }
}

impl std::error::Error for ParseError {}

/// Parses one source file into a tree item.
///
/// `root_path` and `relative_path` are recorded for diagnostics; the garden
/// passes its own root and the file's normalized key.
pub fn parse_tree(
    source: &str,
    root_path: &str,
    relative_path: &str,
) -> Result<TreeItem, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source,
    };
    parser.parse_tree(root_path, relative_path)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: &str) -> ParseError {
        ParseError::new(message, token.line, token.column, token.length, self.source)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.next();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.error_at(
                &token,
                &format!(
                    "expected {} but found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Token), ParseError> {
        let token = self.next();
        match &token.kind {
            TokenKind::Ident(name) => Ok((name.clone(), token.clone())),
            other => Err(self.error_at(
                &token,
                &format!("expected identifier but found {}", other.describe()),
            )),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        let token = self.next();
        match &token.kind {
            TokenKind::Str(text) => Ok(text.clone()),
            other => Err(self.error_at(
                &token,
                &format!("expected string but found {}", other.describe()),
            )),
        }
    }

    fn parse_tree(
        &mut self,
        root_path: &str,
        relative_path: &str,
    ) -> Result<TreeItem, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let (id, _) = self.expect_ident()?;
        self.expect(TokenKind::RBracket)?;

        // Declared parameters with defaults.
        let mut values = ValueMap::new();
        while self.peek().kind == TokenKind::Dash {
            self.next();
            let (key, key_token) = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            let value = self.parse_value()?;
            if values.insert(key.clone(), value).is_some() {
                return Err(
                    self.error_at(&key_token, &format!("duplicate value-key \"{}\"", key))
                );
            }
        }

        let children = self.parse_statements(false)?;

        Ok(TreeItem {
            id,
            root_path: root_path.to_string(),
            relative_path: relative_path.to_string(),
            values,
            body: Box::new(SakuraItem::Sequential(SequentialItem { children })),
        })
    }

    /// Parses statements until `}` (inside a block) or end of file.
    ///
    /// Group and subtree ids must be unique within one container.
    fn parse_statements(&mut self, inside_block: bool) -> Result<Vec<SakuraItem>, ParseError> {
        let mut children = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Eof => {
                    if inside_block {
                        return Err(self.error_at(&token, "unexpected end of file inside block"));
                    }
                    return Ok(children);
                }
                TokenKind::RBrace if inside_block => {
                    self.next();
                    return Ok(children);
                }
                TokenKind::KwParallel => {
                    self.next();
                    self.expect(TokenKind::LBrace)?;
                    let inner = self.parse_statements(true)?;
                    children.push(SakuraItem::Parallel(ParallelItem { children: inner }));
                }
                TokenKind::KwSequential => {
                    self.next();
                    self.expect(TokenKind::LBrace)?;
                    let inner = self.parse_statements(true)?;
                    children.push(SakuraItem::Sequential(SequentialItem { children: inner }));
                }
                TokenKind::KwIf => {
                    children.push(self.parse_if()?);
                }
                TokenKind::KwFor => {
                    children.push(self.parse_for()?);
                }
                TokenKind::KwSubtree => {
                    children.push(self.parse_subtree()?);
                }
                TokenKind::Ident(_) => {
                    let group = self.parse_blossom_group()?;
                    if !group.id.is_empty() && !seen_ids.insert(group.id.clone()) {
                        return Err(self.error_at(
                            &token,
                            &format!("duplicate item-id \"{}\" in container", group.id),
                        ));
                    }
                    children.push(SakuraItem::BlossomGroup(group));
                }
                other => {
                    return Err(self.error_at(
                        &token,
                        &format!("unexpected {} at start of statement", other.describe()),
                    ));
                }
            }
        }
    }

    /// `group_type [ "(" id ")" ] "{" entries and "->" blossoms "}"`
    fn parse_blossom_group(&mut self) -> Result<BlossomGroupItem, ParseError> {
        let (group_type, _) = self.expect_ident()?;

        let mut id = String::new();
        if self.peek().kind == TokenKind::LParen {
            self.next();
            id = self.expect_string()?;
            self.expect(TokenKind::RParen)?;
        }

        self.expect(TokenKind::LBrace)?;
        let mut values = ValueMap::new();
        let mut blossoms = Vec::new();

        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::RBrace => {
                    self.next();
                    break;
                }
                TokenKind::Dash => {
                    self.next();
                    let (key, key_token) = self.expect_ident()?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_value()?;
                    if values.insert(key.clone(), value).is_some() {
                        return Err(self
                            .error_at(&key_token, &format!("duplicate value-key \"{}\"", key)));
                    }
                }
                TokenKind::Arrow => {
                    self.next();
                    let (blossom_type, _) = self.expect_ident()?;
                    let mut blossom = BlossomItem::new(blossom_type);
                    self.expect(TokenKind::LBrace)?;
                    blossom.values = self.parse_value_entries()?;
                    blossoms.push(blossom);
                }
                other => {
                    return Err(self.error_at(
                        &token,
                        &format!("unexpected {} inside blossom-group", other.describe()),
                    ));
                }
            }
        }

        // A group with no explicit children is a single call to its own type.
        if blossoms.is_empty() {
            blossoms.push(BlossomItem::new(group_type.clone()));
        }

        Ok(BlossomGroupItem {
            group_type,
            id,
            name_hierarchy: Vec::new(),
            values,
            blossoms,
        })
    }

    /// `- key = value` entries until `}`.
    fn parse_value_entries(&mut self) -> Result<ValueMap, ParseError> {
        let mut values = ValueMap::new();
        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::RBrace => {
                    self.next();
                    return Ok(values);
                }
                TokenKind::Dash => {
                    self.next();
                    let (key, key_token) = self.expect_ident()?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_value()?;
                    if values.insert(key.clone(), value).is_some() {
                        return Err(self
                            .error_at(&key_token, &format!("duplicate value-key \"{}\"", key)));
                    }
                }
                other => {
                    return Err(self.error_at(
                        &token,
                        &format!("expected \"-\" or \"}}\" but found {}", other.describe()),
                    ));
                }
            }
        }
    }

    /// `if ( expr cmp expr ) { ... } [ else { ... } ]`
    fn parse_if(&mut self) -> Result<SakuraItem, ParseError> {
        self.expect(TokenKind::KwIf)?;
        self.expect(TokenKind::LParen)?;
        let left = self.parse_expression()?;
        let op = self.parse_comparator()?;
        let right = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::LBrace)?;
        let then_children = self.parse_statements(true)?;

        let else_children = if self.peek().kind == TokenKind::KwElse {
            self.next();
            self.expect(TokenKind::LBrace)?;
            self.parse_statements(true)?
        } else {
            Vec::new()
        };

        Ok(SakuraItem::If(Box::new(IfItem {
            condition: Condition { left, op, right },
            then_body: SakuraItem::Sequential(SequentialItem {
                children: then_children,
            }),
            else_body: SakuraItem::Sequential(SequentialItem {
                children: else_children,
            }),
        })))
    }

    /// `for ( i = start ; i < end ) { ... }` or `for ( x in xs ) { ... }`
    fn parse_for(&mut self) -> Result<SakuraItem, ParseError> {
        self.expect(TokenKind::KwFor)?;
        self.expect(TokenKind::LParen)?;
        let (var, var_token) = self.expect_ident()?;

        let token = self.next();
        match token.kind {
            TokenKind::KwIn => {
                let iterable = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::LBrace)?;
                let children = self.parse_statements(true)?;
                Ok(SakuraItem::ForEach(Box::new(ForEachItem {
                    var,
                    iterable,
                    body: SakuraItem::Sequential(SequentialItem { children }),
                })))
            }
            TokenKind::Assign => {
                let start = self.parse_expression()?;
                self.expect(TokenKind::Semicolon)?;
                let (counter, counter_token) = self.expect_ident()?;
                if counter != var {
                    return Err(self.error_at(
                        &counter_token,
                        &format!(
                            "loop condition must use the loop variable \"{}\" but found \"{}\"",
                            var, counter
                        ),
                    ));
                }
                self.expect(TokenKind::Less)?;
                let end = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::LBrace)?;
                let children = self.parse_statements(true)?;
                Ok(SakuraItem::For(Box::new(ForItem {
                    var,
                    start,
                    end,
                    body: SakuraItem::Sequential(SequentialItem { children }),
                })))
            }
            other => Err(self.error_at(
                &var_token,
                &format!("expected \"=\" or \"in\" but found {}", other.describe()),
            )),
        }
    }

    /// `subtree ( "id" ) [ "{" entries "}" ]`
    fn parse_subtree(&mut self) -> Result<SakuraItem, ParseError> {
        self.expect(TokenKind::KwSubtree)?;
        self.expect(TokenKind::LParen)?;
        let referenced_id = self.expect_string()?;
        self.expect(TokenKind::RParen)?;

        let values = if self.peek().kind == TokenKind::LBrace {
            self.next();
            self.parse_value_entries()?
        } else {
            ValueMap::new()
        };

        Ok(SakuraItem::Subtree(SubtreeItem {
            referenced_id,
            values,
        }))
    }

    fn parse_comparator(&mut self) -> Result<Comparator, ParseError> {
        let token = self.next();
        match &token.kind {
            TokenKind::Equal => Ok(Comparator::Equal),
            TokenKind::NotEqual => Ok(Comparator::NotEqual),
            TokenKind::Less => Ok(Comparator::Less),
            TokenKind::LessEqual => Ok(Comparator::LessEqual),
            TokenKind::Greater => Ok(Comparator::Greater),
            TokenKind::GreaterEqual => Ok(Comparator::GreaterEqual),
            other => Err(self.error_at(
                &token,
                &format!(
                    "expected comparison operator but found {}",
                    other.describe()
                ),
            )),
        }
    }

    /// Expression in an `if`/`for` head: a literal or an environment name.
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.next();
                Ok(Expression::Ident(name.clone()))
            }
            _ => Ok(Expression::Literal(self.parse_literal()?)),
        }
    }

    /// Value in a `- key = ...` entry. Bare identifiers desugar to their
    /// interpolation form so the item tree stores plain values.
    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                self.next();
                Ok(Value::String(format!("{{{{{}}}}}", name)))
            }
            _ => self.parse_literal(),
        }
    }

    fn parse_literal(&mut self) -> Result<Value, ParseError> {
        let token = self.next();
        match &token.kind {
            TokenKind::KwNull => Ok(Value::Null),
            TokenKind::KwTrue => Ok(Value::Bool(true)),
            TokenKind::KwFalse => Ok(Value::Bool(false)),
            TokenKind::Int(value) => Ok(Value::Int(*value)),
            TokenKind::Float(value) => Ok(Value::Float(*value)),
            TokenKind::Str(text) => Ok(Value::String(text.clone())),
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if self.peek().kind == TokenKind::RBracket {
                    self.next();
                    return Ok(Value::Array(items));
                }
                loop {
                    items.push(self.parse_value()?);
                    let separator = self.next();
                    match &separator.kind {
                        TokenKind::Comma => continue,
                        TokenKind::RBracket => return Ok(Value::Array(items)),
                        other => {
                            return Err(self.error_at(
                                &separator,
                                &format!(
                                    "expected \",\" or \"]\" but found {}",
                                    other.describe()
                                ),
                            ));
                        }
                    }
                }
            }
            TokenKind::LBrace => {
                let mut entries = ValueMap::new();
                if self.peek().kind == TokenKind::RBrace {
                    self.next();
                    return Ok(Value::Map(entries));
                }
                loop {
                    let (key, _) = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    entries.insert(key, self.parse_value()?);
                    let separator = self.next();
                    match &separator.kind {
                        TokenKind::Comma => continue,
                        TokenKind::RBrace => return Ok(Value::Map(entries)),
                        other => {
                            return Err(self.error_at(
                                &separator,
                                &format!(
                                    "expected \",\" or \"}}\" but found {}",
                                    other.describe()
                                ),
                            ));
                        }
                    }
                }
            }
            other => Err(self.error_at(
                &token,
                &format!("expected value but found {}", other.describe()),
            )),
        }
    }
}
