//! Formula tokenizer.
//!
//! Turns TDX formula source into a flat token stream. Identifiers may contain
//! CJK characters (rule files routinely name variables in Chinese); keywords
//! AND/OR/NOT are recognized case-insensitively.

use crate::domain::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    Op(Op),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Colon,
    Assign,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        let value = text.parse::<f64>().map_err(|_| {
            ParseError::new(ParseErrorKind::Lex, format!("invalid number: {text}"), start)
        })?;
        Ok(Token {
            kind: TokenKind::Number(value),
            position: start,
        })
    }

    fn lex_string(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.advance(); // opening quote
        let body_start = self.pos;
        loop {
            match self.peek() {
                Some('\'') => {
                    let body = self.input[body_start..self.pos].to_string();
                    self.advance();
                    return Ok(Token {
                        kind: TokenKind::Str(body),
                        position: start,
                    });
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return Err(ParseError::new(
                        ParseErrorKind::Lex,
                        "unterminated string literal",
                        start,
                    ));
                }
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word = &self.input[start..self.pos];
        let kind = match word.to_uppercase().as_str() {
            "AND" => TokenKind::Keyword(Keyword::And),
            "OR" => TokenKind::Keyword(Keyword::Or),
            "NOT" => TokenKind::Keyword(Keyword::Not),
            _ => TokenKind::Ident(word.to_string()),
        };
        Token {
            kind,
            position: start,
        }
    }

    fn lex_operator(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        // Two-character operators first.
        for (text, op) in [
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("<>", Op::Ne),
            ("!=", Op::Ne),
            ("==", Op::Eq),
            (":=", Op::Assign),
        ] {
            if self.consume_exact(text) {
                return Ok(Token {
                    kind: TokenKind::Op(op),
                    position: start,
                });
            }
        }
        let op = match self.peek() {
            Some('+') => Op::Plus,
            Some('-') => Op::Minus,
            Some('*') => Op::Star,
            Some('/') => Op::Slash,
            Some('(') => Op::LParen,
            Some(')') => Op::RParen,
            Some(',') => Op::Comma,
            Some(':') => Op::Colon,
            Some('<') => Op::Lt,
            Some('>') => Op::Gt,
            Some(ch) => {
                return Err(ParseError::new(
                    ParseErrorKind::Lex,
                    format!("unexpected character '{ch}'"),
                    start,
                ));
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::Lex,
                    "unexpected end of input",
                    start,
                ));
            }
        };
        self.advance();
        Ok(Token {
            kind: TokenKind::Op(op),
            position: start,
        })
    }
}

/// Tokenize one expression. Whitespace is discarded.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        lexer.skip_whitespace();
        let Some(ch) = lexer.peek() else {
            break;
        };
        let token = if ch.is_ascii_digit() {
            lexer.lex_number()?
        } else if ch == '\'' {
            lexer.lex_string()?
        } else if ch.is_alphanumeric() || ch == '_' {
            lexer.lex_ident()
        } else {
            lexer.lex_operator()?
        };
        tokens.push(token);
    }
    Ok(tokens)
}
