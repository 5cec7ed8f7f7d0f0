//! Recursive descent parser for formula expressions.
//!
//! Precedence low to high: OR, AND, NOT (prefix), comparison (non-chaining),
//! additive, multiplicative, unary sign, primary. Produces an [`Expr`] that is
//! evaluated once per instrument; parsing happens once per rule file.

use crate::domain::ast::{BinOp, Builtin, CmpOp, Expr};
use crate::domain::error::{ParseError, ParseErrorKind};
use crate::domain::lexer::{tokenize, Keyword, Op, Token, TokenKind};

struct Parser {
    tokens: Vec<Token>,
    i: usize,
    input_len: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, input_len: usize) -> Self {
        Self {
            tokens,
            i: 0,
            input_len,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.i)
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.input_len)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.i).cloned();
        if tok.is_some() {
            self.i += 1;
        }
        tok
    }

    fn peek_op(&self) -> Option<Op> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    fn consume_op(&mut self, op: Op) -> bool {
        if self.peek_op() == Some(op) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: Op, what: &str) -> Result<(), ParseError> {
        if self.consume_op(op) {
            Ok(())
        } else {
            Err(ParseError::new(
                ParseErrorKind::Syntax,
                format!("expected {what}"),
                self.position(),
            ))
        }
    }

    fn consume_keyword(&mut self, kw: Keyword) -> bool {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Keyword(k),
                ..
            }) if *k == kw => {
                self.i += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.consume_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.consume_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.consume_keyword(Keyword::Not) {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    /// Non-chaining: at most one comparison operator is consumed, so `a<b<c`
    /// is a syntax error rather than a boolean-versus-number comparison.
    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add()?;
        let op = match self.peek_op() {
            Some(Op::Lt) => CmpOp::Lt,
            Some(Op::Gt) => CmpOp::Gt,
            Some(Op::Le) => CmpOp::Le,
            Some(Op::Ge) => CmpOp::Ge,
            Some(Op::Eq) => CmpOp::Eq,
            Some(Op::Ne) => CmpOp::Ne,
            _ => return Ok(left),
        };
        self.i += 1;
        let right = self.parse_add()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek_op() {
                Some(Op::Plus) => BinOp::Add,
                Some(Op::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.i += 1;
            let right = self.parse_mul()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_op() {
                Some(Op::Star) => BinOp::Mul,
                Some(Op::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.i += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.consume_op(Op::Plus) {
            return self.parse_unary();
        }
        if self.consume_op(Op::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        let Some(token) = self.bump() else {
            return Err(ParseError::new(
                ParseErrorKind::Syntax,
                "unexpected end of expression",
                position,
            ));
        };
        match token.kind {
            TokenKind::Number(v) => Ok(Expr::Number(v)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Ident(name) => {
                if self.peek_op() == Some(Op::LParen) {
                    self.parse_call(&name, position)
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            TokenKind::Op(Op::LParen) => {
                let inner = self.parse_expr()?;
                self.expect_op(Op::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ParseError::new(
                ParseErrorKind::Syntax,
                format!("unexpected token {other:?}"),
                position,
            )),
        }
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Expr, ParseError> {
        let builtin = Builtin::from_name(name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnknownFunction,
                format!("unknown function: {name}"),
                position,
            )
        })?;
        self.expect_op(Op::LParen, "'('")?;
        let mut args = Vec::new();
        if self.peek_op() != Some(Op::RParen) {
            args.push(self.parse_expr()?);
            while self.consume_op(Op::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect_op(Op::RParen, "')'")?;
        if args.len() != builtin.arity() {
            return Err(ParseError::new(
                ParseErrorKind::BadArity,
                format!(
                    "{} expects {} argument(s), got {}",
                    builtin.name(),
                    builtin.arity(),
                    args.len()
                ),
                position,
            ));
        }
        Ok(Expr::Call(builtin, args))
    }
}

/// Parse one expression; trailing input is an error.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens, input.len());
    let expr = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(ParseError::new(
            ParseErrorKind::Syntax,
            "unexpected input after expression",
            tok.position,
        ));
    }
    Ok(expr)
}
