//! Rule programs: parsed multi-statement formulas.
//!
//! A rule is a `;`-separated list of statements. `NAME := expr` binds a
//! working variable, `NAME : expr` binds an output variable. The program's
//! pick signal is the last output variable, falling back to the last
//! assignment when the rule declares no outputs. Parsing happens once per
//! rule; the resulting program is evaluated against every instrument.

use std::collections::BTreeMap;

use crate::domain::context::EvalContext;
use crate::domain::error::{EvalError, ParseError, ParseErrorKind};
use crate::domain::eval::eval_expr;
use crate::domain::lexer::{tokenize, Op, Token, TokenKind};
use crate::domain::parser::parse;
use crate::domain::ast::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `NAME := expr`
    Assign,
    /// `NAME : expr`
    Output,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub name: String,
    pub kind: StatementKind,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
    /// Variable whose final value decides the pick.
    pub output: String,
}

/// Snapshot metrics exported alongside a pick. Only these variables are
/// persisted; everything else a rule binds stays internal.
const METRIC_VARS: [(&str, &str); 5] = [
    ("J", "j"),
    ("短期趋势线", "short_trend_line"),
    ("知行多空线", "bull_bear_line"),
    ("振幅", "amplitude_pct"),
    ("涨跌幅", "change_pct"),
];

/// Result of running a program against one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub pick: bool,
    pub metrics: BTreeMap<String, f64>,
}

impl Program {
    pub fn parse(source: &str) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        let mut output = None;
        for (offset, segment) in split_statements(source) {
            let trimmed = segment.trim();
            if !trimmed.is_empty() {
                let stmt_offset = offset + (segment.len() - segment.trim_start().len());
                let stmt = parse_statement(trimmed)
                    .map_err(|e| e.rebase(stmt_offset))?;
                if stmt.kind == StatementKind::Output {
                    output = Some(stmt.name.clone());
                }
                statements.push(stmt);
            }
        }
        let Some(last) = statements.last() else {
            return Err(ParseError::new(
                ParseErrorKind::Syntax,
                "rule contains no statements",
                0,
            ));
        };
        let output = output.unwrap_or_else(|| last.name.clone());
        Ok(Program { statements, output })
    }

    /// Run every statement in order, then read the output variable. Statement
    /// order is the rule author's; later statements see earlier bindings.
    pub fn evaluate(&self, ctx: &mut EvalContext) -> Result<Evaluation, EvalError> {
        for stmt in &self.statements {
            let value = eval_expr(&stmt.expr, ctx)?;
            ctx.assign(&stmt.name, value);
        }
        let signal = ctx.resolve(&self.output)?;
        let pick = signal.last().map(|v| v != 0.0 && !v.is_nan()).unwrap_or(false);
        let mut metrics = BTreeMap::new();
        for (var, key) in METRIC_VARS {
            if let Some(value) = ctx.get(var) {
                if let Some(v) = value.last() {
                    if v.is_finite() {
                        metrics.insert(key.to_string(), v);
                    }
                }
            }
        }
        Ok(Evaluation { pick, metrics })
    }
}

/// Split a rule on `;`, ignoring separators inside single-quoted strings.
/// Yields (byte offset, segment) pairs in source order.
fn split_statements(source: &str) -> Vec<(usize, &str)> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut in_string = false;
    for (i, ch) in source.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            ';' if !in_string => {
                segments.push((start, &source[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push((start, &source[start..]));
    segments
}

fn parse_statement(stmt: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(stmt)?;
    let (name, kind, op_token) = match (tokens.first(), tokens.get(1)) {
        (
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }),
            Some(op @ Token {
                kind: TokenKind::Op(Op::Assign),
                ..
            }),
        ) => (name.clone(), StatementKind::Assign, op),
        (
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }),
            Some(op @ Token {
                kind: TokenKind::Op(Op::Colon),
                ..
            }),
        ) => (name.clone(), StatementKind::Output, op),
        _ => {
            return Err(ParseError::new(
                ParseErrorKind::Syntax,
                "statement must be NAME := expr or NAME : expr",
                tokens.first().map(|t| t.position).unwrap_or(0),
            ));
        }
    };
    let op_len = match kind {
        StatementKind::Assign => 2,
        StatementKind::Output => 1,
    };
    let expr_offset = op_token.position + op_len;
    let expr = parse(&stmt[expr_offset..]).map_err(|e| e.rebase(expr_offset))?;
    Ok(Statement { name, kind, expr })
}

impl ParseError {
    /// Shift the error position into an enclosing source's coordinates.
    fn rebase(mut self, offset: usize) -> Self {
        self.position += offset;
        self
    }
}
