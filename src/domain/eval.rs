//! Expression evaluator.
//!
//! Walks an [`Expr`] against one [`EvalContext`], producing a [`Value`].
//! Arithmetic follows IEEE semantics so NaN flows through untouched and shows
//! up as `false` only at boolean boundaries. Comparisons involving NaN are
//! false, which keeps warm-up rows out of pick signals.

use crate::domain::ast::{BinOp, Builtin, CmpOp, Expr};
use crate::domain::context::EvalContext;
use crate::domain::error::EvalError;
use crate::domain::series;
use crate::domain::value::Value;

pub fn eval_expr(expr: &Expr, ctx: &EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(v) => Ok(Value::Scalar(*v)),
        Expr::Str(s) => Ok(Value::Text(s.clone())),
        Expr::Ident(name) => ctx.resolve(name),
        Expr::Neg(inner) => match eval_expr(inner, ctx)? {
            Value::Scalar(v) => Ok(Value::Scalar(-v)),
            other => {
                let s = other.to_series(ctx.len())?;
                Ok(Value::Series(s.into_iter().map(|v| -v).collect()))
            }
        },
        Expr::Not(inner) => {
            let b = eval_expr(inner, ctx)?.to_bools(ctx.len())?;
            Ok(Value::Bools(b.into_iter().map(|v| !v).collect()))
        }
        Expr::Binary(op, left, right) => {
            let lhs = eval_expr(left, ctx)?;
            let rhs = eval_expr(right, ctx)?;
            eval_binary(*op, &lhs, &rhs, ctx.len())
        }
        Expr::Compare(op, left, right) => {
            let lhs = eval_expr(left, ctx)?.to_series(ctx.len())?;
            let rhs = eval_expr(right, ctx)?.to_series(ctx.len())?;
            let out = lhs
                .iter()
                .zip(rhs.iter())
                .map(|(&a, &b)| match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Gt => a > b,
                    CmpOp::Le => a <= b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Eq => a == b,
                    CmpOp::Ne => a != b,
                })
                .collect();
            Ok(Value::Bools(out))
        }
        Expr::Call(builtin, args) => eval_call(*builtin, args, ctx),
    }
}

fn eval_binary(op: BinOp, lhs: &Value, rhs: &Value, len: usize) -> Result<Value, EvalError> {
    match op {
        BinOp::And | BinOp::Or => {
            let a = lhs.to_bools(len)?;
            let b = rhs.to_bools(len)?;
            let out = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| match op {
                    BinOp::And => x && y,
                    _ => x || y,
                })
                .collect();
            Ok(Value::Bools(out))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            // Scalar op scalar stays scalar so window arguments like 5+5
            // still work; anything else becomes a full series.
            if let (Value::Scalar(a), Value::Scalar(b)) = (lhs, rhs) {
                return Ok(Value::Scalar(apply(op, *a, *b)));
            }
            let a = lhs.to_series(len)?;
            let b = rhs.to_series(len)?;
            let out = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| apply(op, x, y))
                .collect();
            Ok(Value::Series(out))
        }
    }
}

fn apply(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::And | BinOp::Or => unreachable!("boolean ops handled separately"),
    }
}

fn eval_call(builtin: Builtin, args: &[Expr], ctx: &EvalContext) -> Result<Value, EvalError> {
    match builtin {
        Builtin::Ref => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            Ok(Value::Series(series::shift(&x, n)))
        }
        Builtin::Ma => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            Ok(Value::Series(series::rolling_mean(&x, n)))
        }
        Builtin::Ema => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            Ok(Value::Series(series::ema_span(&x, n)))
        }
        Builtin::Sma => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            let m = window_arg(builtin, &eval_expr(&args[2], ctx)?)?;
            if m > n {
                return Err(EvalError::InvalidArguments {
                    function: builtin.name().to_string(),
                    reason: format!("weight {m} exceeds period {n}"),
                });
            }
            Ok(Value::Series(series::sma_recursive(&x, n, m)))
        }
        Builtin::Llv => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            Ok(Value::Series(series::rolling_min(&x, n)))
        }
        Builtin::Hhv => {
            let x = eval_expr(&args[0], ctx)?.to_series(ctx.len())?;
            let n = window_arg(builtin, &eval_expr(&args[1], ctx)?)?;
            Ok(Value::Series(series::rolling_max(&x, n)))
        }
        Builtin::Inblock => {
            let block = text_arg(builtin, &eval_expr(&args[0], ctx)?)?;
            let hit = in_block(&block, &ctx.instrument.code, &ctx.instrument.exchange);
            Ok(Value::Scalar(if hit { 1.0 } else { 0.0 }))
        }
        Builtin::Namelike => {
            let pattern = text_arg(builtin, &eval_expr(&args[0], ctx)?)?;
            let hit = name_like(&pattern, &ctx.instrument.name).map_err(|reason| {
                EvalError::InvalidArguments {
                    function: builtin.name().to_string(),
                    reason,
                }
            })?;
            Ok(Value::Scalar(if hit { 1.0 } else { 0.0 }))
        }
    }
}

/// Validate a window/period argument. A series is read by its final element,
/// matching how rule authors pass previously assigned values.
fn window_arg(builtin: Builtin, value: &Value) -> Result<usize, EvalError> {
    let v = value.as_scalar().map_err(|_| EvalError::InvalidArguments {
        function: builtin.name().to_string(),
        reason: "window argument must be numeric".to_string(),
    })?;
    if !v.is_finite() || v < 1.0 {
        return Err(EvalError::InvalidArguments {
            function: builtin.name().to_string(),
            reason: format!("window must be a positive number, got {v}"),
        });
    }
    Ok(v as usize)
}

fn text_arg(builtin: Builtin, value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(EvalError::InvalidArguments {
            function: builtin.name().to_string(),
            reason: "expected a string literal".to_string(),
        }),
    }
}

/// Board membership by code prefix (and exchange for the Beijing board).
/// Block names outside the table never match.
fn in_block(block: &str, code: &str, exchange: &str) -> bool {
    match block {
        "创业板" => ["300", "301", "302"].iter().any(|p| code.starts_with(p)),
        "科创板" => ["688", "689"].iter().any(|p| code.starts_with(p)),
        "北证A股" | "北证" => {
            exchange.eq_ignore_ascii_case("BJ")
                || ["83", "87", "88", "92"].iter().any(|p| code.starts_with(p))
        }
        _ => false,
    }
}

/// Substring match, or a wildcard match anywhere in the name when the
/// pattern contains `*`. Wildcard patterns compile through the regex crate
/// with everything else escaped. The empty pattern never matches.
fn name_like(pattern: &str, name: &str) -> Result<bool, String> {
    if pattern.is_empty() {
        return Ok(false);
    }
    if !pattern.contains('*') {
        return Ok(name.contains(pattern));
    }
    let regex_body: String = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let re = regex::Regex::new(&regex_body).map_err(|e| format!("bad name pattern: {e}"))?;
    Ok(re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::{Instrument, PriceBar};
    use crate::domain::parser::parse;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ctx_with_closes(closes: &[f64]) -> EvalContext {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bars: Vec<PriceBar> = closes.iter().map(|&c| PriceBar::flat(d, c)).collect();
        EvalContext::new(Instrument::new("300750", "宁德时代", "SZ"), &bars)
    }

    fn eval(src: &str, ctx: &EvalContext) -> Value {
        eval_expr(&parse(src).unwrap(), ctx).unwrap()
    }

    #[test]
    fn arithmetic_on_series() {
        let ctx = ctx_with_closes(&[10.0, 20.0]);
        assert_eq!(
            eval("C * 2 + 1", &ctx),
            Value::Series(vec![21.0, 41.0])
        );
    }

    #[test]
    fn scalar_arithmetic_stays_scalar() {
        let ctx = ctx_with_closes(&[10.0]);
        assert_eq!(eval("2 + 3", &ctx), Value::Scalar(5.0));
    }

    #[test]
    fn ref_compare_on_rising_closes() {
        let ctx = ctx_with_closes(&[1.0, 2.0, 3.0]);
        // First row compares against the NaN shifted in, so it is false.
        assert_eq!(
            eval("C > REF(C, 1)", &ctx),
            Value::Bools(vec![false, true, true])
        );
    }

    #[test]
    fn nan_comparison_is_false() {
        let ctx = ctx_with_closes(&[1.0, 2.0]);
        assert_eq!(
            eval("REF(C, 5) > 0", &ctx),
            Value::Bools(vec![false, false])
        );
    }

    #[test]
    fn and_or_not() {
        let ctx = ctx_with_closes(&[1.0, 2.0, 3.0]);
        assert_eq!(
            eval("C > 1 AND C < 3", &ctx),
            Value::Bools(vec![false, true, false])
        );
        assert_eq!(
            eval("NOT (C > 1)", &ctx),
            Value::Bools(vec![true, false, false])
        );
    }

    #[test]
    fn window_arg_from_expression() {
        let ctx = ctx_with_closes(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(eval("MA(C, 2+2)", &ctx), eval("MA(C, 4)", &ctx));
    }

    #[test]
    fn window_must_be_positive() {
        let ctx = ctx_with_closes(&[1.0, 2.0]);
        let err = eval_expr(&parse("MA(C, 0)").unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArguments { .. }));
    }

    #[test]
    fn sma_weight_must_not_exceed_period() {
        let ctx = ctx_with_closes(&[1.0, 2.0]);
        let err = eval_expr(&parse("SMA(C, 3, 5)").unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArguments { .. }));
    }

    #[test]
    fn inblock_by_code_prefix() {
        let ctx = ctx_with_closes(&[1.0]);
        assert_eq!(eval("INBLOCK('创业板')", &ctx), Value::Scalar(1.0));
        assert_eq!(eval("INBLOCK('科创板')", &ctx), Value::Scalar(0.0));
    }

    #[test]
    fn inblock_beijing_by_exchange() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bars = vec![PriceBar::flat(d, 1.0)];
        let ctx = EvalContext::new(Instrument::new("430047", "诺思兰德", "BJ"), &bars);
        assert_eq!(eval("INBLOCK('北证')", &ctx), Value::Scalar(1.0));
    }

    #[test]
    fn inblock_unknown_block_is_false() {
        let ctx = ctx_with_closes(&[1.0]);
        assert_eq!(eval("INBLOCK('主板')", &ctx), Value::Scalar(0.0));
    }

    #[test]
    fn namelike_substring_and_wildcard() {
        let ctx = ctx_with_closes(&[1.0]); // name 宁德时代
        assert_eq!(eval("NAMELIKE('时代')", &ctx), Value::Scalar(1.0));
        assert_eq!(eval("NAMELIKE('宁*代')", &ctx), Value::Scalar(1.0));
        assert_eq!(eval("NAMELIKE('*ST*')", &ctx), Value::Scalar(0.0));
        assert_eq!(eval("NAMELIKE('宁德')", &ctx), Value::Scalar(1.0));
        // Wildcard patterns match anywhere, not the whole name.
        assert_eq!(eval("NAMELIKE('宁*时')", &ctx), Value::Scalar(1.0));
        assert_eq!(eval("NAMELIKE('德*代')", &ctx), Value::Scalar(1.0));
        assert_eq!(eval("NAMELIKE('')", &ctx), Value::Scalar(0.0));
    }

    #[test]
    fn ma_over_shifted_series_recovers_after_the_nan_head() {
        let ctx = ctx_with_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let Value::Series(out) = eval("MA(REF(C, 1), 2)", &ctx) else {
            panic!("expected a series");
        };
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 1.0);
        assert_relative_eq!(out[2], 1.5);
        assert_relative_eq!(out[3], 2.5);
        assert_relative_eq!(out[4], 3.5);
    }

    #[test]
    fn undefined_symbol_propagates() {
        let ctx = ctx_with_closes(&[1.0]);
        let err = eval_expr(&parse("ZDF > 5").unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, EvalError::UndefinedSymbol(_)));
    }

    #[test]
    fn empty_window_evaluates_to_empty_series() {
        let ctx = ctx_with_closes(&[]);
        assert_eq!(eval("MA(C, 5)", &ctx), Value::Series(vec![]));
    }
}
