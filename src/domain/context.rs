//! Per-instrument evaluation context.
//!
//! Holds the OHLCV columns for one instrument plus the variable table built up
//! by assignment statements. Name resolution checks user variables before base
//! fields, so a rule may shadow `C` if it really wants to.

use std::collections::HashMap;

use crate::domain::bar::{Instrument, PriceBar};
use crate::domain::error::EvalError;
use crate::domain::value::Value;

pub struct EvalContext {
    pub instrument: Instrument,
    len: usize,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    amount: Vec<f64>,
    variables: HashMap<String, Value>,
}

impl EvalContext {
    pub fn new(instrument: Instrument, bars: &[PriceBar]) -> Self {
        Self {
            instrument,
            len: bars.len(),
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            close: bars.iter().map(|b| b.close).collect(),
            volume: bars.iter().map(|b| b.volume).collect(),
            amount: bars.iter().map(|b| b.amount).collect(),
            variables: HashMap::new(),
        }
    }

    /// Number of bars in the window. Scalars broadcast to this length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Resolve an identifier: user variables first, then base-field aliases.
    pub fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.variables.get(name) {
            return Ok(value.clone());
        }
        let field = match name.to_uppercase().as_str() {
            "O" | "OPEN" => &self.open,
            "H" | "HIGH" => &self.high,
            "L" | "LOW" => &self.low,
            "C" | "CLOSE" => &self.close,
            "V" | "VOL" | "VOLUME" => &self.volume,
            "AMOUNT" => &self.amount,
            _ => return Err(EvalError::UndefinedSymbol(name.to_string())),
        };
        Ok(Value::Series(field.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> EvalContext {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = vec![PriceBar::flat(d, 10.0), PriceBar::flat(d, 11.0)];
        EvalContext::new(Instrument::new("300001", "特锐德", "SZ"), &bars)
    }

    #[test]
    fn base_field_aliases_resolve() {
        let ctx = ctx();
        for name in ["C", "CLOSE", "c", "close"] {
            let v = ctx.resolve(name).unwrap();
            assert_eq!(v, Value::Series(vec![10.0, 11.0]));
        }
        assert!(ctx.resolve("AMOUNT").is_ok());
    }

    #[test]
    fn variables_shadow_base_fields() {
        let mut ctx = ctx();
        ctx.assign("C", Value::Scalar(99.0));
        assert_eq!(ctx.resolve("C").unwrap(), Value::Scalar(99.0));
    }

    #[test]
    fn unknown_name_is_undefined_symbol() {
        let err = ctx().resolve("涨停板").unwrap_err();
        assert!(matches!(err, EvalError::UndefinedSymbol(_)));
    }
}
