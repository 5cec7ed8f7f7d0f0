//! Runtime values produced by formula evaluation.
//!
//! Every bound name is either a scalar or a positional series; coercion to a
//! concrete series happens at operator boundaries, broadcasting scalars to the
//! context length.

use crate::domain::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
    Bools(Vec<bool>),
    Text(String),
}

impl Value {
    /// Coerce to an f64 series of length `len`. Bool series become 0.0/1.0.
    pub fn to_series(&self, len: usize) -> Result<Vec<f64>, EvalError> {
        match self {
            Value::Scalar(v) => Ok(vec![*v; len]),
            Value::Series(s) => Ok(s.clone()),
            Value::Bools(b) => Ok(b.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect()),
            Value::Text(_) => Err(EvalError::InvalidArguments {
                function: "<operator>".into(),
                reason: "string value used in numeric context".into(),
            }),
        }
    }

    /// Coerce to a bool series of length `len`. Numeric truth is "non-zero and
    /// non-NaN".
    pub fn to_bools(&self, len: usize) -> Result<Vec<bool>, EvalError> {
        match self {
            Value::Scalar(v) => Ok(vec![truthy(*v); len]),
            Value::Series(s) => Ok(s.iter().map(|&v| truthy(v)).collect()),
            Value::Bools(b) => Ok(b.clone()),
            Value::Text(_) => Err(EvalError::InvalidArguments {
                function: "<operator>".into(),
                reason: "string value used in boolean context".into(),
            }),
        }
    }

    /// Scalar view used for window arguments: a scalar as-is, a series by its
    /// last element.
    pub fn as_scalar(&self) -> Result<f64, EvalError> {
        match self {
            Value::Scalar(v) => Ok(*v),
            Value::Series(s) => s.last().copied().ok_or_else(|| EvalError::InvalidArguments {
                function: "<operator>".into(),
                reason: "empty series used as scalar".into(),
            }),
            Value::Bools(_) | Value::Text(_) => Err(EvalError::InvalidArguments {
                function: "<operator>".into(),
                reason: "expected a numeric scalar".into(),
            }),
        }
    }

    /// Final-position value used for the pick decision and metric snapshots.
    pub fn last(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Series(s) => s.last().copied(),
            Value::Bools(b) => b.last().map(|&v| if v { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }
}

fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_broadcasts() {
        let s = Value::Scalar(1.5).to_series(3).unwrap();
        assert_eq!(s, vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn bools_to_series_is_zero_one() {
        let s = Value::Bools(vec![true, false]).to_series(2).unwrap();
        assert_eq!(s, vec![1.0, 0.0]);
    }

    #[test]
    fn nan_is_false() {
        let b = Value::Series(vec![f64::NAN, 0.0, 2.0]).to_bools(3).unwrap();
        assert_eq!(b, vec![false, false, true]);
    }

    #[test]
    fn text_in_numeric_context_fails() {
        let err = Value::Text("ST".into()).to_series(2).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArguments { .. }));
    }

    #[test]
    fn as_scalar_takes_last_of_series() {
        assert_eq!(Value::Series(vec![1.0, 9.0]).as_scalar().unwrap(), 9.0);
        assert_eq!(Value::Scalar(3.0).as_scalar().unwrap(), 3.0);
        assert!(Value::Series(vec![]).as_scalar().is_err());
    }

    #[test]
    fn last_of_bools_maps_to_float() {
        assert_eq!(Value::Bools(vec![false, true]).last(), Some(1.0));
        assert_eq!(Value::Text("x".into()).last(), None);
    }
}
