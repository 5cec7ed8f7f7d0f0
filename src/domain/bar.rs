//! Daily price bar and instrument identity.

use chrono::NaiveDate;

/// One trading day for one instrument. Fields that may be absent in the source
/// data (volume, amount) carry NaN rather than an Option so they flow through
/// the formula interpreter unchanged.
#[derive(Debug, Clone)]
pub struct PriceBar {
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

impl PriceBar {
    pub fn flat(trade_date: NaiveDate, price: f64) -> Self {
        Self {
            trade_date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: f64::NAN,
            amount: f64::NAN,
        }
    }
}

/// Price adjustment mode for historical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjust {
    /// Raw exchange prices.
    Raw,
    /// Forward-adjusted (qfq).
    #[default]
    Forward,
    /// Backward-adjusted (hfq).
    Backward,
}

impl Adjust {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjust::Raw => "",
            Adjust::Forward => "qfq",
            Adjust::Backward => "hfq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "" | "raw" | "none" => Some(Adjust::Raw),
            "qfq" => Some(Adjust::Forward),
            "hfq" => Some(Adjust::Backward),
            _ => None,
        }
    }
}

impl std::fmt::Display for Adjust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument identity as listed in the universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub code: String,
    pub name: String,
    pub exchange: String,
}

impl Instrument {
    pub fn new(code: &str, name: &str, exchange: &str) -> Self {
        Self {
            code: code.trim().to_string(),
            name: name.to_string(),
            exchange: exchange.trim().to_uppercase(),
        }
    }
}
