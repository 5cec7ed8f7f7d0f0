//! Market-cap lookup ports.
//!
//! The store holds one snapshot per instrument per day; the provider is the
//! outbound dependency. The cache injects a clock so TTL behavior is testable.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::error::ScreenerError;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. The only `Clock` used outside of tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait MarketCapStorePort {
    /// Most recent stored snapshot: (snapshot date, value). A stored `None`
    /// value records that the provider had nothing for this code.
    fn load(&self, code: &str) -> Result<Option<(NaiveDate, Option<f64>)>, ScreenerError>;

    fn save(
        &self,
        code: &str,
        snapshot_date: NaiveDate,
        value: Option<f64>,
    ) -> Result<(), ScreenerError>;
}

pub trait MarketCapProviderPort {
    /// Total market cap in CNY. `Ok(None)` means the provider does not list
    /// the code; `Err` is a transport or upstream failure.
    fn fetch(&self, code: &str) -> Result<Option<f64>, ScreenerError>;
}
