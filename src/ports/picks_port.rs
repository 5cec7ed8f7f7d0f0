//! Pick persistence port trait.

use chrono::NaiveDate;

use crate::domain::error::ScreenerError;
use crate::domain::screener::PickResult;

pub trait PicksPort {
    /// Upsert picks into the day's result table, keyed (rule_name, code).
    fn record_picks(
        &self,
        trade_date: NaiveDate,
        rule_name: &str,
        picks: &[PickResult],
    ) -> Result<(), ScreenerError>;

    /// Drop per-day result tables older than the retention horizon.
    fn cleanup_expired(&self, keep_before: NaiveDate) -> Result<usize, ScreenerError>;
}
