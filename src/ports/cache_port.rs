//! Indicator cache port trait.

use chrono::NaiveDate;

use crate::domain::bar::Adjust;
use crate::domain::error::ScreenerError;
use crate::domain::indicator::IndicatorRow;

pub trait IndicatorCachePort {
    /// Stored indicator rows for one instrument within a date range,
    /// ascending by date. Rows with null fields are returned as-is; the
    /// cache engine decides what counts as missing.
    fn read_rows(
        &self,
        code: &str,
        adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, ScreenerError>;

    /// Insert or overwrite rows keyed (code, trade_date, adjust).
    fn upsert_rows(
        &self,
        code: &str,
        adjust: Adjust,
        rows: &[IndicatorRow],
    ) -> Result<(), ScreenerError>;
}
