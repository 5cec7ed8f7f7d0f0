//! Market data access port trait.

use chrono::NaiveDate;

use crate::domain::bar::{Adjust, Instrument, PriceBar};
use crate::domain::error::ScreenerError;

pub trait DataPort {
    /// Daily bars for one instrument, ascending by date, both ends inclusive.
    fn fetch_bars(
        &self,
        code: &str,
        adjust: Adjust,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScreenerError>;

    /// Every screenable instrument.
    fn list_universe(&self) -> Result<Vec<Instrument>, ScreenerError>;
}
