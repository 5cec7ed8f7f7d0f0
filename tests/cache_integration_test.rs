//! Incremental indicator cache behavior over a mocked store.

mod common;

use common::*;
use tdxscreen::domain::bar::Adjust;
use tdxscreen::domain::cache::load_enriched;
use tdxscreen::domain::indicator::enrich;

#[test]
fn thirty_day_window_with_three_missing_days_backfills_exactly_three_rows() {
    let closes: Vec<f64> = (0..30).map(|i| 20.0 + (i % 6) as f64 * 0.4).collect();
    let bars = bars_from_closes(&closes);
    let cache = MockCachePort::default();

    // Seed every row, then knock out days 10..=12.
    let rows = load_enriched(&bars, &cache, "300750", Adjust::Forward).unwrap();
    assert_eq!(rows.len(), 30);
    {
        let mut stored = cache.rows.borrow_mut();
        for offset in 9..12 {
            stored.remove(&trading_day(offset)).unwrap();
        }
    }

    let refreshed = load_enriched(&bars, &cache, "300750", Adjust::Forward).unwrap();
    assert_eq!(refreshed.len(), 30);
    assert_eq!(*cache.upsert_sizes.borrow(), vec![30, 3]);
    // The backfilled rows match a clean full recompute.
    assert_eq!(refreshed, enrich(&bars));
}

#[test]
fn complete_cache_serves_reads_without_writes() {
    let bars = bars_from_closes(&[10.0, 10.2, 10.1, 10.4, 10.6]);
    let cache = MockCachePort::default();
    load_enriched(&bars, &cache, "000001", Adjust::Forward).unwrap();
    let writes_after_seed = cache.upsert_sizes.borrow().len();

    let rows = load_enriched(&bars, &cache, "000001", Adjust::Forward).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(cache.upsert_sizes.borrow().len(), writes_after_seed);
}

#[test]
fn null_field_in_a_stored_row_forces_recompute() {
    let bars = bars_from_closes(&[10.0, 10.2, 10.1, 10.4]);
    let cache = MockCachePort::default();
    load_enriched(&bars, &cache, "000001", Adjust::Forward).unwrap();
    cache
        .rows
        .borrow_mut()
        .get_mut(&trading_day(2))
        .unwrap()
        .bull_bear_line = None;

    let rows = load_enriched(&bars, &cache, "000001", Adjust::Forward).unwrap();
    assert!(rows.iter().all(|r| r.is_complete()));
    assert_eq!(*cache.upsert_sizes.borrow(), vec![4, 1]);
}
