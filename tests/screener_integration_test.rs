//! End-to-end screening runs over mocked ports: rule parsing through pick
//! recording, including batch fault tolerance and determinism.

mod common;

use common::*;
use tdxscreen::domain::bar::Adjust;
use tdxscreen::domain::program::Program;
use tdxscreen::domain::screener::{run_screen, ScreenOptions};

fn opts() -> ScreenOptions {
    ScreenOptions { lookback_days: 450 }
}

#[test]
fn momentum_rule_picks_only_the_breakout() {
    // [10, 11, 9, 12]: the last close rises above the previous one.
    let data = MockDataPort::new()
        .with_instrument("000001", "平安银行", "SZ", bars_from_closes(&[10.0, 11.0, 9.0, 12.0]))
        .with_instrument("000002", "万科A", "SZ", bars_from_closes(&[10.0, 11.0, 12.0, 9.0]));
    let picks = MockPicksPort::default();
    let program = Program::parse("XG: C > REF(C, 1)").unwrap();
    let out = run_screen(
        &program,
        "breakout",
        &data.universe,
        trading_day(3),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    assert_eq!(out.stats.picked, 1);
    assert_eq!(out.picks[0].code, "000001");

    let recorded = picks.recorded.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].1, "breakout");
    assert_eq!(recorded[0].2[0].code, "000001");
}

#[test]
fn inblock_filter_separates_boards() {
    let closes = [10.0, 11.0, 12.0];
    let data = MockDataPort::new()
        .with_instrument("300750", "宁德时代", "SZ", bars_from_closes(&closes))
        .with_instrument("600000", "浦发银行", "SH", bars_from_closes(&closes));
    let picks = MockPicksPort::default();
    let program = Program::parse("XG: INBLOCK('创业板') AND C > 0").unwrap();
    let out = run_screen(
        &program,
        "chinext-only",
        &data.universe,
        trading_day(2),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    assert_eq!(out.stats.picked, 1);
    assert_eq!(out.picks[0].code, "300750");
}

#[test]
fn batch_survives_a_failing_instrument() {
    let closes = [10.0, 11.0, 12.0, 13.0];
    let mut data = MockDataPort::new();
    for i in 1..=5 {
        data = data.with_instrument(
            &format!("00000{i}"),
            "样本",
            "SZ",
            bars_from_closes(&closes),
        );
    }
    let data = data.with_error("000003", "connection reset");
    let picks = MockPicksPort::default();
    let program = Program::parse("XG: C > REF(C, 1)").unwrap();
    let out = run_screen(
        &program,
        "momentum",
        &data.universe,
        trading_day(3),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    assert_eq!(out.stats.attempted, 5);
    assert_eq!(out.stats.failed, 1);
    assert_eq!(out.stats.picked, 4);
    assert!(out.picks.iter().all(|p| p.code != "000003"));
}

#[test]
fn halted_instrument_is_skipped_not_failed() {
    let data = MockDataPort::new()
        .with_instrument("000001", "平安银行", "SZ", bars_from_closes(&[10.0, 11.0, 12.0]))
        // Last bar one day before the target: suspended.
        .with_instrument("000002", "万科A", "SZ", bars_from_closes(&[10.0, 11.0]));
    let picks = MockPicksPort::default();
    let program = Program::parse("XG: C > 0").unwrap();
    let out = run_screen(
        &program,
        "alive",
        &data.universe,
        trading_day(2),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    assert_eq!(out.stats.skipped, 1);
    assert_eq!(out.stats.failed, 0);
    assert_eq!(out.stats.picked, 1);
}

#[test]
fn metrics_snapshot_uses_the_allow_list() {
    let data = MockDataPort::new().with_instrument(
        "300001",
        "特锐德",
        "SZ",
        bars_from_closes(&[10.0, 10.5, 11.0, 11.5]),
    );
    let picks = MockPicksPort::default();
    let program = Program::parse(
        "涨跌幅 := (C - REF(C, 1)) / REF(C, 1) * 100; HELPER := MA(C, 2); XG: C > HELPER",
    )
    .unwrap();
    let out = run_screen(
        &program,
        "momentum",
        &data.universe,
        trading_day(3),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    assert_eq!(out.stats.picked, 1);
    let metrics = &out.picks[0].metrics;
    let change = metrics["change_pct"];
    assert!((change - (11.5 - 11.0) / 11.0 * 100.0).abs() < 1e-9);
    assert!(!metrics.contains_key("HELPER"));
}

#[test]
fn forward_reference_fails_that_instrument_only() {
    let closes = [10.0, 11.0, 12.0];
    let data = MockDataPort::new()
        .with_instrument("000001", "平安银行", "SZ", bars_from_closes(&closes))
        .with_instrument("000002", "万科A", "SZ", bars_from_closes(&closes));
    let picks = MockPicksPort::default();
    // B is used before it is assigned.
    let program = Program::parse("A := B + 1; B := C; XG: C > 0").unwrap();
    let out = run_screen(
        &program,
        "broken",
        &data.universe,
        trading_day(2),
        Adjust::Forward,
        &opts(),
        &data,
        &picks,
    )
    .unwrap();
    // Both instruments hit the same undefined symbol; the run itself survives.
    assert_eq!(out.stats.failed, 2);
    assert_eq!(out.stats.picked, 0);
}

#[test]
fn screening_is_deterministic() {
    let closes: Vec<f64> = (0..60).map(|i| 10.0 + ((i * 7) % 13) as f64 * 0.5).collect();
    let data = MockDataPort::new()
        .with_instrument("300750", "宁德时代", "SZ", bars_from_closes(&closes))
        .with_instrument("688111", "金山办公", "SH", bars_from_closes(&closes));
    let program =
        Program::parse("J := 3 * SMA(C, 3, 1) - 2 * SMA(SMA(C, 3, 1), 3, 1); XG: EMA(C, 5) > MA(C, 10)")
            .unwrap();
    let run = || {
        let picks = MockPicksPort::default();
        run_screen(
            &program,
            "kdj-ish",
            &data.universe,
            trading_day(59),
            Adjust::Forward,
            &opts(),
            &data,
            &picks,
        )
        .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.picks, second.picks);
}
