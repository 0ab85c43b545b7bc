//! Worked exit scenarios on hand-built price paths.
//!
//! Each path starts at 100 on the entry date and has one bar per calendar
//! day, so `hold_days` and `bars_held` coincide.

use chrono::{Duration, NaiveDate};
use scorelab_core::domain::{Candidate, ExitReason, MarketRegime, PriceBar, Score, Trade};
use scorelab_core::exit::{simulate_trade, ExitRules};

fn entry() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// `days` bars after entry, all at 100, with `overrides` applied as (day, close).
fn path(days: usize, overrides: &[(usize, f64)]) -> Vec<PriceBar> {
    (0..=days)
        .map(|i| {
            let close = overrides
                .iter()
                .find(|(d, _)| *d == i)
                .map(|(_, c)| *c)
                .unwrap_or(100.0);
            PriceBar {
                date: entry() + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000_000,
            }
        })
        .collect()
}

fn run(tier: &str, bars: &[PriceBar]) -> Trade {
    let candidate = Candidate::new("SCN", Score::composite(80.0), tier, false).unwrap();
    simulate_trade(&candidate, bars, entry(), &ExitRules::default(), MarketRegime::Bull).unwrap()
}

#[test]
fn scenario_a_flat_path_exits_at_hold_period() {
    let t = run("TOP pick", &path(40, &[]));
    assert_eq!(t.hold_period, 30);
    assert_eq!(t.exit_reason, ExitReason::HoldPeriod);
    assert_eq!(t.hold_days, 30);
    assert_eq!(t.bars_held, 30);
    assert_eq!(t.return_pct, 0.0);
    assert!(!t.win);
    assert!(!t.stop_triggered);
}

#[test]
fn scenario_b_drop_below_initial_stop() {
    let t = run("GOOD", &path(40, &[(3, 91.0)]));
    assert_eq!(t.exit_reason, ExitReason::StopLoss);
    assert_eq!(t.exit_price, 91.0);
    assert_eq!(t.bars_held, 3);
    assert!((t.return_pct - (-9.0)).abs() < 1e-9);
    assert!(t.stop_triggered);
    assert!(!t.win);
}

#[test]
fn scenario_c_armed_then_pulled_back() {
    let t = run("GOOD", &path(40, &[(5, 116.0), (6, 111.0)]));
    assert_eq!(t.exit_reason, ExitReason::TrailingStop);
    assert_eq!(t.exit_price, 111.0);
    assert_eq!(t.peak_price, 116.0);
    assert_eq!(t.exit_date, entry() + Duration::days(6));
    assert!((t.return_pct - 11.0).abs() < 1e-9);
    assert!(t.win);
    assert!(t.stop_triggered);
}

#[test]
fn scenario_d_profit_target_after_quiet_run() {
    let t = run("GOOD", &path(40, &[(12, 121.0)]));
    assert_eq!(t.exit_reason, ExitReason::ProfitTarget);
    assert_eq!(t.bars_held, 12);
    assert!((t.return_pct - 21.0).abs() < 1e-9);
    assert!(t.win);
    assert!(!t.stop_triggered);
}

#[test]
fn ma_break_after_slow_fade() {
    // Nine bars at 110 then a drop to 104: above the 92 stop, below 0.98 x MA10.
    let mut overrides: Vec<(usize, f64)> = (1..=9).map(|d| (d, 110.0)).collect();
    overrides.push((10, 104.0));
    let t = run("GOOD", &path(40, &overrides));
    assert_eq!(t.exit_reason, ExitReason::BreakMa10);
    assert_eq!(t.bars_held, 10);
    assert!(t.win);
}

#[test]
fn timing_convergence_extends_hold() {
    let candidate = Candidate::new("SCN", Score::composite(80.0), "moderate", true).unwrap();
    let t = simulate_trade(
        &candidate,
        &path(40, &[]),
        entry(),
        &ExitRules::default(),
        MarketRegime::CautiousBull,
    )
    .unwrap();
    assert_eq!(t.hold_period, 20);
    assert_eq!(t.bars_held, 20);
    assert_eq!(t.market_regime, MarketRegime::CautiousBull);
}

#[test]
fn later_bars_do_not_change_the_trade() {
    let short = path(6, &[(5, 116.0), (6, 111.0)]);
    let long = path(60, &[(5, 116.0), (6, 111.0), (20, 500.0), (30, 1.0)]);
    assert_eq!(run("GOOD", &short), run("GOOD", &long));
}
