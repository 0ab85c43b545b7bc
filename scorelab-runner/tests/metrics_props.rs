//! Property tests for the metrics aggregator.
//!
//! 1. Idempotence: the same trades give the same report
//! 2. Order invariance: any permutation gives the same report, bit for bit
//! 3. Accounting: wins + losses = total, histogram sums to total

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use scorelab_core::domain::{ExitReason, MarketRegime, Score, Tier, Trade, TradeLegs};
use scorelab_runner::{PortfolioReport, ProfitFactor};

fn arb_trade() -> impl Strategy<Value = Trade> {
    (
        50.0..150.0_f64,
        0usize..30,
        prop::sample::select(ExitReason::ALL.to_vec()),
        -15.0..0.0_f64,
    )
        .prop_map(|(exit_price, bars, reason, drawdown)| {
            let entry = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
            Trade::close(
                "PROP",
                Score::composite(60.0),
                Tier::Good,
                30,
                TradeLegs {
                    entry_date: entry,
                    entry_price: 100.0,
                    exit_date: entry + Duration::days(bars as i64 + 1),
                    exit_price,
                    peak_price: exit_price.max(100.0),
                    bars_held: bars + 1,
                    max_drawdown_pct: drawdown,
                },
                reason,
                MarketRegime::Bull,
            )
        })
}

fn arb_trades_and_permutation() -> impl Strategy<Value = (Vec<Trade>, Vec<Trade>)> {
    prop::collection::vec(arb_trade(), 0..40)
        .prop_flat_map(|trades| (Just(trades.clone()), Just(trades).prop_shuffle()))
}

proptest! {
    #[test]
    fn aggregate_is_idempotent(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let a = PortfolioReport::from_trades(&trades);
        let b = PortfolioReport::from_trades(&trades);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn aggregate_ignores_trade_order((trades, shuffled) in arb_trades_and_permutation()) {
        let a = PortfolioReport::from_trades(&trades);
        let b = PortfolioReport::from_trades(&shuffled);
        prop_assert_eq!(a.avg_return.to_bits(), b.avg_return.to_bits());
        prop_assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
        prop_assert_eq!(a.avg_max_drawdown_pct.to_bits(), b.avg_max_drawdown_pct.to_bits());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn counts_add_up(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let r = PortfolioReport::from_trades(&trades);
        prop_assert_eq!(r.winning_trades + r.losing_trades, r.total_trades);
        prop_assert_eq!(r.exit_reason_histogram.values().sum::<usize>(), r.total_trades);
        prop_assert!(r.max_loss <= r.max_return);
        prop_assert!(r.worst_drawdown_pct <= r.avg_max_drawdown_pct + 1e-9);
        if r.losing_trades == 0 && r.winning_trades > 0 {
            prop_assert_eq!(r.profit_factor, ProfitFactor::Unbounded);
        }
        if let ProfitFactor::Finite(pf) = r.profit_factor {
            prop_assert!(pf >= 0.0);
        }
    }
}
