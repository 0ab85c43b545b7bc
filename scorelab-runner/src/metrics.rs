//! Portfolio metrics: a pure function of the closed trades.
//!
//! Every figure is computed from `&[Trade]` alone. Returns are sorted with
//! `f64::total_cmp` before summing, so the report is identical bit for bit
//! under any ordering of the same trades. Context the simulation does not
//! own (regime, reference date, skips) is attached afterwards by the
//! orchestrator.

use chrono::NaiveDate;
use scorelab_core::domain::{ExitReason, MarketRegime, Trade};
use scorelab_core::regime::RegimeSnapshot;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Gross profit over gross loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProfitFactor {
    Finite(f64),
    /// Profitable trades and no losing ones.
    Unbounded,
}

impl ProfitFactor {
    pub fn from_gross(profit: f64, loss: f64) -> Self {
        if loss == 0.0 {
            if profit > 0.0 {
                ProfitFactor::Unbounded
            } else {
                ProfitFactor::Finite(0.0)
            }
        } else {
            ProfitFactor::Finite(profit / loss)
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{v:.2}"),
            ProfitFactor::Unbounded => f.write_str("inf"),
        }
    }
}

/// Why a report has no trades. Serialized as e.g. `"REGIME_FILTER_BEAR"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    RegimeFilter(MarketRegime),
    NoQualifyingCandidates,
    NoData,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::RegimeFilter(regime) => write!(f, "REGIME_FILTER_{regime}"),
            EmptyReason::NoQualifyingCandidates => f.write_str("NO_QUALIFYING_CANDIDATES"),
            EmptyReason::NoData => f.write_str("NO_DATA"),
        }
    }
}

impl FromStr for EmptyReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NO_QUALIFYING_CANDIDATES" => Ok(EmptyReason::NoQualifyingCandidates),
            "NO_DATA" => Ok(EmptyReason::NoData),
            other => other
                .strip_prefix("REGIME_FILTER_")
                .and_then(MarketRegime::parse)
                .map(EmptyReason::RegimeFilter)
                .ok_or_else(|| format!("unknown empty-report reason '{other}'")),
        }
    }
}

impl Serialize for EmptyReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EmptyReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Candidates that produced no trade, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipSummary {
    pub below_threshold: usize,
    pub no_data: usize,
    pub insufficient_history: usize,
    /// Rows rejected at ingestion.
    pub invalid: usize,
}

impl SkipSummary {
    pub fn total(&self) -> usize {
        self.below_threshold + self.no_data + self.insufficient_history + self.invalid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with a positive return.
    pub win_rate: f64,
    pub avg_return: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: ProfitFactor,
    pub sharpe_ratio: f64,
    /// Best single-trade return.
    pub max_return: f64,
    /// Worst single-trade return.
    pub max_loss: f64,
    pub avg_hold_days: f64,
    pub avg_max_drawdown_pct: f64,
    pub worst_drawdown_pct: f64,
    pub exit_reason_histogram: BTreeMap<ExitReason, usize>,
    pub stop_triggered_count: usize,
    /// Percent of trades closed by a stop.
    pub stop_triggered_rate: f64,

    pub market_regime: MarketRegime,
    pub regime_metadata: Option<RegimeSnapshot>,
    pub reference_date: Option<NaiveDate>,
    pub skipped: SkipSummary,
    pub reason: Option<EmptyReason>,
}

impl PortfolioReport {
    /// Compute every trade-derived field.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let n = trades.len();
        let returns = sorted(trades.iter().map(|t| t.return_pct));
        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r <= 0.0).collect();
        let drawdowns = sorted(trades.iter().map(|t| t.max_drawdown_pct));

        let mut histogram = BTreeMap::new();
        for t in trades {
            *histogram.entry(t.exit_reason).or_insert(0) += 1;
        }
        let stop_triggered_count = trades.iter().filter(|t| t.stop_triggered).count();
        let total_hold_days: i64 = trades.iter().map(|t| t.hold_days).sum();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        Self {
            total_trades: n,
            winning_trades: wins.len(),
            losing_trades: n - wins.len(),
            win_rate: percent(wins.len(), n),
            avg_return: mean(&returns),
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            profit_factor: ProfitFactor::from_gross(gross_profit, gross_loss),
            sharpe_ratio: sharpe_ratio(&returns),
            max_return: returns.last().copied().unwrap_or(0.0),
            max_loss: returns.first().copied().unwrap_or(0.0),
            avg_hold_days: if n == 0 { 0.0 } else { total_hold_days as f64 / n as f64 },
            avg_max_drawdown_pct: mean(&drawdowns),
            worst_drawdown_pct: drawdowns.first().copied().unwrap_or(0.0),
            exit_reason_histogram: histogram,
            stop_triggered_count,
            stop_triggered_rate: percent(stop_triggered_count, n),
            market_regime: MarketRegime::Unknown,
            regime_metadata: None,
            reference_date: None,
            skipped: SkipSummary::default(),
            reason: None,
        }
    }

    /// A zero-trade report carrying the reason it is empty.
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::from_trades(&[])
        }
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(f64::total_cmp);
    v
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Mean over sample standard deviation (n - 1) of per-trade returns.
///
/// Returns 0.0 with fewer than two trades or when all returns are equal.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let variance =
        returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std = variance.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    m / std
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorelab_core::domain::{Score, Tier, TradeLegs};

    fn trade(return_pct: f64, reason: ExitReason, hold: i64) -> Trade {
        let entry = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let exit_price = 100.0 * (1.0 + return_pct / 100.0);
        Trade::close(
            "T",
            Score::composite(60.0),
            Tier::Good,
            20,
            TradeLegs {
                entry_date: entry,
                entry_price: 100.0,
                exit_date: entry + chrono::Duration::days(hold),
                exit_price,
                peak_price: exit_price.max(100.0),
                bars_held: hold as usize,
                max_drawdown_pct: return_pct.min(0.0),
            },
            reason,
            MarketRegime::Bull,
        )
    }

    #[test]
    fn empty_collection() {
        let r = PortfolioReport::from_trades(&[]);
        assert_eq!(r.total_trades, 0);
        assert_eq!(r.win_rate, 0.0);
        assert_eq!(r.sharpe_ratio, 0.0);
        assert_eq!(r.profit_factor, ProfitFactor::Finite(0.0));
        assert!(r.exit_reason_histogram.is_empty());
    }

    #[test]
    fn mixed_trades() {
        let trades = vec![
            trade(10.0, ExitReason::ProfitTarget, 10),
            trade(-5.0, ExitReason::StopLoss, 4),
            trade(20.0, ExitReason::ProfitTarget, 12),
            trade(0.0, ExitReason::HoldPeriod, 20),
        ];
        let r = PortfolioReport::from_trades(&trades);
        assert_eq!(r.total_trades, 4);
        assert_eq!(r.winning_trades, 2);
        assert_eq!(r.losing_trades, 2);
        assert!((r.win_rate - 50.0).abs() < 1e-9);
        assert!((r.avg_return - 6.25).abs() < 1e-6);
        assert!((r.avg_win - 15.0).abs() < 1e-6);
        assert!((r.avg_loss - (-2.5)).abs() < 1e-6);
        match r.profit_factor {
            ProfitFactor::Finite(pf) => assert!((pf - 6.0).abs() < 1e-6),
            ProfitFactor::Unbounded => panic!("expected finite profit factor"),
        }
        assert!((r.max_return - 20.0).abs() < 1e-6);
        assert!((r.max_loss - (-5.0)).abs() < 1e-6);
        assert!((r.avg_hold_days - 11.5).abs() < 1e-9);
        assert_eq!(r.exit_reason_histogram[&ExitReason::ProfitTarget], 2);
        assert_eq!(r.exit_reason_histogram.get(&ExitReason::TrailingStop), None);
        assert_eq!(r.stop_triggered_count, 1);
        assert!((r.stop_triggered_rate - 25.0).abs() < 1e-9);
        assert!(r.sharpe_ratio > 0.0);
    }

    #[test]
    fn all_winners_is_unbounded() {
        let trades = vec![trade(5.0, ExitReason::ProfitTarget, 3), trade(7.0, ExitReason::HoldPeriod, 20)];
        assert_eq!(
            PortfolioReport::from_trades(&trades).profit_factor,
            ProfitFactor::Unbounded
        );
    }

    #[test]
    fn sharpe_edge_cases() {
        assert_eq!(sharpe_ratio(&[4.0]), 0.0);
        assert_eq!(sharpe_ratio(&[3.0, 3.0, 3.0]), 0.0);
        // mean 2, sample std 1 -> 2
        assert!((sharpe_ratio(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_reason_wire_format() {
        let reasons = [
            (EmptyReason::RegimeFilter(MarketRegime::Bear), "\"REGIME_FILTER_BEAR\""),
            (EmptyReason::RegimeFilter(MarketRegime::Choppy), "\"REGIME_FILTER_CHOPPY\""),
            (EmptyReason::NoQualifyingCandidates, "\"NO_QUALIFYING_CANDIDATES\""),
            (EmptyReason::NoData, "\"NO_DATA\""),
        ];
        for (reason, wire) in reasons {
            assert_eq!(serde_json::to_string(&reason).unwrap(), wire);
            assert_eq!(serde_json::from_str::<EmptyReason>(wire).unwrap(), reason);
        }
        assert!(serde_json::from_str::<EmptyReason>("\"REGIME_FILTER_SIDEWAYS\"").is_err());
    }

    #[test]
    fn profit_factor_wire_format() {
        let json = serde_json::to_string(&ProfitFactor::Unbounded).unwrap();
        assert_eq!(json, r#"{"kind":"unbounded"}"#);
        let json = serde_json::to_string(&ProfitFactor::Finite(1.5)).unwrap();
        assert_eq!(json, r#"{"kind":"finite","value":1.5}"#);
    }

    #[test]
    fn report_round_trips_through_json() {
        let mut r = PortfolioReport::from_trades(&[trade(3.0, ExitReason::BreakMa10, 11)]);
        r.skipped.no_data = 2;
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"BREAK_MA10\":1"));
        let back: PortfolioReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_trades, 1);
        assert_eq!(back.exit_reason_histogram, r.exit_reason_histogram);
        assert_eq!(back.profit_factor, ProfitFactor::Unbounded);
        assert_eq!(back.skipped, r.skipped);
        assert_eq!(back.reason, None);
    }
}
