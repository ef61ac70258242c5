//! Trading metrics — pure functions of the trading parameters.
//!
//! Rates are taken in percent (`win_rate_percent = 55.0`), fractions are
//! returned where noted. Formulas that can blow up return a [`MetricValue`]
//! so an unbounded result is tagged instead of leaking NaN or infinity.
//!
//! The risk-of-ruin and max-drawdown figures are heuristics. They are not
//! calibrated probabilities and are labelled as such in every field name.

use serde::{Deserialize, Serialize};

use crate::params::TradingParameters;

/// Trading days assumed per calendar month.
pub const TRADING_DAYS_PER_MONTH: f64 = 21.0;

/// Why a metric has no finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// Win rate is 100%: there are no losses to divide by.
    NoLosses,
    /// Risk-of-ruin base `(1 - x) / (1 + x)` is non-positive or undefined, or
    /// risk per trade is zero so the exponent is unbounded.
    UndefinedRuinBase,
}

/// A metric that is either finite or a tagged degenerate case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Finite(f64),
    Degenerate(Degeneracy),
}

impl MetricValue {
    pub fn finite(self) -> Option<f64> {
        match self {
            Self::Finite(v) => Some(v),
            Self::Degenerate(_) => None,
        }
    }

    pub fn is_degenerate(self) -> bool {
        matches!(self, Self::Degenerate(_))
    }
}

/// Performance metrics derived from one set of trading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Average profit per unit risked.
    pub expectancy: f64,
    /// Kelly fraction (0.25 = risk 25% per trade).
    pub kelly: f64,
    pub half_kelly: f64,
    pub quarter_kelly: f64,
    /// Percent.
    pub breakeven_win_rate: f64,
    /// Win rate minus breakeven win rate, in percentage points.
    pub win_rate_vs_breakeven: f64,
    pub profit_factor: MetricValue,
    pub daily_commission: f64,
    pub monthly_commission: f64,
    pub commission_impact_percent: f64,
    pub estimated_daily_return_percent: f64,
    /// Fraction in [0, 1].
    pub risk_of_ruin_heuristic: MetricValue,
    /// Percent. Risk per trade times ten; not derived from the trade model.
    pub estimated_max_drawdown_heuristic: f64,
    pub is_positive_expectancy: bool,
}

impl Metrics {
    /// Compute all metrics for `trading` on an account of `account_size`.
    pub fn compute(trading: &TradingParameters, account_size: f64) -> Self {
        let win_rate = trading.win_rate_percent;
        let rr = trading.risk_reward_ratio;
        let risk = trading.risk_per_trade_percent;

        let e = expectancy(win_rate, rr);
        let k = kelly_fraction(win_rate, rr);
        let breakeven = breakeven_win_rate(rr);
        let daily_commission =
            round_trip_commission(trading.commission_per_trade) * trading.trades_per_day;

        Self {
            expectancy: e,
            kelly: k,
            half_kelly: k / 2.0,
            quarter_kelly: k / 4.0,
            breakeven_win_rate: breakeven,
            win_rate_vs_breakeven: win_rate - breakeven,
            profit_factor: profit_factor(win_rate, rr),
            daily_commission,
            monthly_commission: daily_commission * TRADING_DAYS_PER_MONTH,
            commission_impact_percent: if account_size > 0.0 {
                daily_commission / account_size * 100.0
            } else {
                0.0
            },
            estimated_daily_return_percent: e * (risk * trading.trades_per_day),
            risk_of_ruin_heuristic: risk_of_ruin_heuristic(e, risk),
            estimated_max_drawdown_heuristic: risk * 10.0,
            is_positive_expectancy: e > 0.0,
        }
    }
}

// ─── Individual formulas ────────────────────────────────────────────

/// Expectancy per unit risked: `w * rr - (1 - w)`.
pub fn expectancy(win_rate_percent: f64, risk_reward: f64) -> f64 {
    let w = win_rate_percent / 100.0;
    w * risk_reward - (1.0 - w)
}

/// Kelly fraction: `w - (1 - w) / rr`.
pub fn kelly_fraction(win_rate_percent: f64, risk_reward: f64) -> f64 {
    let w = win_rate_percent / 100.0;
    w - (1.0 - w) / risk_reward
}

/// Minimum win rate, in percent, that breaks even at this risk:reward.
pub fn breakeven_win_rate(risk_reward: f64) -> f64 {
    100.0 / (1.0 + risk_reward)
}

/// Expected gross wins over expected gross losses: `(w * rr) / (1 - w)`.
pub fn profit_factor(win_rate_percent: f64, risk_reward: f64) -> MetricValue {
    let w = win_rate_percent / 100.0;
    let l = 1.0 - w;
    if l <= 0.0 {
        return MetricValue::Degenerate(Degeneracy::NoLosses);
    }
    MetricValue::Finite((w * risk_reward) / l)
}

/// Entry plus exit commission.
pub fn round_trip_commission(commission_per_trade: f64) -> f64 {
    commission_per_trade * 2.0
}

/// Risk-of-ruin heuristic: `clamp01(((1 - x) / (1 + x)) ^ (100 / risk))`
/// with `x = expectancy * risk / 100`.
pub fn risk_of_ruin_heuristic(expectancy: f64, risk_per_trade_percent: f64) -> MetricValue {
    if risk_per_trade_percent <= 0.0 {
        return MetricValue::Degenerate(Degeneracy::UndefinedRuinBase);
    }
    let x = expectancy * risk_per_trade_percent / 100.0;
    if x >= 1.0 || x <= -1.0 {
        return MetricValue::Degenerate(Degeneracy::UndefinedRuinBase);
    }
    let base = (1.0 - x) / (1.0 + x);
    let ruin = base.powf(100.0 / risk_per_trade_percent);
    if ruin.is_nan() {
        return MetricValue::Degenerate(Degeneracy::UndefinedRuinBase);
    }
    MetricValue::Finite(ruin.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trading(win_rate: f64, rr: f64) -> TradingParameters {
        TradingParameters {
            win_rate_percent: win_rate,
            risk_reward_ratio: rr,
            ..TradingParameters::default()
        }
    }

    #[test]
    fn breakeven_win_rates() {
        assert!((breakeven_win_rate(1.0) - 50.0).abs() < 1e-10);
        assert!((breakeven_win_rate(2.0) - 33.33).abs() < 0.01);
        assert!((breakeven_win_rate(3.0) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn kelly_fractions() {
        let m = Metrics::compute(&trading(50.0, 2.0), 10_000.0);
        assert!((m.kelly - 0.25).abs() < 1e-12);
        assert!((m.half_kelly - 0.125).abs() < 1e-12);
        assert!((m.quarter_kelly - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn positive_and_negative_expectancy() {
        let good = Metrics::compute(&trading(50.0, 2.0), 10_000.0);
        assert!((good.expectancy - 0.5).abs() < 1e-12);
        assert!(good.is_positive_expectancy);

        let bad = Metrics::compute(&trading(40.0, 1.0), 10_000.0);
        assert!((bad.expectancy + 0.2).abs() < 1e-12);
        assert!(!bad.is_positive_expectancy);
    }

    #[test]
    fn profit_factor_flags_no_losses() {
        assert_eq!(
            profit_factor(100.0, 2.0),
            MetricValue::Degenerate(Degeneracy::NoLosses)
        );
        let pf = profit_factor(50.0, 2.0).finite().unwrap();
        assert!((pf - 2.0).abs() < 1e-12);
    }

    #[test]
    fn commissions_are_round_trip() {
        // $2 per side, 4 trades/day
        let m = Metrics::compute(&TradingParameters::default(), 10_000.0);
        assert!((m.daily_commission - 16.0).abs() < 1e-12);
        assert!((m.monthly_commission - 336.0).abs() < 1e-12);
        assert!((m.commission_impact_percent - 0.16).abs() < 1e-12);
    }

    #[test]
    fn daily_return_scales_with_risk_and_frequency() {
        // expectancy 0.5 * (1% * 4 trades)
        let m = Metrics::compute(&TradingParameters::default(), 10_000.0);
        assert!((m.estimated_daily_return_percent - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ruin_heuristic_is_bounded() {
        let positive = risk_of_ruin_heuristic(0.5, 1.0).finite().unwrap();
        assert!((0.0..=1.0).contains(&positive));
        assert!(positive < 0.5);

        // Negative expectancy pushes the base above 1; clamped to 1.
        let negative = risk_of_ruin_heuristic(-0.2, 1.0).finite().unwrap();
        assert!((negative - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ruin_heuristic_flags_undefined_base() {
        assert!(risk_of_ruin_heuristic(2.0, 60.0).is_degenerate());
        assert!(risk_of_ruin_heuristic(0.5, 0.0).is_degenerate());
    }

    #[test]
    fn max_drawdown_heuristic() {
        let mut t = TradingParameters::default();
        t.risk_per_trade_percent = 1.5;
        let m = Metrics::compute(&t, 10_000.0);
        assert!((m.estimated_max_drawdown_heuristic - 15.0).abs() < 1e-12);
    }

    #[test]
    fn metric_value_serializes_tagged() {
        let json = serde_json::to_string(&MetricValue::Degenerate(Degeneracy::NoLosses)).unwrap();
        assert_eq!(json, r#"{"kind":"degenerate","value":"no_losses"}"#);
    }
}
