//! Simulation parameters and boundary validation.
//!
//! Parameters are validated once, before they enter the engine. The engine
//! itself assumes finite, in-range inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::CompoundFrequency;
use crate::metrics::Metrics;
use crate::rng::RandomSource;

/// Which rate drives the growth projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    /// Fixed `growth_rate_percent` per compounding event.
    #[default]
    Deterministic,
    /// Expectancy-derived daily return per compounding event, with monthly
    /// commissions deducted.
    Stochastic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    /// `rate` percent of the current balance.
    #[default]
    Percent,
    /// `rate` currency units, capped at the balance.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalFrequency {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl WithdrawalFrequency {
    /// Whether a withdrawal is due in projection month `month` (1-based).
    pub fn is_due(self, month: u32) -> bool {
        match self {
            Self::Monthly => true,
            Self::Quarterly => month % 3 == 0,
            Self::Yearly => month % 12 == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WithdrawalPlan {
    pub enabled: bool,
    pub rate: f64,
    pub kind: WithdrawalKind,
    pub frequency: WithdrawalFrequency,
}

impl Default for WithdrawalPlan {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 4.0,
            kind: WithdrawalKind::Percent,
            frequency: WithdrawalFrequency::Monthly,
        }
    }
}

/// Trading inputs for the metrics calculator and the Monte Carlo simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TradingParameters {
    pub win_rate_percent: f64,
    pub risk_reward_ratio: f64,
    pub risk_per_trade_percent: f64,
    pub trades_per_day: f64,
    /// One-way commission; round trips cost twice this.
    pub commission_per_trade: f64,
}

impl Default for TradingParameters {
    fn default() -> Self {
        Self {
            win_rate_percent: 50.0,
            risk_reward_ratio: 2.0,
            risk_per_trade_percent: 1.0,
            trades_per_day: 4.0,
            commission_per_trade: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonteCarloSettings {
    pub runs: usize,
    pub seed: u64,
    pub random_source: RandomSource,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            runs: 100,
            seed: 42,
            random_source: RandomSource::default(),
        }
    }
}

/// Longest accepted projection horizon: 100 years.
pub const MAX_HORIZON_MONTHS: u32 = 1_200;

/// Complete input to the engine. Immutable once handed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub initial_amount: f64,
    pub growth_rate_percent: f64,
    pub compound_frequency: CompoundFrequency,
    pub start_date: NaiveDate,
    pub horizon_months: u32,
    pub monthly_contribution: f64,
    pub mode: ProjectionMode,
    pub withdrawal: WithdrawalPlan,
    pub trading: TradingParameters,
    pub monte_carlo: MonteCarloSettings,
}

impl SimulationParameters {
    /// Parameters with the calculator defaults, starting on `start_date`.
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            initial_amount: 10_000.0,
            growth_rate_percent: 0.15,
            compound_frequency: CompoundFrequency::Weekday,
            start_date,
            horizon_months: 12,
            monthly_contribution: 0.0,
            mode: ProjectionMode::Deterministic,
            withdrawal: WithdrawalPlan::default(),
            trading: TradingParameters::default(),
            monte_carlo: MonteCarloSettings::default(),
        }
    }

    /// Copy of these parameters with the Monte Carlo seed replaced.
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut params = self.clone();
        params.monte_carlo.seed = seed;
        params
    }

    /// Rate applied once per compounding event, as a fraction.
    pub fn effective_rate(&self, metrics: &Metrics) -> f64 {
        match self.mode {
            ProjectionMode::Deterministic => self.growth_rate_percent / 100.0,
            ProjectionMode::Stochastic => metrics.estimated_daily_return_percent / 100.0,
        }
    }

    /// Copy with every non-finite number replaced by 0.
    ///
    /// For callers that prefer normalizing raw input over rejecting it. The
    /// result still needs `validate()`: a normalized `initial_amount` of 0 is
    /// rejected there.
    pub fn normalized(&self) -> Self {
        let mut p = self.clone();
        for value in [
            &mut p.initial_amount,
            &mut p.growth_rate_percent,
            &mut p.monthly_contribution,
            &mut p.withdrawal.rate,
            &mut p.trading.win_rate_percent,
            &mut p.trading.risk_reward_ratio,
            &mut p.trading.risk_per_trade_percent,
            &mut p.trading.trades_per_day,
            &mut p.trading.commission_per_trade,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        p
    }

    /// Reject anything the engine cannot compute with.
    pub fn validate(&self) -> Result<(), ParamError> {
        finite("initial_amount", self.initial_amount)?;
        finite("growth_rate_percent", self.growth_rate_percent)?;
        finite("monthly_contribution", self.monthly_contribution)?;
        finite("withdrawal.rate", self.withdrawal.rate)?;
        finite("trading.win_rate_percent", self.trading.win_rate_percent)?;
        finite("trading.risk_reward_ratio", self.trading.risk_reward_ratio)?;
        finite("trading.risk_per_trade_percent", self.trading.risk_per_trade_percent)?;
        finite("trading.trades_per_day", self.trading.trades_per_day)?;
        finite("trading.commission_per_trade", self.trading.commission_per_trade)?;

        positive("initial_amount", self.initial_amount)?;
        positive("trading.risk_reward_ratio", self.trading.risk_reward_ratio)?;
        non_negative("monthly_contribution", self.monthly_contribution)?;
        non_negative("withdrawal.rate", self.withdrawal.rate)?;
        non_negative("trading.risk_per_trade_percent", self.trading.risk_per_trade_percent)?;
        non_negative("trading.trades_per_day", self.trading.trades_per_day)?;
        non_negative("trading.commission_per_trade", self.trading.commission_per_trade)?;
        in_range("trading.win_rate_percent", self.trading.win_rate_percent, 0.0, 100.0)?;
        in_range(
            "trading.risk_per_trade_percent",
            self.trading.risk_per_trade_percent,
            0.0,
            100.0,
        )?;

        if self.horizon_months == 0 {
            return Err(ParamError::ZeroHorizon);
        }
        in_range(
            "horizon_months",
            f64::from(self.horizon_months),
            1.0,
            f64::from(MAX_HORIZON_MONTHS),
        )?;
        if self.monte_carlo.runs == 0 {
            return Err(ParamError::ZeroRuns);
        }
        Ok(())
    }
}

/// Boundary validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("horizon_months must be at least 1")]
    ZeroHorizon,
    #[error("monte_carlo.runs must be at least 1")]
    ZeroRuns,
}

fn finite(field: &'static str, value: f64) -> Result<(), ParamError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::NonFinite { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ParamError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ParamError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ParamError::Negative { field, value })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SimulationParameters {
        SimulationParameters::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn non_finite_rejected() {
        let mut p = sample();
        p.growth_rate_percent = f64::NAN;
        assert!(matches!(
            p.validate(),
            Err(ParamError::NonFinite { field: "growth_rate_percent", .. })
        ));
    }

    #[test]
    fn zero_initial_amount_rejected() {
        let mut p = sample();
        p.initial_amount = 0.0;
        assert!(matches!(p.validate(), Err(ParamError::NotPositive { .. })));
    }

    #[test]
    fn zero_horizon_rejected() {
        let mut p = sample();
        p.horizon_months = 0;
        assert_eq!(p.validate(), Err(ParamError::ZeroHorizon));
    }

    #[test]
    fn horizon_beyond_cap_rejected() {
        let mut p = sample();
        p.horizon_months = MAX_HORIZON_MONTHS;
        assert_eq!(p.validate(), Ok(()));
        p.horizon_months = 4_000_000_000;
        assert!(matches!(
            p.validate(),
            Err(ParamError::OutOfRange { field: "horizon_months", .. })
        ));
    }

    #[test]
    fn win_rate_above_hundred_rejected() {
        let mut p = sample();
        p.trading.win_rate_percent = 101.0;
        assert!(matches!(p.validate(), Err(ParamError::OutOfRange { .. })));
    }

    #[test]
    fn normalized_zeroes_non_finite() {
        let mut p = sample();
        p.monthly_contribution = f64::INFINITY;
        p.trading.commission_per_trade = f64::NAN;
        let n = p.normalized();
        assert_eq!(n.monthly_contribution, 0.0);
        assert_eq!(n.trading.commission_per_trade, 0.0);
        assert_eq!(n.validate(), Ok(()));
    }

    #[test]
    fn withdrawal_schedule() {
        assert!(WithdrawalFrequency::Monthly.is_due(1));
        assert!(!WithdrawalFrequency::Quarterly.is_due(2));
        assert!(WithdrawalFrequency::Quarterly.is_due(6));
        assert!(!WithdrawalFrequency::Yearly.is_due(6));
        assert!(WithdrawalFrequency::Yearly.is_due(24));
    }

    #[test]
    fn with_seed_only_changes_seed() {
        let p = sample();
        let q = p.with_seed(7);
        assert_eq!(q.monte_carlo.seed, 7);
        assert_eq!(q.trading, p.trading);
    }

    #[test]
    fn parameters_serialization_roundtrip() {
        let p = sample();
        let json = serde_json::to_string(&p).unwrap();
        let back: SimulationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
