//! Monte Carlo trade-sequence simulation.
//!
//! Each run replays `trades_per_day * horizon_months * 21` trades against its
//! own balance. A trade wins with probability `win_rate`, risks a fixed
//! fraction of the *current* balance, and pays a round-trip commission. A run
//! that reaches a non-positive balance is ruined and stops early.
//!
//! Runs share nothing but the immutable [`TradePlan`]. With the hashed random
//! source they execute on the rayon pool; statistics are computed over sorted
//! or summed values only, so result order never affects them.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{round_trip_commission, TRADING_DAYS_PER_MONTH};
use crate::params::{ParamError, SimulationParameters};
use crate::projection::round_cents;
use crate::rng::{LegacySineRng, RandomSource, RngHierarchy, TradeRng};

/// Equity curves keep every Nth trade plus the last one.
pub const EQUITY_SAMPLE_INTERVAL: u64 = 10;

/// Trading days between monthly contributions.
const CONTRIBUTION_INTERVAL: u64 = 21;

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub trade: u64,
    pub balance: f64,
}

/// Outcome of one simulated trade sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRunResult {
    pub run_index: usize,
    /// Never negative.
    pub final_balance: f64,
    pub max_drawdown_percent: f64,
    pub equity_curve: Vec<EquitySample>,
    pub ruined: bool,
    pub trades_executed: u64,
}

/// A run picked to represent part of the outcome distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeRun {
    pub run_index: usize,
    pub final_balance: f64,
    pub equity_curve: Vec<EquitySample>,
}

impl From<&MonteCarloRunResult> for RepresentativeRun {
    fn from(run: &MonteCarloRunResult) -> Self {
        Self {
            run_index: run.run_index,
            final_balance: run.final_balance,
            equity_curve: run.equity_curve.clone(),
        }
    }
}

/// Aggregate statistics across all runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloStatistics {
    pub runs: usize,
    pub median: f64,
    pub mean: f64,
    pub percentile_10: f64,
    pub percentile_90: f64,
    pub average_drawdown_percent: f64,
    pub max_drawdown_percent: f64,
    pub ruin_rate_percent: f64,
    pub profitable_rate_percent: f64,
    pub worst_run: RepresentativeRun,
    pub median_run: RepresentativeRun,
    pub best_run: RepresentativeRun,
}

/// Per-run results plus aggregates for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloOutcome {
    pub seed: u64,
    pub random_source: RandomSource,
    pub total_trades: u64,
    pub runs: Vec<MonteCarloRunResult>,
    pub statistics: MonteCarloStatistics,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid parameters: {0}")]
    Invalid(#[from] ParamError),
    #[error("simulation cancelled")]
    Cancelled,
    #[error("no runs to aggregate")]
    NoRuns,
}

// ─── Trade plan ──────────────────────────────────────────────────────

/// Per-trade constants derived once from the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub initial_balance: f64,
    pub total_trades: u64,
    pub win_probability: f64,
    /// Fraction of the current balance risked per trade.
    pub risk_fraction: f64,
    pub reward_ratio: f64,
    pub round_trip_commission: f64,
    pub monthly_contribution: f64,
}

impl TradePlan {
    pub fn from_params(params: &SimulationParameters) -> Self {
        let trading = &params.trading;
        let trading_days = f64::from(params.horizon_months) * TRADING_DAYS_PER_MONTH;
        Self {
            initial_balance: params.initial_amount,
            total_trades: (trading.trades_per_day * trading_days).floor() as u64,
            win_probability: trading.win_rate_percent / 100.0,
            risk_fraction: trading.risk_per_trade_percent / 100.0,
            reward_ratio: trading.risk_reward_ratio,
            round_trip_commission: round_trip_commission(trading.commission_per_trade),
            monthly_contribution: params.monthly_contribution,
        }
    }
}

// ─── Simulation ──────────────────────────────────────────────────────

/// Simulate one run, drawing exactly one value from `rng` per trade.
pub fn simulate_run<R: TradeRng>(
    plan: &TradePlan,
    run_index: usize,
    rng: &mut R,
) -> MonteCarloRunResult {
    let mut balance = plan.initial_balance;
    let mut peak = balance;
    let mut max_drawdown = 0.0_f64;
    let mut equity_curve = vec![EquitySample { trade: 0, balance }];
    let mut ruined = false;
    let mut trades_executed = 0;

    for trade in 1..=plan.total_trades {
        trades_executed = trade;
        let risk_amount = balance * plan.risk_fraction;
        if rng.next_unit() < plan.win_probability {
            balance += risk_amount * plan.reward_ratio;
        } else {
            balance -= risk_amount;
        }
        balance -= plan.round_trip_commission;

        if trade % CONTRIBUTION_INTERVAL == 0 && plan.monthly_contribution > 0.0 {
            balance += plan.monthly_contribution;
        }

        if balance > peak {
            peak = balance;
        }
        if peak > 0.0 {
            let drawdown = (peak - balance.max(0.0)) / peak * 100.0;
            max_drawdown = max_drawdown.max(drawdown);
        }

        if balance <= 0.0 {
            balance = 0.0;
            ruined = true;
            equity_curve.push(EquitySample { trade, balance: 0.0 });
            break;
        }

        if trade % EQUITY_SAMPLE_INTERVAL == 0 || trade == plan.total_trades {
            equity_curve.push(EquitySample {
                trade,
                balance: round_cents(balance),
            });
        }
    }

    MonteCarloRunResult {
        run_index,
        final_balance: balance,
        max_drawdown_percent: max_drawdown,
        equity_curve,
        ruined,
        trades_executed,
    }
}

/// Validate `params` and run `params.monte_carlo.runs` simulations.
pub fn simulate(params: &SimulationParameters) -> Result<MonteCarloOutcome, SimulationError> {
    simulate_with_cancel(params, None)
}

/// Like [`simulate`], checking `cancel` before each run.
///
/// A set flag discards every completed run and returns
/// [`SimulationError::Cancelled`].
pub fn simulate_with_cancel(
    params: &SimulationParameters,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloOutcome, SimulationError> {
    params.validate()?;
    let plan = TradePlan::from_params(params);
    let settings = &params.monte_carlo;
    let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));

    tracing::debug!(
        runs = settings.runs,
        seed = settings.seed,
        total_trades = plan.total_trades,
        source = ?settings.random_source,
        "starting monte carlo simulation"
    );

    let runs: Option<Vec<MonteCarloRunResult>> = match settings.random_source {
        RandomSource::Hashed => {
            let hierarchy = RngHierarchy::new(settings.seed);
            (0..settings.runs)
                .into_par_iter()
                .map(|run_index| {
                    if is_cancelled() {
                        return None;
                    }
                    let mut rng = hierarchy.rng_for(run_index);
                    Some(simulate_run(&plan, run_index, &mut rng))
                })
                .collect()
        }
        RandomSource::LegacySine => {
            let mut rng = LegacySineRng::new(settings.seed);
            (0..settings.runs)
                .map(|run_index| {
                    if is_cancelled() {
                        return None;
                    }
                    Some(simulate_run(&plan, run_index, &mut rng))
                })
                .collect()
        }
    };

    let runs = match runs {
        Some(runs) if !is_cancelled() => runs,
        _ => return Err(SimulationError::Cancelled),
    };
    let statistics = aggregate(&runs, params.initial_amount)?;

    Ok(MonteCarloOutcome {
        seed: settings.seed,
        random_source: settings.random_source,
        total_trades: plan.total_trades,
        runs,
        statistics,
    })
}

// ─── Aggregation ─────────────────────────────────────────────────────

/// Aggregate per-run results. Percentiles use the nearest-rank element of the
/// ascending final balances with no interpolation.
pub fn aggregate(
    runs: &[MonteCarloRunResult],
    initial_amount: f64,
) -> Result<MonteCarloStatistics, SimulationError> {
    let n = runs.len();
    if n == 0 {
        return Err(SimulationError::NoRuns);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| compare_runs(&runs[a], &runs[b]));
    let sorted: Vec<f64> = order.iter().map(|&i| runs[i].final_balance).collect();

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let average_drawdown_percent =
        runs.iter().map(|r| r.max_drawdown_percent).sum::<f64>() / n as f64;
    let max_drawdown_percent = runs
        .iter()
        .map(|r| r.max_drawdown_percent)
        .fold(0.0_f64, f64::max);
    let ruined = runs.iter().filter(|r| r.ruined).count();
    let profitable = runs
        .iter()
        .filter(|r| r.final_balance > initial_amount)
        .count();

    Ok(MonteCarloStatistics {
        runs: n,
        median: sorted[n / 2],
        mean,
        percentile_10: nearest_rank(&sorted, 0.1),
        percentile_90: nearest_rank(&sorted, 0.9),
        average_drawdown_percent,
        max_drawdown_percent,
        ruin_rate_percent: ruined as f64 / n as f64 * 100.0,
        profitable_rate_percent: profitable as f64 / n as f64 * 100.0,
        worst_run: RepresentativeRun::from(&runs[order[0]]),
        median_run: RepresentativeRun::from(&runs[order[n / 2]]),
        best_run: RepresentativeRun::from(&runs[order[n - 1]]),
    })
}

/// Element at `floor(n * fraction)` of an ascending, non-empty slice.
fn nearest_rank(sorted: &[f64], fraction: f64) -> f64 {
    let idx = ((sorted.len() as f64 * fraction).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Ascending by final balance, ties broken by run index so the ordering does
/// not depend on the order results arrived in.
fn compare_runs(a: &MonteCarloRunResult, b: &MonteCarloRunResult) -> CmpOrdering {
    a.final_balance
        .total_cmp(&b.final_balance)
        .then(a.run_index.cmp(&b.run_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::fresh_seed;
    use chrono::NaiveDate;

    /// Deterministic draws for exercising the trade loop.
    struct Scripted {
        draws: Vec<f64>,
        pos: usize,
    }

    impl Scripted {
        fn new(draws: Vec<f64>) -> Self {
            Self { draws, pos: 0 }
        }
    }

    impl TradeRng for Scripted {
        fn next_unit(&mut self) -> f64 {
            let v = self.draws[self.pos % self.draws.len()];
            self.pos += 1;
            v
        }
    }

    fn plan(total_trades: u64) -> TradePlan {
        TradePlan {
            initial_balance: 1_000.0,
            total_trades,
            win_probability: 0.5,
            risk_fraction: 0.1,
            reward_ratio: 2.0,
            round_trip_commission: 0.0,
            monthly_contribution: 0.0,
        }
    }

    fn params() -> SimulationParameters {
        let mut p = SimulationParameters::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        p.horizon_months = 3;
        p.monte_carlo.runs = 50;
        p.monte_carlo.seed = 1234;
        p
    }

    fn run_with_balance(run_index: usize, final_balance: f64) -> MonteCarloRunResult {
        MonteCarloRunResult {
            run_index,
            final_balance,
            max_drawdown_percent: run_index as f64,
            equity_curve: vec![EquitySample {
                trade: 0,
                balance: 100.0,
            }],
            ruined: final_balance == 0.0,
            trades_executed: 10,
        }
    }

    #[test]
    fn total_trades_floor() {
        let mut p = params();
        p.trading.trades_per_day = 0.5;
        p.horizon_months = 1;
        // 0.5 * 21 = 10.5
        assert_eq!(TradePlan::from_params(&p).total_trades, 10);
    }

    #[test]
    fn win_and_loss_scale_with_current_balance() {
        // win: 1000 + 100*2 = 1200; loss: 1200 - 120 = 1080
        let mut rng = Scripted::new(vec![0.1, 0.9]);
        let run = simulate_run(&plan(2), 0, &mut rng);
        assert!((run.final_balance - 1_080.0).abs() < 1e-9);
        assert!(!run.ruined);
        assert!((run.max_drawdown_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_sampled_every_tenth_and_final() {
        let mut rng = Scripted::new(vec![0.1]);
        let run = simulate_run(&plan(25), 0, &mut rng);
        let trades: Vec<u64> = run.equity_curve.iter().map(|s| s.trade).collect();
        assert_eq!(trades, vec![0, 10, 20, 25]);
    }

    #[test]
    fn contribution_every_21st_trade() {
        let mut p = plan(21);
        p.risk_fraction = 0.0;
        p.monthly_contribution = 50.0;
        let run = simulate_run(&p, 0, &mut Scripted::new(vec![0.9]));
        assert!((run.final_balance - 1_050.0).abs() < 1e-9);
    }

    #[test]
    fn ruin_stops_run_with_terminal_zero() {
        let mut p = plan(100);
        p.round_trip_commission = 400.0;
        let run = simulate_run(&p, 3, &mut Scripted::new(vec![0.9]));
        // 1000 -> 500 -> 50 -> ruined
        assert!(run.ruined);
        assert_eq!(run.final_balance, 0.0);
        assert_eq!(run.trades_executed, 3);
        let last = run.equity_curve.last().unwrap();
        assert_eq!(*last, EquitySample { trade: 3, balance: 0.0 });
        assert!((run.max_drawdown_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_trades_keeps_initial_balance() {
        let run = simulate_run(&plan(0), 0, &mut Scripted::new(vec![0.5]));
        assert_eq!(run.final_balance, 1_000.0);
        assert_eq!(run.equity_curve.len(), 1);
        assert_eq!(run.trades_executed, 0);
    }

    #[test]
    fn aggregate_nearest_rank() {
        let runs: Vec<_> = [300.0, 100.0, 500.0, 200.0, 400.0]
            .iter()
            .enumerate()
            .map(|(i, &b)| run_with_balance(i, b))
            .collect();
        let stats = aggregate(&runs, 250.0).unwrap();
        assert_eq!(stats.median, 300.0);
        assert_eq!(stats.percentile_10, 100.0);
        assert_eq!(stats.percentile_90, 500.0);
        assert_eq!(stats.mean, 300.0);
        assert_eq!(stats.worst_run.run_index, 1);
        assert_eq!(stats.median_run.run_index, 0);
        assert_eq!(stats.best_run.run_index, 2);
        assert_eq!(stats.max_drawdown_percent, 4.0);
        assert_eq!(stats.average_drawdown_percent, 2.0);
        assert_eq!(stats.profitable_rate_percent, 60.0);
    }

    #[test]
    fn aggregate_profitable_and_ruin_rates() {
        let balances = [0.0, 50.0, 90.0, 100.0, 150.0, 160.0, 170.0, 180.0, 190.0, 200.0];
        let runs: Vec<_> = balances
            .iter()
            .enumerate()
            .map(|(i, &b)| run_with_balance(i, b))
            .collect();
        let stats = aggregate(&runs, 100.0).unwrap();
        assert_eq!(stats.profitable_rate_percent, 60.0);
        assert_eq!(stats.ruin_rate_percent, 10.0);
    }

    #[test]
    fn aggregate_is_order_independent() {
        let mut runs: Vec<_> = (0..7)
            .map(|i| run_with_balance(i, (i * 37 % 11) as f64))
            .collect();
        let forward = aggregate(&runs, 5.0).unwrap();
        runs.reverse();
        let backward = aggregate(&runs, 5.0).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn aggregate_rejects_empty() {
        assert_eq!(aggregate(&[], 100.0), Err(SimulationError::NoRuns));
    }

    #[test]
    fn same_seed_same_outcome() {
        let a = simulate(&params()).unwrap();
        let b = simulate(&params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_outcome() {
        let a = simulate(&params()).unwrap();
        let b = simulate(&params().with_seed(99)).unwrap();
        assert_ne!(a.runs, b.runs);
    }

    #[test]
    fn legacy_source_is_reproducible() {
        let mut p = params();
        p.monte_carlo.random_source = RandomSource::LegacySine;
        let a = simulate(&p).unwrap();
        let b = simulate(&p).unwrap();
        assert_eq!(a.statistics, b.statistics);
    }

    #[test]
    fn legacy_source_shares_counter_across_runs() {
        let mut p = params();
        p.monte_carlo.random_source = RandomSource::LegacySine;
        p.monte_carlo.runs = 2;
        let outcome = simulate(&p).unwrap();
        let plan = TradePlan::from_params(&p);

        let mut rng = LegacySineRng::new(p.monte_carlo.seed);
        let first = simulate_run(&plan, 0, &mut rng);
        let second = simulate_run(&plan, 1, &mut rng);
        assert_eq!(outcome.runs, vec![first, second]);
    }

    #[test]
    fn legacy_source_with_wall_clock_seed_varies_between_runs() {
        let mut p = params().with_seed(fresh_seed());
        p.monte_carlo.random_source = RandomSource::LegacySine;
        let outcome = simulate(&p).unwrap();
        let first = outcome.runs[0].final_balance;
        assert!(outcome.runs.iter().any(|r| r.final_balance != first));
        assert!(outcome.statistics.ruin_rate_percent < 100.0);
    }

    #[test]
    fn cancelled_flag_discards_results() {
        let flag = AtomicBool::new(true);
        assert_eq!(
            simulate_with_cancel(&params(), Some(&flag)),
            Err(SimulationError::Cancelled)
        );
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut p = params();
        p.monte_carlo.runs = 0;
        assert_eq!(
            simulate(&p),
            Err(SimulationError::Invalid(ParamError::ZeroRuns))
        );
    }
}
