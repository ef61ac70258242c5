//! CompoundSim Core — projection, metrics and Monte Carlo engine.
//!
//! This crate contains the computation engine and performs no I/O:
//! - Simulation parameters with boundary validation
//! - Calendar scheduler counting compounding events per month
//! - Trading metrics (expectancy, Kelly, breakeven, profit factor, heuristics)
//! - Month-by-month growth projection on the real calendar
//! - Seeded Monte Carlo trade-sequence simulation with aggregate statistics
//! - Parameter fingerprints for memoized recomputation

pub mod calendar;
pub mod fingerprint;
pub mod metrics;
pub mod monte_carlo;
pub mod params;
pub mod projection;
pub mod rng;

pub use calendar::{add_months, count_compounding_events, days_in_month, CompoundFrequency};
pub use fingerprint::ParamsFingerprint;
pub use metrics::{Degeneracy, MetricValue, Metrics};
pub use monte_carlo::{
    aggregate, simulate, simulate_run, simulate_with_cancel, EquitySample, MonteCarloOutcome,
    MonteCarloRunResult, MonteCarloStatistics, RepresentativeRun, SimulationError, TradePlan,
};
pub use params::{
    MonteCarloSettings, ParamError, MAX_HORIZON_MONTHS, ProjectionMode, SimulationParameters, TradingParameters,
    WithdrawalFrequency, WithdrawalKind, WithdrawalPlan,
};
pub use projection::{
    project, project_with_metrics, Projection, ProjectionPoint, ProjectionSummary,
};
pub use rng::{fresh_seed, LegacySineRng, RandomSource, RngHierarchy, TradeRng};
