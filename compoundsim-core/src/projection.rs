//! Growth projection — month-by-month balance on the real calendar.
//!
//! Each month applies, in order: contribution, compounding events, fees
//! (stochastic mode only), withdrawal. Balances are carried unrounded; the
//! recorded points are rounded to cents.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_months, count_compounding_events};
use crate::metrics::Metrics;
use crate::params::{ProjectionMode, SimulationParameters, WithdrawalKind};

/// Projected account state at the end of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// 0 is the initial state.
    pub month: u32,
    pub date: NaiveDate,
    pub balance: f64,
    pub total_withdrawn: f64,
    pub total_contributed: f64,
    pub total_fees_paid: f64,
    pub monthly_withdrawal: f64,
    pub monthly_contribution: f64,
    pub monthly_fees: f64,
    /// Cumulative compounding events applied so far.
    pub compounding_periods: u64,
}

/// Ordered projection, one point per month `0..=horizon_months`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    points: Vec<ProjectionPoint>,
}

/// Totals at the end of the horizon.
///
/// These are the figures an external tax estimate consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub final_balance: f64,
    pub total_withdrawn: f64,
    pub total_contributed: f64,
    pub total_fees_paid: f64,
    /// Initial amount plus contributions.
    pub total_invested: f64,
    /// Final balance plus withdrawals minus total invested.
    pub total_gain: f64,
    pub total_return_percent: f64,
    pub compounding_periods: u64,
}

impl Projection {
    pub fn points(&self) -> &[ProjectionPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<ProjectionPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn final_point(&self) -> Option<&ProjectionPoint> {
        self.points.last()
    }

    pub fn summary(&self, initial_amount: f64) -> Option<ProjectionSummary> {
        let last = self.final_point()?;
        let total_invested = initial_amount + last.total_contributed;
        let total_out = last.balance + last.total_withdrawn;
        let total_return_percent = if total_invested > 0.0 {
            (total_out / total_invested - 1.0) * 100.0
        } else {
            0.0
        };
        Some(ProjectionSummary {
            final_balance: last.balance,
            total_withdrawn: last.total_withdrawn,
            total_contributed: last.total_contributed,
            total_fees_paid: last.total_fees_paid,
            total_invested,
            total_gain: total_out - total_invested,
            total_return_percent,
            compounding_periods: last.compounding_periods,
        })
    }
}

/// Project the balance for validated parameters.
pub fn project(params: &SimulationParameters) -> Projection {
    let metrics = Metrics::compute(&params.trading, params.initial_amount);
    project_with_metrics(params, &metrics)
}

/// Project using already-computed metrics for the stochastic rate and fees.
pub fn project_with_metrics(params: &SimulationParameters, metrics: &Metrics) -> Projection {
    let rate = params.effective_rate(metrics);
    let monthly_fee = match params.mode {
        ProjectionMode::Stochastic if metrics.monthly_commission > 0.0 => {
            metrics.monthly_commission
        }
        _ => 0.0,
    };
    let withdrawal = &params.withdrawal;

    let mut balance = params.initial_amount;
    let mut total_withdrawn = 0.0;
    let mut total_contributed = 0.0;
    let mut total_fees_paid = 0.0;
    let mut compounding_periods = 0u64;

    let mut points = Vec::with_capacity(params.horizon_months as usize + 1);
    points.push(ProjectionPoint {
        month: 0,
        date: params.start_date,
        balance: round_cents(balance),
        total_withdrawn: 0.0,
        total_contributed: 0.0,
        total_fees_paid: 0.0,
        monthly_withdrawal: 0.0,
        monthly_contribution: 0.0,
        monthly_fees: 0.0,
        compounding_periods: 0,
    });

    for month in 1..=params.horizon_months {
        let date = add_months(params.start_date, month);

        let mut contribution = 0.0;
        if params.monthly_contribution > 0.0 {
            contribution = params.monthly_contribution;
            balance += contribution;
            total_contributed += contribution;
        }

        let events =
            count_compounding_events(date.year(), date.month(), &params.compound_frequency);
        for _ in 0..events {
            balance *= 1.0 + rate;
        }
        compounding_periods += u64::from(events);

        if monthly_fee > 0.0 {
            balance -= monthly_fee;
            total_fees_paid += monthly_fee;
        }

        let mut withdrawn = 0.0;
        if withdrawal.enabled && withdrawal.frequency.is_due(month) && balance > 0.0 {
            withdrawn = match withdrawal.kind {
                WithdrawalKind::Percent => balance * withdrawal.rate / 100.0,
                WithdrawalKind::Fixed => withdrawal.rate.min(balance),
            };
            balance -= withdrawn;
            total_withdrawn += withdrawn;
        }

        points.push(ProjectionPoint {
            month,
            date,
            balance: round_cents(balance),
            total_withdrawn: round_cents(total_withdrawn),
            total_contributed: round_cents(total_contributed),
            total_fees_paid: round_cents(total_fees_paid),
            monthly_withdrawal: round_cents(withdrawn),
            monthly_contribution: round_cents(contribution),
            monthly_fees: round_cents(monthly_fee),
            compounding_periods,
        });
    }

    Projection { points }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CompoundFrequency;
    use crate::params::{WithdrawalFrequency, WithdrawalPlan};

    fn base(start: NaiveDate) -> SimulationParameters {
        let mut p = SimulationParameters::new(start);
        p.initial_amount = 10_000.0;
        p.growth_rate_percent = 1.0;
        p.compound_frequency = CompoundFrequency::Monthly;
        p
    }

    fn jan_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn length_is_horizon_plus_one() {
        let p = base(jan_2025());
        let proj = project(&p);
        assert_eq!(proj.len(), 13);
        assert_eq!(proj.points()[0].month, 0);
        assert_eq!(proj.points()[12].month, 12);
    }

    #[test]
    fn month_zero_is_initial_state() {
        let mut p = base(jan_2025());
        p.monthly_contribution = 500.0;
        let proj = project(&p);
        let first = &proj.points()[0];
        assert_eq!(first.balance, 10_000.0);
        assert_eq!(first.total_contributed, 0.0);
        assert_eq!(first.compounding_periods, 0);
        assert_eq!(first.date, jan_2025());
    }

    #[test]
    fn pure_compounding_matches_closed_form() {
        let p = base(jan_2025());
        let proj = project(&p);
        let last = proj.final_point().unwrap();
        assert_eq!(last.compounding_periods, 12);
        let expected = 10_000.0 * 1.01_f64.powi(12);
        assert!((last.balance - expected).abs() <= 0.01);
    }

    #[test]
    fn contribution_precedes_compounding() {
        let mut p = base(jan_2025());
        p.horizon_months = 1;
        p.monthly_contribution = 1_000.0;
        let proj = project(&p);
        // (10000 + 1000) * 1.01
        assert!((proj.points()[1].balance - 11_110.0).abs() < 1e-9);
        assert_eq!(proj.points()[1].total_contributed, 1_000.0);
    }

    #[test]
    fn dates_advance_by_calendar_month() {
        let p = base(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        let proj = project(&p);
        assert_eq!(proj.points()[1].date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(proj.points()[12].date, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn weekday_events_follow_calendar() {
        let mut p = base(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        p.compound_frequency = CompoundFrequency::Weekday;
        p.horizon_months = 1;
        let proj = project(&p);
        // Month 1 is January 2025: 23 weekdays.
        assert_eq!(proj.points()[1].compounding_periods, 23);
    }

    #[test]
    fn quarterly_percent_withdrawal() {
        let mut p = base(jan_2025());
        p.growth_rate_percent = 0.0;
        p.withdrawal = WithdrawalPlan {
            enabled: true,
            rate: 10.0,
            kind: WithdrawalKind::Percent,
            frequency: WithdrawalFrequency::Quarterly,
        };
        p.horizon_months = 6;
        let proj = project(&p);
        let pts = proj.points();
        assert_eq!(pts[1].monthly_withdrawal, 0.0);
        assert_eq!(pts[3].monthly_withdrawal, 1_000.0);
        assert_eq!(pts[6].monthly_withdrawal, 900.0);
        assert_eq!(pts[6].total_withdrawn, 1_900.0);
        assert_eq!(pts[6].balance, 8_100.0);
    }

    #[test]
    fn fixed_withdrawal_capped_at_balance() {
        let mut p = base(jan_2025());
        p.growth_rate_percent = 0.0;
        p.initial_amount = 500.0;
        p.withdrawal = WithdrawalPlan {
            enabled: true,
            rate: 300.0,
            kind: WithdrawalKind::Fixed,
            frequency: WithdrawalFrequency::Monthly,
        };
        p.horizon_months = 3;
        let proj = project(&p);
        let pts = proj.points();
        assert_eq!(pts[1].balance, 200.0);
        assert_eq!(pts[2].monthly_withdrawal, 200.0);
        assert_eq!(pts[2].balance, 0.0);
        // Nothing left to withdraw.
        assert_eq!(pts[3].monthly_withdrawal, 0.0);
        assert_eq!(pts[3].total_withdrawn, 500.0);
    }

    #[test]
    fn stochastic_mode_uses_metrics_rate_and_fees() {
        let mut p = base(jan_2025());
        p.mode = ProjectionMode::Stochastic;
        p.horizon_months = 1;
        let metrics = Metrics::compute(&p.trading, p.initial_amount);
        let proj = project_with_metrics(&p, &metrics);
        let expected = 10_000.0 * (1.0 + metrics.estimated_daily_return_percent / 100.0)
            - metrics.monthly_commission;
        assert!((proj.points()[1].balance - round_cents(expected)).abs() < 1e-9);
        assert_eq!(proj.points()[1].total_fees_paid, 336.0);
    }

    #[test]
    fn deterministic_mode_pays_no_fees() {
        let p = base(jan_2025());
        let proj = project(&p);
        assert_eq!(proj.final_point().unwrap().total_fees_paid, 0.0);
    }

    #[test]
    fn summary_totals() {
        let mut p = base(jan_2025());
        p.growth_rate_percent = 0.0;
        p.monthly_contribution = 100.0;
        p.horizon_months = 10;
        let summary = project(&p).summary(p.initial_amount).unwrap();
        assert_eq!(summary.total_invested, 11_000.0);
        assert_eq!(summary.final_balance, 11_000.0);
        assert!(summary.total_gain.abs() < 1e-9);
        assert!(summary.total_return_percent.abs() < 1e-9);
    }
}
