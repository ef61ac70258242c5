//! Export: JSON, CSV, and Markdown artifacts for a computed snapshot.
//!
//! - **JSON**: the full `Snapshot`, schema-versioned; newer versions are
//!   rejected on load
//! - **CSV**: month-by-month projection, per-run Monte Carlo results, and the
//!   worst/median/best equity curves
//! - **Markdown**: a single-scenario report

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use compoundsim_core::{MetricValue, MonteCarloRunResult, MonteCarloStatistics, ProjectionPoint};

use crate::session::{Snapshot, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `Snapshot` to pretty JSON.
pub fn snapshot_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).context("failed to serialize Snapshot to JSON")
}

/// Deserialize a `Snapshot`, rejecting schema versions newer than ours.
pub fn import_snapshot_json(json: &str) -> Result<Snapshot> {
    let snapshot: Snapshot =
        serde_json::from_str(json).context("failed to deserialize Snapshot from JSON")?;
    if snapshot.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            snapshot.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(snapshot)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per projection month, month 0 included.
pub fn projection_csv(points: &[ProjectionPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "month",
        "date",
        "balance",
        "monthly_contribution",
        "monthly_withdrawal",
        "monthly_fees",
        "total_contributed",
        "total_withdrawn",
        "total_fees_paid",
        "compounding_periods",
    ])?;

    for p in points {
        wtr.write_record([
            p.month.to_string(),
            p.date.to_string(),
            format!("{:.2}", p.balance),
            format!("{:.2}", p.monthly_contribution),
            format!("{:.2}", p.monthly_withdrawal),
            format!("{:.2}", p.monthly_fees),
            format!("{:.2}", p.total_contributed),
            format!("{:.2}", p.total_withdrawn),
            format!("{:.2}", p.total_fees_paid),
            p.compounding_periods.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per Monte Carlo run, in run-index order.
pub fn runs_csv(runs: &[MonteCarloRunResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "run_index",
        "final_balance",
        "max_drawdown_percent",
        "ruined",
        "trades_executed",
    ])?;

    for r in runs {
        wtr.write_record([
            r.run_index.to_string(),
            format!("{:.2}", r.final_balance),
            format!("{:.4}", r.max_drawdown_percent),
            r.ruined.to_string(),
            r.trades_executed.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Sampled equity curves of the worst, median and best runs, long format.
pub fn representative_curves_csv(stats: &MonteCarloStatistics) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["curve", "run_index", "trade", "balance"])?;

    for (label, run) in [
        ("worst", &stats.worst_run),
        ("median", &stats.median_run),
        ("best", &stats.best_run),
    ] {
        for sample in &run.equity_curve {
            wtr.write_record([
                label.to_string(),
                run.run_index.to_string(),
                sample.trade.to_string(),
                format!("{:.2}", sample.balance),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact sets ──────────────────────────────────────────────────

/// Save the full artifact set for a snapshot.
///
/// Creates `{fingerprint-prefix}_seed{seed}/` under `output_dir` containing:
/// - `snapshot.json` — the full `Snapshot`
/// - `projection.csv` — month-by-month projection
/// - `monte_carlo_runs.csv` — per-run results
/// - `representative_curves.csv` — worst/median/best equity curves
/// - `report.md` — human-readable summary
///
/// Returns the path to the created directory. Existing files are overwritten.
pub fn write_artifacts(snapshot: &Snapshot, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_seed{}",
        snapshot.fingerprint.short(),
        snapshot.monte_carlo.seed
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("snapshot.json", snapshot_json(snapshot)?),
        ("projection.csv", projection_csv(snapshot.projection.points())?),
        ("monte_carlo_runs.csv", runs_csv(&snapshot.monte_carlo.runs)?),
        (
            "representative_curves.csv",
            representative_curves_csv(&snapshot.monte_carlo.statistics)?,
        ),
        ("report.md", generate_report(snapshot)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    tracing::info!(dir = %run_dir.display(), "wrote artifacts");
    Ok(run_dir)
}

/// Load a `Snapshot` from an artifact directory's snapshot.json.
pub fn load_artifacts(dir: &Path) -> Result<Snapshot> {
    let path = dir.join("snapshot.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_snapshot_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for one snapshot.
pub fn generate_report(snapshot: &Snapshot) -> String {
    let mut md = String::with_capacity(2048);
    let p = &snapshot.params;

    md.push_str("# Account Growth Report\n\n");

    md.push_str("## Scenario\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Initial Amount | ${:.2} |\n", p.initial_amount));
    md.push_str(&format!(
        "| Start | {} ({} months) |\n",
        p.start_date, p.horizon_months
    ));
    md.push_str(&format!("| Mode | {:?} |\n", p.mode));
    md.push_str(&format!("| Compounding | {} |\n", p.compound_frequency));
    md.push_str(&format!(
        "| Monthly Contribution | ${:.2} |\n",
        p.monthly_contribution
    ));
    if p.withdrawal.enabled {
        md.push_str(&format!(
            "| Withdrawals | {} {:?} ({:?}) |\n",
            p.withdrawal.rate, p.withdrawal.kind, p.withdrawal.frequency
        ));
    }
    md.push_str(&format!("| Fingerprint | {} |\n", snapshot.fingerprint));
    md.push('\n');

    if let Some(s) = snapshot.summary() {
        md.push_str("## Projection\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Final Balance | ${:.2} |\n", s.final_balance));
        md.push_str(&format!("| Total Invested | ${:.2} |\n", s.total_invested));
        md.push_str(&format!("| Total Withdrawn | ${:.2} |\n", s.total_withdrawn));
        md.push_str(&format!("| Total Fees | ${:.2} |\n", s.total_fees_paid));
        md.push_str(&format!("| Total Gain | ${:.2} |\n", s.total_gain));
        md.push_str(&format!("| Total Return | {:.2}% |\n", s.total_return_percent));
        md.push_str(&format!(
            "| Compounding Periods | {} |\n",
            s.compounding_periods
        ));
        md.push('\n');
    }

    let m = &snapshot.metrics;
    md.push_str("## Trading Metrics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Expectancy | {:.3}R |\n", m.expectancy));
    md.push_str(&format!(
        "| Breakeven Win Rate | {:.2}% |\n",
        m.breakeven_win_rate
    ));
    md.push_str(&format!(
        "| Kelly (full / half / quarter) | {:.2}% / {:.2}% / {:.2}% |\n",
        m.kelly * 100.0,
        m.half_kelly * 100.0,
        m.quarter_kelly * 100.0
    ));
    md.push_str(&format!(
        "| Profit Factor | {} |\n",
        format_metric(m.profit_factor, 1.0)
    ));
    md.push_str(&format!(
        "| Monthly Commission | ${:.2} ({:.2}% of account) |\n",
        m.monthly_commission, m.commission_impact_percent
    ));
    md.push_str(&format!(
        "| Est. Daily Return | {:.3}% |\n",
        m.estimated_daily_return_percent
    ));
    md.push_str(&format!(
        "| Risk of Ruin (heuristic) | {} |\n",
        format_metric(m.risk_of_ruin_heuristic, 100.0)
    ));
    md.push_str(&format!(
        "| Max Drawdown (heuristic) | {:.1}% |\n",
        m.estimated_max_drawdown_heuristic
    ));
    md.push('\n');

    let mc = &snapshot.monte_carlo;
    let st = &mc.statistics;
    md.push_str("## Monte Carlo\n\n");
    md.push_str(&format!(
        "{} runs of {} trades, seed {} ({:?} source).\n\n",
        st.runs, mc.total_trades, mc.seed, mc.random_source
    ));
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Median | ${:.2} |\n", st.median));
    md.push_str(&format!("| Mean | ${:.2} |\n", st.mean));
    md.push_str(&format!(
        "| 10th / 90th Percentile | ${:.2} / ${:.2} |\n",
        st.percentile_10, st.percentile_90
    ));
    md.push_str(&format!(
        "| Avg / Max Drawdown | {:.2}% / {:.2}% |\n",
        st.average_drawdown_percent, st.max_drawdown_percent
    ));
    md.push_str(&format!("| Ruin Rate | {:.1}% |\n", st.ruin_rate_percent));
    md.push_str(&format!(
        "| Profitable Runs | {:.1}% |\n",
        st.profitable_rate_percent
    ));
    md.push('\n');

    md
}

/// Render a metric; `scale` multiplies finite values shown as percentages,
/// a scale of 1 prints the plain number.
pub fn format_metric(value: MetricValue, scale: f64) -> String {
    match value {
        MetricValue::Finite(v) if scale == 1.0 => format!("{v:.2}"),
        MetricValue::Finite(v) => format!("{:.2}%", v * scale),
        MetricValue::Degenerate(d) => format!("n/a ({d:?})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use compoundsim_core::{Degeneracy, SimulationParameters};

    fn sample_snapshot() -> Snapshot {
        let mut p = SimulationParameters::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        p.horizon_months = 3;
        p.monte_carlo.runs = 10;
        Snapshot::compute(&p, 1, None).unwrap()
    }

    // ─── JSON ───────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let original = sample_snapshot();
        let json = snapshot_json(&original).unwrap();
        let restored = import_snapshot_json(&json).unwrap();

        assert_eq!(restored.schema_version, SCHEMA_VERSION);
        assert_eq!(restored.fingerprint, original.fingerprint);
        assert_eq!(restored.projection.len(), original.projection.len());
        assert_eq!(restored.monte_carlo.runs.len(), 10);
        assert!(
            (restored.monte_carlo.statistics.median - original.monte_carlo.statistics.median)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut snapshot = sample_snapshot();
        snapshot.schema_version = 99;
        let json = snapshot_json(&snapshot).unwrap();
        let msg = import_snapshot_json(&json).unwrap_err().to_string();
        assert!(msg.contains("unsupported schema version 99"));
    }

    #[test]
    fn json_missing_version_defaults_to_current() {
        let json = snapshot_json(&sample_snapshot()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let restored = import_snapshot_json(&value.to_string()).unwrap();
        assert_eq!(restored.schema_version, SCHEMA_VERSION);
    }

    // ─── CSV ────────────────────────────────────────────────────────

    #[test]
    fn csv_projection_has_row_per_month() {
        let snapshot = sample_snapshot();
        let csv = projection_csv(snapshot.projection.points()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 1 + 4); // header + months 0..=3
        assert!(lines[0].starts_with("month,date,balance"));
        assert!(lines[1].starts_with("0,2025-01-01,10000.00"));
    }

    #[test]
    fn csv_runs_columns_and_order() {
        let snapshot = sample_snapshot();
        let csv = runs_csv(&snapshot.monte_carlo.runs).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "run_index,final_balance,max_drawdown_percent,ruined,trades_executed"
        );
        assert_eq!(lines.len(), 11);
        for (i, line) in lines[1..].iter().enumerate() {
            assert!(line.starts_with(&format!("{i},")));
        }
    }

    #[test]
    fn csv_empty_runs() {
        let csv = runs_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1); // header only
    }

    #[test]
    fn csv_curves_cover_three_runs() {
        let snapshot = sample_snapshot();
        let csv = representative_curves_csv(&snapshot.monte_carlo.statistics).unwrap();
        for label in ["worst,", "median,", "best,"] {
            assert!(csv.lines().any(|l| l.starts_with(label)), "missing {label}");
        }
    }

    // ─── Markdown ───────────────────────────────────────────────────

    #[test]
    fn report_contains_sections() {
        let md = generate_report(&sample_snapshot());
        assert!(md.contains("# Account Growth Report"));
        assert!(md.contains("## Projection"));
        assert!(md.contains("## Trading Metrics"));
        assert!(md.contains("## Monte Carlo"));
        assert!(md.contains("| Breakeven Win Rate | 33.33% |"));
    }

    #[test]
    fn degenerate_metrics_render_as_na() {
        assert_eq!(
            format_metric(MetricValue::Degenerate(Degeneracy::NoLosses), 1.0),
            "n/a (NoLosses)"
        );
        assert_eq!(format_metric(MetricValue::Finite(0.125), 100.0), "12.50%");
    }
}
