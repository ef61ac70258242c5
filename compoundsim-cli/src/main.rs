//! CompoundSim CLI — account growth projection and Monte Carlo commands.
//!
//! Commands:
//! - `project` — month-by-month balance projection
//! - `metrics` — trading metrics for the scenario's trading parameters
//! - `simulate` — Monte Carlo simulation statistics
//! - `run` — all of the above, optionally saving artifacts
//! - `rerun` — like `run`, with a freshly drawn seed
//! - `export` — save the artifact set without printing tables
//! - `init` — write the resolved scenario as a TOML file
//!
//! Every command reads `--config <toml>` when given, otherwise the calculator
//! defaults; individual flags override either.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use compoundsim_core::{
    project_with_metrics, simulate, CompoundFrequency, Metrics, MonteCarloOutcome,
    ProjectionMode, ProjectionPoint, ProjectionSummary, RandomSource, SimulationParameters,
};
use compoundsim_runner::{format_metric, write_artifacts, ScenarioConfig, Session, Snapshot};

#[derive(Parser)]
#[command(
    name = "compoundsim",
    about = "CompoundSim CLI — trading account growth projection and Monte Carlo simulation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project the account balance month by month.
    Project {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compute trading metrics (expectancy, Kelly, breakeven, heuristics).
    Metrics {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the Monte Carlo simulation and print aggregate statistics.
    Simulate {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compute metrics, projection and simulation together.
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Save the artifact set under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Like `run`, with a freshly drawn Monte Carlo seed.
    Rerun {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Save the artifact set under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Save the artifact set (JSON, CSV, Markdown report).
    Export {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Output directory. Defaults to ./results.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Write the resolved scenario to a TOML file.
    Init {
        /// Destination file.
        path: PathBuf,

        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Scenario source plus per-field overrides.
#[derive(Args, Debug, Default, Clone)]
struct ScenarioArgs {
    /// Path to a TOML scenario file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting balance.
    #[arg(long)]
    initial: Option<f64>,

    /// Start date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    start: Option<String>,

    /// Projection horizon in months.
    #[arg(long)]
    months: Option<u32>,

    /// Growth rate in percent per compounding event (deterministic mode).
    #[arg(long)]
    rate: Option<f64>,

    /// Compounding frequency: daily, weekday, weekly, monthly, quarterly, yearly.
    #[arg(long)]
    frequency: Option<String>,

    /// Monthly contribution.
    #[arg(long)]
    contribution: Option<f64>,

    /// Derive the growth rate from trading metrics instead of --rate.
    #[arg(long, default_value_t = false)]
    stochastic: bool,

    /// Win rate in percent.
    #[arg(long)]
    win_rate: Option<f64>,

    /// Reward-to-risk ratio.
    #[arg(long)]
    risk_reward: Option<f64>,

    /// Percent of the balance risked per trade.
    #[arg(long)]
    risk: Option<f64>,

    /// Trades per trading day.
    #[arg(long)]
    trades_per_day: Option<f64>,

    /// One-way commission per trade.
    #[arg(long)]
    commission: Option<f64>,

    /// Number of Monte Carlo runs.
    #[arg(long)]
    runs: Option<usize>,

    /// Monte Carlo master seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Use the legacy sine-based generator (sequential runs).
    #[arg(long, default_value_t = false)]
    legacy_rng: bool,
}

impl ScenarioArgs {
    /// File (or defaults) with command-line overrides applied.
    fn scenario(&self) -> Result<ScenarioConfig> {
        let mut cfg = match &self.config {
            Some(path) => ScenarioConfig::from_file(path)
                .with_context(|| format!("loading scenario {}", path.display()))?,
            None => ScenarioConfig::default(),
        };

        if let Some(v) = self.initial {
            cfg.account.initial_amount = v;
        }
        if let Some(s) = self.start.as_deref() {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid --start date '{s}'"))?;
            cfg.account.start_date = Some(date);
        }
        if let Some(v) = self.months {
            cfg.account.horizon_months = v;
        }
        if let Some(v) = self.contribution {
            cfg.account.monthly_contribution = v;
        }
        if let Some(v) = self.rate {
            cfg.growth.rate_percent = v;
        }
        if let Some(s) = self.frequency.as_deref() {
            cfg.growth.compound_frequency = CompoundFrequency::from_label(s);
        }
        if self.stochastic {
            cfg.growth.mode = ProjectionMode::Stochastic;
        }
        if let Some(v) = self.win_rate {
            cfg.trading.win_rate_percent = v;
        }
        if let Some(v) = self.risk_reward {
            cfg.trading.risk_reward_ratio = v;
        }
        if let Some(v) = self.risk {
            cfg.trading.risk_per_trade_percent = v;
        }
        if let Some(v) = self.trades_per_day {
            cfg.trading.trades_per_day = v;
        }
        if let Some(v) = self.commission {
            cfg.trading.commission_per_trade = v;
        }
        if let Some(v) = self.runs {
            cfg.monte_carlo.runs = v;
        }
        if let Some(v) = self.seed {
            cfg.monte_carlo.seed = v;
        }
        if self.legacy_rng {
            cfg.monte_carlo.random_source = RandomSource::LegacySine;
        }
        Ok(cfg)
    }

    fn resolve(&self) -> Result<SimulationParameters> {
        let today = chrono::Local::now().date_naive();
        Ok(self.scenario()?.into_parameters(today)?)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Project { scenario, json } => run_project(&scenario, json),
        Commands::Metrics { scenario, json } => run_metrics(&scenario, json),
        Commands::Simulate { scenario, json } => run_simulate(&scenario, json),
        Commands::Run {
            scenario,
            output_dir,
        } => run_full(&scenario, false, output_dir.as_deref()),
        Commands::Rerun {
            scenario,
            output_dir,
        } => run_full(&scenario, true, output_dir.as_deref()),
        Commands::Export {
            scenario,
            output_dir,
        } => run_export(&scenario, &output_dir),
        Commands::Init {
            path,
            scenario,
            force,
        } => run_init(&path, &scenario, force),
    }
}

/// Logs go to stderr so tables and JSON on stdout stay clean. `RUST_LOG`
/// overrides the default `info` level.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_project(scenario: &ScenarioArgs, json: bool) -> Result<()> {
    let params = scenario.resolve()?;
    let metrics = Metrics::compute(&params.trading, params.initial_amount);
    let projection = project_with_metrics(&params, &metrics);

    if json {
        println!("{}", serde_json::to_string_pretty(&projection)?);
        return Ok(());
    }
    print_projection(projection.points());
    if let Some(summary) = projection.summary(params.initial_amount) {
        print_projection_summary(&summary);
    }
    Ok(())
}

fn run_metrics(scenario: &ScenarioArgs, json: bool) -> Result<()> {
    let params = scenario.resolve()?;
    let metrics = Metrics::compute(&params.trading, params.initial_amount);

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }
    print_metrics(&metrics);
    Ok(())
}

fn run_simulate(scenario: &ScenarioArgs, json: bool) -> Result<()> {
    let params = scenario.resolve()?;
    let outcome = simulate(&params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.statistics)?);
        return Ok(());
    }
    print_monte_carlo(&outcome);
    Ok(())
}

fn run_full(scenario: &ScenarioArgs, fresh_seed: bool, output_dir: Option<&Path>) -> Result<()> {
    let params = scenario.resolve()?;
    let session = Session::new();
    let snapshot = if fresh_seed {
        session.rerun(&params)?
    } else {
        session.recompute(&params)?
    };

    print_summary(&snapshot);

    if let Some(dir) = output_dir {
        let run_dir = write_artifacts(&snapshot, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_export(scenario: &ScenarioArgs, output_dir: &Path) -> Result<()> {
    let params = scenario.resolve()?;
    let snapshot = Session::new().recompute(&params)?;
    let run_dir = write_artifacts(&snapshot, output_dir)?;
    println!("{}", run_dir.display());
    Ok(())
}

fn run_init(path: &Path, scenario: &ScenarioArgs, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let params = scenario.resolve()?;
    let text = ScenarioConfig::from_parameters(&params).to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Scenario written to: {}", path.display());
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_projection(points: &[ProjectionPoint]) {
    println!();
    println!(
        "{:>5}  {:<10}  {:>14}  {:>12}  {:>12}  {:>10}",
        "Month", "Date", "Balance", "Contributed", "Withdrawn", "Fees"
    );
    for p in points {
        println!(
            "{:>5}  {:<10}  {:>14.2}  {:>12.2}  {:>12.2}  {:>10.2}",
            p.month,
            p.date,
            p.balance,
            p.total_contributed,
            p.total_withdrawn,
            p.total_fees_paid
        );
    }
}

fn print_projection_summary(s: &ProjectionSummary) {
    println!();
    println!("--- Projection ---");
    println!("Final Balance:  ${:.2}", s.final_balance);
    println!("Total Invested: ${:.2}", s.total_invested);
    println!("Withdrawn:      ${:.2}", s.total_withdrawn);
    println!("Fees Paid:      ${:.2}", s.total_fees_paid);
    println!("Total Gain:     ${:.2}", s.total_gain);
    println!("Total Return:   {:.2}%", s.total_return_percent);
    println!("Compoundings:   {}", s.compounding_periods);
}

fn print_metrics(m: &Metrics) {
    println!();
    println!("--- Trading Metrics ---");
    println!(
        "Expectancy:     {:.3}R ({})",
        m.expectancy,
        if m.is_positive_expectancy {
            "positive"
        } else {
            "negative"
        }
    );
    println!(
        "Breakeven Win:  {:.2}% ({:+.2} pts)",
        m.breakeven_win_rate, m.win_rate_vs_breakeven
    );
    println!(
        "Kelly:          {:.2}% (half {:.2}%, quarter {:.2}%)",
        m.kelly * 100.0,
        m.half_kelly * 100.0,
        m.quarter_kelly * 100.0
    );
    println!("Profit Factor:  {}", format_metric(m.profit_factor, 1.0));
    println!(
        "Commission:     ${:.2}/day, ${:.2}/month ({:.2}% of account)",
        m.daily_commission, m.monthly_commission, m.commission_impact_percent
    );
    println!("Daily Return:   {:.3}%", m.estimated_daily_return_percent);
    println!(
        "Risk of Ruin:   {} (heuristic)",
        format_metric(m.risk_of_ruin_heuristic, 100.0)
    );
    println!(
        "Max Drawdown:   {:.1}% (heuristic)",
        m.estimated_max_drawdown_heuristic
    );
}

fn print_monte_carlo(outcome: &MonteCarloOutcome) {
    let s = &outcome.statistics;
    println!();
    println!("--- Monte Carlo ---");
    println!(
        "Runs:           {} x {} trades (seed {}, {:?})",
        s.runs, outcome.total_trades, outcome.seed, outcome.random_source
    );
    println!("Median:         ${:.2}", s.median);
    println!("Mean:           ${:.2}", s.mean);
    println!("10th Pct:       ${:.2}", s.percentile_10);
    println!("90th Pct:       ${:.2}", s.percentile_90);
    println!("Avg Drawdown:   {:.2}%", s.average_drawdown_percent);
    println!("Max Drawdown:   {:.2}%", s.max_drawdown_percent);
    println!("Ruin Rate:      {:.1}%", s.ruin_rate_percent);
    println!("Profitable:     {:.1}%", s.profitable_rate_percent);
    println!(
        "Worst / Best:   ${:.2} (run {}) / ${:.2} (run {})",
        s.worst_run.final_balance,
        s.worst_run.run_index,
        s.best_run.final_balance,
        s.best_run.run_index
    );
}

fn print_summary(snapshot: &Snapshot) {
    println!();
    println!("=== CompoundSim Result ===");
    let p = &snapshot.params;
    println!("Fingerprint:    {}", snapshot.fingerprint.short());
    println!(
        "Start:          {} ({} months, {})",
        p.start_date, p.horizon_months, p.compound_frequency
    );
    println!("Mode:           {:?}", p.mode);
    if let Some(summary) = snapshot.summary() {
        print_projection_summary(&summary);
    }
    print_metrics(&snapshot.metrics);
    print_monte_carlo(&snapshot.monte_carlo);
    if !snapshot.metrics.is_positive_expectancy {
        println!();
        println!("WARNING: negative expectancy; the strategy loses money on average");
    }
}
