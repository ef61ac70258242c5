//! TOML scenario files.
//!
//! A scenario mirrors `SimulationParameters` section by section. Every key is
//! optional; missing keys take the calculator defaults.
//!
//! ```toml
//! [account]
//! initial_amount = 25000.0
//! start_date = "2025-01-01"
//! horizon_months = 24
//!
//! [growth]
//! mode = "stochastic"
//! compound_frequency = "weekday"
//!
//! [trading]
//! win_rate_percent = 45.0
//! risk_reward_ratio = 2.5
//!
//! [monte_carlo]
//! runs = 500
//! seed = 7
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use compoundsim_core::{
    CompoundFrequency, MonteCarloSettings, ParamError, ProjectionMode, SimulationParameters,
    TradingParameters, WithdrawalPlan,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scenario file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize scenario TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid scenario: {0}")]
    Invalid(#[from] ParamError),
}

/// A complete scenario as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub account: AccountConfig,
    pub growth: GrowthConfig,
    pub withdrawal: WithdrawalPlan,
    pub trading: TradingParameters,
    pub monte_carlo: MonteCarloSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    pub initial_amount: f64,
    pub monthly_contribution: f64,
    /// Quoted ISO date. Unset means "today" at resolution time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub horizon_months: u32,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_amount: 10_000.0,
            monthly_contribution: 0.0,
            start_date: None,
            horizon_months: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrowthConfig {
    pub mode: ProjectionMode,
    /// Percent per compounding event, deterministic mode only.
    pub rate_percent: f64,
    pub compound_frequency: CompoundFrequency,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            mode: ProjectionMode::Deterministic,
            rate_percent: 0.15,
            compound_frequency: CompoundFrequency::Weekday,
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a scenario from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scenario describing an existing parameter set.
    pub fn from_parameters(params: &SimulationParameters) -> Self {
        Self {
            account: AccountConfig {
                initial_amount: params.initial_amount,
                monthly_contribution: params.monthly_contribution,
                start_date: Some(params.start_date),
                horizon_months: params.horizon_months,
            },
            growth: GrowthConfig {
                mode: params.mode,
                rate_percent: params.growth_rate_percent,
                compound_frequency: params.compound_frequency.clone(),
            },
            withdrawal: params.withdrawal.clone(),
            trading: params.trading.clone(),
            monte_carlo: params.monte_carlo.clone(),
        }
    }

    /// Resolve into validated engine parameters. `today` fills a missing
    /// start date.
    pub fn into_parameters(self, today: NaiveDate) -> Result<SimulationParameters, ConfigError> {
        let params = SimulationParameters {
            initial_amount: self.account.initial_amount,
            growth_rate_percent: self.growth.rate_percent,
            compound_frequency: self.growth.compound_frequency,
            start_date: self.account.start_date.unwrap_or(today),
            horizon_months: self.account.horizon_months,
            monthly_contribution: self.account.monthly_contribution,
            mode: self.growth.mode,
            withdrawal: self.withdrawal,
            trading: self.trading,
            monte_carlo: self.monte_carlo,
        };
        params.validate()?;
        Ok(params)
    }
}
