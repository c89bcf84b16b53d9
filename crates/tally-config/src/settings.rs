use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `/backtest` section.
///
/// ```yaml
/// backtest:
///   capital: 10000
///   margin: 1.0
///   multiplier: 1
///   risk_free: 0.0
///   symbols: [SPY, TLT]
///   start: 2020-01-02
///   end: 2023-12-29
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestSettings {
    /// Starting cash, in currency units.
    pub capital: f64,
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: i64,
    #[serde(default)]
    pub risk_free: f64,
    /// Empty means every symbol in the bar file.
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

fn default_margin() -> f64 {
    1.0
}

fn default_multiplier() -> i64 {
    1
}

impl BacktestSettings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let Some(section) = config_json.pointer("/backtest") else {
            bail!("CONFIG_MISSING_SECTION: /backtest");
        };
        let settings: BacktestSettings = serde_json::from_value(section.clone())
            .context("invalid /backtest section")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.capital.is_finite() && self.capital > 0.0) {
            bail!("CONFIG_INVALID /backtest/capital: must be > 0, got {}", self.capital);
        }
        if !(self.margin.is_finite() && self.margin >= 1.0) {
            bail!("CONFIG_INVALID /backtest/margin: must be >= 1, got {}", self.margin);
        }
        if self.multiplier < 1 {
            bail!(
                "CONFIG_INVALID /backtest/multiplier: must be >= 1, got {}",
                self.multiplier
            );
        }
        if !self.risk_free.is_finite() {
            bail!("CONFIG_INVALID /backtest/risk_free: must be finite");
        }
        if let Some(sym) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            bail!("CONFIG_INVALID /backtest/symbols: empty symbol {:?}", sym);
        }
        if let (Some(s), Some(e)) = (self.start, self.end) {
            if s > e {
                bail!("CONFIG_INVALID /backtest: start {} is after end {}", s, e);
            }
        }
        Ok(())
    }
}
