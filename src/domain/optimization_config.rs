//! Parameter bundle handed to the optimization stage.

use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RISK_AVERSION: f64 = 1.5;
pub const DEFAULT_UNIVERSE_SIZE_CAP: usize = 8;

/// Risk-aversion coefficient and universe size cap for one run.
///
/// Built fresh for every run and moved into it; no two runs share one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub risk_aversion: f64,
    pub universe_size_cap: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            risk_aversion: DEFAULT_RISK_AVERSION,
            universe_size_cap: DEFAULT_UNIVERSE_SIZE_CAP,
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.risk_aversion.is_finite() || self.risk_aversion <= 0.0 {
            return Err(PipelineError::InvalidConfig {
                reason: format!(
                    "risk_aversion must be positive, got {}",
                    self.risk_aversion
                ),
            });
        }
        if self.universe_size_cap == 0 {
            return Err(PipelineError::InvalidConfig {
                reason: "universe_size_cap must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Caller-supplied overrides for a pipeline request.
///
/// Accepts the dashboard's legacy `gamma` / `top_n` keys as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, alias = "gamma")]
    pub risk_aversion: Option<f64>,
    #[serde(default, alias = "top_n")]
    pub universe_size_cap: Option<usize>,
}

impl ConfigOverrides {
    pub fn new(risk_aversion: f64, universe_size_cap: usize) -> Self {
        Self {
            risk_aversion: Some(risk_aversion),
            universe_size_cap: Some(universe_size_cap),
        }
    }

    /// Overlays the overrides on the baseline config.
    pub fn apply(&self) -> Result<OptimizationConfig, PipelineError> {
        let mut config = OptimizationConfig::default();
        if let Some(gamma) = self.risk_aversion {
            config.risk_aversion = gamma;
        }
        if let Some(cap) = self.universe_size_cap {
            config.universe_size_cap = cap;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigOverrides::default().apply().unwrap();
        assert_eq!(config.risk_aversion, 1.5);
        assert_eq!(config.universe_size_cap, 8);
    }

    #[test]
    fn test_legacy_keys() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"gamma": 3.0, "top_n": 5}"#).unwrap();
        let config = overrides.apply().unwrap();
        assert_eq!(config.risk_aversion, 3.0);
        assert_eq!(config.universe_size_cap, 5);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(ConfigOverrides::new(0.0, 8).apply().is_err());
        assert!(ConfigOverrides::new(-1.0, 8).apply().is_err());
        assert!(ConfigOverrides::new(f64::NAN, 8).apply().is_err());
        assert!(ConfigOverrides::new(1.5, 0).apply().is_err());
    }
}
