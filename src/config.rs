use anyhow::Context;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::optimizer::OptimizerSettings;
use crate::pipeline::aggregate::TimeWindow;
use crate::pipeline::normalize::{DEFAULT_PRECEDENCE, TimeSide};

/// Time-of-day filter applied before stop-pair aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    /// Target times in `HH:MM:SS`.
    pub targets: Vec<NaiveTime>,
    pub window_minutes: u32,
    #[serde(default)]
    pub min_support: usize,
}

impl WindowConfig {
    pub fn windows(&self) -> Result<Vec<TimeWindow>> {
        self.targets
            .iter()
            .map(|&t| TimeWindow::around(t, self.window_minutes))
            .collect()
    }
}

/// Analysis settings, stored as a JSON object on disk:
/// ```json
/// {
///   "precedence": ["departure", "arrival"],
///   "window": { "targets": ["07:30:00", "16:00:00"], "windowMinutes": 5, "minSupport": 10 },
///   "weatherElements": ["air_temperature"],
///   "optimizer": { "maxAdjustmentPerStop": 30, "maxIterations": 10000 }
/// }
/// ```
/// Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub precedence: Vec<TimeSide>,
    pub window: Option<WindowConfig>,
    pub weather_elements: Vec<String>,
    pub optimizer: OptimizerSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            precedence: DEFAULT_PRECEDENCE.to_vec(),
            window: None,
            weather_elements: vec!["air_temperature".to_string()],
            optimizer: OptimizerSettings::default(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.precedence.is_empty() {
            return Err(PipelineError::Config("precedence list is empty".into()));
        }

        let o = &self.optimizer;
        if !(o.max_adjustment_per_stop.is_finite() && o.max_adjustment_per_stop > 0.0) {
            return Err(PipelineError::Config(format!(
                "maxAdjustmentPerStop must be positive, got {}",
                o.max_adjustment_per_stop
            )));
        }
        for (name, ratio) in [
            ("minSpacingRatio", o.min_spacing_ratio),
            ("maxTotalDriftRatio", o.max_total_drift_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::Config(format!(
                    "{name} must lie in (0, 1], got {ratio}"
                )));
            }
        }

        if let Some(window) = &self.window {
            if window.targets.is_empty() {
                return Err(PipelineError::Config("window has no target times".into()));
            }
            window.windows()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.precedence, vec![TimeSide::Departure, TimeSide::Arrival]);
        assert_eq!(config.optimizer.min_spacing_ratio, 0.8);
        assert_eq!(config.optimizer.max_total_drift_ratio, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "precedence": ["arrival"],
                "window": {{ "targets": ["07:30:00"], "windowMinutes": 5, "minSupport": 3 }},
                "optimizer": {{ "maxAdjustmentPerStop": 12.5 }}
            }}"#
        )
        .unwrap();

        let config = AnalysisConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.precedence, vec![TimeSide::Arrival]);
        assert_eq!(config.optimizer.max_adjustment_per_stop, 12.5);
        assert_eq!(config.optimizer.min_spacing_ratio, 0.8);
        let window = config.window.unwrap();
        assert_eq!(window.min_support, 3);
        assert_eq!(window.windows().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let mut config = AnalysisConfig::default();
        config.optimizer.min_spacing_ratio = 1.5;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_precedence() {
        let config = AnalysisConfig {
            precedence: vec![],
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
