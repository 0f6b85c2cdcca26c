// src/types.rs
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use crate::drivers::{MeterError, DEFAULT_POINT_BUDGET};

// 采样率（轮询周期）
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    #[value(name = "0.1")]
    Tenth,
    #[value(name = "1")]
    One,
    #[default]
    #[value(name = "10")]
    Ten,
    #[value(name = "30")]
    Thirty,
    #[value(name = "100")]
    Hundred,
    #[value(name = "max")]
    Max,
}

impl SampleRate {
    /// Poll period; zero means "every UI frame".
    pub fn period(self) -> Duration {
        let ms = match self {
            SampleRate::Tenth => 10_000,
            SampleRate::One => 1_000,
            SampleRate::Ten => 100,
            SampleRate::Thirty => 20,
            SampleRate::Hundred => 10,
            SampleRate::Max => 0,
        };
        Duration::from_millis(ms)
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleRate::Tenth => "0.1 Hz",
            SampleRate::One => "1 Hz",
            SampleRate::Ten => "10 Hz",
            SampleRate::Thirty => "30 Hz",
            SampleRate::Hundred => "100 Hz",
            SampleRate::Max => "Max",
        }
    }

    // Windows 驱动跑不到 100 Hz，只给 30 Hz
    pub fn choices() -> &'static [SampleRate] {
        if cfg!(windows) {
            &[SampleRate::Tenth, SampleRate::One, SampleRate::Ten, SampleRate::Thirty]
        } else {
            &[
                SampleRate::Tenth,
                SampleRate::One,
                SampleRate::Ten,
                SampleRate::Hundred,
                SampleRate::Max,
            ]
        }
    }
}

pub const AVERAGE_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

// 单台功率计窗口的配置
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub wavelength_nm: f64,
    pub average_count: u32,
    pub sample_rate: SampleRate,
    pub point_budget: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wavelength_nm: 780.0,
            average_count: 10,
            sample_rate: SampleRate::Ten,
            point_budget: DEFAULT_POINT_BUDGET,
        }
    }
}

impl SessionConfig {
    pub fn from_json(text: &str) -> Result<Self, MeterError> {
        let config: SessionConfig = serde_json::from_str(text)?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, MeterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(self) -> Result<Self, MeterError> {
        if !AVERAGE_COUNT_RANGE.contains(&self.average_count) {
            return Err(MeterError::Config(format!(
                "average_count {} outside {:?}",
                self.average_count, AVERAGE_COUNT_RANGE
            )));
        }
        if self.point_budget == 0 {
            return Err(MeterError::Config("point_budget must be positive".into()));
        }
        if !self.wavelength_nm.is_finite() || self.wavelength_nm <= 0.0 {
            return Err(MeterError::Config(format!(
                "wavelength_nm {} is not a positive wavelength",
                self.wavelength_nm
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_match_rates() {
        assert_eq!(SampleRate::Tenth.period(), Duration::from_secs(10));
        assert_eq!(SampleRate::Ten.period(), Duration::from_millis(100));
        assert_eq!(SampleRate::Max.period(), Duration::ZERO);
        assert!(SampleRate::choices().contains(&SampleRate::default()));
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = SessionConfig::from_json(r#"{"wavelength_nm": 1064, "sample_rate": "one"}"#).unwrap();
        assert_eq!(config.wavelength_nm, 1064.0);
        assert_eq!(config.sample_rate, SampleRate::One);
        assert_eq!(config.average_count, 10);
        assert_eq!(SessionConfig::from_json("{}").unwrap(), SessionConfig::default());
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_json(r#"{"average_count": 0}"#),
            Err(MeterError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{"point_budget": 0}"#),
            Err(MeterError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_json("not json"),
            Err(MeterError::Config(_))
        ));
    }
}
