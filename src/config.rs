//! Engine configuration
//!
//! Every field defaults to the built-in constant, so an empty JSON object is a
//! valid configuration and hosts only spell out what they override.

use crate::error::EngageError;
use crate::motion::{MOTION_NOISE_FLOOR_PCT, MOTION_THRESHOLD};
use crate::sampler::{DOWNSCALE, SAMPLE_INTERVAL_MS};
use crate::scoring::TimeWindow;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngageConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Frame sampling and motion detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Minimum spacing between accepted samples
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: i64,
    /// Linear scale applied to native frame dimensions before diffing
    #[serde(default = "default_downscale")]
    pub downscale: f64,
    /// Per-pixel |ΔR|+|ΔG|+|ΔB| above which a pixel counts as changed
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: u32,
    /// Motion percentage above which a sample counts as "has motion"
    #[serde(default = "default_noise_floor")]
    pub motion_noise_floor_pct: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            downscale: DOWNSCALE,
            motion_threshold: MOTION_THRESHOLD,
            motion_noise_floor_pct: MOTION_NOISE_FLOOR_PCT,
        }
    }
}

fn default_sample_interval_ms() -> i64 {
    SAMPLE_INTERVAL_MS
}

fn default_downscale() -> f64 {
    DOWNSCALE
}

fn default_motion_threshold() -> u32 {
    MOTION_THRESHOLD
}

fn default_noise_floor() -> f64 {
    MOTION_NOISE_FLOOR_PCT
}

/// Expected-duration window test sessions are scored against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_test_window")]
    pub test_window: TimeWindow,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            test_window: TimeWindow::TEST,
        }
    }
}

fn default_test_window() -> TimeWindow {
    TimeWindow::TEST
}

impl EngageConfig {
    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngageError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, EngageError> {
        serde_json::to_string_pretty(self).map_err(EngageError::JsonError)
    }

    /// Reject values the sampler or scoring engine cannot work with
    pub fn validate(&self) -> Result<(), EngageError> {
        let sampler = &self.sampler;
        if sampler.sample_interval_ms <= 0 {
            return Err(EngageError::Config(format!(
                "sample_interval_ms must be positive, got {}",
                sampler.sample_interval_ms
            )));
        }
        if !(sampler.downscale > 0.0 && sampler.downscale <= 1.0) {
            return Err(EngageError::Config(format!(
                "downscale must be in (0, 1], got {}",
                sampler.downscale
            )));
        }
        if !(0.0..=100.0).contains(&sampler.motion_noise_floor_pct) {
            return Err(EngageError::Config(format!(
                "motion_noise_floor_pct must be in [0, 100], got {}",
                sampler.motion_noise_floor_pct
            )));
        }
        let window = self.scoring.test_window;
        if !(window.min_sec > 0.0 && window.min_sec <= window.max_sec) {
            return Err(EngageError::Config(format!(
                "test_window needs 0 < min_sec <= max_sec, got {}..{}",
                window.min_sec, window.max_sec
            )));
        }
        Ok(())
    }
}
