//! Engine configuration
//!
//! Parsed once when a page session is created. Every field has a default, so
//! an empty object (or no config at all) gives the stock behavior.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Aggressiveness;

/// When the popup guard blocks anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardGating {
    /// Armed only once the policy gate activates the session
    FollowPolicy,
    /// Armed as soon as the interception layer is installed
    Always,
}

/// What an unreachable policy authority means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailMode {
    /// Treat as enabled and not allow-listed
    Open,
    /// Treat as disabled
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_sweep_debounce_ms")]
    pub sweep_debounce_ms: u32,

    #[serde(default = "default_overlay_debounce_ms")]
    pub overlay_debounce_ms: u32,

    #[serde(default = "default_sanitizer_interval_ms")]
    pub sanitizer_interval_ms: u32,

    #[serde(default = "default_post_load_delay_ms")]
    pub post_load_delay_ms: u32,

    /// Sweeps slower than this are logged
    #[serde(default = "default_slow_sweep_ms")]
    pub slow_sweep_ms: f64,

    /// Clicks later than this after the last pointer-down are synthetic
    #[serde(default = "default_synthetic_click_window_ms")]
    pub synthetic_click_window_ms: f64,

    #[serde(default = "default_min_ad_size_px")]
    pub min_ad_size_px: f64,

    /// Fraction of each viewport dimension an overlay must cover
    #[serde(default = "default_overlay_coverage")]
    pub overlay_coverage: f64,

    #[serde(default = "default_guard_gating")]
    pub guard_gating: GuardGating,

    #[serde(default = "default_authority_failure")]
    pub authority_failure: FailMode,

    /// Overrides the site profile's level
    #[serde(default)]
    pub aggressiveness: Option<Aggressiveness>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_sweep_debounce_ms() -> u32 {
    250
}

fn default_overlay_debounce_ms() -> u32 {
    100
}

fn default_sanitizer_interval_ms() -> u32 {
    2000
}

fn default_post_load_delay_ms() -> u32 {
    1000
}

fn default_slow_sweep_ms() -> f64 {
    10.0
}

fn default_synthetic_click_window_ms() -> f64 {
    100.0
}

fn default_min_ad_size_px() -> f64 {
    crate::classifier::MIN_AD_SIZE_PX
}

fn default_overlay_coverage() -> f64 {
    0.8
}

fn default_guard_gating() -> GuardGating {
    GuardGating::FollowPolicy
}

fn default_authority_failure() -> FailMode {
    FailMode::Open
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_debounce_ms: default_sweep_debounce_ms(),
            overlay_debounce_ms: default_overlay_debounce_ms(),
            sanitizer_interval_ms: default_sanitizer_interval_ms(),
            post_load_delay_ms: default_post_load_delay_ms(),
            slow_sweep_ms: default_slow_sweep_ms(),
            synthetic_click_window_ms: default_synthetic_click_window_ms(),
            min_ad_size_px: default_min_ad_size_px(),
            overlay_coverage: default_overlay_coverage(),
            guard_gating: default_guard_gating(),
            authority_failure: default_authority_failure(),
            aggressiveness: None,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Blank input gives the defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("sweepDebounceMs", self.sweep_debounce_ms),
            ("overlayDebounceMs", self.overlay_debounce_ms),
            ("sanitizerIntervalMs", self.sanitizer_interval_ms),
            ("postLoadDelayMs", self.post_load_delay_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid { field, reason: "must be greater than zero" });
            }
        }
        if !(self.overlay_coverage > 0.0 && self.overlay_coverage <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "overlayCoverage",
                reason: "must be in (0, 1]",
            });
        }
        if self.min_ad_size_px < 0.0 {
            return Err(ConfigError::Invalid { field: "minAdSizePx", reason: "must not be negative" });
        }
        if log_level_filter(&self.log_level).is_none() {
            return Err(ConfigError::Invalid {
                field: "logLevel",
                reason: "expected off, error, warn, info, debug or trace",
            });
        }
        Ok(())
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        log_level_filter(&self.log_level).unwrap_or(log::LevelFilter::Info)
    }
}

fn log_level_filter(level: &str) -> Option<log::LevelFilter> {
    level.parse().ok()
}
