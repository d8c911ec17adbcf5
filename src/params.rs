//! Detection parameters and their metadata
//!
//! This module holds the named range-break configurations and metadata about
//! every tunable parameter, enabling:
//! - Fast / Slow presets that can be enabled side by side
//! - Configuration from deserialized request data
//! - Grid search over detection parameters
//!
//! # Example
//!
//! ```rust
//! use breakscan::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use breakscan::prelude::*;
//!
//! // Get parameter metadata for the range-break detector
//! let params = RangeBreakDetector::param_meta();
//! for param in params {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{volume::AverageKind, Period, Result, ScreenError, Threshold, VariantId};

/// Days at the end of a series eligible to be flagged, unless configured
pub const DEFAULT_RECENT_WINDOW_DAYS: usize = 10;

// ============================================================
// DETECTION PARAMETERS
// ============================================================

/// One range-break configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionParameters {
  /// Days before the recent window whose highs form the range
  pub history_window: Period,
  /// Days whose highs must break out of the range
  pub recent_window_days: Period,
  /// Short average volume must exceed long average volume times this
  pub volume_ratio_threshold: Threshold,
  pub volume_short_window: Period,
  pub volume_long_window: Period,
  #[serde(default)]
  pub volume_average_type: AverageKind,
}

impl DetectionParameters {
  /// Bars required before a match is possible
  pub fn min_bars(&self) -> usize {
    let break_bars = self.history_window.get() + self.recent_window_days.get();
    break_bars.max(self.volume_long_window.get())
  }

  pub fn validate(&self) -> Result<()> {
    if self.volume_short_window >= self.volume_long_window {
      return Err(ScreenError::InvalidConfig(format!(
        "volume short window ({}) must be shorter than long window ({})",
        self.volume_short_window.get(),
        self.volume_long_window.get()
      )));
    }
    Ok(())
  }
}

impl Default for DetectionParameters {
  fn default() -> Self {
    Preset::Fast.parameters()
  }
}

impl From<Preset> for DetectionParameters {
  fn from(preset: Preset) -> Self {
    preset.parameters()
  }
}

/// Named range-break variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
  /// Shorter range, EMA volume confirmation
  Fast,
  /// Longer range, SMA volume confirmation
  Slow,
}

impl Preset {
  pub const ALL: [Preset; 2] = [Preset::Fast, Preset::Slow];

  pub fn id(self) -> VariantId {
    match self {
      Preset::Fast => VariantId::FAST,
      Preset::Slow => VariantId::SLOW,
    }
  }

  pub const fn parameters(self) -> DetectionParameters {
    match self {
      Preset::Fast => DetectionParameters {
        history_window: Period::new_const(100),
        recent_window_days: Period::new_const(10),
        volume_ratio_threshold: Threshold::new_const(1.7),
        volume_short_window: Period::new_const(20),
        volume_long_window: Period::new_const(100),
        volume_average_type: AverageKind::Ema,
      },
      Preset::Slow => DetectionParameters {
        history_window: Period::new_const(200),
        recent_window_days: Period::new_const(20),
        volume_ratio_threshold: Threshold::new_const(1.5),
        volume_short_window: Period::new_const(50),
        volume_long_window: Period::new_const(200),
        volume_average_type: AverageKind::Sma,
      },
    }
  }
}

/// Which presets are active plus the shared eligible-day window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfiguration {
  pub enabled: Vec<Preset>,
  pub recent_window_days: usize,
}

impl Default for EngineConfiguration {
  fn default() -> Self {
    Self { enabled: Preset::ALL.to_vec(), recent_window_days: DEFAULT_RECENT_WINDOW_DAYS }
  }
}

// ============================================================
// PARAMETER TYPES
// ============================================================

/// How a raw parameter value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Positive multiplier
  Threshold,
  /// Whole number of trading days
  Period,
  /// On/off switch, encoded as 0 or 1
  Flag,
}

/// Describes one tunable detection parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "history_window")
  pub name: &'static str,
  /// Parameter type (Threshold or Period)
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Sweep bounds and step: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Threshold parameter
  pub const fn threshold(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Threshold, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// On/off parameter; sweeps both settings
  pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
    let default = if default { 1.0 } else { 0.0 };
    Self { name, param_type: ParamType::Flag, default, range: (0.0, 1.0, 1.0), description }
  }

  /// Every value of the sweep, bounds included
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Reject values outside the sweep bounds, or fractional day counts
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(ScreenError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Threshold => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(ScreenError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Flag => {
        if value != 0.0 && value != 1.0 {
          return Err(ScreenError::InvalidValue("Flag must be 0 or 1"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Detectors whose configuration can be enumerated and rebuilt from raw values,
/// e.g. to sweep the range-break windows over a grid.
pub trait ParameterizedDetector: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Build a detector named `variant`; keys absent from `params` keep their defaults.
  fn with_params(variant: VariantId, params: &HashMap<&str, f64>) -> Result<Self>;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Multiplier parameter, falling back to `default`
pub fn get_threshold(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Threshold> {
  let value = params.get(key).copied().unwrap_or(default);
  Threshold::new(value)
}

/// Day-count parameter, falling back to `default`
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 1.0 || value.fract() != 0.0 {
    return Err(ScreenError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// On/off parameter encoded as 0 or 1, falling back to `default`
pub fn get_flag(params: &HashMap<&str, f64>, key: &str, default: bool) -> Result<bool> {
  match params.get(key).copied() {
    None => Ok(default),
    Some(v) if v == 0.0 => Ok(false),
    Some(v) if v == 1.0 => Ok(true),
    Some(_) => Err(ScreenError::InvalidValue("Flag must be 0 or 1")),
  }
}

// ============================================================
// TESTS
// ============================================================
