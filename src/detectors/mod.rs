//! Series detectors
//!
//! A detector looks at one symbol's ordered series and reports at most one
//! match inside the most recent eligible days.
//!
//! # Builtin detectors
//!
//! - **Range break**: the recent highs break above the highest high of a
//!   preceding history window, confirmed by a short-vs-long volume surge.
//!   Configured through [`DetectionParameters`](crate::params::DetectionParameters);
//!   the Fast and Slow presets are two instances of it.

pub mod helpers;
pub mod range_break;

pub use helpers::*;
pub use range_break::*;
