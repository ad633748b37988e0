//! Metric names for the ocean plugin.
//!
//! Crates record through the re-exported `metrics` facade macros behind their
//! own optional `metrics` feature. Nothing is exported unless the host
//! installs a recorder.
//!
//! ```rust,ignore
//! use ocean_metrics::{commands, counter};
//!
//! counter!(commands::INVOCATIONS_TOTAL, "subcommand" => "droplets").increment(1);
//! ```

mod definitions;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};
