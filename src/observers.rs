//! Renderers for snapshots and deltas.
//!
//! - [`rate`] - the monitor's fixed-width per-interval rate table
//! - [`table`] - lifetime or interval summary tables using the `tabled` crate
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//!
//! The rate table has no optional dependencies and is always available.

pub mod rate;

#[cfg(feature = "table")]
pub mod table;
