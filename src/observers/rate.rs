//! Per-interval rate table for one protocol surface.
//!
//! [`RateReporter`] prints one fixed-width row per monitor tick: one column
//! per named opcode in ascending opcode order, then READ and WRITE, each
//! as a request count followed by the MiB transferred in the interval.
//! A header row is printed before the first row and then every
//! `header_every` rows, preceded by a blank line, so the column names stay
//! on screen while the table scrolls.
//!
//! ```text
//!
//! ACCESS    COMMIT    CREATE    GETATTR   ...  SETATTR   READ      WRITE
//! 12        0         1         340       ...  2         51   6    9    1
//! ```
//!
//! Cells are left-aligned and padded to the column width. Values wider than
//! a cell push the rest of the row to the right; nothing is truncated.

use std::io::{self, Write};

use crate::diff::DeltaStats;
use crate::protocol::ColumnPlan;

/// Width of the request count in the READ and WRITE cells.
const IO_COUNT_WIDTH: usize = 4;

/// Layout settings for a [`RateReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Rows between two headers.
    pub header_every: u64,
    /// Width of every cell, including READ and WRITE.
    pub column_width: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            header_every: 10,
            column_width: 10,
        }
    }
}

/// Whether the next row must be preceded by a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    HeaderDue,
    Steady,
}

/// Renders deltas as rows of a rate table.
///
/// # Examples
///
/// ```rust
/// use nfs_stats::diff::DeltaStats;
/// use nfs_stats::observers::rate::RateReporter;
/// use nfs_stats::protocol::{ColumnPlan, Minor, Surface};
///
/// let mut reporter = RateReporter::new(ColumnPlan::new(Surface::NfsV4(Minor::V0)));
/// let mut out = Vec::new();
/// reporter.report(&mut out, &DeltaStats::zeroed()).unwrap();
///
/// let text = String::from_utf8(out).unwrap();
/// let lines: Vec<_> = text.lines().collect();
/// assert_eq!(lines[0], "");
/// assert!(lines[1].starts_with("ACCESS    COMMIT"));
/// assert!(lines[1].ends_with("READ      WRITE     "));
/// ```
#[derive(Debug, Clone)]
pub struct RateReporter {
    plan: ColumnPlan,
    config: ReporterConfig,
    tick: u64,
}

impl RateReporter {
    pub fn new(plan: ColumnPlan) -> Self {
        Self::with_config(plan, ReporterConfig::default())
    }

    pub fn with_config(plan: ColumnPlan, config: ReporterConfig) -> Self {
        Self {
            plan,
            config: ReporterConfig {
                header_every: config.header_every.max(1),
                ..config
            },
            tick: 0,
        }
    }

    /// Sets the number of rows between headers. Values less than 1 are
    /// treated as 1.
    pub fn header_every(mut self, rows: u64) -> Self {
        self.config.header_every = rows.max(1);
        self
    }

    pub fn column_width(mut self, width: usize) -> Self {
        self.config.column_width = width;
        self
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }

    /// Rows emitted so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn state(&self) -> ReporterState {
        if self.tick % self.config.header_every == 0 {
            ReporterState::HeaderDue
        } else {
            ReporterState::Steady
        }
    }

    /// The header line, newline-terminated.
    pub fn render_header(&self) -> String {
        let w = self.config.column_width;
        let mut line = String::new();
        for column in self.plan.columns() {
            line.push_str(&format!("{:<w$}", column.name));
        }
        line.push_str(&format!(
            "{:<w$}{:<w$}\n",
            self.plan.read().name,
            self.plan.write().name
        ));
        line
    }

    /// One data line for `delta`, newline-terminated.
    pub fn render_row(&self, delta: &DeltaStats) -> String {
        let w = self.config.column_width;
        let mib = w.saturating_sub(IO_COUNT_WIDTH + 1);
        let surface = self.plan.surface();
        let table = surface.table(delta);
        let count = |op: u32| table.get(op as usize).copied().unwrap_or(0);

        let mut line = String::new();
        for column in self.plan.columns() {
            line.push_str(&format!("{:<w$}", count(column.opcode)));
        }
        let (read, write) = surface.io(delta);
        line.push_str(&format!(
            "{:<IO_COUNT_WIDTH$} {:<mib$}",
            count(self.plan.read().opcode),
            read.transferred >> 20
        ));
        line.push_str(&format!(
            "{:<IO_COUNT_WIDTH$} {:<mib$}\n",
            count(self.plan.write().opcode),
            write.transferred >> 20
        ));
        line
    }

    /// Writes a blank line and the header.
    pub fn write_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        out.write_all(self.render_header().as_bytes())
    }

    /// Writes one data row and advances the tick.
    pub fn write_row<W: Write>(&mut self, out: &mut W, delta: &DeltaStats) -> io::Result<()> {
        out.write_all(self.render_row(delta).as_bytes())?;
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }

    /// Writes the header if one is due, then the row for `delta`.
    pub fn report<W: Write>(&mut self, out: &mut W, delta: &DeltaStats) -> io::Result<()> {
        if self.state() == ReporterState::HeaderDue {
            self.write_header(out)?;
        }
        self.write_row(out, delta)
    }
}
