//! Summary table for lifetime or interval counters.
//!
//! [`SummaryTable`] renders every family counter of a [`GlobalStats`] as a
//! row of a `tabled` table: completions, errors, duplicates and execution
//! latency, plus operations per compound for each NFSv4 minor version.
//! pNFS layout counters get a table of their own.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! nfs-stats = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use nfs_stats::observers::table::{SummaryTable, TableStyle};
//! use nfs_stats::store::StatsRegion;
//!
//! let region = StatsRegion::attach(2049)?;
//! let snapshot = region.stats().torn_snapshot();
//! let summary = SummaryTable::new().with_style(TableStyle::Sharp);
//! println!("{}", summary.render(&snapshot));
//! // ┌───────────────────┬───────┬────────┬──────┬──────────┬──────────┬──────────┬──────────────┐
//! // │ Counter           │ Total │ Errors │ Dups │ Avg (ns) │ Min (ns) │ Max (ns) │ Ops/compound │
//! // ├───────────────────┼───────┼────────┼──────┼──────────┼──────────┼──────────┼──────────────┤
//! // │ NFSv3             │ 1200  │ 3      │ 0    │ 81000    │ 9000     │ 4100000  │              │
//! // ...
//! ```
//!
//! Averages divide by counts that may be zero; such cells show `0`.

use tabled::{settings::Style, Table, Tabled};

use crate::counters::global::{GlobalStats, NfsV41Stats};
use crate::counters::operation::{LayoutCounter, OperationCounter};
use crate::protocol::{Minor, Protocol, Surface};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    Modern,
    Extended,
    /// GitHub-flavored Markdown table
    Markdown,
    ReStructuredText,
    Dots,
    /// No borders, just spacing
    Blank,
}

/// Configuration for the summary table.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub style: TableStyle,
    /// Whether to show the header row.
    pub show_header: bool,
    pub title: Option<String>,
    /// Omit families that recorded nothing.
    pub skip_idle: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
            skip_idle: false,
        }
    }
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Counter")]
    name: String,
    #[tabled(rename = "Total")]
    total: u64,
    #[tabled(rename = "Errors")]
    errors: u64,
    #[tabled(rename = "Dups")]
    dups: u64,
    #[tabled(rename = "Avg (ns)")]
    avg: u64,
    #[tabled(rename = "Min (ns)")]
    min: u64,
    #[tabled(rename = "Max (ns)")]
    max: u64,
    #[tabled(rename = "Ops/compound")]
    ops_per_compound: String,
}

impl OperationRow {
    fn new(name: impl Into<String>, op: &OperationCounter) -> Self {
        Self {
            name: name.into(),
            total: op.total,
            errors: op.errors,
            dups: op.dups,
            avg: op.average_latency(),
            min: op.latency.min,
            max: op.latency.max,
            ops_per_compound: String::new(),
        }
    }
}

#[derive(Tabled)]
struct LayoutRow {
    #[tabled(rename = "Layout op")]
    name: String,
    #[tabled(rename = "Total")]
    total: u64,
    #[tabled(rename = "Errors")]
    errors: u64,
    #[tabled(rename = "Delays")]
    delays: u64,
}

impl LayoutRow {
    fn new(version: &str, op: &str, counter: &LayoutCounter) -> Self {
        Self {
            name: format!("{version} {op}"),
            total: counter.total,
            errors: counter.errors,
            delays: counter.delays,
        }
    }
}

/// Renders a [`GlobalStats`] as summary tables.
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    config: SummaryConfig,
}

impl SummaryTable {
    /// Creates a summary table with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SummaryConfig) -> Self {
        Self { config }
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn skip_idle(mut self, skip: bool) -> Self {
        self.config.skip_idle = skip;
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Extended => {
                table.with(Style::extended());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::ReStructuredText => {
                table.with(Style::re_structured_text());
            }
            TableStyle::Dots => {
                table.with(Style::dots());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn finish(&self, mut table: Table) -> String {
        self.apply_style(&mut table);
        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }
        table.to_string()
    }

    fn operation_rows(&self, stats: &GlobalStats) -> Vec<OperationRow> {
        let mut rows = vec![
            OperationRow::new(Protocol::NfsV3.name(), &stats.nfsv3.cmds),
            OperationRow::new("NFSv3 READ", &stats.nfsv3.read.cmd),
            OperationRow::new("NFSv3 WRITE", &stats.nfsv3.write.cmd),
            OperationRow::new(Protocol::MountV1.name(), &stats.mnt.v1_ops),
            OperationRow::new(Protocol::MountV3.name(), &stats.mnt.v3_ops),
            OperationRow::new(Protocol::Nlm4.name(), &stats.nlm4.ops),
            OperationRow::new(Protocol::Rquota.name(), &stats.rquota.ops),
            OperationRow::new(Protocol::RquotaExt.name(), &stats.rquota.ext_ops),
        ];
        for minor in [Minor::V0, Minor::V1, Minor::V2] {
            let version = Protocol::NfsV4(minor).name();
            let (compounds, _) = stats.compounds(minor);
            let (read, write) = Surface::NfsV4(minor).io(stats);
            let mut row = OperationRow::new(format!("{version} compounds"), compounds);
            row.ops_per_compound = stats.average_ops_per_compound(minor).to_string();
            rows.push(row);
            rows.push(OperationRow::new(format!("{version} READ"), &read.cmd));
            rows.push(OperationRow::new(format!("{version} WRITE"), &write.cmd));
        }
        if self.config.skip_idle {
            rows.retain(|r| r.total != 0 || r.avg != 0);
        }
        rows
    }

    fn layout_rows(&self, stats: &GlobalStats) -> Vec<LayoutRow> {
        let families: [(&str, &NfsV41Stats); 2] = [
            (Protocol::NfsV4(Minor::V1).name(), &stats.nfsv41),
            (Protocol::NfsV4(Minor::V2).name(), &stats.nfsv42),
        ];
        let mut rows = Vec::new();
        for (version, family) in families {
            rows.push(LayoutRow::new(version, "GETDEVICEINFO", &family.getdevinfo));
            rows.push(LayoutRow::new(version, "LAYOUTGET", &family.layout_get));
            rows.push(LayoutRow::new(version, "LAYOUTCOMMIT", &family.layout_commit));
            rows.push(LayoutRow::new(version, "LAYOUTRETURN", &family.layout_return));
            rows.push(LayoutRow::new(version, "RECALL", &family.recall));
        }
        if self.config.skip_idle {
            rows.retain(|r| r.total != 0);
        }
        rows
    }

    /// Renders the per-family operation table.
    pub fn render_operations(&self, stats: &GlobalStats) -> String {
        self.finish(Table::new(self.operation_rows(stats)))
    }

    /// Renders the pNFS layout table.
    pub fn render_layouts(&self, stats: &GlobalStats) -> String {
        self.finish(Table::new(self.layout_rows(stats)))
    }

    /// Renders both tables, under the title if one is set.
    pub fn render(&self, stats: &GlobalStats) -> String {
        let body = format!(
            "{}\n{}",
            self.render_operations(stats),
            self.render_layouts(stats)
        );
        match self.config.title {
            Some(ref title) => format!("{}\n{}", title, body),
            None => body,
        }
    }
}
