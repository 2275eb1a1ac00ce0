//! Prints per-second operation rates of a running file server.
//!
//! Run with:
//! ```bash
//! cargo run --bin nfs-stats-monitor --features cli -- --help
//! ```

use std::io;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use nfs_stats::error::Result;
use nfs_stats::monitor::Monitor;
use nfs_stats::observers::rate::ReporterConfig;
use nfs_stats::observers::table::{SummaryTable, TableStyle};
use nfs_stats::protocol::{ColumnPlan, Minor, Surface};
use nfs_stats::store::{StatsRegion, DEFAULT_KEY};
use tracing_subscriber::EnvFilter;

/// Which operation table to display.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ProtocolChoice {
    V3,
    #[default]
    V4,
}

/// Table style selection for `--summary`.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Extended,
    Markdown,
    #[value(name = "rst")]
    ReStructuredText,
    Dots,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Extended => TableStyle::Extended,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::ReStructuredText => TableStyle::ReStructuredText,
            StyleChoice::Dots => TableStyle::Dots,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Attach to the statistics region of a running server and print one row of
/// per-operation counts every interval.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Key the server published its statistics under
    #[arg(short, long, default_value_t = DEFAULT_KEY)]
    key: u32,

    /// Sampling interval in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Rows between repeated headers
    #[arg(long, default_value_t = 10)]
    header_every: u64,

    /// Protocol whose operations are shown
    #[arg(short, long, value_enum, default_value = "v4")]
    protocol: ProtocolChoice,

    /// NFSv4 minor version whose READ/WRITE byte counters are shown
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=2))]
    minor: u32,

    /// Stop after N rows
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Print lifetime totals as a table and exit
    #[arg(long)]
    summary: bool,

    /// Table style for --summary
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,
}

/// Logs go to stderr; stdout carries the table.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let region = StatsRegion::attach(args.key)?;

    if args.summary {
        let snapshot = region.stats().torn_snapshot();
        let summary = SummaryTable::new()
            .with_style(args.style.into())
            .with_title(format!("statistics region {}", region.key()));
        println!("{}", summary.render(&snapshot));
        return Ok(());
    }

    let surface = match args.protocol {
        ProtocolChoice::V3 => Surface::NfsV3,
        ProtocolChoice::V4 => Surface::NfsV4(Minor::from_number(args.minor).unwrap_or(Minor::V0)),
    };
    let config = ReporterConfig {
        header_every: args.header_every,
        ..ReporterConfig::default()
    };
    let mut monitor = Monitor::new(region, ColumnPlan::new(surface))
        .interval(Duration::from_millis(args.interval_ms))
        .reporter_config(config);
    if let Some(ticks) = args.ticks {
        monitor = monitor.max_ticks(ticks);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    monitor.run(&mut out)?;
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("***{}", err);
        process::exit(err.os_code());
    }
}
