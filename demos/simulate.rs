//! Publishes a statistics region and drives it with synthetic NFS traffic.
//!
//! Run the producer in one terminal and the monitor in another:
//! ```bash
//! cargo run --example simulate --features cli -- --threads 4
//! cargo run --bin nfs-stats-monitor --features cli
//! ```
//!
//! Or watch the table in the same process:
//! ```bash
//! cargo run --example simulate --features cli -- --watch --seconds 15
//! ```

use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use nfs_stats::counters::global::LiveStats;
use nfs_stats::counters::operation::Status;
use nfs_stats::error::Result;
use nfs_stats::monitor::Monitor;
use nfs_stats::protocol::{nfs3, nfs4, nlm4, ColumnPlan, Minor, Protocol, Surface};
use nfs_stats::store::{StatsRegion, DEFAULT_KEY};
use nfs_stats::update::LayoutKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Synthetic traffic generator for the statistics region.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Key to publish the statistics region under
    #[arg(short, long, default_value_t = DEFAULT_KEY)]
    key: u32,

    /// Number of producer threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Pause between two compounds of one thread, in microseconds
    #[arg(short, long, default_value_t = 200)]
    pause_us: u64,

    /// NFSv4 minor version the clients speak
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=2))]
    minor: u32,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(short, long)]
    seconds: Option<u64>,

    /// Print the rate table from this process
    #[arg(short, long)]
    watch: bool,
}

/// One client's request mix, driven by the iteration number.
fn simulate_client(stats: &LiveStats, v4: Protocol, client: usize, j: usize) {
    let ok = |n: usize| Status::from(n % 20 != 0);
    let latency = Duration::from_micros(10 + ((client * 31 + j) % 200) as u64);
    let seq = client * 1_000_003 + j;
    let replay = j % 97 == 0;

    // PUTFH, GETATTR, and one of OPEN/LOOKUP/READ/WRITE per compound.
    stats.record_request_queued(v4, nfs4::PUTFH, Duration::from_micros((j % 7) as u64));
    stats.record_request_completed(v4, nfs4::PUTFH, latency, Status::Ok, replay);
    stats.record_request_completed(v4, nfs4::GETATTR, latency, ok(seq), replay);
    match j % 4 {
        0 => stats.record_request_completed(v4, nfs4::OPEN, latency * 3, ok(seq), false),
        1 => stats.record_request_completed(v4, nfs4::LOOKUP, latency, ok(seq), false),
        2 => {
            stats.record_request_completed(v4, nfs4::READ, latency * 2, Status::Ok, false);
            stats.record_io_completed(v4, 128 << 10, 128 << 10, true, false);
        }
        _ => {
            let success = ok(seq).is_ok();
            stats.record_request_completed(v4, nfs4::WRITE, latency * 4, ok(seq), false);
            let written = if success { 64 << 10 } else { 0 };
            stats.record_io_completed(v4, 64 << 10, written, success, true);
        }
    }
    stats.record_compound_completed(v4, 3, ok(seq), replay);

    if v4 != Protocol::NfsV4(Minor::V0) && j % 50 == 0 {
        stats.record_request_completed(v4, nfs4::LAYOUTGET, latency, Status::Ok, false);
        let recall = if j % 150 == 0 { Status::Retry } else { Status::Ok };
        stats.record_layout_event(v4, LayoutKind::Recall, recall);
    }

    // A trickle of legacy traffic.
    if j % 10 == 0 {
        let v3 = Protocol::NfsV3;
        stats.record_request_completed(v3, nfs3::GETATTR, latency, Status::Ok, false);
    }
    if j % 25 == 0 {
        stats.record_request_completed(Protocol::Nlm4, nlm4::LOCK, latency, ok(seq), false);
    }
}

fn run(args: &Args) -> Result<()> {
    let region = Arc::new(StatsRegion::create(args.key)?);
    let minor = Minor::from_number(args.minor).unwrap_or(Minor::V0);
    let v4 = Protocol::NfsV4(minor);
    let stop = Arc::new(AtomicBool::new(false));
    let pause = Duration::from_micros(args.pause_us);

    info!(key = args.key, threads = args.threads, "simulating {} clients", v4.name());

    let mut handles = vec![];
    for client in 0..args.threads {
        let region = Arc::clone(&region);
        let stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut j = 0usize;
            while !stop.load(Ordering::Relaxed) {
                simulate_client(region.stats(), v4, client, j);
                j = j.wrapping_add(1);
                thread::sleep(pause);
            }
        });
        handles.push(handle);
    }

    if args.watch {
        let plan = ColumnPlan::new(Surface::NfsV4(minor));
        let mut monitor = Monitor::new(Arc::clone(&region), plan);
        if let Some(seconds) = args.seconds {
            monitor = monitor.max_ticks(seconds);
        }
        let stdout = io::stdout();
        monitor.run(&mut stdout.lock())?;
    } else {
        match args.seconds {
            Some(seconds) => thread::sleep(Duration::from_secs(seconds)),
            None => loop {
                thread::park();
            },
        }
    }

    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("***{}", err);
        process::exit(err.os_code());
    }
}
