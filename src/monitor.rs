//! The monitor loop: sample, diff, print, repeat.
//!
//! Each tick takes a fresh torn copy of the live block, diffs it against
//! the previous copy and prints one row of the rate table. The first copy
//! is taken before the loop starts, so the first row covers the first
//! interval rather than the server's whole lifetime.
//!
//! ```text
//!   curr = copy()
//!   loop:
//!       header, if due
//!       sleep(interval)
//!       prev = curr; curr = copy()
//!       delta = curr - prev
//!       row(delta)
//! ```
//!
//! The loop ends when its [`StopSignal`] is raised or after a configured
//! number of rows. It never returns early because of what it reads.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytemuck::Zeroable;
use tracing::debug;

use crate::counters::global::GlobalStats;
use crate::diff::{diff_into, DeltaStats};
use crate::error::Result;
use crate::observers::rate::{RateReporter, ReporterConfig, ReporterState};
use crate::protocol::ColumnPlan;
use crate::store::StatsSource;

/// A cloneable flag that asks a running [`Monitor`] to stop after the
/// current tick.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Periodically prints the rate table for one surface of a live block.
pub struct Monitor<S> {
    source: S,
    reporter: RateReporter,
    interval: Duration,
    max_ticks: Option<u64>,
    stop: StopSignal,
}

impl<S: StatsSource> Monitor<S> {
    /// Creates a monitor sampling once per second, with no tick bound.
    pub fn new(source: S, plan: ColumnPlan) -> Self {
        Self {
            source,
            reporter: RateReporter::new(plan),
            interval: Duration::from_secs(1),
            max_ticks: None,
            stop: StopSignal::new(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stops after `ticks` rows.
    pub fn max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn reporter_config(mut self, config: ReporterConfig) -> Self {
        self.reporter = RateReporter::with_config(self.reporter.plan().clone(), config);
        self
    }

    /// A handle that stops the loop from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn should_continue(&self, ticks: u64) -> bool {
        !self.stop.is_stopped() && self.max_ticks.map_or(true, |max| ticks < max)
    }

    /// Runs until stopped, writing the table to `out`. Returns the number
    /// of rows written.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let plan = self.reporter.plan().clone();
        let live = self.source.live();
        let mut prev: GlobalStats = Zeroable::zeroed();
        let mut curr = live.torn_snapshot();
        let mut delta = DeltaStats::zeroed();
        let mut ticks = 0;

        debug!(
            surface = ?plan.surface(),
            interval_ms = self.interval.as_millis() as u64,
            max_ticks = ?self.max_ticks,
            "monitor started"
        );

        while self.should_continue(ticks) {
            if self.reporter.state() == ReporterState::HeaderDue {
                self.reporter.write_header(out)?;
                out.flush()?;
            }
            thread::sleep(self.interval);
            if self.stop.is_stopped() {
                break;
            }
            std::mem::swap(&mut prev, &mut curr);
            live.torn_snapshot_into(&mut curr);
            diff_into(&curr, &prev, &mut delta, &plan);
            self.reporter.write_row(out, &delta)?;
            out.flush()?;
            ticks += 1;
        }

        debug!(ticks, "monitor stopped");
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::operation::Status;
    use crate::protocol::{nfs4, Minor, Protocol, Surface};
    use crate::store::LocalStats;

    fn v40_monitor(local: &LocalStats) -> Monitor<&LocalStats> {
        Monitor::new(local, ColumnPlan::new(Surface::NfsV4(Minor::V0))).interval(Duration::ZERO)
    }

    #[test]
    fn test_runs_bounded_ticks_with_headers() {
        let local = LocalStats::new();
        let mut monitor = v40_monitor(&local).max_ticks(12);
        let mut out = Vec::new();

        assert_eq!(monitor.run(&mut out).unwrap(), 12);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("ACCESS").count(), 2);
        let rows = text
            .lines()
            .filter(|l| l.starts_with('0'))
            .count();
        assert_eq!(rows, 12);
    }

    #[test]
    fn test_idle_server_prints_zero_rows() {
        let local = LocalStats::new();
        local.stats().v4.bump(nfs4::OPEN);
        let mut monitor = v40_monitor(&local).max_ticks(1);
        let mut out = Vec::new();
        monitor.run(&mut out).unwrap();

        // Activity before the first copy is not part of any interval.
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().last().unwrap();
        assert!(row.split_whitespace().all(|cell| cell == "0"), "{row:?}");
    }

    #[test]
    fn test_stop_signal_before_run() {
        let local = LocalStats::new();
        let mut monitor = v40_monitor(&local);
        monitor.stop_signal().stop();
        let mut out = Vec::new();
        assert_eq!(monitor.run(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_stop_from_another_thread() {
        let local = LocalStats::new();
        let mut monitor = v40_monitor(&local).interval(Duration::from_millis(1));
        let stop = monitor.stop_signal();
        let mut out = Vec::new();

        let ticks = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                stop.stop();
            });
            monitor.run(&mut out).unwrap()
        });
        assert!(ticks > 0);
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_cold_start_read_without_bytes() {
        let local = LocalStats::new();
        let plan = ColumnPlan::new(Surface::NfsV4(Minor::V0));
        let stats = local.stats();

        let prev = stats.torn_snapshot();
        stats.record_request_completed(
            Protocol::NfsV4(Minor::V0),
            nfs4::READ,
            Duration::from_millis(5),
            Status::Ok,
            false,
        );
        let curr = stats.torn_snapshot();

        let mut delta = DeltaStats::zeroed();
        diff_into(&curr, &prev, &mut delta, &plan);
        let row = RateReporter::new(plan).render_row(&delta);
        assert_eq!(row, format!("{}1    0    0    0    \n", "0         ".repeat(14)));
    }

    #[test]
    fn test_rows_reflect_activity_between_copies() {
        let local = LocalStats::new();
        let plan = ColumnPlan::new(Surface::NfsV4(Minor::V0));
        let mut reporter = RateReporter::new(plan.clone());
        let stats = local.stats();

        let prev = stats.torn_snapshot();
        stats.record_request_completed(
            Protocol::NfsV4(Minor::V0),
            nfs4::READ,
            Duration::from_micros(5),
            Status::Ok,
            false,
        );
        stats.record_io_completed(Protocol::NfsV4(Minor::V0), 2 << 20, 2 << 20, true, false);
        let curr = stats.torn_snapshot();

        let mut delta = DeltaStats::zeroed();
        diff_into(&curr, &prev, &mut delta, &plan);
        let mut out = Vec::new();
        reporter.report(&mut out, &delta).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("1    2    0    0    \n"), "{text:?}");
    }
}
