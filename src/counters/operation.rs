//! Per-operation counters: request counts, outcomes, latency and bytes.
//!
//! This module provides the three counter shapes every protocol family is
//! assembled from:
//!
//! | Type | Tracks | Used for |
//! |------|--------|----------|
//! | [`OperationCounter`] | total, errors, duplicates, three latency triples | every RPC family, NFSv4 compounds |
//! | [`TransferCounter`] | an `OperationCounter` plus requested/transferred bytes | READ and WRITE |
//! | [`LayoutCounter`] | total, errors, delays | pNFS layout operations |
//!
//! Each is generic over its leaf: `Stat` for the live block, `u64` for a
//! snapshot. Recording methods exist only on the live form; reading helpers
//! such as averages exist only on the snapshot form.

use crate::counters::Stat;

/// Outcome of a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The server asked the client to try again later (`NFS4ERR_DELAY`).
    ///
    /// Layout counters record this as a delay. Everywhere else it is an
    /// error like any other non-OK status.
    Retry,
    /// The operation failed.
    Failed,
}

impl Status {
    /// Returns `true` for [`Status::Ok`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl From<bool> for Status {
    fn from(success: bool) -> Self {
        if success {
            Status::Ok
        } else {
            Status::Failed
        }
    }
}

/// Running latency aggregate, in nanoseconds.
///
/// `sum` accumulates every folded sample so that an average over any
/// interval is `delta(sum) / delta(count)`. `min` and `max` are lifetime
/// extrema with no windowing or decay; `min == 0` means no sample has been
/// folded yet.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency<C = u64> {
    pub sum: C,
    pub min: C,
    pub max: C,
}

impl Latency<Stat> {
    /// Folds one sample into the aggregate.
    #[inline]
    pub fn record(&self, nanos: u64) {
        self.sum.add(nanos);
        let min = self.min.get();
        if min == 0 || nanos < min {
            self.min.set(nanos);
        }
        if nanos > self.max.get() {
            self.max.set(nanos);
        }
    }
}

impl Latency {
    /// Returns `sum / samples`, or 0 when there are no samples.
    pub fn average(&self, samples: u64) -> u64 {
        self.sum.checked_div(samples).unwrap_or(0)
    }
}

/// Lifetime counters for one logical operation type.
///
/// In a quiescent block `total >= errors` and `total >= dups`; a torn copy
/// may transiently show otherwise.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationCounter<C = u64> {
    /// Completed requests of any outcome.
    pub total: C,
    /// Requests that did not complete with [`Status::Ok`].
    pub errors: C,
    /// Requests answered from the duplicate request cache.
    pub dups: C,
    /// Execution latency of requests that were actually run.
    pub latency: Latency<C>,
    /// Time taken to replay a cached reply for duplicates.
    pub dup_latency: Latency<C>,
    /// Time requests spent queued before execution.
    pub queue_latency: Latency<C>,
}

impl OperationCounter<Stat> {
    /// Records one completed request.
    ///
    /// Duplicates are counted in `dups` and their time goes to
    /// `dup_latency` instead of `latency`.
    #[inline]
    pub fn record(&self, nanos: u64, status: Status, is_duplicate: bool) {
        self.record_outcome(status, is_duplicate);
        self.record_timing(nanos, is_duplicate);
    }

    /// Counts a completion without touching any latency.
    #[inline]
    pub fn record_outcome(&self, status: Status, is_duplicate: bool) {
        self.total.add(1);
        if !status.is_ok() {
            self.errors.add(1);
        }
        if is_duplicate {
            self.dups.add(1);
        }
    }

    /// Folds execution time without counting anything.
    ///
    /// Used where a different event owns `total`, `errors` and `dups`, such
    /// as the operations inside an NFSv4 compound.
    #[inline]
    pub fn record_timing(&self, nanos: u64, is_duplicate: bool) {
        if is_duplicate {
            self.dup_latency.record(nanos);
        } else {
            self.latency.record(nanos);
        }
    }

    /// Folds time spent waiting in the request queue.
    #[inline]
    pub fn record_queued(&self, nanos: u64) {
        self.queue_latency.record(nanos);
    }
}

impl OperationCounter {
    /// Average execution latency in nanoseconds, 0 when nothing was executed.
    pub fn average_latency(&self) -> u64 {
        self.latency.average(self.total.wrapping_sub(self.dups))
    }
}

/// An I/O-class operation: completions plus byte volume.
///
/// `transferred <= requested` is *not* an invariant; short transfers and
/// retried requests break it both ways.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCounter<C = u64> {
    pub cmd: OperationCounter<C>,
    pub requested: C,
    pub transferred: C,
}

impl TransferCounter<Stat> {
    /// Records one completed read or write.
    ///
    /// Byte counts are only added for successful transfers.
    #[inline]
    pub fn record_io(&self, requested: u64, transferred: u64, success: bool) {
        self.cmd.record_outcome(Status::from(success), false);
        if success {
            self.requested.add(requested);
            self.transferred.add(transferred);
        }
    }
}

/// Counters for a pNFS layout operation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCounter<C = u64> {
    pub total: C,
    /// Failures other than [`Status::Retry`].
    pub errors: C,
    /// [`Status::Retry`] outcomes, which are not failures.
    pub delays: C,
}

impl LayoutCounter<Stat> {
    /// Records one layout operation outcome.
    #[inline]
    pub fn record(&self, status: Status) {
        self.total.add(1);
        match status {
            Status::Ok => {}
            Status::Retry => self.delays.add(1),
            Status::Failed => self.errors.add(1),
        }
    }
}

counter_layout!(Latency, OperationCounter, TransferCounter, LayoutCounter);
