//! Counter model: the shape of every statistic the server publishes.
//!
//! All counters are built from one leaf type, [`Stat`], and arranged into
//! fixed `#[repr(C)]` aggregates so that the complete block,
//! [`GlobalStats`](global::GlobalStats), has a byte layout that a second
//! process can map and copy.
//!
//! # Two views of one shape
//!
//! Every aggregate is generic over its leaf type:
//!
//! ```text
//!   GlobalStats<Stat>  ── live block, mutated in place by request threads
//!          │
//!          │  torn_snapshot()  (word by word, no lock)
//!          ▼
//!   GlobalStats<u64>   ── plain-old-data copy, diffed and reported
//! ```
//!
//! Both instantiations have the same size and field order, which is checked
//! at compile time.
//!
//! # Update model
//!
//! A [`Stat`] is *not* incremented with an atomic
//! read-modify-write. [`Stat::add`] loads, adds and stores with relaxed
//! ordering, so two threads bumping the same cell at the same instant may
//! lose one of the increments. There is no lock and no `lock`-prefixed
//! instruction on the request path. The loss is bounded by the number of
//! truly simultaneous writers to one cell and vanishes in the per-second
//! aggregates the monitor displays.
//!
//! The only counters that need exact accounting (currently held delegation
//! grants, read by policy code) live outside the shared block in
//! [`client::DelegationStats`] and use real atomic increments.

/// Marks a leaf-generic `#[repr(C)]` aggregate as plain old data when its
/// leaves are `u64`, and as zero-initializable when its leaves are [`Stat`].
macro_rules! counter_layout {
    ($($ty:ident),* $(,)?) => {$(
        // SAFETY: `#[repr(C)]` and built only from `u64` words, so there is
        // no padding and every bit pattern is valid.
        unsafe impl bytemuck::Zeroable for $ty<u64> {}
        // SAFETY: as above; `Copy` and `'static` are derived.
        unsafe impl bytemuck::Pod for $ty<u64> {}
        // SAFETY: all-zero is a valid `Stat`, hence a valid aggregate.
        unsafe impl bytemuck::Zeroable for $ty<$crate::counters::Stat> {}
    )*};
}

pub mod client;
pub mod global;
pub mod operation;
pub mod table;

use bytemuck::Zeroable;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};

/// A single 64-bit statistics cell with unsynchronized update semantics.
///
/// `Stat` is `#[repr(transparent)]` over [`AtomicU64`], so it has exactly the
/// size and alignment of a `u64` word. Reads and writes are individually
/// atomic (no torn words), but [`add`](Stat::add) is a plain
/// load-add-store: concurrent adds to the same cell may lose updates.
///
/// Arithmetic wraps: a cell at `u64::MAX` becomes `0` after one more
/// increment.
///
/// # Examples
///
/// ```rust
/// use nfs_stats::counters::Stat;
///
/// let stat = Stat::new();
/// stat.add(1);
/// stat.add(5);
/// assert_eq!(stat.get(), 6);
/// ```
#[repr(transparent)]
pub struct Stat(AtomicU64);

impl Stat {
    /// Creates a cell holding zero.
    pub const fn new() -> Self {
        Stat(AtomicU64::new(0))
    }

    /// Returns the current value of the cell.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Adds `value` with wrapping arithmetic.
    ///
    /// This is a non-atomic read-modify-write. It never blocks, never
    /// fails, and may lose an update when another thread adds to the same
    /// cell between the load and the store.
    #[inline]
    pub fn add(&self, value: u64) {
        self.set(self.get().wrapping_add(value));
    }

    /// Overwrites the cell.
    #[inline]
    pub(crate) fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}

impl Default for Stat {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the all-zero bit pattern is a valid `AtomicU64` holding 0.
unsafe impl Zeroable for Stat {}

impl Debug for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
