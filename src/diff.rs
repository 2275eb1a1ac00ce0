//! Diff engine: per-interval deltas between two snapshots.
//!
//! Counters are cumulative and wrap at 2^64, so a delta is the wrapping
//! difference `curr - prev`. That difference is exact whenever fewer than
//! 2^64 increments happened in the interval, including across a wrap, and
//! `prev + delta == curr` holds for every word.
//!
//! [`diff`] walks the whole block. [`diff_into`] walks only the words a
//! [`RateReporter`](crate::observers::rate::RateReporter) will print, which
//! is what the monitor does once per tick.

use bytemuck::Zeroable;
use std::ops::Deref;

use crate::counters::global::GlobalStats;
use crate::protocol::ColumnPlan;

/// The change in every counter over one interval.
///
/// Has the same shape as a snapshot; it is a separate type so a delta is
/// not mistaken for an absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaStats(GlobalStats);

impl DeltaStats {
    pub fn zeroed() -> Self {
        DeltaStats(Zeroable::zeroed())
    }

    pub fn into_inner(self) -> GlobalStats {
        self.0
    }
}

impl Default for DeltaStats {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for DeltaStats {
    type Target = GlobalStats;

    fn deref(&self) -> &GlobalStats {
        &self.0
    }
}

/// Computes `curr - prev` for every counter, with wrapping subtraction.
///
/// # Examples
///
/// ```rust
/// use bytemuck::Zeroable;
/// use nfs_stats::counters::global::GlobalStats;
/// use nfs_stats::diff::diff;
///
/// let mut prev: GlobalStats = Zeroable::zeroed();
/// let mut curr = prev;
/// prev.nfsv3.read.transferred = u64::MAX - 1;
/// curr.nfsv3.read.transferred = 3;
///
/// assert_eq!(diff(&curr, &prev).nfsv3.read.transferred, 5);
/// ```
pub fn diff(curr: &GlobalStats, prev: &GlobalStats) -> DeltaStats {
    let mut delta = DeltaStats::zeroed();
    for ((d, &c), &p) in delta
        .0
        .words_mut()
        .iter_mut()
        .zip(curr.words())
        .zip(prev.words())
    {
        *d = c.wrapping_sub(p);
    }
    delta
}

/// Writes into `delta` the differences that `plan` displays.
///
/// Updates the plan's opcode slots and its surface's READ/WRITE transfer
/// counters. Every other word of `delta` is left as it was.
pub fn diff_into(curr: &GlobalStats, prev: &GlobalStats, delta: &mut DeltaStats, plan: &ColumnPlan) {
    let surface = plan.surface();
    let (curr_table, prev_table) = (surface.table(curr), surface.table(prev));
    {
        let delta_table = surface.table_mut(&mut delta.0);
        for op in plan.opcodes() {
            let i = op as usize;
            if let (Some(d), Some(&c), Some(&p)) =
                (delta_table.get_mut(i), curr_table.get(i), prev_table.get(i))
            {
                *d = c.wrapping_sub(p);
            }
        }
    }

    let (curr_read, curr_write) = surface.io(curr);
    let (prev_read, prev_write) = surface.io(prev);
    let (delta_read, delta_write) = surface.io_mut(&mut delta.0);
    for (d, c, p) in [
        (delta_read, curr_read, prev_read),
        (delta_write, curr_write, prev_write),
    ] {
        d.cmd.total = c.cmd.total.wrapping_sub(p.cmd.total);
        d.requested = c.requested.wrapping_sub(p.requested);
        d.transferred = c.transferred.wrapping_sub(p.transferred);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{nfs3, nfs4, Minor, Surface};

    fn zero() -> GlobalStats {
        Zeroable::zeroed()
    }

    fn sample() -> GlobalStats {
        let mut s = zero();
        for (i, w) in s.words_mut().iter_mut().enumerate() {
            *w = (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        }
        s
    }

    #[test]
    fn test_diff_of_identical_is_zero() {
        let s = sample();
        assert_eq!(diff(&s, &s), DeltaStats::zeroed());
    }

    #[test]
    fn test_prev_plus_delta_is_curr() {
        let prev = sample();
        let mut curr = prev;
        for (i, w) in curr.words_mut().iter_mut().enumerate() {
            *w = w.wrapping_add(i as u64 * 3 + 1);
        }
        let delta = diff(&curr, &prev);
        for ((&p, &d), &c) in prev.words().iter().zip(delta.words()).zip(curr.words()) {
            assert_eq!(p.wrapping_add(d), c);
        }
    }

    #[test]
    fn test_diff_across_wrap() {
        let mut prev = zero();
        let mut curr = zero();
        prev.v4.op[nfs4::OPEN as usize] = u64::MAX - 2;
        curr.v4.op[nfs4::OPEN as usize] = 4;
        assert_eq!(diff(&curr, &prev).v4.op[nfs4::OPEN as usize], 7);
    }

    #[test]
    fn test_diff_into_fills_displayed_words() {
        let plan = ColumnPlan::new(Surface::NfsV4(Minor::V1));
        let mut prev = zero();
        let mut curr = zero();
        curr.v4.op[nfs4::GETATTR as usize] = 9;
        curr.v4.op[nfs4::READ as usize] = 2;
        curr.nfsv41.read.cmd.total = 2;
        curr.nfsv41.read.transferred = 3 << 20;
        prev.nfsv41.write.transferred = 1;
        curr.nfsv41.write.transferred = 1;

        let mut delta = DeltaStats::zeroed();
        diff_into(&curr, &prev, &mut delta, &plan);
        assert_eq!(delta.v4.op[nfs4::GETATTR as usize], 9);
        assert_eq!(delta.v4.op[nfs4::READ as usize], 2);
        assert_eq!(delta.nfsv41.read.cmd.total, 2);
        assert_eq!(delta.nfsv41.read.transferred, 3 << 20);
        assert_eq!(delta.nfsv41.write.transferred, 0);
    }

    #[test]
    fn test_diff_into_skips_unnamed_slots() {
        let plan = ColumnPlan::new(Surface::NfsV4(Minor::V0));
        let prev = zero();
        let mut curr = zero();
        curr.v4.op[nfs4::CLOSE as usize] = 5;
        curr.v4.op[nfs4::SEQUENCE as usize] = 5;
        curr.nfsv40.compounds.total = 5;

        let mut delta = DeltaStats::zeroed();
        diff_into(&curr, &prev, &mut delta, &plan);
        assert_eq!(delta, DeltaStats::zeroed());
    }

    #[test]
    fn test_diff_into_matches_full_diff_on_plan() {
        let plan = ColumnPlan::new(Surface::NfsV3);
        let prev = sample();
        let mut curr = prev;
        for w in curr.words_mut() {
            *w = w.wrapping_add(11);
        }
        let full = diff(&curr, &prev);
        let mut partial = DeltaStats::zeroed();
        diff_into(&curr, &prev, &mut partial, &plan);

        for op in plan.opcodes() {
            assert_eq!(partial.v3.op[op as usize], full.v3.op[op as usize]);
        }
        assert_eq!(partial.v3.op[nfs3::NULL as usize], 0);
        assert_eq!(partial.nfsv3.write.transferred, full.nfsv3.write.transferred);
    }
}
