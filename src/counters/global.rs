//! The aggregate root: every counter the server publishes, in one block.
//!
//! [`GlobalStats`] is the unit that is placed in shared memory and copied
//! wholesale by the monitor. Its field order is part of the contract
//! between producer and consumer builds and must not change while a
//! region is attached.

use bytemuck::Zeroable;
use std::mem::{align_of, size_of};

use crate::counters::operation::{LayoutCounter, OperationCounter, TransferCounter};
use crate::counters::table::OpTable;
use crate::counters::Stat;
use crate::protocol::{mount, nfs3, nfs4, nlm4, rquota, Minor};

/// NFSv3 counters. Non-I/O procedures are `cmds`; READ and WRITE are
/// tracked separately with byte volume.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NfsV3Stats<C = u64> {
    pub cmds: OperationCounter<C>,
    pub read: TransferCounter<C>,
    pub write: TransferCounter<C>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountStats<C = u64> {
    pub v1_ops: OperationCounter<C>,
    pub v3_ops: OperationCounter<C>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlmStats<C = u64> {
    pub ops: OperationCounter<C>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RquotaStats<C = u64> {
    pub ops: OperationCounter<C>,
    pub ext_ops: OperationCounter<C>,
}

/// NFSv4.0 counters.
///
/// `ops_per_compound` is a running total of operations across all
/// compounds; the average is derived at display time.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NfsV40Stats<C = u64> {
    pub compounds: OperationCounter<C>,
    pub ops_per_compound: C,
    pub read: TransferCounter<C>,
    pub write: TransferCounter<C>,
}

/// NFSv4.1 counters, also used for NFSv4.2.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NfsV41Stats<C = u64> {
    pub compounds: OperationCounter<C>,
    pub ops_per_compound: C,
    pub read: TransferCounter<C>,
    pub write: TransferCounter<C>,
    pub getdevinfo: LayoutCounter<C>,
    pub layout_get: LayoutCounter<C>,
    pub layout_commit: LayoutCounter<C>,
    pub layout_return: LayoutCounter<C>,
    pub recall: LayoutCounter<C>,
}

/// Every published counter.
///
/// With `C = Stat` this is the live block; with the default `C = u64` it
/// is a snapshot or a delta.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalStats<C = u64> {
    pub nfsv3: NfsV3Stats<C>,
    pub mnt: MountStats<C>,
    pub nlm4: NlmStats<C>,
    pub rquota: RquotaStats<C>,
    pub nfsv40: NfsV40Stats<C>,
    pub nfsv41: NfsV41Stats<C>,
    pub nfsv42: NfsV41Stats<C>,
    pub v3: OpTable<C, { nfs3::COUNT }>,
    pub v4: OpTable<C, { nfs4::COUNT }>,
    pub lm: OpTable<C, { nlm4::COUNT }>,
    pub mn: OpTable<C, { mount::COUNT }>,
    pub qt: OpTable<C, { rquota::COUNT }>,
}

/// The live block as mutated by request threads.
pub type LiveStats = GlobalStats<Stat>;

counter_layout!(
    NfsV3Stats,
    MountStats,
    NlmStats,
    RquotaStats,
    NfsV40Stats,
    NfsV41Stats,
    GlobalStats,
);

/// Number of 64-bit words in one block.
pub const WORDS: usize = size_of::<GlobalStats>() / size_of::<u64>();

/// Size in bytes of one block, and of the shared region holding it.
pub const REGION_SIZE: usize = size_of::<GlobalStats>();

const _: () = assert!(size_of::<LiveStats>() == size_of::<GlobalStats>());
const _: () = assert!(align_of::<LiveStats>() == align_of::<GlobalStats>());
const _: () = assert!(REGION_SIZE == WORDS * size_of::<u64>());

impl LiveStats {
    /// Copies the live block word by word, with no synchronization.
    ///
    /// The copy may be torn: a concurrent update can be visible in some
    /// fields of a counter and not yet in others. Every field is a
    /// monotonically increasing counter, so the anomaly disappears on the
    /// next copy.
    pub fn torn_snapshot(&self) -> GlobalStats {
        let mut snapshot: GlobalStats = Zeroable::zeroed();
        self.torn_snapshot_into(&mut snapshot);
        snapshot
    }

    /// Same as [`torn_snapshot`](Self::torn_snapshot), reusing `dst`.
    pub fn torn_snapshot_into(&self, dst: &mut GlobalStats) {
        for (word, cell) in dst.words_mut().iter_mut().zip(self.cells()) {
            *word = cell.get();
        }
    }

    /// Zeroes every counter. Only valid before the block is published.
    pub(crate) fn clear(&self) {
        for cell in self.cells() {
            cell.set(0);
        }
    }

    /// The block viewed as its flat sequence of cells.
    fn cells(&self) -> &[Stat] {
        // SAFETY: `LiveStats` is `#[repr(C)]` and built only from `Stat`
        // (directly or through nested `#[repr(C)]`/`#[repr(transparent)]`
        // aggregates), so it is exactly `WORDS` contiguous, aligned cells.
        unsafe { std::slice::from_raw_parts((self as *const Self).cast::<Stat>(), WORDS) }
    }

    /// Counters of an NFSv4.1 or NFSv4.2 minor version.
    pub(crate) fn v41_family(&self, minor: Minor) -> Option<&NfsV41Stats<Stat>> {
        match minor {
            Minor::V0 => None,
            Minor::V1 => Some(&self.nfsv41),
            Minor::V2 => Some(&self.nfsv42),
        }
    }
}

impl GlobalStats {
    /// The block as its flat sequence of words.
    pub fn words(&self) -> &[u64] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }

    pub fn words_mut(&mut self) -> &mut [u64] {
        bytemuck::cast_slice_mut(std::slice::from_mut(self))
    }

    /// Compound counter and running operation total of a minor version.
    pub fn compounds(&self, minor: Minor) -> (&OperationCounter, u64) {
        match minor {
            Minor::V0 => (&self.nfsv40.compounds, self.nfsv40.ops_per_compound),
            Minor::V1 => (&self.nfsv41.compounds, self.nfsv41.ops_per_compound),
            Minor::V2 => (&self.nfsv42.compounds, self.nfsv42.ops_per_compound),
        }
    }

    /// Average operations per compound, or 0 before any compound completed.
    pub fn average_ops_per_compound(&self, minor: Minor) -> u64 {
        let (compounds, ops) = self.compounds(minor);
        ops.checked_div(compounds.total).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::operation::Status;

    fn live() -> Box<LiveStats> {
        Box::new(LiveStats::zeroed())
    }

    #[test]
    fn test_words_cover_block() {
        let stats: GlobalStats = Zeroable::zeroed();
        assert_eq!(stats.words().len(), WORDS);
        assert!(stats.words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_snapshot_of_zeroed_is_zero() {
        let stats = live();
        let snap = stats.torn_snapshot();
        assert_eq!(snap, <GlobalStats as Zeroable>::zeroed());
    }

    #[test]
    fn test_snapshot_copies_every_family() {
        let stats = live();
        stats.nfsv3.cmds.total.add(1);
        stats.mnt.v3_ops.errors.add(2);
        stats.nlm4.ops.dups.add(3);
        stats.rquota.ext_ops.total.add(4);
        stats.nfsv40.ops_per_compound.add(5);
        stats.nfsv41.recall.delays.add(6);
        stats.nfsv42.write.transferred.add(7);
        stats.v3.bump(nfs3::COMMIT);
        stats.v4.bump(nfs4::CLONE);
        stats.lm.bump(nlm4::FREE_ALL);
        stats.mn.bump(mount::EXPORT);
        stats.qt.bump(rquota::SETACTIVEQUOTA);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv3.cmds.total, 1);
        assert_eq!(snap.mnt.v3_ops.errors, 2);
        assert_eq!(snap.nlm4.ops.dups, 3);
        assert_eq!(snap.rquota.ext_ops.total, 4);
        assert_eq!(snap.nfsv40.ops_per_compound, 5);
        assert_eq!(snap.nfsv41.recall.delays, 6);
        assert_eq!(snap.nfsv42.write.transferred, 7);
        assert_eq!(snap.v3.op[nfs3::COMMIT as usize], 1);
        assert_eq!(snap.v4.op[nfs4::CLONE as usize], 1);
        assert_eq!(snap.lm.op[nlm4::FREE_ALL as usize], 1);
        assert_eq!(snap.mn.op[mount::EXPORT as usize], 1);
        assert_eq!(snap.qt.op[rquota::SETACTIVEQUOTA as usize], 1);
        assert_eq!(snap.words().iter().sum::<u64>(), 33);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = live();
        stats.v4.bump(nfs4::OPEN);
        let snap = stats.torn_snapshot();
        stats.v4.bump(nfs4::OPEN);
        assert_eq!(snap.v4.op[nfs4::OPEN as usize], 1);
        assert_eq!(stats.torn_snapshot().v4.op[nfs4::OPEN as usize], 2);
    }

    #[test]
    fn test_clear() {
        let stats = live();
        stats.nfsv40.read.cmd.record(10, Status::Ok, false);
        stats.clear();
        assert_eq!(stats.torn_snapshot(), <GlobalStats as Zeroable>::zeroed());
    }

    #[test]
    fn test_average_ops_per_compound() {
        let mut snap: GlobalStats = Zeroable::zeroed();
        assert_eq!(snap.average_ops_per_compound(Minor::V0), 0);

        snap.nfsv41.compounds.total = 4;
        snap.nfsv41.ops_per_compound = 14;
        assert_eq!(snap.average_ops_per_compound(Minor::V1), 3);
        assert_eq!(snap.average_ops_per_compound(Minor::V2), 0);
    }

    #[test]
    fn test_region_size() {
        assert_eq!(REGION_SIZE, WORDS * 8);
        assert_eq!(REGION_SIZE, size_of::<LiveStats>());
    }
}
