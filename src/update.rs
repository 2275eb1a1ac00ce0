//! Update API: the entry points the request pipeline calls after each
//! unit of work.
//!
//! Every function here is an additive, lock-free, non-blocking update of
//! the live block. None can fail and none reads back a value it wrote to
//! make a decision. Unknown opcodes and events that a protocol has no
//! counter for are dropped silently.
//!
//! # Routing
//!
//! | Event | Counters touched |
//! |-------|------------------|
//! | request completed, NFSv3/MOUNT/NLM/RQUOTA | family `OperationCounter` + raw opcode slot |
//! | request completed, NFSv4 READ/WRITE | raw slot + latency of the minor version's transfer counter |
//! | request completed, NFSv4 layout op (4.1+) | raw slot + layout counter |
//! | request completed, other NFSv4 op | raw slot + latency of the minor version's `compounds` |
//! | I/O completed | transfer counter `total`/`errors` and bytes |
//! | compound completed | `compounds` `total`/`errors`/`dups` + `ops_per_compound` |
//! | layout event | layout counter (4.1+ only) |
//!
//! NFSv4 operations run inside a compound, and replays are detected for the
//! whole compound, so an NFSv4 operation only adds time. Its outcome is
//! counted once, by the event that owns the counter: the compound that
//! carried it (a compound stops at its first failing operation and returns
//! that status) or the I/O completion of a READ/WRITE. That keeps
//! `total >= errors` and `total >= dups` on every counter.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use nfs_stats::counters::operation::Status;
//! use nfs_stats::protocol::{nfs4, Minor, Protocol};
//! use nfs_stats::store::LocalStats;
//!
//! let local = LocalStats::new();
//! let stats = local.stats();
//! let v40 = Protocol::NfsV4(Minor::V0);
//!
//! stats.record_request_completed(v40, nfs4::READ, Duration::from_millis(5), Status::Ok, false);
//! stats.record_io_completed(v40, 65536, 65536, true, false);
//! stats.record_compound_completed(v40, 3, Status::Ok, false);
//!
//! let snap = stats.torn_snapshot();
//! assert_eq!(snap.v4.op[nfs4::READ as usize], 1);
//! assert_eq!(snap.nfsv40.read.transferred, 65536);
//! ```

use std::time::Duration;

use crate::counters::global::LiveStats;
use crate::counters::operation::{LayoutCounter, OperationCounter, Status, TransferCounter};
use crate::counters::Stat;
use crate::protocol::{nfs4, Minor, Opcode, Protocol};

/// A pNFS layout event class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    GetDeviceInfo,
    LayoutGet,
    LayoutCommit,
    LayoutReturn,
    /// A layout recall sent to the client on the backchannel.
    Recall,
}

impl LayoutKind {
    /// The layout kind an NFSv4 operation belongs to, if any.
    pub fn from_nfs4_op(opcode: Opcode) -> Option<Self> {
        match opcode {
            nfs4::GETDEVICEINFO => Some(LayoutKind::GetDeviceInfo),
            nfs4::LAYOUTGET => Some(LayoutKind::LayoutGet),
            nfs4::LAYOUTCOMMIT => Some(LayoutKind::LayoutCommit),
            nfs4::LAYOUTRETURN => Some(LayoutKind::LayoutReturn),
            _ => None,
        }
    }
}

#[inline]
fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl LiveStats {
    /// Records one completed request.
    ///
    /// Increments the protocol's raw slot for `opcode` and records the
    /// outcome and latency according to the routing table in the module
    /// documentation.
    pub fn record_request_completed(
        &self,
        protocol: Protocol,
        opcode: Opcode,
        elapsed: Duration,
        status: Status,
        is_duplicate: bool,
    ) {
        let elapsed = nanos(elapsed);
        match protocol {
            Protocol::NfsV4(minor) => {
                self.v4.bump(opcode);
                self.record_nfs4_op(minor, opcode, elapsed, status, is_duplicate);
            }
            _ => {
                self.bump_raw(protocol, opcode);
                if let Some(counter) = self.family(protocol) {
                    counter.record(elapsed, status, is_duplicate);
                }
            }
        }
    }

    /// Records how long a request waited in the queue before execution.
    pub fn record_request_queued(&self, protocol: Protocol, opcode: Opcode, waited: Duration) {
        let waited = nanos(waited);
        let counter = match protocol {
            Protocol::NfsV4(minor) => match opcode {
                nfs4::READ | nfs4::WRITE => self
                    .transfers(protocol, opcode == nfs4::WRITE)
                    .map(|xfer| &xfer.cmd),
                _ => Some(self.compounds(minor).0),
            },
            _ => self.family(protocol),
        };
        if let Some(counter) = counter {
            counter.record_queued(waited);
        }
    }

    /// Records one completed read or write and its byte volume.
    pub fn record_io_completed(
        &self,
        protocol: Protocol,
        bytes_requested: u64,
        bytes_transferred: u64,
        success: bool,
        is_write: bool,
    ) {
        if let Some(xfer) = self.transfers(protocol, is_write) {
            xfer.record_io(bytes_requested, bytes_transferred, success);
        }
    }

    /// Records one completed NFSv4 compound carrying `op_count` operations.
    ///
    /// `status` is the compound's status, that is, the status of its first
    /// failing operation. A replayed compound is counted in `dups`.
    pub fn record_compound_completed(
        &self,
        protocol: Protocol,
        op_count: u32,
        status: Status,
        is_duplicate: bool,
    ) {
        if let Protocol::NfsV4(minor) = protocol {
            let (compounds, ops) = self.compounds(minor);
            compounds.record_outcome(status, is_duplicate);
            ops.add(u64::from(op_count));
        }
    }

    /// Records a pNFS layout outcome. [`Status::Retry`] counts as a delay.
    pub fn record_layout_event(&self, protocol: Protocol, kind: LayoutKind, status: Status) {
        if let Some(layout) = self.layout(protocol, kind) {
            layout.record(status);
        }
    }

    fn record_nfs4_op(
        &self,
        minor: Minor,
        opcode: Opcode,
        elapsed: u64,
        status: Status,
        is_duplicate: bool,
    ) {
        let protocol = Protocol::NfsV4(minor);
        match opcode {
            nfs4::READ | nfs4::WRITE => {
                if let Some(xfer) = self.transfers(protocol, opcode == nfs4::WRITE) {
                    xfer.cmd.record_timing(elapsed, is_duplicate);
                }
            }
            _ => match LayoutKind::from_nfs4_op(opcode) {
                Some(kind) if minor != Minor::V0 => {
                    self.record_layout_event(protocol, kind, status);
                }
                _ => self.compounds(minor).0.record_timing(elapsed, is_duplicate),
            },
        }
    }

    fn bump_raw(&self, protocol: Protocol, opcode: Opcode) {
        match protocol {
            Protocol::NfsV3 => self.v3.bump(opcode),
            Protocol::MountV1 | Protocol::MountV3 => self.mn.bump(opcode),
            Protocol::Nlm4 => self.lm.bump(opcode),
            Protocol::Rquota | Protocol::RquotaExt => self.qt.bump(opcode),
            Protocol::NfsV4(_) => self.v4.bump(opcode),
        }
    }

    /// The family counter for RPC-level protocols.
    fn family(&self, protocol: Protocol) -> Option<&OperationCounter<Stat>> {
        match protocol {
            Protocol::NfsV3 => Some(&self.nfsv3.cmds),
            Protocol::MountV1 => Some(&self.mnt.v1_ops),
            Protocol::MountV3 => Some(&self.mnt.v3_ops),
            Protocol::Nlm4 => Some(&self.nlm4.ops),
            Protocol::Rquota => Some(&self.rquota.ops),
            Protocol::RquotaExt => Some(&self.rquota.ext_ops),
            Protocol::NfsV4(_) => None,
        }
    }

    fn transfers(&self, protocol: Protocol, is_write: bool) -> Option<&TransferCounter<Stat>> {
        let (read, write) = match protocol {
            Protocol::NfsV3 => (&self.nfsv3.read, &self.nfsv3.write),
            Protocol::NfsV4(Minor::V0) => (&self.nfsv40.read, &self.nfsv40.write),
            Protocol::NfsV4(minor) => {
                let family = self.v41_family(minor)?;
                (&family.read, &family.write)
            }
            _ => return None,
        };
        Some(if is_write { write } else { read })
    }

    fn compounds(&self, minor: Minor) -> (&OperationCounter<Stat>, &Stat) {
        match self.v41_family(minor) {
            Some(family) => (&family.compounds, &family.ops_per_compound),
            None => (&self.nfsv40.compounds, &self.nfsv40.ops_per_compound),
        }
    }

    fn layout(&self, protocol: Protocol, kind: LayoutKind) -> Option<&LayoutCounter<Stat>> {
        let Protocol::NfsV4(minor) = protocol else {
            return None;
        };
        let family = self.v41_family(minor)?;
        Some(match kind {
            LayoutKind::GetDeviceInfo => &family.getdevinfo,
            LayoutKind::LayoutGet => &family.layout_get,
            LayoutKind::LayoutCommit => &family.layout_commit,
            LayoutKind::LayoutReturn => &family.layout_return,
            LayoutKind::Recall => &family.recall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::global::GlobalStats;
    use crate::protocol::{mount, nfs3, nlm4, rquota};
    use bytemuck::Zeroable;
    use std::sync::Arc;
    use std::thread;

    const V40: Protocol = Protocol::NfsV4(Minor::V0);
    const V41: Protocol = Protocol::NfsV4(Minor::V1);
    const V42: Protocol = Protocol::NfsV4(Minor::V2);

    fn live() -> Box<LiveStats> {
        Box::new(LiveStats::zeroed())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_nfs3_request() {
        let stats = live();
        stats.record_request_completed(Protocol::NfsV3, nfs3::GETATTR, ms(2), Status::Ok, false);
        stats.record_request_completed(Protocol::NfsV3, nfs3::LOOKUP, ms(4), Status::Failed, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.v3.op[nfs3::GETATTR as usize], 1);
        assert_eq!(snap.v3.op[nfs3::LOOKUP as usize], 1);
        assert_eq!(snap.nfsv3.cmds.total, 2);
        assert_eq!(snap.nfsv3.cmds.errors, 1);
        assert_eq!(snap.nfsv3.cmds.latency.sum, 6_000_000);
        assert_eq!(snap.nfsv3.cmds.latency.min, 2_000_000);
        assert_eq!(snap.nfsv3.cmds.latency.max, 4_000_000);
    }

    #[test]
    fn test_duplicate_goes_to_dup_latency() {
        let stats = live();
        stats.record_request_completed(Protocol::Nlm4, nlm4::LOCK, ms(1), Status::Ok, true);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nlm4.ops.total, 1);
        assert_eq!(snap.nlm4.ops.dups, 1);
        assert_eq!(snap.nlm4.ops.latency.sum, 0);
        assert_eq!(snap.nlm4.ops.dup_latency.sum, 1_000_000);
        assert_eq!(snap.lm.op[nlm4::LOCK as usize], 1);
    }

    #[test]
    fn test_mount_and_rquota_versions_are_separate() {
        let stats = live();
        stats.record_request_completed(Protocol::MountV1, mount::MNT, ms(1), Status::Ok, false);
        stats.record_request_completed(Protocol::MountV3, mount::MNT, ms(1), Status::Ok, false);
        stats.record_request_completed(Protocol::Rquota, rquota::GETQUOTA, ms(1), Status::Ok, false);
        stats.record_request_completed(
            Protocol::RquotaExt,
            rquota::SETQUOTA,
            ms(1),
            Status::Failed,
            false,
        );

        let snap = stats.torn_snapshot();
        assert_eq!(snap.mnt.v1_ops.total, 1);
        assert_eq!(snap.mnt.v3_ops.total, 1);
        assert_eq!(snap.mn.op[mount::MNT as usize], 2);
        assert_eq!(snap.rquota.ops.total, 1);
        assert_eq!(snap.rquota.ext_ops.errors, 1);
        assert_eq!(snap.qt.op[rquota::GETQUOTA as usize], 1);
        assert_eq!(snap.qt.op[rquota::SETQUOTA as usize], 1);
    }

    #[test]
    fn test_nfs4_read_counts_op_and_latency_only() {
        let stats = live();
        stats.record_request_completed(V40, nfs4::READ, ms(5), Status::Ok, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.v4.op[nfs4::READ as usize], 1);
        assert_eq!(snap.nfsv40.read.cmd.total, 0);
        assert_eq!(snap.nfsv40.read.cmd.latency.sum, 5_000_000);
        assert_eq!(snap.nfsv40.read.transferred, 0);
    }

    #[test]
    fn test_nfs4_generic_op_latency_goes_to_compounds() {
        let stats = live();
        stats.record_request_completed(V41, nfs4::OPEN, ms(3), Status::Ok, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.v4.op[nfs4::OPEN as usize], 1);
        assert_eq!(snap.nfsv41.compounds.latency.sum, 3_000_000);
        assert_eq!(snap.nfsv41.compounds.total, 0);
        assert_eq!(snap.nfsv40.compounds.latency.sum, 0);
    }

    #[test]
    fn test_nfs4_layout_op_routes_to_layout_counter() {
        let stats = live();
        stats.record_request_completed(V41, nfs4::LAYOUTGET, ms(1), Status::Retry, false);
        stats.record_request_completed(V42, nfs4::LAYOUTRETURN, ms(1), Status::Failed, false);
        stats.record_request_completed(V40, nfs4::LAYOUTGET, ms(1), Status::Ok, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.v4.op[nfs4::LAYOUTGET as usize], 2);
        assert_eq!(snap.nfsv41.layout_get.total, 1);
        assert_eq!(snap.nfsv41.layout_get.delays, 1);
        assert_eq!(snap.nfsv41.layout_get.errors, 0);
        assert_eq!(snap.nfsv42.layout_return.errors, 1);
        // v4.0 has no layout counters; the op still folds into compounds.
        assert_eq!(snap.nfsv40.compounds.latency.sum, 1_000_000);
    }

    #[test]
    fn test_io_completed() {
        let stats = live();
        stats.record_io_completed(V40, 8192, 4096, true, false);
        stats.record_io_completed(V40, 1024, 1024, true, true);
        stats.record_io_completed(V40, 1024, 0, false, true);
        stats.record_io_completed(Protocol::NfsV3, 10, 10, true, false);
        stats.record_io_completed(V42, 20, 20, true, true);
        stats.record_io_completed(Protocol::Nlm4, 99, 99, true, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv40.read.cmd.total, 1);
        assert_eq!(snap.nfsv40.read.requested, 8192);
        assert_eq!(snap.nfsv40.read.transferred, 4096);
        assert_eq!(snap.nfsv40.write.cmd.total, 2);
        assert_eq!(snap.nfsv40.write.cmd.errors, 1);
        assert_eq!(snap.nfsv40.write.transferred, 1024);
        assert_eq!(snap.nfsv3.read.transferred, 10);
        assert_eq!(snap.nfsv42.write.transferred, 20);
        assert_eq!(snap.nfsv41.write.transferred, 0);
    }

    #[test]
    fn test_compound_completed() {
        let stats = live();
        stats.record_compound_completed(V41, 4, Status::Ok, false);
        stats.record_compound_completed(V41, 2, Status::Failed, false);
        stats.record_compound_completed(Protocol::NfsV3, 9, Status::Ok, false);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv41.compounds.total, 2);
        assert_eq!(snap.nfsv41.compounds.errors, 1);
        assert_eq!(snap.nfsv41.compounds.dups, 0);
        assert_eq!(snap.nfsv41.ops_per_compound, 6);
        assert_eq!(snap.average_ops_per_compound(Minor::V1), 3);
        assert_eq!(snap.nfsv40.compounds.total, 0);
    }

    #[test]
    fn test_nfs4_outcomes_keep_totals_ahead() {
        let stats = live();
        // A replayed compound of three ops.
        for op in [nfs4::SEQUENCE, nfs4::PUTFH, nfs4::GETATTR] {
            stats.record_request_completed(V41, op, ms(1), Status::Ok, true);
        }
        stats.record_compound_completed(V41, 3, Status::Ok, true);
        // A replayed READ answered from the reply cache, with no I/O.
        stats.record_request_completed(V41, nfs4::READ, ms(1), Status::Ok, true);
        // A compound that stops at a failed GETATTR.
        stats.record_request_completed(V41, nfs4::PUTFH, ms(2), Status::Ok, false);
        stats.record_request_completed(V41, nfs4::GETATTR, ms(2), Status::Failed, false);
        stats.record_compound_completed(V41, 2, Status::Failed, false);
        // A failed WRITE.
        stats.record_request_completed(V41, nfs4::WRITE, ms(3), Status::Failed, false);
        stats.record_io_completed(V41, 4096, 0, false, true);

        let snap = stats.torn_snapshot();
        let compounds = &snap.nfsv41.compounds;
        assert_eq!((compounds.total, compounds.errors, compounds.dups), (2, 1, 1));
        assert_eq!(compounds.dup_latency.sum, 3_000_000);
        assert_eq!(compounds.latency.sum, 4_000_000);
        assert_eq!(snap.nfsv41.read.cmd.dup_latency.sum, 1_000_000);
        assert_eq!(snap.nfsv41.write.cmd.errors, 1);

        for cmd in [compounds, &snap.nfsv41.read.cmd, &snap.nfsv41.write.cmd] {
            assert!(cmd.total >= cmd.errors, "{cmd:?}");
            assert!(cmd.total >= cmd.dups, "{cmd:?}");
        }
    }

    #[test]
    fn test_layout_event() {
        let stats = live();
        stats.record_layout_event(V41, LayoutKind::Recall, Status::Ok);
        stats.record_layout_event(V41, LayoutKind::GetDeviceInfo, Status::Retry);
        stats.record_layout_event(V41, LayoutKind::LayoutCommit, Status::Failed);
        stats.record_layout_event(V40, LayoutKind::Recall, Status::Ok);
        stats.record_layout_event(Protocol::NfsV3, LayoutKind::Recall, Status::Ok);

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv41.recall.total, 1);
        assert_eq!(snap.nfsv41.getdevinfo.delays, 1);
        assert_eq!(snap.nfsv41.getdevinfo.errors, 0);
        assert_eq!(snap.nfsv41.layout_commit.errors, 1);
        assert_eq!(snap.nfsv42.recall.total, 0);
    }

    #[test]
    fn test_request_queued() {
        let stats = live();
        stats.record_request_queued(Protocol::NfsV3, nfs3::READ, ms(2));
        stats.record_request_queued(V40, nfs4::WRITE, ms(3));
        stats.record_request_queued(V41, nfs4::OPEN, ms(4));

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv3.cmds.queue_latency.sum, 2_000_000);
        assert_eq!(snap.nfsv40.write.cmd.queue_latency.sum, 3_000_000);
        assert_eq!(snap.nfsv41.compounds.queue_latency.sum, 4_000_000);
    }

    #[test]
    fn test_unknown_opcode_is_ignored() {
        let stats = live();
        stats.record_request_completed(V40, 10_044, ms(1), Status::Failed, false);
        stats.record_request_completed(Protocol::MountV3, 99, ms(1), Status::Ok, false);

        let snap = stats.torn_snapshot();
        assert!(snap.v4.as_slice().iter().all(|&n| n == 0));
        assert!(snap.mn.as_slice().iter().all(|&n| n == 0));
        // The family counter still sees the completed RPC.
        assert_eq!(snap.mnt.v3_ops.total, 1);
    }

    #[test]
    fn test_replay_equals_sum_of_increments() {
        let stats = live();
        let sizes = [512u64, 4096, 1, 65536, 0, 131072];
        for &n in &sizes {
            stats.record_io_completed(V40, n, n, true, false);
        }

        let snap = stats.torn_snapshot();
        assert_eq!(snap.nfsv40.read.cmd.total, sizes.len() as u64);
        assert_eq!(snap.nfsv40.read.transferred, sizes.iter().sum::<u64>());
    }

    #[test]
    fn test_elapsed_saturates() {
        assert_eq!(nanos(Duration::MAX), u64::MAX);
        assert_eq!(nanos(ms(1)), 1_000_000);
    }

    #[test]
    fn test_concurrent_producers_bounded_loss() {
        for _ in 0..50 {
            let stats: Arc<Box<LiveStats>> = Arc::new(live());
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let s = Arc::clone(&stats);
                    thread::spawn(move || {
                        s.record_request_completed(
                            Protocol::NfsV3,
                            nfs3::GETATTR,
                            ms(1),
                            Status::Ok,
                            false,
                        );
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            let snap: GlobalStats = stats.torn_snapshot();
            assert!((1..=2).contains(&snap.v3.op[nfs3::GETATTR as usize]));
            assert!((1..=2).contains(&snap.nfsv3.cmds.total));
        }
    }
}
