//! Protocol identities, opcode numbering and display metadata.
//!
//! Opcode numbers follow the protocol specifications (RFC 1813 for NFSv3
//! and MOUNT, the NLM v4 and RQUOTA program definitions, RFC 7530/8881/7862
//! for NFSv4.x). Raw counter tables reserve a slot for every code up to the
//! highest one tracked, so their indices are stable across server versions.
//!
//! [`OpMetadata`] is the read-only key that makes a raw table readable:
//! a name per slot, or `None` for codes that are illegal, deprecated or not
//! reported. [`ColumnPlan`] turns that metadata into the monitor's column
//! order, once, at startup.

use crate::counters::global::GlobalStats;
use crate::counters::operation::TransferCounter;

/// A protocol opcode (RPC procedure number, or NFSv4 operation number).
pub type Opcode = u32;

/// NFSv3 procedure numbers.
pub mod nfs3 {
    use super::Opcode;

    pub const NULL: Opcode = 0;
    pub const GETATTR: Opcode = 1;
    pub const SETATTR: Opcode = 2;
    pub const LOOKUP: Opcode = 3;
    pub const ACCESS: Opcode = 4;
    pub const READLINK: Opcode = 5;
    pub const READ: Opcode = 6;
    pub const WRITE: Opcode = 7;
    pub const CREATE: Opcode = 8;
    pub const MKDIR: Opcode = 9;
    pub const SYMLINK: Opcode = 10;
    pub const MKNOD: Opcode = 11;
    pub const REMOVE: Opcode = 12;
    pub const RMDIR: Opcode = 13;
    pub const RENAME: Opcode = 14;
    pub const LINK: Opcode = 15;
    pub const READDIR: Opcode = 16;
    pub const READDIRPLUS: Opcode = 17;
    pub const FSSTAT: Opcode = 18;
    pub const FSINFO: Opcode = 19;
    pub const PATHCONF: Opcode = 20;
    pub const COMMIT: Opcode = 21;

    /// Slots in the raw table.
    pub const COUNT: usize = COMMIT as usize + 1;
}

/// MOUNT procedure numbers.
pub mod mount {
    use super::Opcode;

    pub const NULL: Opcode = 0;
    pub const MNT: Opcode = 1;
    pub const DUMP: Opcode = 2;
    pub const UMNT: Opcode = 3;
    pub const UMNTALL: Opcode = 4;
    pub const EXPORT: Opcode = 5;

    pub const COUNT: usize = EXPORT as usize + 1;
}

/// NLM v4 procedure numbers. Codes 17 to 19 are unassigned.
pub mod nlm4 {
    use super::Opcode;

    pub const NULL: Opcode = 0;
    pub const TEST: Opcode = 1;
    pub const LOCK: Opcode = 2;
    pub const CANCEL: Opcode = 3;
    pub const UNLOCK: Opcode = 4;
    pub const GRANTED: Opcode = 5;
    pub const TEST_MSG: Opcode = 6;
    pub const LOCK_MSG: Opcode = 7;
    pub const CANCEL_MSG: Opcode = 8;
    pub const UNLOCK_MSG: Opcode = 9;
    pub const GRANTED_MSG: Opcode = 10;
    pub const TEST_RES: Opcode = 11;
    pub const LOCK_RES: Opcode = 12;
    pub const CANCEL_RES: Opcode = 13;
    pub const UNLOCK_RES: Opcode = 14;
    pub const GRANTED_RES: Opcode = 15;
    pub const SM_NOTIFY: Opcode = 16;
    pub const SHARE: Opcode = 20;
    pub const UNSHARE: Opcode = 21;
    pub const NM_LOCK: Opcode = 22;
    pub const FREE_ALL: Opcode = 23;

    pub const COUNT: usize = FREE_ALL as usize + 1;
}

/// RQUOTA procedure numbers.
pub mod rquota {
    use super::Opcode;

    pub const NULL: Opcode = 0;
    pub const GETQUOTA: Opcode = 1;
    pub const GETACTIVEQUOTA: Opcode = 2;
    pub const SETQUOTA: Opcode = 3;
    pub const SETACTIVEQUOTA: Opcode = 4;

    pub const COUNT: usize = SETACTIVEQUOTA as usize + 1;
}

/// NFSv4.x operation numbers. Codes 0 to 2 are illegal.
pub mod nfs4 {
    use super::Opcode;

    pub const ACCESS: Opcode = 3;
    pub const CLOSE: Opcode = 4;
    pub const COMMIT: Opcode = 5;
    pub const CREATE: Opcode = 6;
    pub const DELEGPURGE: Opcode = 7;
    pub const DELEGRETURN: Opcode = 8;
    pub const GETATTR: Opcode = 9;
    pub const GETFH: Opcode = 10;
    pub const LINK: Opcode = 11;
    pub const LOCK: Opcode = 12;
    pub const LOCKT: Opcode = 13;
    pub const LOCKU: Opcode = 14;
    pub const LOOKUP: Opcode = 15;
    pub const LOOKUPP: Opcode = 16;
    pub const NVERIFY: Opcode = 17;
    pub const OPEN: Opcode = 18;
    pub const OPENATTR: Opcode = 19;
    pub const OPEN_CONFIRM: Opcode = 20;
    pub const OPEN_DOWNGRADE: Opcode = 21;
    pub const PUTFH: Opcode = 22;
    pub const PUTPUBFH: Opcode = 23;
    pub const PUTROOTFH: Opcode = 24;
    pub const READ: Opcode = 25;
    pub const READDIR: Opcode = 26;
    pub const READLINK: Opcode = 27;
    pub const REMOVE: Opcode = 28;
    pub const RENAME: Opcode = 29;
    pub const RENEW: Opcode = 30;
    pub const RESTOREFH: Opcode = 31;
    pub const SAVEFH: Opcode = 32;
    pub const SECINFO: Opcode = 33;
    pub const SETATTR: Opcode = 34;
    pub const SETCLIENTID: Opcode = 35;
    pub const SETCLIENTID_CONFIRM: Opcode = 36;
    pub const VERIFY: Opcode = 37;
    pub const WRITE: Opcode = 38;
    pub const RELEASE_LOCKOWNER: Opcode = 39;
    // NFSv4.1
    pub const BACKCHANNEL_CTL: Opcode = 40;
    pub const BIND_CONN_TO_SESSION: Opcode = 41;
    pub const EXCHANGE_ID: Opcode = 42;
    pub const CREATE_SESSION: Opcode = 43;
    pub const DESTROY_SESSION: Opcode = 44;
    pub const FREE_STATEID: Opcode = 45;
    pub const GET_DIR_DELEGATION: Opcode = 46;
    pub const GETDEVICEINFO: Opcode = 47;
    pub const GETDEVICELIST: Opcode = 48;
    pub const LAYOUTCOMMIT: Opcode = 49;
    pub const LAYOUTGET: Opcode = 50;
    pub const LAYOUTRETURN: Opcode = 51;
    pub const SECINFO_NO_NAME: Opcode = 52;
    pub const SEQUENCE: Opcode = 53;
    pub const SET_SSV: Opcode = 54;
    pub const TEST_STATEID: Opcode = 55;
    pub const WANT_DELEGATION: Opcode = 56;
    pub const DESTROY_CLIENTID: Opcode = 57;
    pub const RECLAIM_COMPLETE: Opcode = 58;
    // NFSv4.2
    pub const ALLOCATE: Opcode = 59;
    pub const COPY: Opcode = 60;
    pub const COPY_NOTIFY: Opcode = 61;
    pub const DEALLOCATE: Opcode = 62;
    pub const IO_ADVISE: Opcode = 63;
    pub const LAYOUTERROR: Opcode = 64;
    pub const LAYOUTSTATS: Opcode = 65;
    pub const OFFLOAD_CANCEL: Opcode = 66;
    pub const OFFLOAD_STATUS: Opcode = 67;
    pub const READ_PLUS: Opcode = 68;
    pub const SEEK: Opcode = 69;
    pub const WRITE_SAME: Opcode = 70;
    pub const CLONE: Opcode = 71;

    pub const COUNT: usize = CLONE as usize + 1;
}

/// NFSv4 minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Minor {
    V0,
    V1,
    V2,
}

impl Minor {
    /// Parses a numeric minor version.
    pub fn from_number(minor: u32) -> Option<Self> {
        match minor {
            0 => Some(Minor::V0),
            1 => Some(Minor::V1),
            2 => Some(Minor::V2),
            _ => None,
        }
    }
}

/// A protocol surface served by the daemon.
///
/// The request pipeline tags every completed unit of work with one of
/// these; the Update API uses it to pick the family counters and the raw
/// opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    NfsV3,
    MountV1,
    MountV3,
    Nlm4,
    Rquota,
    /// Extended RQUOTA (version 2, with quota types).
    RquotaExt,
    NfsV4(Minor),
}

impl Protocol {
    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Protocol::NfsV3 => "NFSv3",
            Protocol::MountV1 => "MNTv1",
            Protocol::MountV3 => "MNTv3",
            Protocol::Nlm4 => "NLMv4",
            Protocol::Rquota => "RQUOTA",
            Protocol::RquotaExt => "RQUOTAv2",
            Protocol::NfsV4(Minor::V0) => "NFSv4.0",
            Protocol::NfsV4(Minor::V1) => "NFSv4.1",
            Protocol::NfsV4(Minor::V2) => "NFSv4.2",
        }
    }

    /// Display metadata for this protocol's opcodes, if it is reported.
    ///
    /// MOUNT, NLM and RQUOTA opcodes are counted but have no rate columns.
    pub fn metadata(self) -> Option<&'static OpMetadata> {
        match self {
            Protocol::NfsV3 => Some(&NFS3_METADATA),
            Protocol::NfsV4(_) => Some(&NFS4_METADATA),
            _ => None,
        }
    }
}

/// Display names for one protocol's opcode table.
#[derive(Debug)]
pub struct OpMetadata {
    names: &'static [Option<&'static str>],
    read: Opcode,
    write: Opcode,
}

impl OpMetadata {
    /// Name of `opcode`, or `None` when it is not displayed.
    pub fn name(&self, opcode: Opcode) -> Option<&'static str> {
        self.names.get(opcode as usize).copied().flatten()
    }

    /// Number of opcodes the metadata covers, named or not.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The protocol's READ opcode, rendered in a dedicated column.
    pub fn read(&self) -> Opcode {
        self.read
    }

    /// The protocol's WRITE opcode, rendered in a dedicated column.
    pub fn write(&self) -> Opcode {
        self.write
    }

    /// Named opcodes in ascending order.
    pub fn named(&self) -> impl Iterator<Item = (Opcode, &'static str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(op, name)| name.map(|n| (op as Opcode, n)))
    }
}

const NFS3_NAMES: [Option<&str>; nfs3::COUNT] = [
    None, // NULL
    Some("GETATTR"),
    Some("SETATTR"),
    Some("LOOKUP"),
    Some("ACCESS"),
    Some("READLINK"),
    Some("READ"),
    Some("WRITE"),
    Some("CREATE"),
    Some("MKDIR"),
    Some("SYMLINK"),
    Some("MKNOD"),
    Some("REMOVE"),
    Some("RMDIR"),
    Some("RENAME"),
    Some("LINK"),
    Some("READDIR"),
    Some("RDDIRPLUS"),
    Some("FSSTAT"),
    Some("FSINFO"),
    Some("PATHCONF"),
    Some("COMMIT"),
];

/// NFSv4 display subset. Session, state and pNFS operations are counted
/// in the raw table but not shown.
const NFS4_NAMES: [Option<&str>; nfs4::COUNT] = {
    let mut names: [Option<&str>; nfs4::COUNT] = [None; nfs4::COUNT];
    names[nfs4::ACCESS as usize] = Some("ACCESS");
    names[nfs4::COMMIT as usize] = Some("COMMIT");
    names[nfs4::CREATE as usize] = Some("CREATE");
    names[nfs4::GETATTR as usize] = Some("GETATTR");
    names[nfs4::LINK as usize] = Some("LINK");
    names[nfs4::LOCK as usize] = Some("LOCK");
    names[nfs4::LOOKUP as usize] = Some("LOOKUP");
    names[nfs4::LOOKUPP as usize] = Some("LOOKUPP");
    names[nfs4::OPEN as usize] = Some("OPEN");
    names[nfs4::READ as usize] = Some("READ");
    names[nfs4::READDIR as usize] = Some("READDIR");
    names[nfs4::READLINK as usize] = Some("READLINK");
    names[nfs4::REMOVE as usize] = Some("REMOVE");
    names[nfs4::RENAME as usize] = Some("RENAME");
    names[nfs4::SETATTR as usize] = Some("SETATTR");
    names[nfs4::WRITE as usize] = Some("WRITE");
    names
};

pub static NFS3_METADATA: OpMetadata = OpMetadata {
    names: &NFS3_NAMES,
    read: nfs3::READ,
    write: nfs3::WRITE,
};

pub static NFS4_METADATA: OpMetadata = OpMetadata {
    names: &NFS4_NAMES,
    read: nfs4::READ,
    write: nfs4::WRITE,
};

/// The counters one rate table is drawn from: a raw opcode table plus the
/// READ/WRITE transfer counters that supply byte volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    NfsV3,
    NfsV4(Minor),
}

impl Surface {
    pub fn metadata(self) -> &'static OpMetadata {
        match self {
            Surface::NfsV3 => &NFS3_METADATA,
            Surface::NfsV4(_) => &NFS4_METADATA,
        }
    }

    /// The raw opcode table.
    pub fn table(self, stats: &GlobalStats) -> &[u64] {
        match self {
            Surface::NfsV3 => stats.v3.as_slice(),
            Surface::NfsV4(_) => stats.v4.as_slice(),
        }
    }

    pub fn table_mut(self, stats: &mut GlobalStats) -> &mut [u64] {
        match self {
            Surface::NfsV3 => stats.v3.as_mut_slice(),
            Surface::NfsV4(_) => stats.v4.as_mut_slice(),
        }
    }

    /// The (read, write) transfer counters.
    pub fn io(self, stats: &GlobalStats) -> (&TransferCounter, &TransferCounter) {
        match self {
            Surface::NfsV3 => (&stats.nfsv3.read, &stats.nfsv3.write),
            Surface::NfsV4(Minor::V0) => (&stats.nfsv40.read, &stats.nfsv40.write),
            Surface::NfsV4(Minor::V1) => (&stats.nfsv41.read, &stats.nfsv41.write),
            Surface::NfsV4(Minor::V2) => (&stats.nfsv42.read, &stats.nfsv42.write),
        }
    }

    pub fn io_mut(self, stats: &mut GlobalStats) -> (&mut TransferCounter, &mut TransferCounter) {
        match self {
            Surface::NfsV3 => (&mut stats.nfsv3.read, &mut stats.nfsv3.write),
            Surface::NfsV4(Minor::V0) => (&mut stats.nfsv40.read, &mut stats.nfsv40.write),
            Surface::NfsV4(Minor::V1) => (&mut stats.nfsv41.read, &mut stats.nfsv41.write),
            Surface::NfsV4(Minor::V2) => (&mut stats.nfsv42.read, &mut stats.nfsv42.write),
        }
    }
}

/// One displayed opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub opcode: Opcode,
    pub name: &'static str,
}

/// Column order for a rate table, fixed at construction.
///
/// Every named opcode except READ and WRITE, in ascending opcode order,
/// followed by READ and then WRITE wherever they sit in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    surface: Surface,
    columns: Vec<Column>,
    read: Column,
    write: Column,
}

impl ColumnPlan {
    /// Scans the surface's metadata once and fixes the column order.
    pub fn new(surface: Surface) -> Self {
        let meta = surface.metadata();
        let (read, write) = (meta.read(), meta.write());
        let columns = meta
            .named()
            .filter(|&(op, _)| op != read && op != write)
            .map(|(opcode, name)| Column { opcode, name })
            .collect();
        Self {
            surface,
            columns,
            read: Column {
                opcode: read,
                name: meta.name(read).unwrap_or("READ"),
            },
            write: Column {
                opcode: write,
                name: meta.name(write).unwrap_or("WRITE"),
            },
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// The generic columns, without READ and WRITE.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn read(&self) -> Column {
        self.read
    }

    pub fn write(&self) -> Column {
        self.write
    }

    /// Every opcode the plan reads, generic columns first.
    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.columns
            .iter()
            .map(|c| c.opcode)
            .chain([self.read.opcode, self.write.opcode])
    }
}
