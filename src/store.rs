//! Snapshot store: where the live block lives and how others find it.
//!
//! The server publishes one [`LiveStats`] block in a named POSIX shared
//! memory region. The name is derived from a numeric key agreed between
//! the server and the monitor (2049 by default), so the monitor can attach
//! without any other rendezvous.
//!
//! ```text
//!   server process                         monitor process
//!   ┌───────────────────────┐              ┌───────────────────────┐
//!   │ StatsRegion::create() │   /nfs_stats │ StatsRegion::attach() │
//!   │   record_*()  ────────┼──► .<key> ◄──┼──── torn_snapshot()   │
//!   └───────────────────────┘              └───────────────────────┘
//! ```
//!
//! Neither side takes a lock. Producers mutate cells in place and the
//! monitor copies the block word by word, accepting torn reads.
//!
//! [`LocalStats`] holds a block on the heap for single-process use.
//! Both implement [`StatsSource`], which is all the monitor needs.

use bytemuck::Zeroable;
use shared_memory::{Shmem, ShmemConf, ShmemError};
use tracing::{debug, info, warn};

use crate::counters::global::{LiveStats, REGION_SIZE};
use crate::error::{Result, StatsError};

/// Key used by the server and monitor when none is configured.
pub const DEFAULT_KEY: u32 = 2049;

/// Anything that exposes a live block.
pub trait StatsSource {
    fn live(&self) -> &LiveStats;
}

impl<T: StatsSource + ?Sized> StatsSource for &T {
    fn live(&self) -> &LiveStats {
        (**self).live()
    }
}

impl<T: StatsSource + ?Sized> StatsSource for std::sync::Arc<T> {
    fn live(&self) -> &LiveStats {
        (**self).live()
    }
}

/// OS identifier of the region published under `key`.
pub fn region_name(key: u32) -> String {
    format!("/nfs_stats.{key}")
}

/// A live block mapped from named shared memory.
///
/// The creating side owns the region and unlinks it on drop; an attached
/// side only unmaps it.
pub struct StatsRegion {
    shmem: Shmem,
    key: u32,
}

// SAFETY: the mapping is only ever accessed through `&LiveStats`, whose
// cells are individually atomic words, so sharing it across threads is sound.
unsafe impl Send for StatsRegion {}
unsafe impl Sync for StatsRegion {}

impl StatsRegion {
    /// Creates and publishes a zeroed block under `key`.
    ///
    /// A region left behind by a previous server instance is taken over and
    /// cleared, provided it has the expected size.
    pub fn create(key: u32) -> Result<Self> {
        let name = region_name(key);
        let region = match ShmemConf::new().size(REGION_SIZE).os_id(&name).create() {
            Ok(shmem) => {
                info!(key, size = REGION_SIZE, "created statistics region {}", name);
                Self::checked(shmem, key)?
            }
            Err(ShmemError::MappingIdExists) => {
                let shmem = ShmemConf::new()
                    .os_id(&name)
                    .open()
                    .map_err(|source| StatsError::Create { key, source })?;
                // Only take ownership of a region we can use; dropping an
                // owned handle unlinks the name.
                let mut region = Self::checked(shmem, key)?;
                region.shmem.set_owner(true);
                warn!(key, "reusing stale statistics region {}, counters cleared", name);
                region.stats().clear();
                region
            }
            Err(source) => return Err(StatsError::Create { key, source }),
        };
        Ok(region)
    }

    /// Attaches to the block published under `key`.
    pub fn attach(key: u32) -> Result<Self> {
        let name = region_name(key);
        let shmem = ShmemConf::new()
            .os_id(&name)
            .open()
            .map_err(|source| StatsError::Locate { key, source })?;
        let region = Self::checked(shmem, key)?;
        info!(key, "attached to statistics region {}", name);
        Ok(region)
    }

    fn checked(shmem: Shmem, key: u32) -> Result<Self> {
        if shmem.len() != REGION_SIZE {
            return Err(StatsError::SizeMismatch {
                key,
                expected: REGION_SIZE,
                found: shmem.len(),
            });
        }
        Ok(Self { shmem, key })
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    /// Returns `true` when this handle created the region.
    pub fn is_owner(&self) -> bool {
        self.shmem.is_owner()
    }

    /// The live block.
    pub fn stats(&self) -> &LiveStats {
        // SAFETY: the mapping is page aligned and exactly `REGION_SIZE` bytes
        // (checked on construction), the all-zero pattern and every other
        // bit pattern are valid for `LiveStats`, and it stays mapped for the
        // lifetime of `self`.
        unsafe { &*self.shmem.as_ptr().cast::<LiveStats>() }
    }
}

impl StatsSource for StatsRegion {
    fn live(&self) -> &LiveStats {
        self.stats()
    }
}

impl Drop for StatsRegion {
    fn drop(&mut self) {
        debug!(
            key = self.key,
            owner = self.shmem.is_owner(),
            "detaching statistics region"
        );
    }
}

impl std::fmt::Debug for StatsRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRegion")
            .field("key", &self.key)
            .field("os_id", &self.shmem.get_os_id())
            .field("owner", &self.shmem.is_owner())
            .finish()
    }
}

/// A live block on the heap, for single-process use.
pub struct LocalStats {
    stats: Box<LiveStats>,
}

impl LocalStats {
    pub fn new() -> Self {
        Self {
            stats: Box::new(LiveStats::zeroed()),
        }
    }

    pub fn stats(&self) -> &LiveStats {
        &self.stats
    }
}

impl Default for LocalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for LocalStats {
    fn live(&self) -> &LiveStats {
        self.stats()
    }
}

impl std::fmt::Debug for LocalStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStats").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::operation::Status;
    use crate::protocol::{nfs4, Minor, Protocol};
    use std::time::Duration;

    fn unique_key(salt: u32) -> u32 {
        std::process::id().wrapping_mul(16).wrapping_add(salt) | 0x4000_0000
    }

    #[test]
    fn test_region_name() {
        assert_eq!(region_name(DEFAULT_KEY), "/nfs_stats.2049");
    }

    #[test]
    fn test_local_stats_starts_zeroed() {
        let local = LocalStats::new();
        assert!(local.live().torn_snapshot().words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_attach_sees_server_updates() {
        let key = unique_key(1);
        let server = StatsRegion::create(key).unwrap();
        assert!(server.is_owner());

        let monitor = StatsRegion::attach(key).unwrap();
        assert!(!monitor.is_owner());
        assert_eq!(monitor.key(), key);

        server.stats().record_request_completed(
            Protocol::NfsV4(Minor::V0),
            nfs4::OPEN,
            Duration::from_micros(10),
            Status::Ok,
            false,
        );
        let snap = monitor.live().torn_snapshot();
        assert_eq!(snap.v4.op[nfs4::OPEN as usize], 1);
    }

    #[test]
    fn test_attach_missing_region_fails() {
        let key = unique_key(2);
        let err = StatsRegion::attach(key).unwrap_err();
        assert!(matches!(err, StatsError::Locate { .. }));
        assert_ne!(err.os_code(), 0);
    }

    #[test]
    fn test_create_reuses_and_clears_stale_region() {
        let key = unique_key(3);
        let first = StatsRegion::create(key).unwrap();
        first.stats().v4.bump(nfs4::READ);

        let second = StatsRegion::create(key).unwrap();
        assert!(second.is_owner());
        assert_eq!(second.stats().torn_snapshot().v4.op[nfs4::READ as usize], 0);
    }

    #[test]
    fn test_create_leaves_foreign_region_in_place() {
        let key = unique_key(4);
        let foreign = ShmemConf::new()
            .size(4096)
            .os_id(region_name(key))
            .create()
            .unwrap();

        let err = StatsRegion::create(key).unwrap_err();
        assert!(matches!(err, StatsError::SizeMismatch { found: 4096, .. }));

        // The failed create must not have unlinked the name.
        let reopened = ShmemConf::new().os_id(region_name(key)).open().unwrap();
        assert_eq!(reopened.len(), 4096);
        drop(reopened);
        drop(foreign);
    }
}
