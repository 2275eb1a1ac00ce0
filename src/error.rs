//! Error type for locating, creating and reading the statistics region.
//!
//! Updating counters never fails; only the surfaces around the block do.
//! Every failure a caller can see is a [`StatsError`], and the monitor binary
//! turns it into a process exit status with [`StatsError::os_code`].

use shared_memory::ShmemError;
use thiserror::Error;

/// Errors raised by the snapshot store and the monitor.
#[derive(Debug, Error)]
pub enum StatsError {
    /// No region is published under `key`, or it could not be mapped.
    #[error("failed to locate statistics region, key {key}: {source}")]
    Locate {
        key: u32,
        #[source]
        source: ShmemError,
    },

    /// The region could not be created.
    #[error("failed to create statistics region, key {key}: {source}")]
    Create {
        key: u32,
        #[source]
        source: ShmemError,
    },

    /// The region exists but does not hold a block of the expected layout.
    #[error("statistics region {key} is {found} bytes, expected {expected}")]
    SizeMismatch {
        key: u32,
        expected: usize,
        found: usize,
    },

    /// Writing the report failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store and monitor operations.
pub type Result<T> = std::result::Result<T, StatsError>;

const EINVAL: i32 = 22;

impl StatsError {
    /// The OS error number behind this failure, suitable as an exit status.
    ///
    /// Falls back to `EINVAL` for layout mismatches and to `1` when no
    /// error number is available.
    pub fn os_code(&self) -> i32 {
        match self {
            StatsError::Locate { source, .. } | StatsError::Create { source, .. } => {
                shmem_errno(source).unwrap_or(1)
            }
            StatsError::SizeMismatch { .. } => EINVAL,
            StatsError::Io(err) => err.raw_os_error().unwrap_or(1),
        }
    }
}

fn shmem_errno(err: &ShmemError) -> Option<i32> {
    match err {
        ShmemError::MapCreateFailed(code)
        | ShmemError::MapOpenFailed(code)
        | ShmemError::UnknownOsError(code) => i32::try_from(*code).ok(),
        _ => None,
    }
}
