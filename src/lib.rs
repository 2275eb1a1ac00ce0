//! # nfs-stats - Lock-Free Statistics for a Multi-Protocol File Server
//!
//! A Rust library for counting what a file server does: every RPC of every
//! protocol it speaks (NFSv3, MOUNT, NLM, RQUOTA, NFSv4.0/4.1/4.2), with
//! outcome, latency and byte volume. The counters live in one fixed-layout
//! block that is published in shared memory, so a separate monitor process
//! can read them without talking to the server.
//!
//! ## The Problem
//!
//! The request path of a file server is hot. Every completed request updates
//! several counters, and dozens of worker threads complete requests at the
//! same time. Protecting the counters with a lock, or even with atomic
//! read-modify-write instructions, puts a serialization point on exactly the
//! path that must scale.
//!
//! At the same time, operators want to watch live rates from outside the
//! process, without a management RPC that itself competes with the workload.
//!
//! ## The Approach: Unsynchronized Counters in Shared Memory
//!
//! 1. **No synchronization on update**: a counter increment is a plain
//!    load-add-store ([`Stat::add`](counters::Stat::add)). Two threads
//!    hitting the same cell at the same instant may lose one increment.
//!    Counts are approximate under contention and exact when uncontended.
//!
//! 2. **One fixed layout**: all counters form a single `#[repr(C)]` block,
//!    [`GlobalStats`](counters::global::GlobalStats), with one slot per
//!    opcode of every protocol. Slot `i` always means opcode `i`.
//!
//! 3. **Torn snapshots**: a reader copies the block word by word while
//!    writers keep going. A copy can mix before/after values of one request;
//!    since every field only grows, the next copy makes it whole again.
//!
//! 4. **Wrapping deltas**: the monitor prints `curr - prev` per interval with
//!    wrapping subtraction, which stays exact across a 64-bit wrap.
//!
//! ```text
//!   request threads                 shared region                monitor
//!   ───────────────                 ─────────────                ───────
//!   record_request_completed ──┐
//!   record_io_completed ───────┼──► GlobalStats<Stat> ──copy──► GlobalStats<u64>
//!   record_compound_completed ─┘                                     │ diff
//!                                                                    ▼
//!                                                     ACCESS  COMMIT ... READ WRITE
//! ```
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`counters`] | [`Stat`](counters::Stat), per-operation counters, the global block, per-client counters |
//! | [`protocol`] | opcode numbers, display names, column plans |
//! | [`update`] | the entry points the request pipeline calls |
//! | [`store`] | the shared memory region and in-process blocks |
//! | [`diff`] | per-interval deltas |
//! | [`observers`] | the rate table and the summary table |
//! | [`monitor`] | the sample-diff-print loop |
//! | [`error`] | the crate error type |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use nfs_stats::counters::operation::Status;
//! use nfs_stats::diff::diff;
//! use nfs_stats::protocol::{nfs4, Minor, Protocol};
//! use nfs_stats::store::LocalStats;
//!
//! let local = LocalStats::new();
//! let stats = local.stats();
//! let v41 = Protocol::NfsV4(Minor::V1);
//!
//! let before = stats.torn_snapshot();
//! stats.record_request_completed(v41, nfs4::OPEN, Duration::from_micros(80), Status::Ok, false);
//! stats.record_compound_completed(v41, 4, Status::Ok, false);
//! let after = stats.torn_snapshot();
//!
//! let delta = diff(&after, &before);
//! assert_eq!(delta.v4.op[nfs4::OPEN as usize], 1);
//! assert_eq!(delta.nfsv41.compounds.total, 1);
//! ```
//!
//! In a server, publish the block with
//! [`StatsRegion::create`](store::StatsRegion::create) instead, and run the
//! `nfs-stats-monitor` binary (feature `cli`) against the same key.
//!
//! ## Feature Flags
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `table` | [`observers::table`], summary tables via `tabled` |
//! | `cli` | the `nfs-stats-monitor` binary and the `simulate` demo |
//! | `full` | everything |

pub mod counters;
pub mod diff;
pub mod error;
pub mod monitor;
pub mod observers;
pub mod protocol;
pub mod store;
pub mod update;

pub use counters::global::{GlobalStats, LiveStats};
pub use counters::Stat;
pub use error::{Result, StatsError};
