//! Per-client counters kept in process memory.
//!
//! These are attributed to a client identity by the caller and are not
//! part of the shared block. Transport counters follow the same
//! unsynchronized update model as every other statistic. Delegation
//! counters do not: the number of grants a client currently holds is read
//! by recall policy, so it is maintained with real atomic operations.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::counters::Stat;

/// Bytes, packets and errors moved over one client's connections.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub rx_bytes: Stat,
    pub rx_packets: Stat,
    pub rx_errors: Stat,
    pub tx_bytes: Stat,
    pub tx_packets: Stat,
    pub tx_errors: Stat,
}

impl TransportStats {
    /// Adds one batch of transport activity.
    pub fn record(
        &self,
        rx_bytes: u64,
        rx_packets: u64,
        rx_errors: u64,
        tx_bytes: u64,
        tx_packets: u64,
        tx_errors: u64,
    ) {
        self.rx_bytes.add(rx_bytes);
        self.rx_packets.add(rx_packets);
        self.rx_errors.add(rx_errors);
        self.tx_bytes.add(tx_bytes);
        self.tx_packets.add(tx_packets);
        self.tx_errors.add(tx_errors);
    }
}

/// Delegation accounting for one client.
#[derive(Debug, Default)]
pub struct DelegationStats {
    current_grants: AtomicU32,
    total_recalls: AtomicU32,
    failed_recalls: AtomicU32,
    revokes: AtomicU32,
}

impl DelegationStats {
    /// A delegation was granted to the client.
    pub fn inc_grants(&self) {
        self.current_grants.fetch_add(1, Ordering::Relaxed);
    }

    /// The client returned a delegation. Never drops below zero.
    pub fn dec_grants(&self) {
        // At zero the update is refused and the count stays at zero.
        self.current_grants
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .ok();
    }

    /// The server revoked a delegation from the client.
    pub fn inc_revokes(&self) {
        self.revokes.fetch_add(1, Ordering::Relaxed);
    }

    /// The client was asked to return a delegation.
    pub fn inc_recalls(&self) {
        self.total_recalls.fetch_add(1, Ordering::Relaxed);
    }

    /// The client did not honor a recall.
    pub fn inc_failed_recalls(&self) {
        self.failed_recalls.fetch_add(1, Ordering::Relaxed);
    }

    /// Delegations currently held.
    pub fn current_grants(&self) -> u32 {
        self.current_grants.load(Ordering::Relaxed)
    }

    pub fn total_recalls(&self) -> u32 {
        self.total_recalls.load(Ordering::Relaxed)
    }

    pub fn failed_recalls(&self) -> u32 {
        self.failed_recalls.load(Ordering::Relaxed)
    }

    pub fn revokes(&self) -> u32 {
        self.revokes.load(Ordering::Relaxed)
    }
}

/// All per-client statistics.
///
/// The two groups are written from different paths (network receive and
/// delegation policy) and sit on separate cache lines.
#[derive(Debug, Default)]
pub struct ClientStats {
    transport: CachePadded<TransportStats>,
    delegations: CachePadded<DelegationStats>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds transport activity for this client.
    pub fn record_transport_event(
        &self,
        rx_bytes: u64,
        rx_packets: u64,
        rx_errors: u64,
        tx_bytes: u64,
        tx_packets: u64,
        tx_errors: u64,
    ) {
        self.transport.record(
            rx_bytes, rx_packets, rx_errors, tx_bytes, tx_packets, tx_errors,
        );
    }

    pub fn transport(&self) -> &TransportStats {
        &self.transport
    }

    pub fn delegations(&self) -> &DelegationStats {
        &self.delegations
    }
}
