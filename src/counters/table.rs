//! Dense, index-addressed per-opcode counter arrays.
//!
//! An [`OpTable`] holds one counter per opcode a protocol version defines,
//! including reserved and illegal codes. Slots are never added, removed or
//! reordered at runtime, so index `i` always means opcode `i` for every
//! build that shares the layout. Which slots are shown, and under what name,
//! is decided separately by [`OpMetadata`](crate::protocol::OpMetadata).

use crate::counters::Stat;

/// One counter per opcode of a protocol version.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpTable<C, const N: usize> {
    pub op: [C; N],
}

impl<C, const N: usize> OpTable<C, N> {
    /// Number of opcode slots.
    pub const LEN: usize = N;

    /// Returns the counter for `opcode`, or `None` when out of range.
    #[inline]
    pub fn get(&self, opcode: u32) -> Option<&C> {
        self.op.get(opcode as usize)
    }

    /// All slots in opcode order.
    #[inline]
    pub fn as_slice(&self) -> &[C] {
        &self.op
    }
}

impl<const N: usize> OpTable<Stat, N> {
    /// Counts one more `opcode`. Out-of-range opcodes are ignored.
    #[inline]
    pub fn bump(&self, opcode: u32) {
        if let Some(slot) = self.get(opcode) {
            slot.add(1);
        }
    }
}

impl<const N: usize> OpTable<u64, N> {
    /// Mutable access to all slots, for building deltas.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.op
    }
}

// SAFETY: `#[repr(transparent)]` over `[u64; N]`: no padding, any bit pattern is valid.
unsafe impl<const N: usize> bytemuck::Zeroable for OpTable<u64, N> {}
// SAFETY: as above; `Copy` and `'static` are derived.
unsafe impl<const N: usize> bytemuck::Pod for OpTable<u64, N> {}
// SAFETY: all-zero is a valid `[Stat; N]`.
unsafe impl<const N: usize> bytemuck::Zeroable for OpTable<Stat, N> {}
