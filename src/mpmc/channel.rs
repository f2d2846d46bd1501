//! Per-channel view and sequence arithmetic.

use std::sync::atomic::AtomicU64;

use crate::constants::{CACHE_LINE_SIZE, SLOT_SIZE};
use crate::error::{DmxpError, Result};
use crate::layout::{ChannelDescriptor, Slot};
use crate::region::Region;

/// Converts a cursor position to its ring index.
///
/// The mask is `capacity - 1`; capacity is a power of two, so the bitwise
/// AND is the modulo.
#[inline(always)]
pub fn band_index(cursor: u64, mask: u64) -> u64 {
    cursor & mask
}

/// Sequence word of an empty slot at `cursor`'s position, for `cursor`'s
/// cycle: with `cursor = k*C + i` this is `i + k*C`, i.e. the cursor
/// itself.
#[inline(always)]
pub fn empty_marker(cursor: u64) -> u64 {
    cursor
}

/// Sequence word of a published slot at `cursor`'s position.
#[inline(always)]
pub fn published_marker(cursor: u64) -> u64 {
    cursor + 1
}

/// Sequence word a consumer stores after reading at `cursor`: the empty
/// marker for the next cycle at the same index, `i + (k+1)*C`.
#[inline(always)]
pub fn recycled_marker(cursor: u64, capacity: u64) -> u64 {
    cursor + capacity
}

/// Whether a sequence word observed at `cursor`'s slot is in the
/// protocol's expected set. Legal words at index `i` are `i + j*C` and
/// `i + j*C + 1` for some cycle `j`, so modulo capacity they are congruent
/// to `i` or `i + 1`. Anything else is a crashed producer or corruption.
#[inline(always)]
pub fn sequence_in_expected_set(sequence: u64, cursor: u64, mask: u64) -> bool {
    let r = sequence & mask;
    r == (cursor & mask) || r == (cursor.wrapping_add(1) & mask)
}

/// Resolved view of one channel: its descriptor plus a typed pointer to
/// its slot band. Cheap to build; endpoints resolve per operation and hold
/// no channel state between calls.
pub(crate) struct ChannelRef<'a> {
    desc: &'a ChannelDescriptor,
    band: *mut Slot,
    capacity: u64,
    mask: u64,
}

impl<'a> ChannelRef<'a> {
    /// Looks up `channel_id` and re-validates the descriptor against the
    /// mapping before any slot is touched.
    pub(crate) fn resolve(region: &'a Region, channel_id: u32) -> Result<Self> {
        let desc = region
            .descriptor(channel_id)
            .filter(|d| d.is_initialized())
            .ok_or(DmxpError::UnknownChannel { channel_id })?;

        if desc.channel_id != channel_id {
            return Err(DmxpError::corrupt(
                channel_id,
                format!("descriptor carries id {}", desc.channel_id),
            ));
        }
        let capacity = desc.capacity;
        if !capacity.is_power_of_two() {
            return Err(DmxpError::corrupt(
                channel_id,
                format!("capacity {capacity} is not a power of two"),
            ));
        }

        let band_offset = desc.band_offset as usize;
        let band_len = (capacity as usize)
            .checked_mul(SLOT_SIZE)
            .ok_or_else(|| DmxpError::corrupt(channel_id, "band length overflows"))?;
        let band_end = band_offset
            .checked_add(band_len)
            .ok_or_else(|| DmxpError::corrupt(channel_id, "band end overflows"))?;
        if band_end > region.len() || band_offset % CACHE_LINE_SIZE != 0 {
            return Err(DmxpError::corrupt(
                channel_id,
                format!("band {band_offset}..{band_end} outside mapped region"),
            ));
        }

        Ok(Self {
            desc,
            band: unsafe { region.base_ptr().add(band_offset) } as *mut Slot,
            capacity,
            mask: capacity - 1,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    pub(crate) fn mask(&self) -> u64 {
        self.mask
    }

    #[inline]
    pub(crate) fn tail(&self) -> &AtomicU64 {
        &self.desc.tail
    }

    #[inline]
    pub(crate) fn head(&self) -> &AtomicU64 {
        &self.desc.head
    }

    /// Raw slot pointer for `cursor`'s position.
    #[inline]
    pub(crate) fn slot_ptr(&self, cursor: u64) -> *mut Slot {
        unsafe { self.band.add(band_index(cursor, self.mask) as usize) }
    }

    /// The publication sequence word of `cursor`'s slot.
    #[inline]
    pub(crate) fn sequence(&self, cursor: u64) -> &AtomicU64 {
        unsafe { &(*self.slot_ptr(cursor)).sequence }
    }
}
