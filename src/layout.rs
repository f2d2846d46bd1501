//! Binary layout of the shared region.
//!
//! The region is created by an external allocator; this module defines the
//! exact image both sides agree on, as `#[repr(C)]` structs overlaid on the
//! mapping:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RegionHeader (128 B): magic │ version │ max_channels │ ...  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ChannelDescriptor[MAX_CHANNELS]  (384 B each)               │
//! │    id/flags/capacity/band_offset │ tail @128 │ head @256     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Slot bands, one per channel at its band_offset              │
//! │    Slot (1088 B): sequence │ meta │ pad │ payload[960] │ pad │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Offsets are the ABI. They are asserted at compile time below; a peer in
//! any language must reproduce them bit for bit. All scalars little-endian,
//! cursors and sequences 8-byte naturally aligned atomics.

use std::mem::{offset_of, size_of};
use std::sync::atomic::{AtomicU32, AtomicU64};

use bytemuck::{Pod, Zeroable};

use crate::constants::{
    CHANNEL_DESCRIPTOR_SIZE, CHANNEL_TABLE_OFFSET, MAGIC, MSG_INLINE, REGION_VERSION, SLOT_SIZE,
};
use crate::error::{DmxpError, Result};

/// Global header at region offset 0.
#[repr(C, align(128))]
pub struct RegionHeader {
    pub magic: u64,
    pub version: u32,
    pub max_channels: u32,
    /// Count of initialized channels. Advisory; may lag the table.
    pub channel_count: AtomicU32,
    pub reserved: u32,
    _pad: [u8; 104],
}

impl RegionHeader {
    /// Validates magic and version, in that order. Performs no writes.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(DmxpError::InvalidMagic { found: self.magic });
        }
        if self.version != REGION_VERSION {
            return Err(DmxpError::VersionMismatch { found: self.version });
        }
        Ok(())
    }
}

/// Per-channel control block in the descriptor table.
///
/// `tail` and `head` each live on their own cache line so producers and
/// consumers do not false-share. A descriptor with `capacity == 0` is
/// uninitialized; initialized descriptors never change again, except for
/// the two cursors.
#[repr(C, align(128))]
pub struct ChannelDescriptor {
    pub channel_id: u32,
    pub flags: u32,
    /// Slot count of this channel's band. Power of two.
    pub capacity: u64,
    /// Absolute offset of the slot band within the region.
    pub band_offset: u64,
    _pad0: [u8; 104],
    /// Producer cursor. Monotonic; ring index is `tail & (capacity - 1)`.
    pub tail: AtomicU64,
    _pad1: [u8; 120],
    /// Consumer cursor. Monotonic; `tail - head` is the queue depth.
    pub head: AtomicU64,
    _pad2: [u8; 120],
}

impl ChannelDescriptor {
    pub fn is_initialized(&self) -> bool {
        self.capacity != 0
    }
}

/// Message metadata, 40 bytes, stored at slot offset 8 and returned to
/// receivers. The trailing reserved word is the struct's C-ABI tail
/// padding, made explicit so the type has no uninitialized bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MessageMeta {
    pub message_id: u64,
    pub timestamp_ns: u64,
    pub channel_id: u32,
    /// Transported, semantics reserved to upper layers. Always 0 here.
    pub message_type: u32,
    pub sender_pid: u32,
    /// Tag of the producing runtime, see [`crate::constants::RUNTIME_RUST`].
    pub sender_runtime: u16,
    /// Transported, semantics reserved to upper layers. Always 0 here.
    pub flags: u16,
    pub payload_len: u32,
    pub(crate) _reserved: u32,
}

/// One message cell of a slot band.
///
/// `sequence` encodes both cycle and publication state: at ring index `i`
/// in a channel of capacity `C`, the slot is empty for cycle `k` while
/// `sequence == i + k*C` and published while `sequence == i + k*C + 1`.
#[repr(C, align(64))]
pub struct Slot {
    pub sequence: AtomicU64,
    pub meta: MessageMeta,
    _pad0: [u8; 16],
    pub payload: [u8; MSG_INLINE],
    _pad1: [u8; 64],
}

// The offsets below are the wire contract; a layout change here is a
// protocol break, not a refactor.
const _: () = {
    assert!(size_of::<RegionHeader>() == CHANNEL_TABLE_OFFSET);
    assert!(offset_of!(RegionHeader, magic) == 0);
    assert!(offset_of!(RegionHeader, version) == 8);
    assert!(offset_of!(RegionHeader, max_channels) == 12);
    assert!(offset_of!(RegionHeader, channel_count) == 16);
    assert!(offset_of!(RegionHeader, reserved) == 20);

    assert!(size_of::<ChannelDescriptor>() == CHANNEL_DESCRIPTOR_SIZE);
    assert!(offset_of!(ChannelDescriptor, channel_id) == 0);
    assert!(offset_of!(ChannelDescriptor, flags) == 4);
    assert!(offset_of!(ChannelDescriptor, capacity) == 8);
    assert!(offset_of!(ChannelDescriptor, band_offset) == 16);
    assert!(offset_of!(ChannelDescriptor, tail) == 128);
    assert!(offset_of!(ChannelDescriptor, head) == 256);

    assert!(size_of::<MessageMeta>() == 40);
    assert!(offset_of!(MessageMeta, message_id) == 0);
    assert!(offset_of!(MessageMeta, timestamp_ns) == 8);
    assert!(offset_of!(MessageMeta, channel_id) == 16);
    assert!(offset_of!(MessageMeta, message_type) == 20);
    assert!(offset_of!(MessageMeta, sender_pid) == 24);
    assert!(offset_of!(MessageMeta, sender_runtime) == 28);
    assert!(offset_of!(MessageMeta, flags) == 30);
    assert!(offset_of!(MessageMeta, payload_len) == 32);

    assert!(size_of::<Slot>() == SLOT_SIZE);
    assert!(offset_of!(Slot, sequence) == 0);
    assert!(offset_of!(Slot, meta) == 8);
    assert!(offset_of!(Slot, payload) == 64);
};
