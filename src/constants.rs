//! Wire-contract constants.
//!
//! Every value here is part of the shared-memory ABI and must match what
//! peer runtimes attached to the same region use. None of them are tunable.

/// Magic number at offset 0 of a valid region ("DMXP_MEM").
pub const MAGIC: u64 = 0x444d_5850_5f4d_454d;

/// Region format version accepted by this library.
pub const REGION_VERSION: u32 = 1;

/// Fixed upper bound of the channel descriptor table.
pub const MAX_CHANNELS: usize = 256;

/// Byte offset of the descriptor table within the region.
pub const CHANNEL_TABLE_OFFSET: usize = 128;

/// Stride of one channel descriptor in the table.
pub const CHANNEL_DESCRIPTOR_SIZE: usize = 384;

/// Size of one message slot.
pub const SLOT_SIZE: usize = 1088;

/// Maximum inline payload bytes per message.
pub const MSG_INLINE: usize = 960;

/// Smallest region that can hold the header plus a full descriptor table.
/// Allocators lay out the first slot band immediately after the table, so
/// this is also the lowest valid `band_offset`.
pub const REGION_MIN_SIZE: usize =
    CHANNEL_TABLE_OFFSET + MAX_CHANNELS * CHANNEL_DESCRIPTOR_SIZE;

/// Well-known region path on a shared tmpfs.
pub const DEFAULT_REGION_PATH: &str = "/dev/shm/dmxp_alloc";

/// Cache line size assumed for cursor isolation.
pub const CACHE_LINE_SIZE: usize = 64;

/// `sender_runtime` tag stamped by this library. The Python binding
/// stamps 0; the tag is diagnostic only.
pub const RUNTIME_RUST: u16 = 1;
