//! Error types for dmxp.

use std::path::PathBuf;
use thiserror::Error;

use crate::constants::{MSG_INLINE, REGION_VERSION};

pub type Result<T> = std::result::Result<T, DmxpError>;

/// Success code of the integer ABI used by cross-language callers.
pub const CODE_SUCCESS: i32 = 0;

#[derive(Error, Debug)]
pub enum DmxpError {
    /// Region file does not exist yet (the allocator side has not run).
    #[error("region file not found: {}", .path.display())]
    PathMissing { path: PathBuf },

    /// Mapped file does not start with the DMXP magic number.
    #[error("invalid region magic: {found:#018x}")]
    InvalidMagic { found: u64 },

    /// Region was initialized by an incompatible library version.
    #[error("region version mismatch: found {found}, supported {}", REGION_VERSION)]
    VersionMismatch { found: u32 },

    /// `mmap` of the region failed.
    #[error("failed to map region: {0}")]
    MapFailed(#[source] std::io::Error),

    /// Region file is too small to hold the header and descriptor table.
    #[error("region truncated: {len} bytes")]
    RegionTruncated { len: usize },

    /// No initialized descriptor for this channel id.
    #[error("unknown channel: {channel_id}")]
    UnknownChannel { channel_id: u32 },

    /// Payload exceeds the inline slot capacity.
    #[error("payload too large: {len} bytes (max: {})", MSG_INLINE)]
    PayloadTooLarge { len: usize },

    /// Ring is full; recoverable, retry after a consumer drains.
    #[error("channel {channel_id} is full")]
    ChannelFull { channel_id: u32 },

    /// Non-blocking receive found no published message.
    #[error("channel empty")]
    Empty,

    /// Timed receive reached its deadline.
    #[error("receive timed out")]
    Timeout,

    /// A slot sequence outside the protocol's expected set, or an invalid
    /// descriptor. The channel is unusable until externally recovered.
    #[error("channel {channel_id} corrupt: {reason}")]
    ChannelCorrupt { channel_id: u32, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DmxpError {
    pub fn corrupt(channel_id: u32, reason: impl Into<String>) -> Self {
        Self::ChannelCorrupt { channel_id, reason: reason.into() }
    }

    /// Recoverable errors are expected signals the caller may retry on;
    /// everything else is a hard failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelFull { .. } | Self::Empty | Self::Timeout)
    }

    /// Integer code of this error in the cross-language ABI.
    ///
    /// `Empty` and `Timeout` values are fixed by existing peers; the rest
    /// of the mapping is equally frozen. Success is [`CODE_SUCCESS`].
    pub fn code(&self) -> i32 {
        match self {
            Self::PathMissing { .. } => -1,
            Self::InvalidMagic { .. } => -2,
            Self::VersionMismatch { .. } => -3,
            Self::MapFailed(_) => -4,
            Self::Empty => -5,
            Self::ChannelFull { .. } => -6,
            Self::Timeout => -7,
            Self::UnknownChannel { .. } => -8,
            Self::PayloadTooLarge { .. } => -9,
            Self::ChannelCorrupt { .. } => -10,
            Self::RegionTruncated { .. } => -11,
            Self::Io(_) => -12,
        }
    }
}
