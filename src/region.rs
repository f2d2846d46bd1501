//! Attach handshake and region-wide views.
//!
//! A [`Region`] is a per-process handle onto an existing shared-memory
//! region. Attaching maps the file `MAP_SHARED`, validates the header, and
//! performs no writes; all mutable state stays inside the mapping. Handles
//! are cheap to clone and the mapping is released when the last clone
//! drops. Multiple handles to the same region are fine.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::constants::{
    CHANNEL_DESCRIPTOR_SIZE, CHANNEL_TABLE_OFFSET, DEFAULT_REGION_PATH, MAX_CHANNELS,
    REGION_MIN_SIZE,
};
use crate::error::{DmxpError, Result};
use crate::insights;
use crate::layout::{ChannelDescriptor, RegionHeader};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::mpmc::channel::ChannelRef;
use crate::mpmc::{Consumer, Producer};

/// Snapshot of one channel's control block.
///
/// `head` and `tail` are read atomically but not as a pair; re-read them
/// through [`Region::channel_info`] when a consistent depth matters.
#[derive(Debug, Clone, Copy)]
pub struct ChannelInfo {
    pub channel_id: u32,
    pub capacity: u64,
    pub band_offset: u64,
    pub head: u64,
    pub tail: u64,
}

impl ChannelInfo {
    /// Messages currently in flight (published but unconsumed), as of the
    /// snapshot.
    pub fn depth(&self) -> u64 {
        self.tail.saturating_sub(self.head)
    }
}

struct Mapping {
    ptr: *mut u8,
    len: usize,
    metrics: Metrics,
}

// The mapping is plain shared memory; all concurrent access goes through
// atomics or claimed slots.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut _, self.len);
        }
    }
}

/// Handle onto an attached region.
#[derive(Clone)]
pub struct Region {
    inner: Arc<Mapping>,
}

impl Region {
    /// Attach to the region at `path`.
    ///
    /// Opens read-write, maps the whole file shared, closes the descriptor,
    /// then validates magic and version. Nothing is written; on any failure
    /// the mapping (if made) is released and the file is untouched, so the
    /// caller may retry once the allocator side has initialized the region.
    pub fn attach<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DmxpError::PathMissing { path: path.to_path_buf() },
                _ => DmxpError::Io(e),
            })?;

        let len = file.metadata()?.len() as usize;
        if len < REGION_MIN_SIZE {
            return Err(DmxpError::RegionTruncated { len });
        }

        let ptr = unsafe {
            let ptr = libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            );
            if ptr == libc::MAP_FAILED {
                return Err(DmxpError::MapFailed(io::Error::last_os_error()));
            }
            ptr as *mut u8
        };

        // The mapping outlives the descriptor.
        drop(file);

        let region = Self {
            inner: Arc::new(Mapping { ptr, len, metrics: Metrics::new() }),
        };
        // Unmap-on-error falls out of Mapping's Drop.
        region.header().validate()?;

        insights::record_attach(len);
        Ok(region)
    }

    /// Attach at the well-known tmpfs path.
    pub fn attach_default() -> Result<Self> {
        Self::attach(DEFAULT_REGION_PATH)
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.inner.ptr
    }

    pub(crate) fn header(&self) -> &RegionHeader {
        unsafe { &*(self.inner.ptr as *const RegionHeader) }
    }

    /// Advisory count of initialized channels, from the header. May lag
    /// the descriptor table; enumerate for the authoritative view.
    pub fn channel_count(&self) -> u32 {
        self.header().channel_count.load(Ordering::Relaxed)
    }

    fn table_len(&self) -> usize {
        (self.header().max_channels as usize).min(MAX_CHANNELS)
    }

    pub(crate) fn descriptor(&self, channel_id: u32) -> Option<&ChannelDescriptor> {
        if channel_id as usize >= self.table_len() {
            return None;
        }
        let offset = CHANNEL_TABLE_OFFSET + channel_id as usize * CHANNEL_DESCRIPTOR_SIZE;
        Some(unsafe { &*(self.inner.ptr.add(offset) as *const ChannelDescriptor) })
    }

    /// Control-block snapshot for one channel, absent if uninitialized.
    pub fn channel_info(&self, channel_id: u32) -> Option<ChannelInfo> {
        let desc = self.descriptor(channel_id)?;
        if !desc.is_initialized() {
            return None;
        }
        Some(ChannelInfo {
            channel_id: desc.channel_id,
            capacity: desc.capacity,
            band_offset: desc.band_offset,
            head: desc.head.load(Ordering::Acquire),
            tail: desc.tail.load(Ordering::Acquire),
        })
    }

    /// Ids of all initialized channels, ascending.
    pub fn list_channels(&self) -> Vec<u32> {
        self.channels().map(|info| info.channel_id).collect()
    }

    /// Iterate initialized channels in ascending id order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelInfo> + '_ {
        (0..self.table_len() as u32).filter_map(|id| self.channel_info(id))
    }

    /// Producer endpoint on `channel_id`. Fails fast if the channel is
    /// missing or its descriptor is unusable; never allocates in the region.
    pub fn producer(&self, channel_id: u32) -> Result<Producer> {
        ChannelRef::resolve(self, channel_id)?;
        Ok(Producer::new(self.clone(), channel_id))
    }

    /// Consumer endpoint on `channel_id`.
    pub fn consumer(&self, channel_id: u32) -> Result<Consumer> {
        ChannelRef::resolve(self, channel_id)?;
        Ok(Consumer::new(self.clone(), channel_id))
    }

    /// This process's endpoint counters for this handle's clone family.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub(crate) fn metrics_ref(&self) -> &Metrics {
        &self.inner.metrics
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.debug_struct("Region")
            .field("len", &self.inner.len)
            .field("version", &header.version)
            .field("max_channels", &header.max_channels)
            .field("channel_count", &self.channel_count())
            .field("channels", &self.list_channels())
            .finish()
    }
}
