//! The lock-free MPMC slot protocol.
//!
//! Producers and consumers coordinate through two monotonic cursors and a
//! per-slot sequence word; no locks, no kernel broker. For slot index `i`
//! in a channel of capacity `C` (power of two):
//!
//! - empty for cycle `k` while `sequence == i + k*C`
//! - published in cycle `k` once `sequence == i + k*C + 1`
//! - consumption stores `i + (k+1)*C`, the empty marker for the next cycle
//!
//! Producers serialize on the `tail` CAS, consumers on the `head` CAS.
//! Happens-before runs from the producer's release store of the sequence
//! to the consumer's acquire load, covering the slot's meta and payload.

pub mod channel;
pub mod consumer;
pub mod producer;

pub use channel::{band_index, empty_marker, published_marker, recycled_marker};
pub use consumer::{Consumer, WaitStrategy};
pub use producer::Producer;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::MSG_INLINE;
use crate::layout::MessageMeta;

/// One received message: metadata plus the payload copied out of the ring.
#[derive(Clone, Copy)]
pub struct Message {
    pub(crate) meta: MessageMeta,
    pub(crate) payload: [u8; MSG_INLINE],
}

impl Message {
    pub fn meta(&self) -> &MessageMeta {
        &self.meta
    }

    /// The payload bytes; length is the sender's `payload_len`.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.meta.payload_len as usize]
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("meta", &self.meta)
            .field("payload_len", &self.meta.payload_len)
            .finish()
    }
}

pub(crate) fn timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
