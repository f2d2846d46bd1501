//! Producer endpoint: claim a tail position, write, publish.

use std::sync::atomic::Ordering;

use crate::constants::{MSG_INLINE, RUNTIME_RUST};
use crate::error::{DmxpError, Result};
use crate::insights;
use crate::layout::MessageMeta;
use crate::mpmc::channel::{empty_marker, published_marker, sequence_in_expected_set, ChannelRef};
use crate::mpmc::timestamp_ns;
use crate::region::Region;

/// Sending endpoint on one channel.
///
/// Holds only the region handle, the channel id, and a per-endpoint
/// message-id counter. Any number of producers may target the same channel
/// from any process; contenders are serialized by the tail CAS, and
/// publication order equals claim order.
pub struct Producer {
    region: Region,
    channel_id: u32,
    next_message_id: u64,
}

impl Producer {
    pub(crate) fn new(region: Region, channel_id: u32) -> Self {
        Self { region, channel_id, next_message_id: 0 }
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Publish one message.
    ///
    /// Claims the next tail position with a CAS once `tail - head < C`,
    /// waits for the slot's empty marker, writes meta and payload, then
    /// publishes with a release store of the sequence. Returns
    /// [`DmxpError::ChannelFull`] without moving `tail` when the ring has
    /// no room.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MSG_INLINE {
            return Err(DmxpError::PayloadTooLarge { len: payload.len() });
        }

        let chan = ChannelRef::resolve(&self.region, self.channel_id)?;
        let capacity = chan.capacity();

        // Claim. The full pre-check rides inside the retry loop so a lost
        // CAS re-reads both cursors.
        let tail = loop {
            let t = chan.tail().load(Ordering::Acquire);
            let h = chan.head().load(Ordering::Acquire);
            if t.wrapping_sub(h) >= capacity {
                self.region.metrics_ref().record_full();
                insights::record_full(self.channel_id);
                return Err(DmxpError::ChannelFull { channel_id: self.channel_id });
            }
            match chan
                .tail()
                .compare_exchange_weak(t, t + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break t,
                Err(_) => std::hint::spin_loop(),
            }
        };

        // Wait until the slot is empty for our cycle. The claim guarantees
        // room, so this only covers a consumer that has advanced head but
        // not yet recycled the sequence word.
        let sequence = chan.sequence(tail);
        loop {
            let s = sequence.load(Ordering::Acquire);
            if s == empty_marker(tail) {
                break;
            }
            if s > tail || !sequence_in_expected_set(s, tail, chan.mask()) {
                self.region.metrics_ref().record_corrupt();
                insights::record_corrupt(self.channel_id);
                return Err(DmxpError::corrupt(
                    self.channel_id,
                    format!("slot sequence {s} while claiming position {tail}"),
                ));
            }
            std::hint::spin_loop();
        }

        let meta = MessageMeta {
            message_id: self.next_message_id,
            timestamp_ns: timestamp_ns(),
            channel_id: self.channel_id,
            message_type: 0,
            sender_pid: std::process::id(),
            sender_runtime: RUNTIME_RUST,
            flags: 0,
            payload_len: payload.len() as u32,
            _reserved: 0,
        };

        let slot = chan.slot_ptr(tail);
        unsafe {
            std::ptr::write(std::ptr::addr_of_mut!((*slot).meta), meta);
            std::ptr::copy_nonoverlapping(
                payload.as_ptr(),
                std::ptr::addr_of_mut!((*slot).payload) as *mut u8,
                payload.len(),
            );
        }
        self.next_message_id += 1;

        // Publish: everything written above becomes visible to the
        // consumer that acquires this store.
        sequence.store(published_marker(tail), Ordering::Release);

        self.region.metrics_ref().record_send(payload.len() as u64);
        insights::record_send(self.channel_id, payload.len() as u64);
        Ok(())
    }

    /// Publish messages until the first full ring; returns how many were
    /// sent. Other errors propagate.
    pub fn send_batch<'m, I>(&mut self, messages: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'m [u8]>,
    {
        let mut sent = 0;
        for payload in messages {
            match self.send(payload) {
                Ok(()) => sent += 1,
                Err(DmxpError::ChannelFull { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }
}
