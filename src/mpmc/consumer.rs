//! Consumer endpoint: claim a head position, read, recycle.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::constants::MSG_INLINE;
use crate::error::{DmxpError, Result};
use crate::insights;
use crate::mpmc::channel::{published_marker, recycled_marker, ChannelRef};
use crate::mpmc::Message;
use crate::region::Region;

/// How a blocking receive behaves between checks of the head slot.
///
/// The bus has no kernel wait primitive; waiting is spinning, optionally
/// with a cooperative yield once the spin budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Spin briefly, then yield to the scheduler between checks.
    #[default]
    Yielding,
    /// Never yield. Lowest latency, burns a core while waiting.
    BusySpin,
}

const SPIN_TRIES: u32 = 100;

impl WaitStrategy {
    #[inline]
    fn idle(&self, spins: &mut u32) {
        match self {
            WaitStrategy::BusySpin => std::hint::spin_loop(),
            WaitStrategy::Yielding => {
                if *spins < SPIN_TRIES {
                    *spins += 1;
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }
}

enum Wait {
    NonBlocking,
    Deadline(Instant),
    Forever,
}

/// Receiving endpoint on one channel.
///
/// Stateless apart from the region handle; any number of consumers may
/// share a channel, serialized by the head CAS. Delivery order equals
/// publication order.
pub struct Consumer {
    region: Region,
    channel_id: u32,
    wait_strategy: WaitStrategy,
}

impl Consumer {
    pub(crate) fn new(region: Region, channel_id: u32) -> Self {
        Self { region, channel_id, wait_strategy: WaitStrategy::default() }
    }

    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Non-blocking receive. [`DmxpError::Empty`] when nothing is
    /// published at head; `head` is left unchanged in that case.
    pub fn try_recv(&self) -> Result<Message> {
        self.recv_inner(Wait::NonBlocking)
    }

    /// Blocking receive; spins (per the wait strategy) until a message is
    /// published.
    pub fn recv(&self) -> Result<Message> {
        self.recv_inner(Wait::Forever)
    }

    /// Receive with a deadline; [`DmxpError::Timeout`] on expiry.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Message> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.recv_inner(Wait::Deadline(deadline)),
            None => self.recv_inner(Wait::Forever),
        }
    }

    /// Drain up to `max` messages without blocking.
    pub fn drain(&self, max: usize) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.try_recv() {
                Ok(message) => out.push(message),
                Err(DmxpError::Empty) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn recv_inner(&self, wait: Wait) -> Result<Message> {
        let chan = ChannelRef::resolve(&self.region, self.channel_id)?;
        let capacity = chan.capacity();
        let mut spins = 0;

        loop {
            let head = chan.head().load(Ordering::Acquire);
            let sequence = chan.sequence(head);
            let s = sequence.load(Ordering::Acquire);

            if s == published_marker(head) {
                // Published. Claiming the position makes us its only
                // reader for this cycle; the readiness check comes first
                // so a failed claim never strands an unpublished slot.
                if chan
                    .head()
                    .compare_exchange_weak(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    continue;
                }

                let slot = chan.slot_ptr(head);
                let meta = unsafe { std::ptr::read(std::ptr::addr_of!((*slot).meta)) };
                let len = meta.payload_len as usize;
                if len > MSG_INLINE {
                    self.region.metrics_ref().record_corrupt();
                    insights::record_corrupt(self.channel_id);
                    return Err(DmxpError::corrupt(
                        self.channel_id,
                        format!("payload_len {len} exceeds slot capacity"),
                    ));
                }

                let mut payload = [0u8; MSG_INLINE];
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        std::ptr::addr_of!((*slot).payload) as *const u8,
                        payload.as_mut_ptr(),
                        len,
                    );
                }

                // Recycle: empty marker for the next cycle at this index.
                sequence.store(recycled_marker(head, capacity), Ordering::Release);

                self.region.metrics_ref().record_receive(len as u64);
                insights::record_receive(self.channel_id, len as u64);
                return Ok(Message { meta, payload });
            }

            if s > published_marker(head) {
                // Usually a stale head snapshot (another consumer already
                // recycled this slot). If head has not moved, the word is
                // outside the protocol set.
                if chan.head().load(Ordering::Acquire) == head {
                    self.region.metrics_ref().record_corrupt();
                    insights::record_corrupt(self.channel_id);
                    return Err(DmxpError::corrupt(
                        self.channel_id,
                        format!("slot sequence {s} at head position {head}"),
                    ));
                }
                continue;
            }

            // s <= head: nothing published at head. Either the ring is
            // empty or a producer is mid-publish.
            match wait {
                Wait::NonBlocking => return Err(DmxpError::Empty),
                Wait::Deadline(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(DmxpError::Timeout);
                    }
                    self.wait_strategy.idle(&mut spins);
                }
                Wait::Forever => self.wait_strategy.idle(&mut spins),
            }
        }
    }
}
