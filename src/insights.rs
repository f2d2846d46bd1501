//! Observability shims. Zero-cost when the `tracing` feature is off.
//!
//! ```toml
//! dmxp = { version = "0.1", features = ["tracing"] }
//! ```
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

/// Record a successful attach.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_attach(len: usize) {
    tracing::debug!(len, "region attached");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_attach(_len: usize) {}

/// Record a published message (span visible to subscribers).
#[cfg(feature = "tracing")]
#[inline]
pub fn record_send(channel_id: u32, bytes: u64) {
    let _span = tracing::trace_span!("send", channel_id, bytes).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_send(_channel_id: u32, _bytes: u64) {}

/// Record a consumed message.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_receive(channel_id: u32, bytes: u64) {
    let _span = tracing::trace_span!("recv", channel_id, bytes).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_receive(_channel_id: u32, _bytes: u64) {}

/// Record a rejected send (ring full).
#[cfg(feature = "tracing")]
#[inline]
pub fn record_full(channel_id: u32) {
    tracing::warn!(channel_id, "channel full");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_full(_channel_id: u32) {}

/// Record a fatal sequence-protocol violation.
#[cfg(feature = "tracing")]
#[inline]
pub fn record_corrupt(channel_id: u32) {
    tracing::error!(channel_id, "channel corrupt");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_corrupt(_channel_id: u32) {}
