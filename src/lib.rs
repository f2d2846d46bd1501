//! dmxp - multi-producer/multi-consumer message bus over shared memory.
//!
//! Attaches to a memory-mapped region built by an external allocator and
//! exchanges small messages between processes through per-channel
//! lock-free rings. The fast path is a bounded run of atomic operations
//! plus a payload copy; no syscalls, no locks, no runtime.
//!
//! - [`Region`] - attach/validate the region, enumerate channels
//! - [`Producer`] - claim a tail position, write, publish
//! - [`Consumer`] - claim a head position, read, recycle
//!
//! ```rust,no_run
//! use dmxp::Region;
//!
//! let region = Region::attach_default()?;
//! let mut producer = region.producer(0)?;
//! let consumer = region.consumer(0)?;
//!
//! producer.send(b"Hello")?;
//! let message = consumer.try_recv()?;
//! assert_eq!(message.payload(), b"Hello");
//! # Ok::<(), dmxp::DmxpError>(())
//! ```

pub mod constants;
pub mod error;
pub mod insights;
pub mod layout;
pub mod metrics;
pub mod mpmc;
pub mod region;

pub use error::{DmxpError, Result, CODE_SUCCESS};
pub use layout::MessageMeta;
pub use metrics::MetricsSnapshot;
pub use mpmc::{Consumer, Message, Producer, WaitStrategy};
pub use region::{ChannelInfo, Region};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
