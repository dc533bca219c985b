//! The stream engine: entries, streams, consumer groups, and the registry.
//!
//! Lock order across the engine is registry → stream entries → stream
//! groups → group consumers → group PEL → consumer pending, with no
//! back-edges. Every engine call completes without waiting on external
//! events.

mod entry;
mod group;
mod registry;
mod stream;

pub use entry::{AppendId, Entry, EntryId};
pub use group::{Consumer, ConsumerGroup, PendingRecord};
pub use registry::StreamRegistry;
pub use stream::Stream;

pub(crate) use entry::now_ms;
