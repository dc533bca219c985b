//! Stream entry identifiers and entries.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Stream entry ID: a wall-clock millisecond timestamp plus a sequence
/// number that disambiguates entries within the same millisecond.
///
/// Ordering is lexicographic on `(ms, seq)`, which is also insertion order
/// within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    /// Milliseconds timestamp
    pub ms: u64,
    /// Sequence number within the millisecond
    pub seq: u64,
}

impl EntryId {
    /// The minimum ID, also the `-` range sentinel
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    /// The maximum ID, also the `+` range sentinel
    pub const MAX: EntryId = EntryId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    /// Create a new entry ID
    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Parse an ID in the strict `<ms>-<seq>` form.
    ///
    /// Range sentinels and auto-generation tokens are not accepted here;
    /// the command layer resolves those before calling into the engine.
    pub fn parse(s: &str) -> Option<Self> {
        let (ms, seq) = s.split_once('-')?;
        Some(Self {
            ms: ms.parse().ok()?,
            seq: seq.parse().ok()?,
        })
    }

    /// ID for an entry appended right now: current wall clock, sequence 0
    pub fn generate_now() -> Self {
        Self::new(now_ms(), 0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Requested ID for an append, with generation intent kept separate from
/// ID data so that `0-0` is expressible as a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendId {
    /// `*`: generate both timestamp and sequence
    Auto,
    /// `<ms>-*`: caller fixes the timestamp, sequence is generated
    AutoSeq(u64),
    /// `<ms>-<seq>`: fully explicit
    Explicit(EntryId),
}

impl AppendId {
    /// Parse an XADD ID argument.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "*" {
            return Some(AppendId::Auto);
        }
        let (ms, seq) = s.split_once('-')?;
        let ms = ms.parse().ok()?;
        if seq == "*" {
            Some(AppendId::AutoSeq(ms))
        } else {
            Some(AppendId::Explicit(EntryId::new(ms, seq.parse().ok()?)))
        }
    }
}

/// A stream entry: an ID plus its field-value pairs in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The entry ID
    pub id: EntryId,
    /// Field-value pairs, in the order the client supplied them
    pub fields: Vec<(Bytes, Bytes)>,
}
