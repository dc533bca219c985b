//! The stream itself: an ordered index of entries plus its consumer groups.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{BrookError, Result};

use super::entry::{AppendId, Entry, EntryId};
use super::group::ConsumerGroup;

/// Entries and the append high-water mark, guarded together so an append
/// is one atomic insert-and-advance.
#[derive(Debug)]
struct EntryIndex {
    entries: BTreeMap<EntryId, Vec<(Bytes, Bytes)>>,
    last_id: EntryId,
}

/// An append-only stream.
///
/// `last_id` never decreases, including across deletions, so freshly
/// generated IDs stay strictly above everything the stream has ever held.
/// Range and cursor queries copy entries out under the index lock, giving
/// callers a consistent snapshot.
pub struct Stream {
    index: RwLock<EntryIndex>,
    groups: RwLock<HashMap<Bytes, Arc<ConsumerGroup>>>,
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream {
    /// Create a new empty stream
    pub fn new() -> Self {
        Self {
            index: RwLock::new(EntryIndex {
                entries: BTreeMap::new(),
                last_id: EntryId::ZERO,
            }),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Append an entry, resolving the requested ID against `last_id`.
    ///
    /// - `Auto`: wall-clock ID, bumped to `last_id.seq + 1` if the clock
    ///   has not moved past `last_id`.
    /// - `AutoSeq(ms)`: next sequence within `ms`; fails if `ms` is behind
    ///   `last_id.ms`.
    /// - `Explicit(id)`: must be strictly greater than `last_id`.
    ///
    /// On failure nothing is mutated.
    pub fn append(&self, id: AppendId, fields: Vec<(Bytes, Bytes)>) -> Result<EntryId> {
        let mut index = self.index.write();

        let actual = match id {
            AppendId::Auto => {
                let generated = EntryId::generate_now();
                if generated <= index.last_id {
                    EntryId::new(index.last_id.ms, index.last_id.seq + 1)
                } else {
                    generated
                }
            }
            AppendId::AutoSeq(ms) => {
                if ms == index.last_id.ms {
                    EntryId::new(ms, index.last_id.seq + 1)
                } else if ms > index.last_id.ms {
                    EntryId::new(ms, 0)
                } else {
                    return Err(BrookError::IdTooSmall);
                }
            }
            AppendId::Explicit(id) => {
                if id <= index.last_id {
                    return Err(BrookError::IdTooSmall);
                }
                id
            }
        };

        index.entries.insert(actual, fields);
        index.last_id = actual;
        Ok(actual)
    }

    /// Entries with `start <= id <= end`, ascending, at most `count`.
    pub fn range(&self, start: EntryId, end: EntryId, count: Option<usize>) -> Vec<Entry> {
        if start > end {
            return Vec::new();
        }
        let index = self.index.read();
        let mut result = Vec::new();
        for (id, fields) in index.entries.range(start..=end) {
            if let Some(limit) = count {
                if result.len() >= limit {
                    break;
                }
            }
            result.push(Entry {
                id: *id,
                fields: fields.clone(),
            });
        }
        result
    }

    /// Entries with `id > cursor`, ascending, at most `count`.
    pub fn after(&self, cursor: EntryId, count: Option<usize>) -> Vec<Entry> {
        let index = self.index.read();
        let mut result = Vec::new();
        for (id, fields) in index
            .entries
            .range((Bound::Excluded(cursor), Bound::Unbounded))
        {
            if let Some(limit) = count {
                if result.len() >= limit {
                    break;
                }
            }
            result.push(Entry {
                id: *id,
                fields: fields.clone(),
            });
        }
        result
    }

    /// Remove the given IDs, returning how many were actually present.
    /// `last_id` is not rolled back.
    pub fn delete(&self, ids: &[EntryId]) -> usize {
        let mut index = self.index.write();
        let mut removed = 0;
        for id in ids {
            if index.entries.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.index.read().entries.len()
    }

    /// Whether the stream currently holds no entries
    pub fn is_empty(&self) -> bool {
        self.index.read().entries.is_empty()
    }

    /// The largest ID ever appended
    pub fn last_id(&self) -> EntryId {
        self.index.read().last_id
    }

    /// Create a consumer group with its cursor at `start`. Returns false
    /// if a group of that name already exists.
    pub fn create_group(&self, name: Bytes, start: EntryId) -> bool {
        let mut groups = self.groups.write();
        if groups.contains_key(&name) {
            return false;
        }
        groups.insert(name.clone(), Arc::new(ConsumerGroup::new(name, start)));
        true
    }

    /// Look up a consumer group
    pub fn group(&self, name: &Bytes) -> Option<Arc<ConsumerGroup>> {
        self.groups.read().get(name).cloned()
    }

    /// Remove a consumer group and everything it tracks
    pub fn remove_group(&self, name: &Bytes) -> bool {
        self.groups.write().remove(name).is_some()
    }

    /// Number of consumer groups on this stream
    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }
}
