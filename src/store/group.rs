//! Consumer groups: delivery cursor, pending entries list, consumers.
//!
//! A group partitions a stream among competing consumers. Each delivered
//! entry is tracked in the group's PEL until its owning consumer
//! acknowledges it. Lock order within a group is consumers → PEL →
//! consumer pending; `last_delivered` shares the PEL lock so a delivery
//! records its pending entry and advances the cursor atomically.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{BrookError, Result};

use super::entry::{now_ms, Entry, EntryId};

/// A PEL record: who holds the entry, since when, and how many times it
/// has been handed out. The record carries no payload; callers join with
/// the owning stream when they need fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    /// Consumer that currently owns this pending entry
    pub owner: Bytes,
    /// Delivery time, milliseconds since the Unix epoch
    pub delivered_ms: u64,
    /// Number of times this entry was delivered
    pub delivery_count: u64,
}

#[derive(Debug)]
struct ConsumerState {
    seen_ms: u64,
    pending: HashSet<EntryId>,
}

/// A named reader within a consumer group.
pub struct Consumer {
    name: Bytes,
    state: Mutex<ConsumerState>,
}

impl Consumer {
    fn new(name: Bytes) -> Self {
        Self {
            name,
            state: Mutex::new(ConsumerState {
                seen_ms: now_ms(),
                pending: HashSet::new(),
            }),
        }
    }

    /// Consumer name
    pub fn name(&self) -> &Bytes {
        &self.name
    }

    /// Wall clock of the most recent interaction
    pub fn seen_ms(&self) -> u64 {
        self.state.lock().seen_ms
    }

    /// Number of entries delivered to this consumer and not yet acknowledged
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether the given ID is pending for this consumer
    pub fn has_pending(&self, id: EntryId) -> bool {
        self.state.lock().pending.contains(&id)
    }

    fn touch(&self) {
        self.state.lock().seen_ms = now_ms();
    }

    fn add_pending(&self, id: EntryId) {
        self.state.lock().pending.insert(id);
    }

    fn remove_pending(&self, id: EntryId) -> bool {
        self.state.lock().pending.remove(&id)
    }
}

/// Delivery cursor and PEL, guarded together: the cursor only advances
/// while the matching pending record is inserted.
#[derive(Debug)]
struct DeliveryState {
    last_delivered: EntryId,
    pel: HashMap<EntryId, PendingRecord>,
}

/// A consumer group over one stream.
pub struct ConsumerGroup {
    name: Bytes,
    consumers: Mutex<HashMap<Bytes, Arc<Consumer>>>,
    delivery: Mutex<DeliveryState>,
}

impl ConsumerGroup {
    /// Create a group whose cursor starts at `start`: entries with IDs
    /// greater than it are available for delivery.
    pub fn new(name: Bytes, start: EntryId) -> Self {
        Self {
            name,
            consumers: Mutex::new(HashMap::new()),
            delivery: Mutex::new(DeliveryState {
                last_delivered: start,
                pel: HashMap::new(),
            }),
        }
    }

    /// Group name
    pub fn name(&self) -> &Bytes {
        &self.name
    }

    /// The highest ID this group has ever handed out
    pub fn last_delivered(&self) -> EntryId {
        self.delivery.lock().last_delivered
    }

    /// Idempotent consumer registration
    pub fn get_or_create_consumer(&self, name: &Bytes) -> Arc<Consumer> {
        self.consumers
            .lock()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Consumer::new(name.clone())))
            .clone()
    }

    /// Look up a consumer without creating it
    pub fn consumer(&self, name: &Bytes) -> Option<Arc<Consumer>> {
        self.consumers.lock().get(name).cloned()
    }

    /// Names of all registered consumers
    pub fn consumer_names(&self) -> Vec<Bytes> {
        self.consumers.lock().keys().cloned().collect()
    }

    /// Deliver unseen entries from `candidates` to `consumer_name`.
    ///
    /// `candidates` is an ordered batch the stream reported as existing
    /// after this group's cursor. Each entry with an ID above
    /// `last_delivered` is handed to the consumer, recorded in the PEL
    /// with delivery count 1, and advances the cursor. The cursor check
    /// runs under the PEL lock, so concurrent deliveries to different
    /// consumers never hand out the same ID twice.
    pub fn deliver(
        &self,
        consumer_name: &Bytes,
        candidates: &[Entry],
        count: Option<usize>,
    ) -> Vec<Entry> {
        let consumer = self.get_or_create_consumer(consumer_name);
        consumer.touch();

        let mut delivered = Vec::new();
        let mut delivery = self.delivery.lock();
        for entry in candidates {
            if let Some(limit) = count {
                if delivered.len() >= limit {
                    break;
                }
            }
            if entry.id > delivery.last_delivered {
                delivery.pel.insert(
                    entry.id,
                    PendingRecord {
                        owner: consumer_name.clone(),
                        delivered_ms: now_ms(),
                        delivery_count: 1,
                    },
                );
                consumer.add_pending(entry.id);
                delivery.last_delivered = entry.id;
                delivered.push(entry.clone());
            }
        }
        delivered
    }

    /// Acknowledge `ids` on behalf of `consumer_name`.
    ///
    /// An ID counts only if its PEL record exists and names the acking
    /// consumer as owner; anything else is skipped. Repeated acks of the
    /// same ID contribute zero.
    pub fn ack(&self, consumer_name: &Bytes, ids: &[EntryId]) -> usize {
        let consumer = self.consumer(consumer_name);
        let mut acked = 0;
        let mut delivery = self.delivery.lock();
        for id in ids {
            let owned = matches!(delivery.pel.get(id), Some(rec) if rec.owner == *consumer_name);
            if !owned {
                continue;
            }
            delivery.pel.remove(id);
            if let Some(consumer) = &consumer {
                consumer.remove_pending(*id);
            }
            acked += 1;
        }
        acked
    }

    /// Acknowledge `ids` against whichever consumer owns each record.
    ///
    /// The wire form of XACK names no consumer, so ownership is resolved
    /// from the PEL itself. Each ID still counts at most once.
    pub fn ack_ids(&self, ids: &[EntryId]) -> usize {
        let mut acked = 0;
        for id in ids {
            let owner = self.delivery.lock().pel.get(id).map(|rec| rec.owner.clone());
            if let Some(owner) = owner {
                acked += self.ack(&owner, std::slice::from_ref(id));
            }
        }
        acked
    }

    /// Administrative cursor override. Moving backwards is rejected: the
    /// cursor is a high-water mark and every ID at or below it may already
    /// have been delivered.
    pub fn set_last_delivered(&self, id: EntryId) -> Result<()> {
        let mut delivery = self.delivery.lock();
        if id < delivery.last_delivered {
            return Err(BrookError::InvalidArgument(
                "SETID cannot move the group cursor backwards".to_string(),
            ));
        }
        delivery.last_delivered = id;
        Ok(())
    }

    /// Enumerate PEL records, optionally filtered to one consumer, sorted
    /// by ID.
    pub fn pending_entries(&self, consumer_name: Option<&Bytes>) -> Vec<(EntryId, PendingRecord)> {
        let delivery = self.delivery.lock();
        let mut records: Vec<(EntryId, PendingRecord)> = delivery
            .pel
            .iter()
            .filter(|(_, rec)| consumer_name.map_or(true, |name| rec.owner == *name))
            .map(|(id, rec)| (*id, rec.clone()))
            .collect();
        records.sort_by_key(|(id, _)| *id);
        records
    }

    /// Total number of pending entries in the group
    pub fn pending_count(&self) -> usize {
        self.delivery.lock().pel.len()
    }

    /// Remove a consumer and purge its pending entries from the PEL.
    /// Returns the number of purged records, or None if the consumer was
    /// not registered.
    pub fn remove_consumer(&self, name: &Bytes) -> Option<usize> {
        let consumer = self.consumers.lock().remove(name)?;
        let mut delivery = self.delivery.lock();
        let mut state = consumer.state.lock();
        let purged = state.pending.len();
        for id in state.pending.drain() {
            delivery.pel.remove(&id);
        }
        Some(purged)
    }
}
