//! Stream command handlers.
//!
//! Each function maps a parsed command onto the engine and shapes the
//! reply frame. Reads against a missing stream are silent: the stream is
//! skipped (multi-stream reads) or the reply is empty/zero, never an
//! error.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::BrookError;
use crate::protocol::Frame;
use crate::store::{now_ms, AppendId, ConsumerGroup, Entry, EntryId, Stream, StreamRegistry};

/// XADD: append one entry, creating the stream on first use.
pub fn xadd(
    registry: &StreamRegistry,
    key: &Bytes,
    id: &str,
    fields: Vec<(Bytes, Bytes)>,
) -> Frame {
    let Some(requested) = AppendId::parse(id) else {
        return Frame::error(BrookError::InvalidStreamId.to_resp_error());
    };

    let stream = registry.get_or_create(key);
    match stream.append(requested, fields) {
        Ok(actual) => Frame::bulk(actual.to_string()),
        Err(e) => Frame::error(e.to_resp_error()),
    }
}

/// XLEN: number of entries, 0 for a missing stream.
pub fn xlen(registry: &StreamRegistry, key: &Bytes) -> Frame {
    match registry.get(key) {
        Some(stream) => Frame::integer(stream.len() as i64),
        None => Frame::integer(0),
    }
}

/// XRANGE: inclusive ID range with optional count.
pub fn xrange(
    registry: &StreamRegistry,
    key: &Bytes,
    start: &str,
    end: &str,
    count: Option<usize>,
) -> Frame {
    let Some(stream) = registry.get(key) else {
        return Frame::null_array();
    };

    let start_id = match start {
        "-" => EntryId::ZERO,
        _ => match EntryId::parse(start) {
            Some(id) => id,
            None => return Frame::error(BrookError::InvalidStreamId.to_resp_error()),
        },
    };
    let end_id = match end {
        "+" => EntryId::MAX,
        _ => match EntryId::parse(end) {
            Some(id) => id,
            None => return Frame::error(BrookError::InvalidStreamId.to_resp_error()),
        },
    };

    entries_frame(&stream.range(start_id, end_id, count))
}

/// XDEL: remove entries by ID; unparseable IDs are skipped.
pub fn xdel(registry: &StreamRegistry, key: &Bytes, ids: &[String]) -> Frame {
    let Some(stream) = registry.get(key) else {
        return Frame::integer(0);
    };
    let parsed: Vec<EntryId> = ids.iter().filter_map(|s| EntryId::parse(s)).collect();
    Frame::integer(stream.delete(&parsed) as i64)
}

/// XREAD: per-stream after-cursor fan-out read. Missing streams and
/// unparseable cursors are skipped; an overall empty result is the null
/// array.
pub fn xread(
    registry: &StreamRegistry,
    streams: &[(Bytes, String)],
    count: Option<usize>,
) -> Frame {
    let mut results = Vec::new();

    for (key, id_text) in streams {
        let Some(stream) = registry.get(key) else {
            continue;
        };
        let Some(cursor) = resolve_cursor(id_text, &stream) else {
            continue;
        };
        let entries = stream.after(cursor, count);
        if entries.is_empty() {
            continue;
        }
        results.push(stream_reply(key, &entries));
    }

    if results.is_empty() {
        Frame::null_array()
    } else {
        Frame::array(results)
    }
}

/// XGROUP CREATE: register a group, creating the stream on first use.
pub fn xgroup_create(registry: &StreamRegistry, key: &Bytes, group: &Bytes, id: &str) -> Frame {
    let stream = registry.get_or_create(key);
    let start = match resolve_cursor(id, &stream) {
        Some(id) => id,
        None => return Frame::error(BrookError::InvalidStreamId.to_resp_error()),
    };

    if stream.create_group(group.clone(), start) {
        Frame::simple("OK")
    } else {
        Frame::error(BrookError::GroupExists.to_resp_error())
    }
}

/// XGROUP SETID: move the group cursor forward.
pub fn xgroup_setid(registry: &StreamRegistry, key: &Bytes, group: &Bytes, id: &str) -> Frame {
    let Some((stream, group)) = lookup_group(registry, key, group) else {
        return Frame::error(BrookError::NoSuchGroup.to_resp_error());
    };
    let target = match resolve_cursor(id, &stream) {
        Some(id) => id,
        None => return Frame::error(BrookError::InvalidStreamId.to_resp_error()),
    };

    match group.set_last_delivered(target) {
        Ok(()) => Frame::simple("OK"),
        Err(e) => Frame::error(e.to_resp_error()),
    }
}

/// XGROUP DELCONSUMER: drop a consumer, purging its pending entries.
pub fn xgroup_delconsumer(
    registry: &StreamRegistry,
    key: &Bytes,
    group: &Bytes,
    consumer: &Bytes,
) -> Frame {
    let Some((_, group)) = lookup_group(registry, key, group) else {
        return Frame::error(BrookError::NoSuchGroup.to_resp_error());
    };
    Frame::integer(group.remove_consumer(consumer).unwrap_or(0) as i64)
}

/// XREADGROUP: deliver new entries to a consumer. Missing streams or
/// groups are skipped from the reply.
pub fn xreadgroup(
    registry: &StreamRegistry,
    group_name: &Bytes,
    consumer: &Bytes,
    streams: &[(Bytes, String)],
    count: Option<usize>,
) -> Frame {
    let mut results = Vec::new();

    for (key, _id) in streams {
        let Some((stream, group)) = lookup_group(registry, key, group_name) else {
            continue;
        };
        // Candidates are copied out of the entries lock first; the group
        // re-checks each ID against its cursor under the PEL lock.
        let candidates = stream.after(group.last_delivered(), None);
        let delivered = group.deliver(consumer, &candidates, count);
        if delivered.is_empty() {
            continue;
        }
        results.push(stream_reply(key, &delivered));
    }

    if results.is_empty() {
        Frame::null_array()
    } else {
        Frame::array(results)
    }
}

/// XACK: acknowledge delivered entries against their recorded owners.
/// Missing stream or group replies `:0`; unparseable IDs are skipped.
pub fn xack(registry: &StreamRegistry, key: &Bytes, group: &Bytes, ids: &[String]) -> Frame {
    let Some((_, group)) = lookup_group(registry, key, group) else {
        return Frame::integer(0);
    };
    let parsed: Vec<EntryId> = ids.iter().filter_map(|s| EntryId::parse(s)).collect();
    Frame::integer(group.ack_ids(&parsed) as i64)
}

/// XPENDING: rows of `[id, owner, idle-ms, delivery-count]`, optionally
/// filtered to one consumer.
pub fn xpending(
    registry: &StreamRegistry,
    key: &Bytes,
    group: &Bytes,
    consumer: Option<&Bytes>,
) -> Frame {
    let Some((_, group)) = lookup_group(registry, key, group) else {
        return Frame::error(BrookError::NoSuchGroup.to_resp_error());
    };

    let now = now_ms();
    let rows = group
        .pending_entries(consumer)
        .into_iter()
        .map(|(id, rec)| {
            Frame::array(vec![
                Frame::bulk(id.to_string()),
                Frame::bulk(rec.owner),
                Frame::integer(now.saturating_sub(rec.delivered_ms) as i64),
                Frame::integer(rec.delivery_count as i64),
            ])
        })
        .collect();
    Frame::array(rows)
}

/// Resolve a cursor-position argument: `$` is the stream's current tail,
/// `0` is shorthand for `0-0`, anything else must be a literal ID.
fn resolve_cursor(text: &str, stream: &Stream) -> Option<EntryId> {
    match text {
        "$" => Some(stream.last_id()),
        "0" => Some(EntryId::ZERO),
        _ => EntryId::parse(text),
    }
}

fn lookup_group(
    registry: &StreamRegistry,
    key: &Bytes,
    group: &Bytes,
) -> Option<(Arc<Stream>, Arc<ConsumerGroup>)> {
    let stream = registry.get(key)?;
    let group = stream.group(group)?;
    Some((stream, group))
}

/// One entry as `[id, [field, value, ...]]`.
fn entry_frame(entry: &Entry) -> Frame {
    let mut flat = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in &entry.fields {
        flat.push(Frame::bulk(field.clone()));
        flat.push(Frame::bulk(value.clone()));
    }
    Frame::array(vec![Frame::bulk(entry.id.to_string()), Frame::array(flat)])
}

/// A batch of entries; the empty batch is the null array.
fn entries_frame(entries: &[Entry]) -> Frame {
    if entries.is_empty() {
        return Frame::null_array();
    }
    Frame::array(entries.iter().map(entry_frame).collect())
}

/// One stream's slice of an XREAD/XREADGROUP reply: `[name, entries]`.
fn stream_reply(key: &Bytes, entries: &[Entry]) -> Frame {
    Frame::array(vec![
        Frame::bulk(key.clone()),
        Frame::array(entries.iter().map(entry_frame).collect()),
    ])
}
