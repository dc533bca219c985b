//! Command execution: one dispatch match from [`Command`] to the handlers.

use std::sync::Arc;

use crate::protocol::Frame;
use crate::store::StreamRegistry;

use super::parser::Command;
use super::streams;

/// Executes parsed commands against the shared stream registry.
pub struct CommandExecutor {
    registry: Arc<StreamRegistry>,
}

impl CommandExecutor {
    /// Create an executor over the given registry
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this executor operates on
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Execute a command, producing the reply frame.
    ///
    /// Never panics on client input; every failure surfaces as an error
    /// frame.
    pub fn execute(&self, command: Command) -> Frame {
        match command {
            Command::XAdd { key, id, fields } => {
                streams::xadd(&self.registry, &key, &id, fields)
            }
            Command::XRead {
                count,
                block,
                streams: targets,
            } => {
                // BLOCK is accepted for wire compatibility; reads return
                // immediately (see DESIGN.md).
                let _ = block;
                streams::xread(&self.registry, &targets, count)
            }
            Command::XRange {
                key,
                start,
                end,
                count,
            } => streams::xrange(&self.registry, &key, &start, &end, count),
            Command::XLen { key } => streams::xlen(&self.registry, &key),
            Command::XDel { key, ids } => streams::xdel(&self.registry, &key, &ids),
            Command::XGroupCreate { key, group, id } => {
                streams::xgroup_create(&self.registry, &key, &group, &id)
            }
            Command::XGroupSetId { key, group, id } => {
                streams::xgroup_setid(&self.registry, &key, &group, &id)
            }
            Command::XGroupDelConsumer {
                key,
                group,
                consumer,
            } => streams::xgroup_delconsumer(&self.registry, &key, &group, &consumer),
            Command::XReadGroup {
                group,
                consumer,
                count,
                block,
                streams: targets,
            } => {
                let _ = block;
                streams::xreadgroup(&self.registry, &group, &consumer, &targets, count)
            }
            Command::XAck { key, group, ids } => {
                streams::xack(&self.registry, &key, &group, &ids)
            }
            Command::XPending {
                key,
                group,
                consumer,
            } => streams::xpending(&self.registry, &key, &group, consumer.as_ref()),
            Command::Ping => Frame::simple("PONG"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> CommandExecutor {
        CommandExecutor::new(Arc::new(StreamRegistry::new()))
    }

    fn run(executor: &CommandExecutor, parts: &[&str]) -> Frame {
        let frame = Frame::array(parts.iter().map(|p| Frame::bulk(p.to_string())).collect());
        match Command::from_frame(frame) {
            Ok(command) => executor.execute(command),
            Err(e) => Frame::error(e.to_resp_error()),
        }
    }

    fn bulk_text(frame: &Frame) -> &str {
        frame.as_str().expect("expected a textual frame")
    }

    #[test]
    fn test_ping() {
        let ex = executor();
        assert_eq!(run(&ex, &["PING"]), Frame::simple("PONG"));
    }

    #[test]
    fn test_auto_sequence_progression() {
        // XADD s 1000-0, then 1000-*, then 1001-*, then XLEN
        let ex = executor();
        assert_eq!(
            bulk_text(&run(&ex, &["XADD", "s", "1000-0", "a", "1"])),
            "1000-0"
        );
        assert_eq!(
            bulk_text(&run(&ex, &["XADD", "s", "1000-*", "b", "2"])),
            "1000-1"
        );
        assert_eq!(
            bulk_text(&run(&ex, &["XADD", "s", "1001-*", "c", "3"])),
            "1001-0"
        );
        assert_eq!(run(&ex, &["XLEN", "s"]), Frame::integer(3));
    }

    #[test]
    fn test_xadd_rejects_downgrade() {
        let ex = executor();
        run(&ex, &["XADD", "s", "10-0", "a", "1"]);

        let reply = run(&ex, &["XADD", "s", "9-*", "b", "2"]);
        assert!(reply.is_error());
        let reply = run(&ex, &["XADD", "s", "10-0", "b", "2"]);
        assert!(reply.is_error());
        assert_eq!(run(&ex, &["XLEN", "s"]), Frame::integer(1));
    }

    #[test]
    fn test_xadd_malformed_id_leaves_stream_unchanged() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);

        let reply = run(&ex, &["XADD", "s", "not-an-id", "f", "v"]);
        assert!(reply.is_error());
        assert_eq!(run(&ex, &["XLEN", "s"]), Frame::integer(1));
    }

    #[test]
    fn test_xrange_full_and_bounded() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1000-0", "a", "1"]);
        run(&ex, &["XADD", "s", "1000-*", "b", "2"]);
        run(&ex, &["XADD", "s", "1001-*", "c", "3"]);

        let reply = run(&ex, &["XRANGE", "s", "-", "+"]);
        let items = reply.as_array().unwrap();
        assert_eq!(items.len(), 3);
        let first = items[0].as_array().unwrap();
        assert_eq!(bulk_text(&first[0]), "1000-0");
        let last = items[2].as_array().unwrap();
        assert_eq!(bulk_text(&last[0]), "1001-0");

        let reply = run(&ex, &["XRANGE", "s", "1000-1", "1001-0", "COUNT", "1"]);
        let items = reply.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(bulk_text(&items[0].as_array().unwrap()[0]), "1000-1");
    }

    #[test]
    fn test_xrange_missing_stream_is_null_array() {
        let ex = executor();
        assert_eq!(run(&ex, &["XRANGE", "ghost", "-", "+"]), Frame::null_array());
    }

    #[test]
    fn test_xread_after_cursor() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);
        run(&ex, &["XADD", "s", "2-0", "b", "2"]);

        let reply = run(&ex, &["XREAD", "STREAMS", "s", "1-0"]);
        let per_stream = reply.as_array().unwrap();
        assert_eq!(per_stream.len(), 1);
        let item = per_stream[0].as_array().unwrap();
        assert_eq!(bulk_text(&item[0]), "s");
        let entries = item[1].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(bulk_text(&entries[0].as_array().unwrap()[0]), "2-0");

        // Nothing after the tail, and missing streams are skipped
        assert_eq!(
            run(&ex, &["XREAD", "STREAMS", "s", "2-0"]),
            Frame::null_array()
        );
        assert_eq!(
            run(&ex, &["XREAD", "STREAMS", "ghost", "0"]),
            Frame::null_array()
        );
        assert_eq!(
            run(&ex, &["XREAD", "STREAMS", "s", "$"]),
            Frame::null_array()
        );
    }

    #[test]
    fn test_group_fanout_and_ack() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1000-0", "a", "1"]);
        run(&ex, &["XADD", "s", "1000-1", "b", "2"]);
        run(&ex, &["XADD", "s", "1001-0", "c", "3"]);

        assert_eq!(
            run(&ex, &["XGROUP", "CREATE", "s", "g", "0-0"]),
            Frame::simple("OK")
        );

        // c1 takes the first two
        let reply = run(
            &ex,
            &["XREADGROUP", "GROUP", "g", "c1", "COUNT", "2", "STREAMS", "s", ">"],
        );
        let entries = reply.as_array().unwrap()[0].as_array().unwrap()[1]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(entries.len(), 2);

        // c2 sees only the third
        let reply = run(
            &ex,
            &["XREADGROUP", "GROUP", "g", "c2", "COUNT", "2", "STREAMS", "s", ">"],
        );
        let entries = reply.as_array().unwrap()[0].as_array().unwrap()[1]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(bulk_text(&entries[0].as_array().unwrap()[0]), "1001-0");

        // Acks count once, against the owner
        assert_eq!(
            run(&ex, &["XACK", "s", "g", "1000-0", "1000-1"]),
            Frame::integer(2)
        );
        assert_eq!(run(&ex, &["XACK", "s", "g", "1000-0"]), Frame::integer(0));
    }

    #[test]
    fn test_busygroup() {
        let ex = executor();
        run(&ex, &["XGROUP", "CREATE", "s", "g", "0-0"]);
        let reply = run(&ex, &["XGROUP", "CREATE", "s", "g", "0-0"]);
        match reply {
            Frame::Error(msg) => assert!(msg.starts_with(b"BUSYGROUP" as &[u8])),
            other => panic!("expected BUSYGROUP error, got {other:?}"),
        }
    }

    #[test]
    fn test_xreadgroup_missing_group_is_empty() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);
        assert_eq!(
            run(&ex, &["XREADGROUP", "GROUP", "ghost", "c", "STREAMS", "s", ">"]),
            Frame::null_array()
        );
        assert_eq!(run(&ex, &["XACK", "s", "ghost", "1-0"]), Frame::integer(0));
        assert_eq!(run(&ex, &["XACK", "ghost", "g", "1-0"]), Frame::integer(0));
    }

    #[test]
    fn test_xdel_returns_actual_count() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);
        run(&ex, &["XADD", "s", "2-0", "b", "2"]);

        assert_eq!(
            run(&ex, &["XDEL", "s", "1-0", "9-9", "bogus"]),
            Frame::integer(1)
        );
        assert_eq!(run(&ex, &["XLEN", "s"]), Frame::integer(1));
        assert_eq!(run(&ex, &["XDEL", "ghost", "1-0"]), Frame::integer(0));
    }

    #[test]
    fn test_delete_preserves_last_id_via_commands() {
        let ex = executor();
        let first = bulk_text(&run(&ex, &["XADD", "s", "*", "a", "1"])).to_string();
        assert_eq!(run(&ex, &["XDEL", "s", &first]), Frame::integer(1));
        let second = bulk_text(&run(&ex, &["XADD", "s", "*", "b", "2"])).to_string();

        let parse = |s: &str| {
            let (ms, seq) = s.split_once('-').unwrap();
            (ms.parse::<u64>().unwrap(), seq.parse::<u64>().unwrap())
        };
        assert!(parse(&second) > parse(&first));
    }

    #[test]
    fn test_xgroup_create_dollar_starts_at_tail() {
        let ex = executor();
        run(&ex, &["XADD", "s", "5-0", "a", "1"]);
        run(&ex, &["XGROUP", "CREATE", "s", "g", "$"]);

        // Entry at the tail is before the cursor, nothing to deliver
        assert_eq!(
            run(&ex, &["XREADGROUP", "GROUP", "g", "c", "STREAMS", "s", ">"]),
            Frame::null_array()
        );

        run(&ex, &["XADD", "s", "6-0", "b", "2"]);
        let reply = run(&ex, &["XREADGROUP", "GROUP", "g", "c", "STREAMS", "s", ">"]);
        assert!(!reply.is_null());
    }

    #[test]
    fn test_xgroup_setid_guard() {
        let ex = executor();
        run(&ex, &["XADD", "s", "5-0", "a", "1"]);
        run(&ex, &["XGROUP", "CREATE", "s", "g", "$"]);

        let reply = run(&ex, &["XGROUP", "SETID", "s", "g", "1-0"]);
        assert!(reply.is_error());
        assert_eq!(
            run(&ex, &["XGROUP", "SETID", "s", "g", "7-0"]),
            Frame::simple("OK")
        );
        let reply = run(&ex, &["XGROUP", "SETID", "s", "ghost", "7-0"]);
        match reply {
            Frame::Error(msg) => assert!(msg.starts_with(b"NOGROUP" as &[u8])),
            other => panic!("expected NOGROUP error, got {other:?}"),
        }
    }

    #[test]
    fn test_xpending_rows() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);
        run(&ex, &["XADD", "s", "2-0", "b", "2"]);
        run(&ex, &["XGROUP", "CREATE", "s", "g", "0-0"]);
        run(&ex, &["XREADGROUP", "GROUP", "g", "c1", "STREAMS", "s", ">"]);

        let reply = run(&ex, &["XPENDING", "s", "g"]);
        let rows = reply.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        let row = rows[0].as_array().unwrap();
        assert_eq!(bulk_text(&row[0]), "1-0");
        assert_eq!(bulk_text(&row[1]), "c1");
        assert_eq!(row[3], Frame::integer(1));

        // Filtered to a consumer with nothing pending
        let reply = run(&ex, &["XPENDING", "s", "g", "c2"]);
        assert_eq!(reply.as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_xgroup_delconsumer_purges() {
        let ex = executor();
        run(&ex, &["XADD", "s", "1-0", "a", "1"]);
        run(&ex, &["XGROUP", "CREATE", "s", "g", "0-0"]);
        run(&ex, &["XREADGROUP", "GROUP", "g", "c1", "STREAMS", "s", ">"]);

        assert_eq!(
            run(&ex, &["XGROUP", "DELCONSUMER", "s", "g", "c1"]),
            Frame::integer(1)
        );
        let reply = run(&ex, &["XPENDING", "s", "g"]);
        assert_eq!(reply.as_array().unwrap().len(), 0);
        // Unknown consumer purges nothing
        assert_eq!(
            run(&ex, &["XGROUP", "DELCONSUMER", "s", "g", "c9"]),
            Frame::integer(0)
        );
    }

    #[test]
    fn test_unknown_command_reply() {
        let ex = executor();
        let reply = run(&ex, &["NOPE", "arg"]);
        match reply {
            Frame::Error(msg) => {
                assert_eq!(&msg[..], b"ERR unknown command 'NOPE'" as &[u8]);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
