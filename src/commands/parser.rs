//! Command parsing: RESP frames to typed [`Command`] values.
//!
//! The [`Command`] enum carries one variant per supported command;
//! `Command::from_frame` converts an incoming request frame (always an
//! array of bulk strings, possibly synthesized from an inline line) into a
//! `Command`, validating arity and argument shape. ID arguments stay as
//! text here: sentinels like `$` need stream context and are resolved in
//! the handlers.
//!
//! Adding a command means a new variant, a `parse_*` function with a match
//! arm in `from_frame`, and an execution arm in [`super::executor`].

use bytes::Bytes;

use crate::error::{BrookError, Result};
use crate::protocol::Frame;

/// Parsed client command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// XADD key id field value [field value ...]
    XAdd {
        key: Bytes,
        id: String,
        fields: Vec<(Bytes, Bytes)>,
    },
    /// XREAD [COUNT n] [BLOCK ms] STREAMS key [key ...] id [id ...]
    XRead {
        count: Option<usize>,
        block: Option<u64>,
        streams: Vec<(Bytes, String)>,
    },
    /// XRANGE key start end [COUNT n]
    XRange {
        key: Bytes,
        start: String,
        end: String,
        count: Option<usize>,
    },
    /// XLEN key
    XLen { key: Bytes },
    /// XDEL key id [id ...]
    XDel { key: Bytes, ids: Vec<String> },
    /// XGROUP CREATE key group id
    XGroupCreate { key: Bytes, group: Bytes, id: String },
    /// XGROUP SETID key group id
    XGroupSetId { key: Bytes, group: Bytes, id: String },
    /// XGROUP DELCONSUMER key group consumer
    XGroupDelConsumer {
        key: Bytes,
        group: Bytes,
        consumer: Bytes,
    },
    /// XREADGROUP GROUP group consumer [COUNT n] [BLOCK ms] STREAMS key [key ...] id [id ...]
    XReadGroup {
        group: Bytes,
        consumer: Bytes,
        count: Option<usize>,
        block: Option<u64>,
        streams: Vec<(Bytes, String)>,
    },
    /// XACK key group id [id ...]
    XAck {
        key: Bytes,
        group: Bytes,
        ids: Vec<String>,
    },
    /// XPENDING key group [consumer]
    XPending {
        key: Bytes,
        group: Bytes,
        consumer: Option<Bytes>,
    },
    /// PING
    Ping,
}

impl Command {
    /// Parse a request frame into a command.
    ///
    /// The command token is matched case-insensitively. Any shape problem
    /// comes back as an error the dispatcher turns into an `-ERR` reply.
    pub fn from_frame(frame: Frame) -> Result<Command> {
        let frames = frame
            .into_array()
            .ok_or_else(|| BrookError::Protocol("expected array frame".to_string()))?;

        let Some((name_frame, args)) = frames.split_first() else {
            return Err(BrookError::Protocol("empty command".to_string()));
        };
        let name = get_string(name_frame)?;

        match name.to_ascii_uppercase().as_str() {
            "XADD" => parse_xadd(args),
            "XREAD" => parse_xread(args),
            "XRANGE" => parse_xrange(args),
            "XLEN" => parse_xlen(args),
            "XDEL" => parse_xdel(args),
            "XGROUP" => parse_xgroup(args),
            "XREADGROUP" => parse_xreadgroup(args),
            "XACK" => parse_xack(args),
            "XPENDING" => parse_xpending(args),
            // PING takes any arity
            "PING" => Ok(Command::Ping),
            _ => Err(BrookError::UnknownCommand(name)),
        }
    }
}

/// Extract bytes from a request element; integer and simple-string
/// elements are coerced to their textual form.
fn get_bytes(frame: &Frame) -> Result<Bytes> {
    match frame {
        Frame::Bulk(Some(b)) | Frame::Simple(b) => Ok(b.clone()),
        Frame::Integer(n) => Ok(Bytes::from(n.to_string())),
        _ => Err(BrookError::Protocol("expected string argument".to_string())),
    }
}

/// Extract a UTF-8 string from a request element
fn get_string(frame: &Frame) -> Result<String> {
    let bytes = get_bytes(frame)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| BrookError::Protocol("invalid UTF-8".to_string()))
}

/// Extract an integer from a request element
fn get_int(frame: &Frame) -> Result<i64> {
    match frame {
        Frame::Integer(n) => Ok(*n),
        _ => get_string(frame)?
            .parse()
            .map_err(|_| BrookError::NotInteger),
    }
}

/// COUNT argument: negative means unlimited
fn get_count(frame: &Frame) -> Result<Option<usize>> {
    let n = get_int(frame)?;
    if n < 0 {
        Ok(None)
    } else {
        Ok(Some(n as usize))
    }
}

/// BLOCK argument: milliseconds, non-negative
fn get_block(frame: &Frame) -> Result<u64> {
    let n = get_int(frame)?;
    u64::try_from(n).map_err(|_| BrookError::NotInteger)
}

fn parse_xadd(args: &[Frame]) -> Result<Command> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(BrookError::WrongArity("xadd".to_string()));
    }

    let key = get_bytes(&args[0])?;
    let id = get_string(&args[1])?;

    let mut fields = Vec::with_capacity((args.len() - 2) / 2);
    for pair in args[2..].chunks_exact(2) {
        fields.push((get_bytes(&pair[0])?, get_bytes(&pair[1])?));
    }

    Ok(Command::XAdd { key, id, fields })
}

fn parse_xrange(args: &[Frame]) -> Result<Command> {
    if args.len() < 3 || args.len() > 5 {
        return Err(BrookError::WrongArity("xrange".to_string()));
    }

    let key = get_bytes(&args[0])?;
    let start = get_string(&args[1])?;
    let end = get_string(&args[2])?;

    let count = match args.len() {
        3 => None,
        5 if get_string(&args[3])?.eq_ignore_ascii_case("COUNT") => get_count(&args[4])?,
        _ => return Err(BrookError::Syntax),
    };

    Ok(Command::XRange {
        key,
        start,
        end,
        count,
    })
}

fn parse_xlen(args: &[Frame]) -> Result<Command> {
    if args.len() != 1 {
        return Err(BrookError::WrongArity("xlen".to_string()));
    }
    Ok(Command::XLen {
        key: get_bytes(&args[0])?,
    })
}

fn parse_xdel(args: &[Frame]) -> Result<Command> {
    if args.len() < 2 {
        return Err(BrookError::WrongArity("xdel".to_string()));
    }
    let key = get_bytes(&args[0])?;
    let ids = args[1..].iter().map(get_string).collect::<Result<_>>()?;
    Ok(Command::XDel { key, ids })
}

/// Shared tail of XREAD/XREADGROUP: `STREAMS k1 .. km id1 .. idm`
fn parse_streams_list(args: &[Frame], command: &str) -> Result<Vec<(Bytes, String)>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(BrookError::Protocol(format!(
            "Unbalanced {command} list of streams: for each stream key an ID or '$' must be specified"
        )));
    }

    let half = args.len() / 2;
    let mut streams = Vec::with_capacity(half);
    for i in 0..half {
        let key = get_bytes(&args[i])?;
        let id = get_string(&args[half + i])?;
        streams.push((key, id));
    }
    Ok(streams)
}

fn parse_xread(args: &[Frame]) -> Result<Command> {
    let mut idx = 0;
    let mut count = None;
    let mut block = None;
    let mut streams_at = None;

    while idx < args.len() {
        let opt = get_string(&args[idx])?;
        match opt.to_ascii_uppercase().as_str() {
            "COUNT" => {
                idx += 1;
                let frame = args.get(idx).ok_or(BrookError::Syntax)?;
                count = get_count(frame)?;
                idx += 1;
            }
            "BLOCK" => {
                idx += 1;
                let frame = args.get(idx).ok_or(BrookError::Syntax)?;
                block = Some(get_block(frame)?);
                idx += 1;
            }
            "STREAMS" => {
                streams_at = Some(idx + 1);
                break;
            }
            _ => {
                return Err(BrookError::Protocol(format!(
                    "Unrecognized XREAD option '{opt}'"
                )))
            }
        }
    }

    let Some(streams_at) = streams_at else {
        return Err(BrookError::WrongArity("xread".to_string()));
    };

    let streams = parse_streams_list(&args[streams_at..], "XREAD")?;
    Ok(Command::XRead {
        count,
        block,
        streams,
    })
}

fn parse_xreadgroup(args: &[Frame]) -> Result<Command> {
    if args.len() < 5 {
        return Err(BrookError::WrongArity("xreadgroup".to_string()));
    }

    if !get_string(&args[0])?.eq_ignore_ascii_case("GROUP") {
        return Err(BrookError::Syntax);
    }
    let group = get_bytes(&args[1])?;
    let consumer = get_bytes(&args[2])?;

    let mut idx = 3;
    let mut count = None;
    let mut block = None;
    let mut streams_at = None;

    while idx < args.len() {
        let opt = get_string(&args[idx])?;
        match opt.to_ascii_uppercase().as_str() {
            "COUNT" => {
                idx += 1;
                let frame = args.get(idx).ok_or(BrookError::Syntax)?;
                count = get_count(frame)?;
                idx += 1;
            }
            "BLOCK" => {
                idx += 1;
                let frame = args.get(idx).ok_or(BrookError::Syntax)?;
                block = Some(get_block(frame)?);
                idx += 1;
            }
            "STREAMS" => {
                streams_at = Some(idx + 1);
                break;
            }
            _ => {
                return Err(BrookError::Protocol(format!(
                    "Unrecognized XREADGROUP option '{opt}'"
                )))
            }
        }
    }

    let Some(streams_at) = streams_at else {
        return Err(BrookError::WrongArity("xreadgroup".to_string()));
    };

    let streams = parse_streams_list(&args[streams_at..], "XREADGROUP")?;
    Ok(Command::XReadGroup {
        group,
        consumer,
        count,
        block,
        streams,
    })
}

fn parse_xgroup(args: &[Frame]) -> Result<Command> {
    let Some(sub_frame) = args.first() else {
        return Err(BrookError::WrongArity("xgroup".to_string()));
    };
    let sub = get_string(sub_frame)?;

    match sub.to_ascii_uppercase().as_str() {
        "CREATE" => {
            if args.len() != 4 {
                return Err(BrookError::WrongArity("xgroup".to_string()));
            }
            Ok(Command::XGroupCreate {
                key: get_bytes(&args[1])?,
                group: get_bytes(&args[2])?,
                id: get_string(&args[3])?,
            })
        }
        "SETID" => {
            if args.len() != 4 {
                return Err(BrookError::WrongArity("xgroup".to_string()));
            }
            Ok(Command::XGroupSetId {
                key: get_bytes(&args[1])?,
                group: get_bytes(&args[2])?,
                id: get_string(&args[3])?,
            })
        }
        "DELCONSUMER" => {
            if args.len() != 4 {
                return Err(BrookError::WrongArity("xgroup".to_string()));
            }
            Ok(Command::XGroupDelConsumer {
                key: get_bytes(&args[1])?,
                group: get_bytes(&args[2])?,
                consumer: get_bytes(&args[3])?,
            })
        }
        _ => Err(BrookError::UnknownCommand(format!("XGROUP {sub}"))),
    }
}

fn parse_xack(args: &[Frame]) -> Result<Command> {
    if args.len() < 3 {
        return Err(BrookError::WrongArity("xack".to_string()));
    }
    let key = get_bytes(&args[0])?;
    let group = get_bytes(&args[1])?;
    let ids = args[2..].iter().map(get_string).collect::<Result<_>>()?;
    Ok(Command::XAck { key, group, ids })
}

fn parse_xpending(args: &[Frame]) -> Result<Command> {
    if args.len() < 2 || args.len() > 3 {
        return Err(BrookError::WrongArity("xpending".to_string()));
    }
    Ok(Command::XPending {
        key: get_bytes(&args[0])?,
        group: get_bytes(&args[1])?,
        consumer: args.get(2).map(get_bytes).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parts: &[&str]) -> Frame {
        Frame::array(parts.iter().map(|p| Frame::bulk(p.to_string())).collect())
    }

    #[test]
    fn test_parse_xadd() {
        let cmd = Command::from_frame(request(&["XADD", "s", "*", "a", "1", "b", "2"])).unwrap();
        assert_eq!(
            cmd,
            Command::XAdd {
                key: Bytes::from("s"),
                id: "*".to_string(),
                fields: vec![
                    (Bytes::from("a"), Bytes::from("1")),
                    (Bytes::from("b"), Bytes::from("2")),
                ],
            }
        );
    }

    #[test]
    fn test_parse_xadd_arity() {
        // Missing fields
        assert!(matches!(
            Command::from_frame(request(&["XADD", "s", "*"])),
            Err(BrookError::WrongArity(_))
        ));
        // Unbalanced field/value list
        assert!(matches!(
            Command::from_frame(request(&["XADD", "s", "*", "a"])),
            Err(BrookError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_frame(request(&["XADD", "s", "*", "a", "1", "b"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_command_case_insensitive() {
        assert!(Command::from_frame(request(&["xadd", "s", "*", "a", "1"])).is_ok());
        assert!(Command::from_frame(request(&["XLen", "s"])).is_ok());
        assert_eq!(
            Command::from_frame(request(&["ping"])).unwrap(),
            Command::Ping
        );
    }

    #[test]
    fn test_parse_xrange() {
        let cmd = Command::from_frame(request(&["XRANGE", "s", "-", "+"])).unwrap();
        assert_eq!(
            cmd,
            Command::XRange {
                key: Bytes::from("s"),
                start: "-".to_string(),
                end: "+".to_string(),
                count: None,
            }
        );

        let cmd =
            Command::from_frame(request(&["XRANGE", "s", "1-0", "2-0", "COUNT", "5"])).unwrap();
        assert_eq!(
            cmd,
            Command::XRange {
                key: Bytes::from("s"),
                start: "1-0".to_string(),
                end: "2-0".to_string(),
                count: Some(5),
            }
        );
    }

    #[test]
    fn test_parse_xrange_arity() {
        assert!(matches!(
            Command::from_frame(request(&["XRANGE", "s", "-"])),
            Err(BrookError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_frame(request(&["XRANGE", "s", "-", "+", "COUNT", "1", "extra"])),
            Err(BrookError::WrongArity(_))
        ));
        // 4 args with no COUNT keyword
        assert!(matches!(
            Command::from_frame(request(&["XRANGE", "s", "-", "+", "5"])),
            Err(BrookError::Syntax)
        ));
        // COUNT with a non-integer
        assert!(matches!(
            Command::from_frame(request(&["XRANGE", "s", "-", "+", "COUNT", "abc"])),
            Err(BrookError::NotInteger)
        ));
    }

    #[test]
    fn test_parse_xread() {
        let cmd = Command::from_frame(request(&[
            "XREAD", "COUNT", "10", "BLOCK", "0", "STREAMS", "s1", "s2", "0-0", "$",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::XRead {
                count: Some(10),
                block: Some(0),
                streams: vec![
                    (Bytes::from("s1"), "0-0".to_string()),
                    (Bytes::from("s2"), "$".to_string()),
                ],
            }
        );
    }

    #[test]
    fn test_parse_xread_unbalanced() {
        let err =
            Command::from_frame(request(&["XREAD", "STREAMS", "s1", "s2", "0-0"])).unwrap_err();
        assert!(err.to_resp_error().contains("Unbalanced"));

        // No keys at all
        assert!(Command::from_frame(request(&["XREAD", "STREAMS"])).is_err());
        // No STREAMS token
        assert!(matches!(
            Command::from_frame(request(&["XREAD", "COUNT", "10"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_xreadgroup() {
        let cmd = Command::from_frame(request(&[
            "XREADGROUP", "GROUP", "g", "c", "COUNT", "2", "STREAMS", "s", ">",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::XReadGroup {
                group: Bytes::from("g"),
                consumer: Bytes::from("c"),
                count: Some(2),
                block: None,
                streams: vec![(Bytes::from("s"), ">".to_string())],
            }
        );
    }

    #[test]
    fn test_parse_xreadgroup_requires_group_token() {
        assert!(matches!(
            Command::from_frame(request(&[
                "XREADGROUP",
                "NOTGROUP",
                "g",
                "c",
                "STREAMS",
                "s",
                ">"
            ])),
            Err(BrookError::Syntax)
        ));
        assert!(matches!(
            Command::from_frame(request(&["XREADGROUP", "GROUP", "g", "c"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_xgroup() {
        let cmd = Command::from_frame(request(&["XGROUP", "CREATE", "s", "g", "0-0"])).unwrap();
        assert_eq!(
            cmd,
            Command::XGroupCreate {
                key: Bytes::from("s"),
                group: Bytes::from("g"),
                id: "0-0".to_string(),
            }
        );

        let cmd = Command::from_frame(request(&["XGROUP", "SETID", "s", "g", "$"])).unwrap();
        assert!(matches!(cmd, Command::XGroupSetId { .. }));

        let cmd = Command::from_frame(request(&["XGROUP", "DELCONSUMER", "s", "g", "c"])).unwrap();
        assert!(matches!(cmd, Command::XGroupDelConsumer { .. }));
    }

    #[test]
    fn test_parse_xgroup_unknown_subcommand() {
        let err = Command::from_frame(request(&["XGROUP", "DESTROYALL", "s", "g"])).unwrap_err();
        assert!(matches!(err, BrookError::UnknownCommand(_)));

        assert!(matches!(
            Command::from_frame(request(&["XGROUP", "CREATE", "s", "g"])),
            Err(BrookError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_frame(request(&["XGROUP", "CREATE", "s", "g", "0-0", "extra"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_xack() {
        let cmd = Command::from_frame(request(&["XACK", "s", "g", "1-0", "2-0"])).unwrap();
        assert_eq!(
            cmd,
            Command::XAck {
                key: Bytes::from("s"),
                group: Bytes::from("g"),
                ids: vec!["1-0".to_string(), "2-0".to_string()],
            }
        );

        assert!(matches!(
            Command::from_frame(request(&["XACK", "s", "g"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_xlen_xdel() {
        assert!(Command::from_frame(request(&["XLEN", "s"])).is_ok());
        assert!(matches!(
            Command::from_frame(request(&["XLEN"])),
            Err(BrookError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_frame(request(&["XLEN", "s", "extra"])),
            Err(BrookError::WrongArity(_))
        ));

        assert!(Command::from_frame(request(&["XDEL", "s", "1-0"])).is_ok());
        assert!(matches!(
            Command::from_frame(request(&["XDEL", "s"])),
            Err(BrookError::WrongArity(_))
        ));
    }

    #[test]
    fn test_parse_xpending() {
        let cmd = Command::from_frame(request(&["XPENDING", "s", "g"])).unwrap();
        assert_eq!(
            cmd,
            Command::XPending {
                key: Bytes::from("s"),
                group: Bytes::from("g"),
                consumer: None,
            }
        );

        let cmd = Command::from_frame(request(&["XPENDING", "s", "g", "c1"])).unwrap();
        assert!(matches!(
            cmd,
            Command::XPending {
                consumer: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::from_frame(request(&["FLUSHALL"])).unwrap_err();
        assert_eq!(err.to_resp_error(), "ERR unknown command 'FLUSHALL'");
    }

    #[test]
    fn test_empty_command() {
        let err = Command::from_frame(Frame::array(vec![])).unwrap_err();
        assert_eq!(err.to_resp_error(), "ERR empty command");
    }

    #[test]
    fn test_integer_elements_coerced() {
        // :5 as an array element reads as the text "5"
        let frame = Frame::array(vec![Frame::bulk("XLEN"), Frame::Integer(5)]);
        let cmd = Command::from_frame(frame).unwrap();
        assert_eq!(
            cmd,
            Command::XLen {
                key: Bytes::from("5")
            }
        );
    }

    #[test]
    fn test_ping_ignores_extra_args() {
        assert_eq!(
            Command::from_frame(request(&["PING", "hello"])).unwrap(),
            Command::Ping
        );
    }
}
