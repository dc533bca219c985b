//! RESP wire protocol: frame types, incremental parsing, and encoding.

mod encoder;
mod frame;
mod parser;

pub use encoder::{encode_frame, encode_to_bytes};
pub use frame::Frame;
pub use parser::{parse_frame, parse_frame_with_limits, parse_request, ParseError, ParserLimits};
