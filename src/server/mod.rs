//! Server runtime: TCP listener, per-connection handlers, buffered I/O.

mod connection;
mod handler;
mod listener;

pub use connection::Connection;
pub use handler::Handler;
pub use listener::Server;
