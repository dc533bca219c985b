//! Per-connection request handler.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::commands::{Command, CommandExecutor};
use crate::error::Result;
use crate::protocol::Frame;
use crate::store::StreamRegistry;

use super::connection::Connection;

/// Handler for a single client connection.
///
/// Runs the read → dispatch → reply loop until the client disconnects or
/// the server shuts down. Client-driven failures (bad framing, unknown
/// commands, engine errors) become `-ERR` replies; the connection stays
/// open.
pub struct Handler {
    connection: Connection,
    executor: CommandExecutor,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Handler {
    /// Create a handler over the shared registry
    pub fn new(
        connection: Connection,
        registry: Arc<StreamRegistry>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            connection,
            executor: CommandExecutor::new(registry),
            shutdown_rx,
        }
    }

    /// Run the handler loop.
    ///
    /// When several pipelined commands are already buffered, their replies
    /// are batched and flushed together.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                result = self.connection.read_frame() => {
                    match result {
                        Ok(Some(frame)) => {
                            let response = self.handle_frame(frame);

                            if self.connection.has_pending_data() {
                                self.connection.buffer_frame(&response);
                                loop {
                                    match self.connection.try_parse_buffered() {
                                        Ok(Some(next)) => {
                                            let response = self.handle_frame(next);
                                            self.connection.buffer_frame(&response);
                                        }
                                        Ok(None) => break,
                                        Err(e) => {
                                            self.connection
                                                .buffer_frame(&Frame::error(e.to_resp_error()));
                                            break;
                                        }
                                    }
                                }
                                self.connection.flush_buffered().await?;
                            } else {
                                self.connection.write_frame(&response).await?;
                            }
                        }
                        Ok(None) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            // Framing violation: reply and keep the
                            // connection; the read buffer was resynced.
                            self.connection
                                .write_frame(&Frame::error(e.to_resp_error()))
                                .await?;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    debug!("handler stopping on shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    fn handle_frame(&self, frame: Frame) -> Frame {
        match Command::from_frame(frame) {
            Ok(command) => {
                debug!(?command, "executing");
                self.executor.execute(command)
            }
            Err(e) => Frame::error(e.to_resp_error()),
        }
    }
}
