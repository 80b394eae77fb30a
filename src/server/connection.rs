//! Per-connection task
//!
//! Owns the socket for one client. Inbound lines are handed to the
//! [`ConnectionHandler`]; lines queued on the connection's registry entry
//! are written back out. A queued close is honoured only after every line
//! queued before it has been flushed.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::error::Result;
use crate::protocol::LineCodec;
use crate::registry::{ConnectionEntry, Outbound};
use crate::server::handler::ConnectionHandler;

/// A single client connection
pub struct Connection<S, H: ConnectionHandler> {
    entry: Arc<ConnectionEntry>,
    outbound: mpsc::Receiver<Outbound>,
    framed: Framed<S, LineCodec>,
    handler: Arc<H>,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: ConnectionHandler,
{
    pub fn new(
        entry: Arc<ConnectionEntry>,
        outbound: mpsc::Receiver<Outbound>,
        socket: S,
        codec: LineCodec,
        handler: Arc<H>,
    ) -> Self {
        Self {
            entry,
            outbound,
            framed: Framed::new(socket, codec),
            handler,
        }
    }

    /// Drive the connection until the peer leaves or a close is requested
    ///
    /// The entry is unregistered before the disconnect callback fires, so no
    /// broadcast issued afterwards is addressed to it.
    pub async fn run(mut self) -> Result<()> {
        self.handler.on_client_connected(&self.entry).await;

        let result = self.pump().await;

        if let Err(ref e) = result {
            self.handler.on_client_exception(&self.entry, e).await;
        }

        self.handler.registry().unregister(self.entry.id).await;
        self.handler.on_client_disconnected(&self.entry).await;

        result
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                // Drain writes first so replies queued ahead of a close go out
                biased;

                _ = self.entry.aborted() => {
                    tracing::warn!(connection_id = self.entry.id, "Connection dropped: outbound queue full");
                    return Ok(());
                }

                outbound = self.outbound.recv() => match outbound {
                    Some(Outbound::Line(line)) => {
                        // A peer that stops reading must not hold the writer forever
                        tokio::select! {
                            sent = self.framed.send(line) => sent?,
                            _ = self.entry.aborted() => {
                                tracing::warn!(connection_id = self.entry.id, "Connection dropped: outbound queue full");
                                return Ok(());
                            }
                        }
                    }
                    Some(Outbound::Close) | None => {
                        tokio::select! {
                            flushed = SinkExt::<Arc<str>>::flush(&mut self.framed) => flushed?,
                            _ = self.entry.aborted() => return Ok(()),
                        }
                        // Peer may already be gone; nothing left to report
                        let _ = self.framed.get_mut().shutdown().await;
                        tracing::debug!(connection_id = self.entry.id, "Connection closed by server");
                        return Ok(());
                    }
                },

                frame = self.framed.next() => match frame {
                    Some(Ok(line)) => {
                        if self.entry.is_closed() {
                            continue;
                        }
                        tracing::trace!(connection_id = self.entry.id, line = %line, "Line received");
                        self.handler.on_message(&self.entry, &line).await;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::debug!(connection_id = self.entry.id, "Peer closed connection");
                        return Ok(());
                    }
                },
            }
        }
    }
}
