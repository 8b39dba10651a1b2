//! Socket-level plumbing: one task per connection owning the stream.
//!
//! The task multiplexes the outbound queue and inbound line reads with
//! `select!`, so every write to a connection goes through exactly one
//! writer. Broadcasters enqueue and move on; a consumer that has gone away
//! just loses the line.

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tokio_rustls::TlsAcceptor;

use crate::errors::ConnectionError;

/// Something that happened on the socket, delivered to the owning client
/// task.
#[derive(Debug)]
pub enum ConnectionEvent {
    Message(String),
    Closed(ConnectionError),
}

pub(crate) enum ConnectionControl {
    Send(String),
    Close,
}

/// Handle to a connection task. Cheap to clone; dropping every handle does
/// not close the socket, use [`Connection::close`] for that.
#[derive(Clone)]
pub struct Connection {
    control: UnboundedSender<ConnectionControl>,
}

impl Connection {
    /// Takes ownership of an accepted stream and spawns its I/O task. With
    /// a TLS acceptor, the handshake runs first; handshake failure surfaces
    /// as a `Closed` event.
    pub fn new(
        stream: TcpStream,
        tls: Option<TlsAcceptor>,
        events: UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let (control_send, control_recv) = unbounded_channel();

        tokio::spawn(async move {
            match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        ConnectionTask::new(tls_stream, control_recv, events)
                            .run()
                            .await
                    }
                    Err(e) => {
                        let _ = events.send(ConnectionEvent::Closed(
                            ConnectionError::TlsError(e.to_string()),
                        ));
                    }
                },
                None => ConnectionTask::new(stream, control_recv, events).run().await,
            }
        });

        Self {
            control: control_send,
        }
    }

    /// Queues one line for delivery; the task appends CRLF. Errors mean the
    /// task is gone, which the reader side will have reported already.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.control.send(ConnectionControl::Send(line.into()));
    }

    pub fn close(&self) {
        let _ = self.control.send(ConnectionControl::Close);
    }

    /// A handle with no task behind it; sends vanish. Lets state-level tests
    /// build clients without sockets.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (control_send, _) = unbounded_channel();
        Self {
            control: control_send,
        }
    }

    /// A handle whose queue is handed back to the caller, so state-level
    /// tests can assert on the lines a client would have been sent.
    #[cfg(test)]
    pub(crate) fn test_channel() -> (Self, UnboundedReceiver<ConnectionControl>) {
        let (control_send, control_recv) = unbounded_channel();
        (
            Self {
                control: control_send,
            },
            control_recv,
        )
    }
}

struct ConnectionTask<S> {
    conn: S,
    control_channel: UnboundedReceiver<ConnectionControl>,
    event_channel: UnboundedSender<ConnectionEvent>,
}

impl<S> ConnectionTask<S>
where
    S: AsyncRead + AsyncWrite,
{
    fn new(
        stream: S,
        control_channel: UnboundedReceiver<ConnectionControl>,
        event_channel: UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            conn: stream,
            control_channel,
            event_channel,
        }
    }

    async fn run(mut self) {
        let (reader, mut writer) = tokio::io::split(self.conn);
        let reader = BufReader::new(reader);
        let mut lines = reader.lines();
        loop {
            select! {
                control = self.control_channel.recv() => match control {
                    None => { break; }
                    Some(ConnectionControl::Close) => { break; }
                    Some(ConnectionControl::Send(msg)) => {
                        if writer.write_all(msg.as_bytes()).await.is_err()
                            || writer.write_all(b"\r\n").await.is_err()
                        {
                            break;
                        }
                    }
                },
                message = lines.next_line() => match message {
                    Ok(None) => { break; }
                    Ok(Some(m)) => {
                        if self.event_channel.send(ConnectionEvent::Message(m)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = self
                            .event_channel
                            .send(ConnectionEvent::Closed(ConnectionError::from(e)));
                        return;
                    }
                }
            }
        }
        let _ = self
            .event_channel
            .send(ConnectionEvent::Closed(ConnectionError::Closed));
    }
}
