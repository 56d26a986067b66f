//! Stream transport adapter.
//!
//! [`StreamTransport`] wraps a synchronous [`Connect`] implementation and exposes
//! it through the completion-event [`Transport`] contract. Opening connects
//! immediately and queues the outcome; sends are written and flushed in full;
//! `pump_io` polls the connection for readable bytes.
//!
//! The wrapped connection must be non-blocking (or use a short read timeout): a
//! read that returns zero bytes or reports [`Error::Timeout`] is treated as
//! "no data yet". Connections that signal end-of-stream must report it as an
//! error such as [`Error::ConnectionClosed`].

use alloc::collections::VecDeque;
use alloc::string::String;
use core::fmt;
use log::{debug, warn};

use super::error::Error;
use super::{Close, Connect, IoEvent, Read, Transport, Write};

/// Size of the stack buffer used for each read.
const READ_CHUNK: usize = 512;

/// Upper bound on reads performed by a single `pump_io` call.
const MAX_READS_PER_PUMP: usize = 16;

/// A [`Transport`] built from a synchronous [`Connect`] implementation.
pub struct StreamTransport<N: Connect> {
    connector: N,
    remote: String,
    connection: Option<N::Connection>,
    events: VecDeque<IoEvent>,
}

impl<N: Connect> fmt::Debug for StreamTransport<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTransport")
            .field("remote", &self.remote)
            .field("open", &self.connection.is_some())
            .field("queued_events", &self.events.len())
            .finish()
    }
}

impl<N> StreamTransport<N>
where
    N: Connect,
    <N::Connection as Read>::Error: Into<Error>,
{
    /// Creates a transport that connects to `remote` through `connector` when the
    /// engine opens it.
    pub fn new(connector: N, remote: &str) -> Self {
        Self {
            connector,
            remote: String::from(remote),
            connection: None,
            events: VecDeque::new(),
        }
    }

    /// Returns `true` while a connection is held.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The remote address passed to the connector.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn write_all(connection: &mut N::Connection, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            match connection.write(bytes) {
                Ok(0) => return Err(Error::WriteError),
                Ok(n) => bytes = &bytes[n..],
                Err(_) => return Err(Error::WriteError),
            }
        }
        connection.flush().map_err(|_| Error::WriteError)
    }
}

impl<N> Transport for StreamTransport<N>
where
    N: Connect,
    <N::Connection as Read>::Error: Into<Error>,
{
    type Error = Error;

    fn open(&mut self) -> Result<(), Self::Error> {
        if self.connection.is_some() {
            return Err(Error::OpenFailed);
        }
        match self.connector.connect(&self.remote) {
            Ok(connection) => {
                debug!("stream transport connected to {}", self.remote);
                self.connection = Some(connection);
                self.events.push_back(IoEvent::OpenComplete(Ok(())));
            }
            Err(e) => {
                warn!("stream transport failed to connect to {}: {:?}", self.remote, e);
                self.events
                    .push_back(IoEvent::OpenComplete(Err(Error::ConnectionRefused)));
            }
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        Self::write_all(connection, bytes)?;
        self.events.push_back(IoEvent::SendComplete(Ok(())));
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        let connection = self.connection.take().ok_or(Error::NotOpen)?;
        let result = connection.close().map_err(|_| Error::ConnectionClosed);
        self.events.push_back(IoEvent::CloseComplete);
        result
    }

    fn pump_io(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_PUMP {
            match connection.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.events.push_back(IoEvent::BytesReceived(buf[..n].to_vec())),
                Err(e) => match e.into() {
                    Error::Timeout => break,
                    other => {
                        self.events.push_back(IoEvent::IoError(other));
                        break;
                    }
                },
            }
        }
    }

    fn next_event(&mut self) -> Option<IoEvent> {
        self.events.pop_front()
    }
}
