//! A network abstraction layer for embedded systems
//!
//! This module provides the traits the MQTT engine uses to talk to the outside
//! world. There are two levels:
//!
//! - The synchronous connection traits ([`Read`], [`Write`], [`Close`],
//!   [`Connection`] and [`Connect`]) describe a plain byte stream, such as a TCP
//!   socket or a UART, the way most embedded network stacks expose one.
//! - The [`Transport`] trait is the completion-driven contract the MQTT session
//!   engine consumes: operations are started by the engine and their results come
//!   back later as [`IoEvent`]s, collected while the engine pumps I/O.
//!
//! [`StreamTransport`] bridges the two, so any [`Connect`] implementation can drive
//! an MQTT session.

#![allow(missing_docs)]
#![deny(unsafe_code)]

use alloc::vec::Vec;

/// Common error types for network operations
pub mod error;

/// Adapter from the synchronous connection traits to [`Transport`].
pub mod stream;

/// Application layer protocols built on top of a transport.
pub mod application;

pub use stream::StreamTransport;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Transport, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}

/// A completion reported by a [`Transport`].
///
/// Events are produced while the transport performs I/O in
/// [`Transport::pump_io`] and are handed to the engine, in order, through
/// [`Transport::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    /// An `open` request finished.
    OpenComplete(Result<(), error::Error>),
    /// Bytes arrived from the peer. Chunk boundaries are arbitrary.
    BytesReceived(Vec<u8>),
    /// A `send` request finished.
    SendComplete(Result<(), error::Error>),
    /// The transport failed while open.
    IoError(error::Error),
    /// A `close` request finished.
    CloseComplete,
}

/// The byte-pipe contract consumed by the MQTT session engine.
///
/// A transport is reliable or failing: bytes handed to [`send`](Self::send) are
/// delivered in order or the transport reports an error. `open`, `send` and
/// `close` only start an operation; their outcome is reported later through
/// [`IoEvent`]s. A synchronous `Err` means the operation could not even be
/// started.
pub trait Transport {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Start opening the transport. Completion is reported with
    /// [`IoEvent::OpenComplete`].
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Queue bytes for transmission. Completion is reported with
    /// [`IoEvent::SendComplete`].
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Start closing the transport. Completion is reported with
    /// [`IoEvent::CloseComplete`].
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Perform pending I/O work without blocking.
    fn pump_io(&mut self);

    /// Take the next completion produced by earlier work, if any.
    fn next_event(&mut self) -> Option<IoEvent>;
}
