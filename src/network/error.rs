//! Common error types for transport operations

/// A common error type for transport operations.
///
/// This enum defines the failures a byte-stream transport can report to the
/// MQTT engine. The engine never inspects them beyond "succeeded" or "failed",
/// but they are kept distinct so that logs stay useful.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    #[error("connection is not open")]
    NotOpen,
    /// The transport could not be opened.
    #[error("transport open failed")]
    OpenFailed,
    /// An error occurred during a write operation.
    #[error("write failed")]
    WriteError,
    /// An error occurred during a read operation.
    #[error("read failed")]
    ReadError,
    /// A connection attempt was refused.
    #[error("connection refused")]
    ConnectionRefused,
    /// A timeout occurred.
    #[error("operation timed out")]
    Timeout,
    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// An invalid address was provided.
    #[error("invalid address")]
    InvalidAddress,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::OpenFailed => defmt::write!(f, "OpenFailed"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
        }
    }
}
