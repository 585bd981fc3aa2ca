//! Errors of sending, receiving and running an exchange.
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::exchange::State;
use crate::wire;

/// The error type of everything above the wire format.
///
/// Configuration and transport errors end an exchange immediately. Inbound datagrams that do not
/// belong to the exchange are never an error, they are filtered by the receive loops.
#[derive(Debug, Error)]
pub enum Error {
    /// A host string that is not a dotted-decimal IPv4 address.
    #[error("invalid IPv4 address {addr:?}: {source}")]
    Address {
        /// The offending input.
        addr: String,
        /// Why it was rejected.
        source: wire::ipv4::ParseAddressError,
    },

    /// A system call on a raw socket failed.
    #[error("{op} failed: {source}")]
    Io {
        /// The name of the failing call.
        op: &'static str,
        /// The error reported by the OS.
        source: io::Error,
    },

    /// The kernel accepted only part of a datagram.
    #[error("short write, sent {written} of {len} bytes")]
    ShortWrite {
        /// Number of bytes the kernel took.
        written: usize,
        /// Length of the datagram.
        len: usize,
    },

    /// A payload that does not fit into a single IPv4 datagram.
    #[error("payload of {len} bytes does not fit into one datagram")]
    PayloadTooLong {
        /// Length of the rejected payload.
        len: usize,
    },

    /// No matching datagram arrived before the deadline.
    #[error("no matching reply within {0:?}")]
    Timeout(Duration),

    /// The peer reset the connection.
    #[error("connection reset by peer")]
    Reset,

    /// A step of an exchange was taken in the wrong state.
    #[error("{op} is not possible in state {state}")]
    OutOfOrder {
        /// The step that was attempted.
        op: &'static str,
        /// The state the exchange was in.
        state: State,
    },

    /// A datagram handed in for decoding was not a valid TCP/IP datagram.
    #[error("invalid datagram: {0}")]
    Wire(#[from] wire::Error),
}

/// The result type of the exchange.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        Error::Io { op, source }
    }
}
