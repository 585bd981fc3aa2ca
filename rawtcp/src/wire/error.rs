use core::fmt;

/// The error type for parsing packets off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// An incoming packet could not be parsed because it was shorter than assumed.
    ///
    /// The packet may be shorter than the minimum header length, shorter than a length it claims
    /// in one of its fields, or it may have been cut off by a receive buffer that was too small
    /// to hold all of it.
    Truncated,

    /// An incoming packet had an incorrect checksum.
    WrongChecksum,

    /// An incoming packet could not be recognized.
    ///
    /// E.g. an Ethernet frame with an EtherType other than IPv4, an IP datagram with a version
    /// other than 4 or a protocol other than TCP. On a raw socket this is the common case for
    /// foreign traffic and not a fault of the peer.
    Unrecognized,

    /// An incoming packet was recognized but was self-contradictory.
    ///
    /// Examples: a TCP segment whose data offset points inside its fixed header, an IPv4
    /// datagram whose total length is shorter than its header.
    Malformed,

    /// An outgoing packet is longer than its length fields can express.
    ///
    /// A TCP segment over 65535 octets has no pseudo header length to checksum it with.
    Oversized,
}

/// The result type for the wire module.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Unrecognized  => write!(f, "unrecognized packet"),
            Error::Malformed     => write!(f, "malformed packet"),
            Error::Oversized     => write!(f, "packet too long"),
        }
    }
}

impl std::error::Error for Error {}
