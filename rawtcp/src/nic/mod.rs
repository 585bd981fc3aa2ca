//! Encapsulates the raw sockets an exchange talks through.
//!
//! Sending and receiving are two separate traits since they are two separate sockets: a raw IP
//! socket in header-inclusion mode for sending complete datagrams, and a capture socket that sees
//! inbound traffic either at the IP level or at the link level. Everything the capture socket sees
//! is handed up, correlating it to an exchange is not the job of this layer.
//!
//! Software implementations are possible as well, see [`external::External`].
//!
//! [`external::External`]: external/struct.External.html
use core::{fmt, str::FromStr};
use std::time::Duration;

use crate::Result;
use crate::wire::{self, ethernet, Endpoint};

pub mod external;

#[cfg(target_os = "linux")]
#[path = "sys/mod.rs"]
mod sys_internal;

#[cfg(target_os = "linux")]
pub use self::sys_internal::exports as sys;

/// Size of the buffer a single frame is received into.
///
/// Frames longer than this are cut off and fail to decode.
pub const RECV_BUFFER_LEN: usize = 1024;

/// The level at which inbound traffic is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capture {
    /// IP datagrams carrying TCP, as delivered to a raw IP socket.
    Ip,
    /// Complete Ethernet II frames of all protocols, as delivered to a packet socket.
    Link,
}

/// Sends complete IPv4 datagrams.
pub trait Tx {
    /// Send one datagram, headers included, towards `dst`.
    ///
    /// The datagram is written atomically. A short write is an error.
    fn send(&mut self, dst: Endpoint, datagram: &[u8]) -> Result<()>;
}

/// Receives raw inbound frames.
pub trait Rx {
    /// The level at which frames are captured.
    fn capture(&self) -> Capture;

    /// Receive a single frame into the buffer.
    ///
    /// Blocks for at most `timeout`, or indefinitely if it is `None`. A frame that is already
    /// queued is returned even for a zero timeout. Returns `Ok(None)` when the timeout expired. Otherwise returns the length of the frame as it was on the wire, which may
    /// be larger than the buffer when the frame was truncated.
    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>>;
}

impl<T: Tx + ?Sized> Tx for &'_ mut T {
    fn send(&mut self, dst: Endpoint, datagram: &[u8]) -> Result<()> {
        (**self).send(dst, datagram)
    }
}

impl<T: Rx + ?Sized> Rx for &'_ mut T {
    fn capture(&self) -> Capture {
        (**self).capture()
    }

    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>> {
        (**self).recv(buffer, timeout)
    }
}

impl Capture {
    /// Extract the IP datagram from a received frame.
    ///
    /// `len` is the length reported by [`Rx::recv`], a frame longer than the buffer is
    /// `Truncated`. At the link level the Ethernet header is stripped and frames that do not carry
    /// IPv4 are `Unrecognized`.
    ///
    /// [`Rx::recv`]: trait.Rx.html#tymethod.recv
    pub fn datagram(self, buffer: &[u8], len: usize) -> wire::Result<&[u8]> {
        let frame = buffer.get(..len).ok_or(wire::Error::Truncated)?;
        match self {
            Capture::Ip => Ok(frame),
            Capture::Link => ethernet::strip_ipv4(frame),
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Capture::Ip
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capture::Ip => f.write_str("ip"),
            Capture::Link => f.write_str("link"),
        }
    }
}

/// Error for an unknown capture level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCaptureError(String);

impl fmt::Display for ParseCaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown capture level {:?}, expected `ip` or `link`", self.0)
    }
}

impl std::error::Error for ParseCaptureError {}

impl FromStr for Capture {
    type Err = ParseCaptureError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "ip" => Ok(Capture::Ip),
            "link" => Ok(Capture::Link),
            other => Err(ParseCaptureError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn datagram_at_ip_level() {
        let buffer = [0x45u8; 64];
        assert_eq!(Capture::Ip.datagram(&buffer, 40), Ok(&buffer[..40]));
        assert_eq!(Capture::Ip.datagram(&buffer, 65), Err(wire::Error::Truncated));
    }

    #[test]
    fn datagram_at_link_level() {
        let mut buffer = [0u8; 64];
        buffer[12] = 0x08;
        buffer[14] = 0x45;
        assert_eq!(Capture::Link.datagram(&buffer, 54), Ok(&buffer[14..54]));

        buffer[12] = 0x86;
        buffer[13] = 0xdd;
        assert_eq!(Capture::Link.datagram(&buffer, 54), Err(wire::Error::Unrecognized));
    }

    #[test]
    fn capture_names() {
        assert_eq!("ip".parse(), Ok(Capture::Ip));
        assert_eq!("link".parse(), Ok(Capture::Link));
        assert!("eth".parse::<Capture>().is_err());
        assert_eq!(Capture::Link.to_string(), "link");
    }
}
