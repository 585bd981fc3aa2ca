//! Exchanges over the raw sockets of the host, in one call.
//!
//! Opens the sending and the capture socket, runs the exchange and closes both again on every
//! path out, successful or not. Needs `CAP_NET_RAW`.
use crate::{Error, Result};
use crate::exchange::{Config, Exchange};
use crate::nic::Capture;
use crate::nic::sys::{CaptureSocket, RawSocket};
use crate::packet::parse_address;
use crate::wire::Endpoint;

/// Push `payload` to a server after a hand-made handshake and return the payload of its response.
///
/// Both hosts are dotted-decimal IPv4 addresses and are checked before any socket is opened.
/// Replies are captured at the IP level and waited for indefinitely, use [`send_with`] for
/// anything else.
///
/// [`send_with`]: fn.send_with.html
pub fn send_tcp_data(
    dst_host: &str,
    dst_port: u16,
    src_host: &str,
    src_port: u16,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let remote = Endpoint::new(parse_address(dst_host)?, dst_port);
    let local = Endpoint::new(parse_address(src_host)?, src_port);
    let config = Config::new(local, remote).payload(payload);
    send_with(config, Capture::Ip, None)
}

/// Run a configured exchange over fresh sockets.
///
/// With an interface name the capture socket only sees traffic of that interface.
pub fn send_with(config: Config, capture: Capture, iface: Option<&str>) -> Result<Vec<u8>> {
    let (tx, rx) = open_sockets(capture, iface)?;
    Exchange::new(config, tx, rx).run()
}

/// Open the sending socket and a capture socket at the given level.
pub fn open_sockets(capture: Capture, iface: Option<&str>) -> Result<(RawSocket, CaptureSocket)> {
    let tx = RawSocket::new()
        .map_err(|err| Error::io("socket", err.into()))?;
    let mut rx = CaptureSocket::new(capture)
        .map_err(|err| Error::io("socket", err.into()))?;

    if let Some(iface) = iface {
        rx.bind_interface(iface)
            .map_err(|err| Error::io("bind", err.into()))?;
    }

    Ok((tx, rx))
}
