//! Matching inbound datagrams to an exchange.
//!
//! A capture socket sees everything: other connections, other protocols, the host's own replies
//! and, at the link level, other hosts' traffic. The only way to pick out the segments of one
//! exchange is by their address and port tuple.
use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::nic::{Rx, RECV_BUFFER_LEN};
use crate::packet::Inbound;
use crate::wire::{self, Endpoint, IpProtocol};

/// Longest single wait while a cancellation flag is being watched.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decides whether an inbound datagram belongs to an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlator {
    /// Our side of the exchange.
    pub local: Endpoint,
    /// The peer.
    pub remote: Endpoint,
    /// Also require the destination port to be ours.
    pub check_dst_port: bool,
}

/// Why a datagram was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// The IP datagram carries another protocol.
    Protocol(IpProtocol),
    /// Sent by another host.
    SrcAddr,
    /// Sent from another port of the peer.
    SrcPort,
    /// Addressed to another local port.
    DstPort,
}

impl Correlator {
    /// Create a correlator for the tuple of an exchange, checking the destination port.
    pub fn new(local: Endpoint, remote: Endpoint) -> Self {
        Correlator { local, remote, check_dst_port: true }
    }

    /// Check a decoded datagram against the tuple.
    pub fn check(&self, inbound: &Inbound) -> core::result::Result<(), Mismatch> {
        if inbound.ip.protocol != IpProtocol::Tcp {
            return Err(Mismatch::Protocol(inbound.ip.protocol));
        }

        if inbound.ip.src_addr != self.remote.addr {
            return Err(Mismatch::SrcAddr);
        }

        if inbound.tcp.src_port != self.remote.port {
            return Err(Mismatch::SrcPort);
        }

        if self.check_dst_port && inbound.tcp.dst_port != self.local.port {
            return Err(Mismatch::DstPort);
        }

        Ok(())
    }

    /// Shorthand for `check(inbound).is_ok()`.
    pub fn matches(&self, inbound: &Inbound) -> bool {
        self.check(inbound).is_ok()
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mismatch::Protocol(protocol) => write!(f, "protocol {} is not TCP", protocol),
            Mismatch::SrcAddr => write!(f, "foreign source address"),
            Mismatch::SrcPort => write!(f, "foreign source port"),
            Mismatch::DstPort => write!(f, "foreign destination port"),
        }
    }
}

/// The receiving half of an exchange.
///
/// Owns the capture device and the receive buffer.
pub(crate) struct Incoming<R> {
    rx: R,
    correlator: Correlator,
    buffer: Vec<u8>,
    timeout: Option<Duration>,
    verify_checksums: bool,
}

impl<R: Rx> Incoming<R> {
    pub(crate) fn new(
        rx: R,
        correlator: Correlator,
        timeout: Option<Duration>,
        verify_checksums: bool,
    ) -> Self {
        Incoming {
            rx,
            correlator,
            buffer: vec![0; RECV_BUFFER_LEN],
            timeout,
            verify_checksums,
        }
    }

    pub(crate) fn into_inner(self) -> R {
        self.rx
    }

    /// Receive until a correlated datagram passes `accept`.
    ///
    /// A correlated RST ends the wait with `Error::Reset`, whatever `accept` would say about it.
    /// The configured timeout bounds the whole wait, not each single receive. Setting `cancel`
    /// ends the wait with a timeout as well.
    pub(crate) fn next_matching<F>(
        &mut self,
        what: &'static str,
        cancel: Option<&AtomicBool>,
        mut accept: F,
    ) -> Result<Inbound>
        where F: FnMut(&Inbound) -> bool,
    {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        let mut attempted = false;

        loop {
            if cancel.map_or(false, |flag| flag.load(Ordering::Acquire)) {
                return Err(Error::Timeout(started.elapsed()));
            }

            // A frame already queued is looked at before the deadline counts, even for a zero
            // timeout.
            let expired = deadline.map_or(false, |deadline| Instant::now() >= deadline);
            if attempted && expired {
                return Err(self.timed_out());
            }
            attempted = true;

            let mut wait = deadline
                .map(|deadline| deadline.saturating_duration_since(Instant::now()));
            if cancel.is_some() {
                wait = Some(wait.map_or(POLL_INTERVAL, |wait| wait.min(POLL_INTERVAL)));
            }

            let len = match self.rx.recv(&mut self.buffer, wait)? {
                Some(len) => len,
                None if wait.is_some() => continue,
                None => return Err(self.timed_out()),
            };

            let inbound = match self.decode(len) {
                Ok(inbound) => inbound,
                Err(err) => {
                    net_trace!("waiting for {}: dropping undecodable frame of {} bytes: {}",
                        what, len, err);
                    continue;
                },
            };

            if let Err(mismatch) = self.correlator.check(&inbound) {
                net_trace!("waiting for {}: dropping {} from {}: {}",
                    what, inbound.tcp.flags, inbound.src(), mismatch);
                continue;
            }

            if inbound.tcp.flags.rst() {
                net_debug!("waiting for {}: reset by {} seq={}",
                    what, inbound.src(), inbound.tcp.seq_number);
                return Err(Error::Reset);
            }

            if !accept(&inbound) {
                net_trace!("waiting for {}: skipping {} seq={} len={}",
                    what, inbound.tcp.flags, inbound.tcp.seq_number, inbound.payload.len());
                continue;
            }

            return Ok(inbound);
        }
    }

    fn decode(&self, len: usize) -> wire::Result<Inbound> {
        let datagram = self.rx.capture().datagram(&self.buffer, len)?;
        if self.verify_checksums {
            Inbound::decode_verified(datagram)
        } else {
            Inbound::decode(datagram)
        }
    }

    fn timed_out(&self) -> Error {
        Error::Timeout(self.timeout.unwrap_or_default())
    }
}
