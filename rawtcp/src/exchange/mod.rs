//! The handshake and data push of a single exchange.
//!
//! An [`Exchange`] plays the client side of one TCP connection by hand. It opens the connection
//! with a SYN, acknowledges the SYN-ACK of the peer, pushes the configured payload and waits for
//! the first segment carrying data in reply:
//!
//! ```text
//! Init --send SYN(seq=0, ack=0)--> SynSent
//! SynSent --receive SYN-ACK--> GotSynAck
//! GotSynAck --send ACK(seq=1, ack=remote+1)--> AckSent
//! AckSent --send PSH+ACK(seq=1, ack=remote+1, payload)--> Pushed
//! Pushed --receive data--> Done
//! ```
//!
//! A reset from the peer while waiting ends in `Reset` instead. Every step can be driven
//! separately, which allows sending something else in between, or [`run`] drives all of them.
//!
//! The sequence number of the data push does not advance with the payload. The peer only ever
//! sees one segment with data from us and there is nothing after it.
//!
//! [`Exchange`]: struct.Exchange.html
//! [`run`]: struct.Exchange.html#method.run
use core::fmt;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::{Error, Result};
use crate::nic::{Rx, Tx};
use crate::packet::{Inbound, Segment};
use crate::wire::{Endpoint, TcpFlags, TcpSeqNumber};

mod correlate;
#[cfg(test)]
mod tests;

pub use self::correlate::{Correlator, Mismatch};
pub(crate) use self::correlate::Incoming;

/// The parameters of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Our address and port, written as the source of every segment.
    pub local: Endpoint,
    /// The peer.
    pub remote: Endpoint,
    /// The data pushed after the handshake.
    pub payload: Vec<u8>,
    /// Bound for each wait on the peer. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Only accept segments addressed to our port.
    pub check_dst_port: bool,
    /// Drop inbound datagrams with wrong checksums instead of accepting them.
    pub verify_checksums: bool,
}

/// The state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing sent yet.
    Init,
    /// The SYN is sent.
    SynSent,
    /// The SYN-ACK of the peer arrived.
    GotSynAck,
    /// The handshake is completed from our side.
    AckSent,
    /// The payload is sent.
    Pushed,
    /// The response arrived.
    Done,
    /// The peer reset the connection.
    Reset,
}

/// One exchange over a pair of devices.
///
/// Not reusable, an exchange that reached `Done` or `Reset` stays there.
pub struct Exchange<T, R> {
    state: State,
    remote_seq: TcpSeqNumber,
    outgoing: Outgoing<T>,
    incoming: Incoming<R>,
}

/// The sending half of an exchange.
pub(crate) struct Outgoing<T> {
    tx: T,
    local: Endpoint,
    remote: Endpoint,
    seq_number: TcpSeqNumber,
    payload: Vec<u8>,
    checksum: Option<u16>,
}

impl Config {
    /// Configure an exchange between two endpoints.
    ///
    /// Pushes no payload, waits forever and checks the destination port of inbound segments.
    pub fn new(local: Endpoint, remote: Endpoint) -> Self {
        Config {
            local,
            remote,
            payload: Vec::new(),
            timeout: None,
            check_dst_port: true,
            verify_checksums: false,
        }
    }

    /// Set the payload to push.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Bound every wait on the peer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Choose whether the destination port of inbound segments is checked.
    pub fn check_dst_port(mut self, check: bool) -> Self {
        self.check_dst_port = check;
        self
    }

    /// Choose whether inbound checksums are verified.
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    fn correlator(&self) -> Correlator {
        Correlator {
            local: self.local,
            remote: self.remote,
            check_dst_port: self.check_dst_port,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            State::Init => "INIT",
            State::SynSent => "SYN_SENT",
            State::GotSynAck => "GOT_SYN_ACK",
            State::AckSent => "ACK_SENT",
            State::Pushed => "PUSHED",
            State::Done => "DONE",
            State::Reset => "RESET",
        })
    }
}

impl<T: Tx, R: Rx> Exchange<T, R> {
    /// Prepare an exchange. Nothing is sent until the first step.
    pub fn new(config: Config, tx: T, rx: R) -> Self {
        let correlator = config.correlator();
        Exchange {
            state: State::Init,
            remote_seq: TcpSeqNumber(0),
            incoming: Incoming::new(rx, correlator, config.timeout, config.verify_checksums),
            outgoing: Outgoing {
                tx,
                local: config.local,
                remote: config.remote,
                seq_number: TcpSeqNumber(0),
                payload: config.payload,
                checksum: None,
            },
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The sequence number of the next segment we send.
    pub fn local_seq(&self) -> TcpSeqNumber {
        self.outgoing.seq_number
    }

    /// The sequence number of the SYN-ACK, zero before it arrived.
    pub fn remote_seq(&self) -> TcpSeqNumber {
        self.remote_seq
    }

    /// The acknowledgement number we send after the handshake.
    pub fn ack_number(&self) -> TcpSeqNumber {
        self.remote_seq + 1
    }

    /// Send the next segment with the given TCP checksum instead of the computed one.
    ///
    /// Applies once. A peer drops such a segment unless the value happens to be right, which is
    /// the point of overriding it.
    pub fn override_checksum(&mut self, checksum: u16) {
        self.outgoing.checksum = Some(checksum);
    }

    /// Open the connection.
    pub fn send_syn(&mut self) -> Result<()> {
        self.expect("send_syn", State::Init)?;
        self.outgoing.syn()?;
        self.transition(State::SynSent);
        Ok(())
    }

    /// Wait for the SYN-ACK of the peer.
    ///
    /// Correlated segments without both SYN and ACK are skipped.
    pub fn await_syn_ack(&mut self) -> Result<Inbound> {
        self.expect("await_syn_ack", State::SynSent)?;
        let syn_ack = self.incoming.syn_ack(None);
        let syn_ack = self.settle(syn_ack)?;
        self.accept_syn_ack(&syn_ack);
        Ok(syn_ack)
    }

    /// Complete the handshake.
    pub fn send_ack(&mut self) -> Result<()> {
        self.expect("send_ack", State::GotSynAck)?;
        let ack = self.ack_number();
        self.outgoing.send(TcpFlags::ACK, ack, false)?;
        self.transition(State::AckSent);
        Ok(())
    }

    /// Push the payload.
    pub fn push(&mut self) -> Result<()> {
        self.expect("push", State::AckSent)?;
        let ack = self.ack_number();
        self.outgoing.send(TcpFlags::PSH | TcpFlags::ACK, ack, true)?;
        self.transition(State::Pushed);
        Ok(())
    }

    /// Wait for the response to the push and return its payload.
    ///
    /// Correlated segments without payload, such as a bare acknowledgement of the push, are
    /// skipped.
    pub fn await_response(&mut self) -> Result<Vec<u8>> {
        self.expect("await_response", State::Pushed)?;
        let response = self.incoming.next_matching("response", None, |inbound| {
            !inbound.payload.is_empty()
        });
        let response = self.settle(response)?;
        self.transition(State::Done);
        Ok(response.payload)
    }

    /// Run all steps of the exchange and return the response payload.
    pub fn run(&mut self) -> Result<Vec<u8>> {
        self.send_syn()?;
        self.await_syn_ack()?;
        self.send_ack()?;
        self.push()?;
        self.await_response()
    }

    /// Take the exchange apart, returning the devices.
    pub fn into_inner(self) -> (T, R) {
        (self.outgoing.tx, self.incoming.into_inner())
    }

    /// Borrow both halves at once, for sending and receiving on separate threads.
    pub(crate) fn halves(&mut self) -> (&mut Outgoing<T>, &mut Incoming<R>) {
        (&mut self.outgoing, &mut self.incoming)
    }

    pub(crate) fn expect(&self, op: &'static str, state: State) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::OutOfOrder { op, state: self.state })
        }
    }

    pub(crate) fn transition(&mut self, next: State) {
        net_debug!("exchange {} -> {}: {} -> {}",
            self.outgoing.local, self.outgoing.remote, self.state, next);
        self.state = next;
    }

    /// Record the SYN-ACK, the SYN now counts as acknowledged.
    pub(crate) fn accept_syn_ack(&mut self, syn_ack: &Inbound) {
        self.remote_seq = syn_ack.tcp.seq_number;
        self.outgoing.seq_number += 1;
        self.transition(State::GotSynAck);
    }

    /// Move into `Reset` if the peer reset the connection.
    pub(crate) fn settle<X>(&mut self, result: Result<X>) -> Result<X> {
        if let Err(Error::Reset) = result {
            self.transition(State::Reset);
        }
        result
    }
}

impl<T: Tx> Outgoing<T> {
    pub(crate) fn syn(&mut self) -> Result<()> {
        self.send(TcpFlags::SYN, TcpSeqNumber(0), false)
    }

    fn send(&mut self, flags: TcpFlags, ack_number: TcpSeqNumber, with_payload: bool)
        -> Result<()>
    {
        let payload: &[u8] = if with_payload { &self.payload } else { &[] };
        let segment = Segment {
            seq_number: self.seq_number,
            ack_number,
            payload,
            checksum: self.checksum.take(),
            ..Segment::new(self.local, self.remote, flags)
        };

        let datagram = segment.build()?;
        net_debug!("sending {} to {} seq={} ack={} len={}",
            flags, self.remote, segment.seq_number, ack_number, payload.len());
        self.tx.send(self.remote, &datagram)
    }
}

impl<R: Rx> Incoming<R> {
    pub(crate) fn syn_ack(&mut self, cancel: Option<&AtomicBool>) -> Result<Inbound> {
        self.next_matching("SYN-ACK", cancel, |inbound| {
            inbound.tcp.flags.contains(TcpFlags::SYN | TcpFlags::ACK)
        })
    }
}
