//! Timing an exchange.
//!
//! The SYN-ACK of a nearby peer may arrive before a receive would even be posted after sending
//! the SYN. Capture sockets queue what they see, but the time stamp of such a late receive would
//! include the delay of posting it. The harness therefore starts the receiver on its own thread
//! before the SYN is sent and only joins it afterwards:
//!
//! ```text
//! receiver: ----ready----[ recv .............. SYN-ACK ]--join
//! sender:   ----ready--[t0] SYN ------------------------join--ACK--PSH--[ recv ... data ][t2]
//!                                               [t1]
//! ```
//!
//! Both sides only rendezvous on start and completion, they share no other state.
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::Result;
use crate::exchange::{Exchange, State};
use crate::nic::{Rx, Tx};

/// The measured durations of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTrip {
    /// From sending the SYN to receiving the SYN-ACK.
    pub syn_ack: Duration,
    /// From sending the SYN to receiving the response to the push.
    pub full: Duration,
    /// The payload of the response.
    pub response: Vec<u8>,
}

/// Run a complete exchange and measure it.
///
/// The exchange must not have been started yet.
pub fn measure_round_trip<T, R>(exchange: &mut Exchange<T, R>) -> Result<RoundTrip>
    where T: Tx, R: Rx + Send,
{
    exchange.expect("measure_round_trip", State::Init)?;

    let ready = Barrier::new(2);
    let abandon = AtomicBool::new(false);
    let (outgoing, incoming) = exchange.halves();

    let (sent_at, sent, received) = thread::scope(|scope| {
        let receiver = scope.spawn(|| {
            ready.wait();
            let syn_ack = incoming.syn_ack(Some(&abandon));
            (syn_ack, Instant::now())
        });

        ready.wait();
        let sent_at = Instant::now();
        let sent = outgoing.syn();
        if sent.is_err() {
            abandon.store(true, Ordering::Release);
        }

        let received = match receiver.join() {
            Ok(received) => received,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (sent_at, sent, received)
    });

    sent?;
    exchange.transition(State::SynSent);

    let (syn_ack, syn_ack_at) = received;
    let syn_ack = exchange.settle(syn_ack)?;
    exchange.accept_syn_ack(&syn_ack);
    net_debug!("SYN-ACK from {} after {:?}", syn_ack.src(), syn_ack_at - sent_at);

    exchange.send_ack()?;
    exchange.push()?;
    let response = exchange.await_response()?;
    let done_at = Instant::now();

    Ok(RoundTrip {
        syn_ack: syn_ack_at - sent_at,
        full: done_at - sent_at,
        response,
    })
}
