//! A software nic whose peer is played by a closure.
//!
//! Every datagram sent through [`External`] is recorded and handed to a responder which answers
//! with any number of frames. These, and anything injected from the outside, are queued for
//! receiving. Clones share the same state so that one clone may be used to send while another one
//! receives on a different thread, just like the two sockets of a real exchange.
//!
//! [`External`]: struct.External.html
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::Result;
use crate::wire::Endpoint;
use super::{Capture, Rx, Tx};

type Responder = dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send;

/// An in-memory device with a scripted peer.
#[derive(Clone)]
pub struct External {
    capture: Capture,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    arrived: Condvar,
}

struct State {
    /// Every datagram sent, in order.
    sent: Vec<(Endpoint, Vec<u8>)>,

    /// Frames pending to be received.
    inbox: VecDeque<Vec<u8>>,

    responder: Box<Responder>,
}

impl External {
    /// A device whose peer never answers.
    pub fn new(capture: Capture) -> Self {
        External::with_responder(capture, |_| Vec::new())
    }

    /// A device whose peer answers each sent datagram with the frames the responder returns.
    ///
    /// The frames must match the capture level, at the link level they need an Ethernet header.
    pub fn with_responder<F>(capture: Capture, responder: F) -> Self
        where F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        External {
            capture,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    sent: Vec::new(),
                    inbox: VecDeque::new(),
                    responder: Box::new(responder),
                }),
                arrived: Condvar::new(),
            }),
        }
    }

    /// Queue a frame to be received, independent of anything sent.
    pub fn inject(&self, frame: Vec<u8>) {
        self.lock().inbox.push_back(frame);
        self.shared.arrived.notify_all();
    }

    /// All datagrams sent so far with their destination.
    pub fn sent(&self) -> Vec<(Endpoint, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Number of frames still waiting to be received.
    pub fn to_recv(&self) -> usize {
        self.lock().inbox.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking responder poisons the lock, the state itself stays consistent.
        self.shared.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Tx for External {
    fn send(&mut self, dst: Endpoint, datagram: &[u8]) -> Result<()> {
        let mut state = self.lock();
        state.sent.push((dst, datagram.to_vec()));
        let replies = (state.responder)(datagram);
        state.inbox.extend(replies);
        drop(state);

        self.shared.arrived.notify_all();
        Ok(())
    }
}

impl Rx for External {
    fn capture(&self) -> Capture {
        self.capture
    }

    /// Take the next queued frame.
    ///
    /// Waits for a frame to be queued by another clone for at most `timeout`.
    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<Option<usize>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock();

        let frame = loop {
            if let Some(frame) = state.inbox.pop_front() {
                break frame;
            }

            state = match deadline {
                None => self.shared.arrived.wait(state)
                    .unwrap_or_else(|poison| poison.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.shared.arrived.wait_timeout(state, deadline - now)
                        .unwrap_or_else(|poison| poison.into_inner())
                        .0
                },
            };
        };

        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        Ok(Some(frame.len()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::Ipv4Address;

    const PEER: Endpoint = Endpoint::new(Ipv4Address::LOOPBACK, 8080);

    #[test]
    fn echo() {
        let mut nic = External::with_responder(Capture::Ip, |datagram| vec![datagram.to_vec()]);
        nic.send(PEER, &[1, 2, 3]).unwrap();
        assert_eq!(nic.sent(), vec![(PEER, vec![1, 2, 3])]);

        let mut buffer = [0; 8];
        assert_eq!(nic.recv(&mut buffer, None).unwrap(), Some(3));
        assert_eq!(&buffer[..3], &[1, 2, 3]);
        assert_eq!(nic.recv(&mut buffer, Some(Duration::from_millis(1))).unwrap(), None);
    }

    #[test]
    fn truncates() {
        let mut nic = External::new(Capture::Ip);
        nic.inject(vec![7; 16]);
        let mut buffer = [0; 8];
        assert_eq!(nic.recv(&mut buffer, Some(Duration::from_millis(1))).unwrap(), Some(16));
        assert_eq!(buffer, [7; 8]);
    }

    #[test]
    fn shared_between_threads() {
        let mut rx = External::with_responder(Capture::Ip, |_| vec![vec![42]]);
        let mut tx = rx.clone();

        let receiver = std::thread::spawn(move || {
            let mut buffer = [0; 4];
            rx.recv(&mut buffer, Some(Duration::from_secs(5))).unwrap()
        });

        tx.send(PEER, &[]).unwrap();
        assert_eq!(receiver.join().unwrap(), Some(1));
        assert_eq!(tx.to_recv(), 0);
    }
}
