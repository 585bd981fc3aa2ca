//! Hand-crafted TCP over raw sockets.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//!    1. [Checksums](wire/checksum/index.html)
//!    1. [Ipv4](wire/ipv4/index.html)
//!    1. [Tcp](wire/tcp/index.html)
//!    1. [Ethernet](wire/ethernet/index.html)
//! 3. [Building datagrams](packet/index.html)
//! 4. [Network interfaces](nic/index.html)
//! 5. [The exchange](exchange/index.html)
//! 6. [Latency](latency/index.html)
//! 7. [One-call exchanges](client/index.html)
//!
//! ## Design
//!
//! This library bypasses the kernel TCP state machine for exactly one connection. It writes the
//! IPv4 and TCP headers itself, computes both checksums, hands the complete datagram to a raw
//! socket in header-inclusion mode and then observes the replies on a second raw socket. The
//! point is measuring and experimenting: flag combinations and sequence numbers a stream socket
//! would never let through are just arguments here.
//!
//! An exchange is a single handshake followed by a single data push:
//!
//! ```text
//! Init --SYN--> SynSent --SYN-ACK--> GotSynAck --ACK--> AckSent --PSH+ACK--> Pushed --data--> Done
//! ```
//!
//! There is no retransmission, no window management, no reassembly and no teardown. Inbound
//! datagrams are correlated to the exchange only by their address and port tuple, everything else
//! the raw socket sees is silently dropped. Consequently only one exchange may be in flight per
//! local port and remote address.
//!
//! Nothing in the core looks at the environment. Source addresses, capture levels and deadlines
//! are passed in explicitly; resolving names or interface addresses is the job of the caller (see
//! the `rawtcp-probe` binary).
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;

#[cfg(target_os = "linux")]
pub mod client;
pub mod error;
pub mod exchange;
pub mod latency;
pub mod nic;
pub mod packet;
pub mod wire;

pub use error::{Error, Result};

#[cfg(target_os = "linux")]
pub use client::send_tcp_data;
