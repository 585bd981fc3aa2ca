/*! Low-level packet access and construction.

# Packet representations

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the `Packet` and `Frame` wrappers, e.g.
   [`ipv4::Packet`] or [`tcp::Packet`]. All multi-byte fields are read and written in network
   byte order through `byteorder::NetworkEndian`, so the integers handed out are always in host
   order no matter the endianness of the host.
 * Second, it provides a compact, high-level representation of header data that can be created
   from parsing and emitted into a sequence of octets. This happens through the `Repr` family of
   structs, e.g. [`ipv4::Repr`] or [`tcp::Repr`].

[`ipv4::Packet`]: ipv4/struct.Packet.html
[`tcp::Packet`]: tcp/struct.Packet.html
[`ipv4::Repr`]: ipv4/struct.Repr.html
[`tcp::Repr`]: tcp/struct.Repr.html

The wrappers guarantee that, if `check_len()` returned `Ok(())`, then no field accessor or
setter will panic. The `new_checked` constructors combine construction and this check and must be
used on anything that came from the network.

Only IPv4 without options and TCP without options are ever emitted. Both headers are exactly 20
octets long.

# Examples

Emit a SYN segment and parse it back:

```rust
use rawtcp::wire::{ipv4, tcp};

let src_addr = ipv4::Address::new(10, 0, 0, 1);
let dst_addr = ipv4::Address::new(10, 0, 0, 2);
let repr = tcp::Repr {
    src_port: 25566,
    dst_port: 8080,
    seq_number: tcp::SeqNumber(0),
    ack_number: tcp::SeqNumber(0),
    flags: tcp::Flags::SYN,
    window_len: tcp::WINDOW_LEN,
};

let header = tcp::encode_header(src_addr, dst_addr, &repr, &[]).expect("fits a segment");
let packet = tcp::Packet::new_checked(&header[..]).expect("truncated segment");
assert_eq!(tcp::Repr::parse(&packet), repr);
assert!(packet.verify_checksum(src_addr, dst_addr));
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in parts from `smoltcp` originally distributed under 0-clause BSD
use core::fmt;

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

pub mod checksum;
pub mod ethernet;
mod error;
pub mod ipv4;
pub mod tcp;

pub use self::error::{Error, Result};

pub use self::ipv4::{
    Address as Ipv4Address,
    Protocol as IpProtocol,
};

pub use self::tcp::{
    Flags as TcpFlags,
    SeqNumber as TcpSeqNumber,
};

/// One side of a TCP conversation: an IPv4 address and a port.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct Endpoint {
    /// The IPv4 address of the host.
    pub addr: Ipv4Address,
    /// The TCP port on that host.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    pub const fn new(addr: Ipv4Address, port: u16) -> Self {
        Endpoint { addr, port }
    }
}

impl From<::std::net::SocketAddrV4> for Endpoint {
    fn from(addr: ::std::net::SocketAddrV4) -> Self {
        Endpoint::new((*addr.ip()).into(), addr.port())
    }
}

impl From<Endpoint> for ::std::net::SocketAddrV4 {
    fn from(endpoint: Endpoint) -> Self {
        ::std::net::SocketAddrV4::new(endpoint.addr.into(), endpoint.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
