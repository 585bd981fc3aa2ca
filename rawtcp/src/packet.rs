//! Building complete datagrams and taking received ones apart.
//!
//! A datagram sent by this crate is always `IPv4 header || TCP header || payload` with both
//! headers exactly 20 octets long. The builder is pure, it only composes the encoders of the
//! [`wire`] module and never touches a socket.
//!
//! [`wire`]: ../wire/index.html
use crate::{Error, Result};
use crate::wire::{ipv4, tcp, Endpoint, Ipv4Address, TcpFlags, TcpSeqNumber};

/// Length of a datagram without payload.
pub const BARE_LEN: usize = ipv4::HEADER_LEN + tcp::HEADER_LEN;

/// The longest payload that still fits the IPv4 total length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - BARE_LEN;

/// One outbound TCP segment with its addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Our side, written as the source.
    pub src: Endpoint,
    /// The peer, written as the destination.
    pub dst: Endpoint,
    /// The sequence number.
    pub seq_number: TcpSeqNumber,
    /// The acknowledgement number.
    pub ack_number: TcpSeqNumber,
    /// The control flags.
    pub flags: TcpFlags,
    /// Data following the TCP header.
    pub payload: &'a [u8],
    /// A TCP checksum to write verbatim instead of the computed one.
    pub checksum: Option<u16>,
}

impl<'a> Segment<'a> {
    /// A segment without payload and with a computed checksum.
    pub fn new(src: Endpoint, dst: Endpoint, flags: TcpFlags) -> Self {
        Segment {
            src,
            dst,
            seq_number: TcpSeqNumber(0),
            ack_number: TcpSeqNumber(0),
            flags,
            payload: &[],
            checksum: None,
        }
    }

    /// The TCP header representation of this segment.
    pub fn tcp_repr(&self) -> tcp::Repr {
        tcp::Repr {
            src_port: self.src.port,
            dst_port: self.dst.port,
            seq_number: self.seq_number,
            ack_number: self.ack_number,
            flags: self.flags,
            window_len: tcp::WINDOW_LEN,
        }
    }

    /// Length of the complete datagram.
    pub fn datagram_len(&self) -> usize {
        BARE_LEN + self.payload.len()
    }

    /// Build the complete datagram.
    ///
    /// The IPv4 header keeps its fixed static fields, except that the total length and the header
    /// checksum are patched when the payload is not empty.
    pub fn build(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong { len: self.payload.len() });
        }

        let mut datagram = Vec::with_capacity(self.datagram_len());
        datagram.extend_from_slice(&ipv4::encode_header(self.src.addr, self.dst.addr));
        datagram.extend_from_slice(&tcp::encode_header(
            self.src.addr,
            self.dst.addr,
            &self.tcp_repr(),
            self.payload)?);
        datagram.extend_from_slice(self.payload);

        if datagram.len() > usize::from(ipv4::TOTAL_LEN) {
            let mut packet = ipv4::Packet::new_unchecked(&mut datagram[..]);
            packet.set_total_len(self.datagram_len() as u16);
            packet.fill_checksum();
        }

        if let Some(checksum) = self.checksum {
            tcp::Packet::new_unchecked(&mut datagram[ipv4::HEADER_LEN..]).set_checksum(checksum);
        }

        Ok(datagram)
    }
}

/// Parse a dotted-decimal IPv4 host string.
pub fn parse_address(host: &str) -> Result<Ipv4Address> {
    host.parse().map_err(|source| Error::Address {
        addr: host.to_owned(),
        source,
    })
}

/// Build a datagram from textual addresses.
///
/// Both hosts must be dotted-decimal IPv4 addresses, resolving names is up to the caller.
///
/// ```
/// use rawtcp::packet::build_packet;
/// use rawtcp::wire::TcpFlags;
///
/// let syn = build_packet("127.0.0.1", 8080, "127.0.0.1", 25566, 0, 0, TcpFlags::SYN, &[])
///     .unwrap();
/// assert_eq!(syn.len(), 40);
/// assert!(build_packet("127.0.0", 8080, "127.0.0.1", 25566, 0, 0, TcpFlags::SYN, &[]).is_err());
/// ```
#[allow(clippy::too_many_arguments)]
pub fn build_packet(
    dst_host: &str,
    dst_port: u16,
    src_host: &str,
    src_port: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let dst = Endpoint::new(parse_address(dst_host)?, dst_port);
    let src = Endpoint::new(parse_address(src_host)?, src_port);

    Segment {
        seq_number: TcpSeqNumber(seq),
        ack_number: TcpSeqNumber(ack),
        payload,
        ..Segment::new(src, dst, flags)
    }.build()
}

/// A received TCP/IP datagram, decoded and copied out of the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// The IPv4 header.
    pub ip: ipv4::Repr,
    /// The TCP header.
    pub tcp: tcp::Repr,
    /// The TCP payload, without any link layer padding.
    pub payload: Vec<u8>,
}

impl Inbound {
    /// Decode an IPv4 datagram carrying TCP.
    ///
    /// Checksums are not verified. Datagrams looped back by the local host routinely carry a
    /// checksum that was left for the hardware to complete.
    pub fn decode(bytes: &[u8]) -> crate::wire::Result<Self> {
        let (ip, segment) = ipv4::decode_header(bytes)?;
        if ip.protocol != ipv4::Protocol::Tcp {
            return Err(crate::wire::Error::Unrecognized);
        }

        let (tcp, payload) = tcp::decode_header(segment)?;
        Ok(Inbound {
            ip,
            tcp,
            payload: payload.to_vec(),
        })
    }

    /// Decode a datagram, additionally requiring both checksums to be correct.
    pub fn decode_verified(bytes: &[u8]) -> crate::wire::Result<Self> {
        let inbound = Self::decode(bytes)?;

        let ip = ipv4::Packet::new_unchecked(bytes);
        let segment = tcp::Packet::new_unchecked(ip.payload());
        if !ip.verify_checksum() || !segment.verify_checksum(inbound.ip.src_addr, inbound.ip.dst_addr) {
            return Err(crate::wire::Error::WrongChecksum);
        }

        Ok(inbound)
    }

    /// The sending side.
    pub fn src(&self) -> Endpoint {
        Endpoint::new(self.ip.src_addr, self.tcp.src_port)
    }

    /// The receiving side.
    pub fn dst(&self) -> Endpoint {
        Endpoint::new(self.ip.dst_addr, self.tcp.dst_port)
    }
}

/// Decode a datagram handed in from elsewhere.
pub fn decode_packet(bytes: &[u8]) -> Result<Inbound> {
    Ok(Inbound::decode(bytes)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::checksum;

    const CLIENT: Endpoint = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 25566);
    const SERVER: Endpoint = Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 8080);

    #[test]
    fn bare_syn() {
        let datagram = Segment::new(CLIENT, SERVER, TcpFlags::SYN).build().unwrap();
        assert_eq!(datagram.len(), BARE_LEN);
        assert_eq!(&datagram[..20], &ipv4::encode_header(CLIENT.addr, SERVER.addr));

        let inbound = decode_packet(&datagram).unwrap();
        assert_eq!(inbound.src(), CLIENT);
        assert_eq!(inbound.dst(), SERVER);
        assert_eq!(inbound.tcp.flags, TcpFlags::SYN);
        assert_eq!(inbound.tcp.window_len, tcp::WINDOW_LEN);
        assert!(inbound.payload.is_empty());
        assert!(Inbound::decode_verified(&datagram).is_ok());
    }

    #[test]
    fn payload_patches_total_len() {
        let payload = b"GET / HTTP/1.0\r\n\r\n";
        let datagram = Segment {
            seq_number: TcpSeqNumber(1),
            ack_number: TcpSeqNumber(1001),
            payload,
            ..Segment::new(CLIENT, SERVER, TcpFlags::PSH | TcpFlags::ACK)
        }.build().unwrap();

        assert_eq!(datagram.len(), BARE_LEN + payload.len());
        let ip = ipv4::Packet::new_checked(&datagram[..]).unwrap();
        assert_eq!(ip.total_len() as usize, datagram.len());
        assert!(ip.verify_checksum());
        assert_eq!(checksum::checksum(&datagram[..20]), 0);

        let inbound = Inbound::decode_verified(&datagram).unwrap();
        assert_eq!(inbound.tcp.seq_number, TcpSeqNumber(1));
        assert_eq!(inbound.tcp.ack_number, TcpSeqNumber(1001));
        assert_eq!(&inbound.payload[..], &payload[..]);
    }

    #[test]
    fn checksum_override() {
        let datagram = Segment {
            checksum: Some(0xbeef),
            ..Segment::new(CLIENT, SERVER, TcpFlags::SYN)
        }.build().unwrap();

        assert_eq!(&datagram[36..38], &[0xbe, 0xef]);
        assert!(decode_packet(&datagram).is_ok());
        assert_eq!(Inbound::decode_verified(&datagram), Err(crate::wire::Error::WrongChecksum));
    }

    #[test]
    fn textual_addresses() {
        let datagram = build_packet(
            "10.0.0.2", 8080, "10.0.0.1", 25566, 7, 9, TcpFlags::ACK, &[]).unwrap();
        let inbound = decode_packet(&datagram).unwrap();
        assert_eq!(inbound.src(), CLIENT);
        assert_eq!(inbound.dst(), SERVER);
        assert_eq!(inbound.tcp.seq_number, TcpSeqNumber(7));
        assert_eq!(inbound.tcp.ack_number, TcpSeqNumber(9));
    }

    #[test]
    fn bad_addresses() {
        for host in ["10.0.0", "10.0.0.256", "::1", "example.com"].iter() {
            match build_packet(host, 80, "10.0.0.1", 1, 0, 0, TcpFlags::SYN, &[]) {
                Err(Error::Address { addr, .. }) => assert_eq!(&addr, host),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn oversized_payload() {
        let payload = vec![0; MAX_PAYLOAD_LEN + 1];
        let segment = Segment { payload: &payload, ..Segment::new(CLIENT, SERVER, TcpFlags::PSH) };
        match segment.build() {
            Err(Error::PayloadTooLong { len }) => assert_eq!(len, MAX_PAYLOAD_LEN + 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_other_protocols() {
        let mut datagram = Segment::new(CLIENT, SERVER, TcpFlags::SYN).build().unwrap();
        datagram[9] = 0x11;
        assert!(matches!(decode_packet(&datagram), Err(Error::Wire(crate::wire::Error::Unrecognized))));
        assert_eq!(decode_packet(&datagram[..30]).unwrap_err().to_string(), "invalid datagram: truncated packet");
    }
}
