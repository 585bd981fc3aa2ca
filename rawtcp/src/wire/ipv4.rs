//! IPv4 addresses and the 20 octet IPv4 header.
//!
//! Only headers without options are emitted, received headers may carry options which are skipped.
//! The static fields of emitted headers carry fixed
//! values suitable for a minimal TCP datagram, see [`encode_header`].
//!
//! [`encode_header`]: fn.encode_header.html
use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{checksum, Error, Result};

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        /// Internet Control Message Protocol.
        Icmp = 0x01,
        /// Transmission Control Protocol.
        Tcp  = 0x06,
        /// User Datagram Protocol.
        Udp  = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Tcp  => write!(f, "TCP"),
            Protocol::Udp  => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id),
        }
    }
}

/// Length of an IPv4 header without options.
pub const HEADER_LEN: usize = 20;

/// Value of the total length field in [`encode_header`]: one header each of IPv4 and TCP.
///
/// [`encode_header`]: fn.encode_header.html
pub const TOTAL_LEN: u16 = 40;

/// Value of the identification field in [`encode_header`].
///
/// [`encode_header`]: fn.encode_header.html
pub const IDENT: u16 = 0x8df5;

/// Time to live of emitted datagrams.
pub const TTL: u8 = 64;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// The loopback address `127.0.0.1`.
    pub const LOOPBACK:    Address = Address([127, 0, 0, 1]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The address as an integer in host order, e.g. `0xc0a80101` for `192.168.1.1`.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Decode an integer in host order into an address.
    pub fn from_network_integer(num: u32) -> Self {
        Address(num.to_be_bytes())
    }

    /// Query whether the address falls into the "unspecified" range.
    pub fn is_unspecified(&self) -> bool {
        self.0[0] == 0
    }

    /// Query whether the address falls into the "loopback" range.
    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }
}

impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// Error emitted when parsing a dotted-decimal IPv4 address fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAddressError {
    kind: ParseAddressErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseAddressErrorKind {
    /// Not exactly four dot separated components.
    ComponentCount,

    /// A component is not a decimal number between 0 and 255.
    InvalidOctet,
}

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self.kind {
            ParseAddressErrorKind::ComponentCount => "expected four dotted components (only IPv4 is supported)",
            ParseAddressErrorKind::InvalidOctet => "invalid octet",
        })
    }
}

impl std::error::Error for ParseAddressError {}

impl FromStr for Address {
    type Err = ParseAddressError;

    /// Parse a dotted-decimal address such as `192.168.1.1`.
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let mut octets = [0u8; 4];
        let mut parts = s.split('.');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(ParseAddressError {
                kind: ParseAddressErrorKind::ComponentCount,
            })?;

            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseAddressError { kind: ParseAddressErrorKind::InvalidOctet });
            }

            *octet = part.parse().map_err(|_| ParseAddressError {
                kind: ParseAddressErrorKind::InvalidOctet,
            })?;
        }

        if parts.next().is_some() {
            return Err(ParseAddressError { kind: ParseAddressErrorKind::ComponentCount });
        }

        Ok(Address(octets))
    }
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// A read/write wrapper around an Internet Protocol version 4 datagram buffer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet<T> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the header, options
    /// included, or than the total length claimed in the header. Returns `Err(Error::Malformed)`
    /// if the header length is shorter than a header without options or if the total length is
    /// shorter than the header itself.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < field::DST_ADDR.end {
            return Err(Error::Truncated);
        }

        let header_len = self.header_len() as usize;
        let total_len = self.total_len() as usize;
        if header_len < HEADER_LEN {
            Err(Error::Malformed)
        } else if header_len > len {
            Err(Error::Truncated)
        } else if total_len < header_len {
            Err(Error::Malformed)
        } else if total_len > len {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let data = self.buffer.as_ref();
        (data[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::LENGTH])
    }

    /// Return the identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::IDENT])
    }

    /// Return the time to live field.
    #[inline]
    pub fn ttl(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        let data = self.buffer.as_ref();
        Protocol::from(data[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::CHECKSUM])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        let data = self.buffer.as_ref();
        Address::from_bytes(&data[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        let data = self.buffer.as_ref();
        Address::from_bytes(&data[field::DST_ADDR])
    }

    /// Validate the header checksum, which covers the options as well.
    pub fn verify_checksum(&self) -> bool {
        let data = self.buffer.as_ref();
        checksum::data(&data[..self.header_len() as usize]) == !0
    }

    /// Return the options, empty for a header of 20 octets.
    #[inline]
    pub fn options(&self) -> &[u8] {
        let data = self.buffer.as_ref();
        &data[HEADER_LEN..self.header_len() as usize]
    }

    /// Return the payload, everything after the header up to the total length.
    ///
    /// Octets beyond the total length, such as link layer padding, are not part of it.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        let data = self.buffer.as_ref();
        &data[self.header_len() as usize..self.total_len() as usize]
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return the payload with the lifetime of the underlying buffer.
    #[inline]
    pub fn payload_slice(&self) -> &'a [u8] {
        let data = T::as_ref(self.buffer);
        &data[self.header_len() as usize..self.total_len() as usize]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the version field and the header length of a header without options.
    #[inline]
    pub fn set_version_and_header_len(&mut self) {
        let data = self.buffer.as_mut();
        data[field::VER_IHL] = 0x40 | (HEADER_LEN / 4) as u8;
    }

    /// Set the type of service field.
    #[inline]
    pub fn set_dscp_ecn(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::DSCP_ECN] = value;
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::LENGTH], value)
    }

    /// Set the identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::IDENT], value)
    }

    /// Clear the flags and fragment offset field.
    #[inline]
    pub fn clear_flags_and_offset(&mut self) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::FLG_OFF], 0)
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_ttl(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        let data = self.buffer.as_mut();
        data[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        let data = self.buffer.as_mut();
        data[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        let data = self.buffer.as_mut();
        data[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum, options included.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = {
            let data = self.buffer.as_ref();
            checksum::checksum(&data[..self.header_len() as usize])
        };
        self.set_checksum(checksum)
    }
}

/// A high-level representation of an IPv4 header, as far as the exchange cares about it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Repr {
    /// The version nibble, always 4 for a successfully parsed header.
    pub version: u8,
    /// The encapsulated protocol.
    pub protocol: Protocol,
    /// Source address.
    pub src_addr: Address,
    /// Destination address.
    pub dst_addr: Address,
}

impl Repr {
    /// Parse an IPv4 header and return a high-level representation.
    ///
    /// Datagrams of another version are not recognized. Options are not represented, the
    /// payload of the packet starts behind them. The protocol is not checked here, a caller
    /// looking for TCP must compare it.
    pub fn parse<T: AsRef<[u8]>>(packet: &Packet<T>) -> Result<Repr> {
        if packet.version() != 4 {
            return Err(Error::Unrecognized);
        }

        Ok(Repr {
            version: packet.version(),
            protocol: packet.protocol(),
            src_addr: packet.src_addr(),
            dst_addr: packet.dst_addr(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into an IPv4 header with fixed static fields.
    ///
    /// The total length is set to [`TOTAL_LEN`], the identification to [`IDENT`], no fragment
    /// flags, a time to live of [`TTL`] and the header checksum is filled in.
    ///
    /// [`TOTAL_LEN`]: constant.TOTAL_LEN.html
    /// [`IDENT`]: constant.IDENT.html
    /// [`TTL`]: constant.TTL.html
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, packet: &mut Packet<T>) {
        packet.set_version_and_header_len();
        packet.set_dscp_ecn(0);
        packet.set_total_len(TOTAL_LEN);
        packet.set_ident(IDENT);
        packet.clear_flags_and_offset();
        packet.set_ttl(TTL);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
        packet.fill_checksum();
    }
}

/// Encode the 20 octet IPv4 header of a TCP datagram.
///
/// The static fields are fixed and not derived from the real payload; in particular the total
/// length always claims a bare 40 octet TCP/IP datagram. Whoever sends more than that has to
/// patch the total length and refill the checksum, see [`Packet::set_total_len`].
///
/// [`Packet::set_total_len`]: struct.Packet.html#method.set_total_len
pub fn encode_header(src_addr: Address, dst_addr: Address) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    let repr = Repr {
        version: 4,
        protocol: Protocol::Tcp,
        src_addr,
        dst_addr,
    };
    repr.emit(&mut Packet::new_unchecked(&mut header[..]));
    header
}

/// Decode an IPv4 header, returning its representation and payload.
pub fn decode_header(bytes: &[u8]) -> Result<(Repr, &[u8])> {
    let packet = Packet::new_checked(bytes)?;
    let repr = Repr::parse(&packet)?;
    Ok((repr, packet.payload_slice()))
}
