//! The 20 octet TCP header, its flags and sequence numbers.
use core::{convert::TryFrom, fmt, ops};
use byteorder::{ByteOrder, NetworkEndian};

use super::{checksum, Error, Result};
use super::ipv4::{Address, Protocol};

/// Length of a TCP header without options.
pub const HEADER_LEN: usize = 20;

/// The pseudo header length of a segment, if it has one.
fn segment_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::Oversized)
}

/// The window advertised in every emitted header.
///
/// Nothing is ever buffered beyond a single receive so the value is not enforced in any way.
pub const WINDOW_LEN: u16 = 8192;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub u32);

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > u32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as u32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

/// A set of tcp flags.
///
/// Only the six classic control bits are named, the remaining bits of the flag octet are kept as
/// they were found when parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u8);

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const OFFSET:   usize = 12;
    pub(crate) const FLAGS:    usize = 13;
    pub(crate) const OFF_FLG:  Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u8 = 0x01;
    pub(crate) const FLG_SYN: u8 = 0x02;
    pub(crate) const FLG_RST: u8 = 0x04;
    pub(crate) const FLG_PSH: u8 = 0x08;
    pub(crate) const FLG_ACK: u8 = 0x10;
    pub(crate) const FLG_URG: u8 = 0x20;
}

impl Flags {
    /// No flags at all.
    pub const NONE: Flags = Flags(0);
    /// The FIN flag alone.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag alone.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag alone.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag alone.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag alone.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag alone.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Collect flags from their lowercase names.
    ///
    /// The recognized names are `fin`, `syn`, `rst`, `psh`, `ack` and `urg`. Anything else is
    /// ignored, naming a flag twice has no further effect.
    ///
    /// ```
    /// use rawtcp::wire::tcp::Flags;
    /// assert_eq!(Flags::from_names(&["psh", "ack"]).bits(), 0b011000);
    /// assert_eq!(Flags::from_names(vec!["syn", "bogus"]), Flags::SYN);
    /// ```
    pub fn from_names<I>(names: I) -> Flags
        where I: IntoIterator, I::Item: AsRef<str>,
    {
        let mut flags = Flags::NONE;
        for name in names {
            match name.as_ref() {
                "fin" => flags.set_fin(true),
                "syn" => flags.set_syn(true),
                "rst" => flags.set_rst(true),
                "psh" => flags.set_psh(true),
                "ack" => flags.set_ack(true),
                "urg" => flags.set_urg(true),
                _ => (),
            }
        }
        flags
    }

    /// The raw flag octet.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Check if all flags of `other` are set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    /// Set the URG flag.
    #[inline]
    pub fn set_urg(&mut self, value: bool) {
        self.set(field::FLG_URG, value)
    }

    fn set(&mut self, flag: u8, value: bool) {
        let flag = if value { flag } else { 0 };
        let without = self.0 & !flag;
        self.0 = without | flag;
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.fin(), "FIN"), (self.syn(), "SYN"), (self.rst(), "RST"),
            (self.psh(), "PSH"), (self.ack(), "ACK"), (self.urg(), "URG"),
        ];

        let mut first = true;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str("+")?;
            }
            f.write_str(name)?;
            first = false;
        }

        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// A read/write wrapper around a Transmission Control Protocol packet buffer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet<T> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with TCP packet structure.
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

    /// Ensure that no header accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the fixed header or than the
    /// header length claimed by the data offset. Returns `Err(Error::Malformed)` if the data
    /// offset points inside the fixed header.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < field::URGENT.end {
            Err(Error::Truncated)
        } else {
            let header_len = self.header_len() as usize;
            if len < header_len {
                Err(Error::Truncated)
            } else if header_len < field::URGENT.end {
                Err(Error::Malformed)
            } else {
                Ok(())
            }
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_u32(&data[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        let data = self.buffer.as_ref();
        SeqNumber(NetworkEndian::read_u32(&data[field::ACK_NUM]))
    }

    /// Return the data offset, in 32-bit words.
    #[inline]
    pub fn data_offset(&self) -> u8 {
        let data = self.buffer.as_ref();
        data[field::OFFSET] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        self.data_offset() * 4
    }

    /// Read all flags at once.
    #[inline]
    pub fn flags(&self) -> Flags {
        let data = self.buffer.as_ref();
        Flags(data[field::FLAGS])
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        let data = self.buffer.as_ref();
        NetworkEndian::read_u16(&data[field::URGENT])
    }

    /// Validate the packet checksum.
    ///
    /// The buffer must contain the whole segment, header and payload, and nothing else. A buffer
    /// longer than 65535 octets never verifies.
    pub fn verify_checksum(&self, src_addr: Address, dst_addr: Address) -> bool {
        let data = self.buffer.as_ref();
        let length = match segment_len(data.len()) {
            Ok(length) => length,
            Err(_) => return false,
        };

        checksum::combine(&[
            checksum::pseudo_header_sum(src_addr, dst_addr, Protocol::Tcp, length),
            checksum::data(data),
        ]) == !0
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return a pointer to the payload.
    #[inline]
    pub fn payload_slice(&self) -> &'a [u8] {
        let header_len = self.header_len() as usize;
        let data = T::as_ref(self.buffer);
        &data[header_len..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u32(&mut data[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u32(&mut data[field::ACK_NUM], value.0)
    }

    /// Set data offset, reserved bits and flags in one go.
    ///
    /// The 16-bit field is `data_offset << 12 | 0 << 9 | flags`.
    #[inline]
    pub fn set_offset_and_flags(&mut self, data_offset: u8, Flags(flags): Flags) {
        let data = self.buffer.as_mut();
        let raw = (u16::from(data_offset) << 12) | (0 << 9) | u16::from(flags & 0x3f);
        NetworkEndian::write_u16(&mut data[field::OFF_FLG], raw)
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        let data = self.buffer.as_mut();
        NetworkEndian::write_u16(&mut data[field::URGENT], value)
    }

    /// Compute and fill in the checksum of a buffer holding the complete segment.
    ///
    /// Returns `Err(Error::Oversized)` and leaves the buffer untouched if it is longer than
    /// 65535 octets.
    pub fn fill_checksum(&mut self, src_addr: Address, dst_addr: Address) -> Result<()> {
        let length = segment_len(self.buffer.as_ref().len())?;
        self.set_checksum(0);
        let checksum = {
            let data = self.buffer.as_ref();
            !checksum::combine(&[
                checksum::pseudo_header_sum(src_addr, dst_addr, Protocol::Tcp, length),
                checksum::data(data),
            ])
        };
        self.set_checksum(checksum);
        Ok(())
    }
}

/// A high-level representation of a TCP header without options.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Repr {
    /// The sending port.
    pub src_port: u16,
    /// The receiving port.
    pub dst_port: u16,
    /// Sequence number of the first octet (or of the SYN).
    pub seq_number: SeqNumber,
    /// The acknowledgement number, meaningful only with the ACK flag.
    pub ack_number: SeqNumber,
    /// The control flags.
    pub flags: Flags,
    /// The advertised window.
    pub window_len: u16,
}

impl Repr {
    /// Parse a TCP header and return a high-level representation.
    pub fn parse<T: AsRef<[u8]>>(packet: &Packet<T>) -> Repr {
        Repr {
            src_port: packet.src_port(),
            dst_port: packet.dst_port(),
            seq_number: packet.seq_number(),
            ack_number: packet.ack_number(),
            flags: packet.flags(),
            window_len: packet.window_len(),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into a TCP header.
    ///
    /// The checksum and urgent pointer are zeroed, the checksum must be filled afterwards once
    /// the payload is in place.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, packet: &mut Packet<T>) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        packet.set_ack_number(self.ack_number);
        packet.set_offset_and_flags((HEADER_LEN / 4) as u8, self.flags);
        packet.set_window_len(self.window_len);
        packet.set_checksum(0);
        packet.set_urgent_at(0);
    }
}

/// Encode a 20 octet TCP header whose checksum covers `payload`.
///
/// The checksum is computed over the pseudo header, this header and the payload, in that order.
/// The payload itself is not part of the result; it must follow the header on the wire. Fails
/// with `Error::Oversized` if header and payload together exceed 65535 octets.
pub fn encode_header(src_addr: Address, dst_addr: Address, repr: &Repr, payload: &[u8])
    -> Result<[u8; HEADER_LEN]>
{
    let length = segment_len(HEADER_LEN + payload.len())?;
    let mut header = [0u8; HEADER_LEN];
    let mut packet = Packet::new_unchecked(&mut header[..]);
    repr.emit(&mut packet);

    let sum = checksum::combine(&[
        checksum::pseudo_header_sum(src_addr, dst_addr, Protocol::Tcp, length),
        checksum::data(&packet.buffer[..]),
        checksum::data(payload),
    ]);
    packet.set_checksum(!sum);

    Ok(header)
}

/// Decode a TCP header, returning its representation and the payload.
pub fn decode_header(bytes: &[u8]) -> Result<(Repr, &[u8])> {
    let packet = Packet::new_checked(bytes)?;
    Ok((Repr::parse(&packet), packet.payload_slice()))
}
