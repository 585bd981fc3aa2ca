//! The Internet checksum of RFC 1071.
//!
//! The checksum is the one's complement of the one's complement sum of all 16-bit big-endian
//! words in the data. An odd trailing octet is summed as if padded with a zero octet on the
//! right. Summing a buffer that already contains its correct checksum yields `0xffff`, so the
//! final [`checksum`] of such a buffer is zero.
//!
//! [`checksum`]: fn.checksum.html
use byteorder::{ByteOrder, NetworkEndian};

use super::ipv4::{Address, Protocol};

/// Length of the IPv4 pseudo header prepended for transport checksums.
pub const PSEUDO_HEADER_LEN: usize = 12;

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 compliant sum (without the final complement).
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        // Keep the accumulator far from overflowing on long buffers.
        accum = propagate_carries(accum) as u32;
        data = &data[CHUNK_SIZE..];
    }

    // Sum the rest that does not fit the last 32-byte chunk,
    // taking by 2 bytes.
    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // Add the last remaining odd byte, if any.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant sums.
pub fn combine(sums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in sums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// The Internet checksum of a buffer.
///
/// This is the complemented sum, ready to be written into a header field. For a TCP segment the
/// buffer must start with the [`pseudo_header`].
///
/// [`pseudo_header`]: fn.pseudo_header.html
pub fn checksum(bytes: &[u8]) -> u16 {
    !data(bytes)
}

/// Build the IPv4 pseudo header.
///
/// Source address, destination address, a zero octet, the protocol number and the length of the
/// transport segment (header and payload) as a big-endian 16-bit value. It is only ever summed,
/// never transmitted.
pub fn pseudo_header(src_addr: Address, dst_addr: Address, protocol: Protocol, length: u16)
    -> [u8; PSEUDO_HEADER_LEN]
{
    let mut header = [0u8; PSEUDO_HEADER_LEN];
    header[0..4].copy_from_slice(src_addr.as_bytes());
    header[4..8].copy_from_slice(dst_addr.as_bytes());
    header[8] = 0;
    header[9] = protocol.into();
    NetworkEndian::write_u16(&mut header[10..12], length);
    header
}

/// The sum of the IPv4 pseudo header, for combining with the sum of a segment.
pub fn pseudo_header_sum(src_addr: Address, dst_addr: Address, protocol: Protocol, length: u16)
    -> u16
{
    data(&pseudo_header(src_addr, dst_addr, protocol, length))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rfc1071_example() {
        let bytes = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(data(&bytes), 0xddf2);
        assert_eq!(checksum(&bytes), 0x220d);
    }

    #[test]
    fn odd_length_pads_low_byte() {
        assert_eq!(data(&[0x01]), 0x0100);
        assert_eq!(data(&[0x12, 0x34, 0x56]), 0x1234 + 0x5600);
    }

    #[test]
    fn empty() {
        assert_eq!(data(&[]), 0);
        assert_eq!(checksum(&[]), 0xffff);
    }

    #[test]
    fn carries_fold_twice() {
        // 0xffff + 0xffff + 0x0001 = 0x1_ffff, folding once leaves 0x1_0000.
        let bytes = [0xff, 0xff, 0xff, 0xff, 0x00, 0x01];
        assert_eq!(data(&bytes), 0x0001);
    }

    #[test]
    fn ipv4_header_known_value() {
        let mut header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00,
            0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8, 0x00, 0x01,
            0xc0, 0xa8, 0x00, 0xc7,
        ];
        let sum = checksum(&header);
        assert_eq!(sum, 0xb861);

        NetworkEndian::write_u16(&mut header[10..12], sum);
        assert_eq!(checksum(&header), 0);
    }

    #[test]
    fn self_verification_on_long_buffers() {
        let mut bytes: Vec<u8> = (0..1001u32).map(|i| (i * 7 + 3) as u8).collect();
        // Reserve a checksum field in the middle, zeroed for computation.
        bytes[100] = 0;
        bytes[101] = 0;
        let sum = checksum(&bytes);
        NetworkEndian::write_u16(&mut bytes[100..102], sum);
        assert_eq!(checksum(&bytes), 0);
    }

    #[test]
    fn combine_equals_concatenation() {
        let a = [0x12, 0x34, 0x56, 0x78];
        let b = [0x9a, 0xbc, 0xde, 0xf0, 0x11, 0x22];
        let whole: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(combine(&[data(&a), data(&b)]), data(&whole));
    }

    #[test]
    fn pseudo_header_layout() {
        let header = pseudo_header(
            Address::new(192, 168, 1, 1),
            Address::new(10, 0, 0, 2),
            Protocol::Tcp,
            0x0123);
        assert_eq!(header, [192, 168, 1, 1, 10, 0, 0, 2, 0, 6, 0x01, 0x23]);
    }
}
