// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;

use super::{ifreq, Descriptor, Errno, LibcResult, IoctlResult};
use crate::wire::Ipv4Address;
use libc;

pub(crate) const ETH_P_ALL:       libc::c_short = 0x0003;
pub(crate) const PACKET_OUTGOING: libc::c_uchar = 4;

/// Size of the kernel's `struct ifreq`, the name followed by a 24 byte union.
const IFREQ_LEN: usize = libc::IF_NAMESIZE + 24;

/// Adds a method to look up the index of an interface.
pub(crate) trait IfIndex {
    fn get_if_index(&mut self, fd: libc::c_int) -> Result<libc::c_int, Errno>;
}

/// Adds a method to look up the primary IPv4 address of an interface.
pub(crate) trait IfAddr {
    fn get_if_addr(&mut self, fd: libc::c_int) -> Result<Ipv4Address, Errno>;
}

impl ifreq {
    pub(crate) const SIOCGIFADDR:  libc::Ioctl = 0x8915;
    pub(crate) const SIOCGIFINDEX: libc::Ioctl = 0x8933;
}

impl IfIndex for ifreq {
    fn get_if_index(&mut self, fd: libc::c_int) -> Result<libc::c_int, Errno> {
        #[repr(C)]
        struct Request {
            interface: ifreq,
            ifr_ifindex: libc::c_int,
            _pad: [u8; IFREQ_LEN - libc::IF_NAMESIZE - mem::size_of::<libc::c_int>()],
        }

        let mut request = Request {
            interface: *self,
            ifr_ifindex: 0,
            _pad: [0; IFREQ_LEN - libc::IF_NAMESIZE - mem::size_of::<libc::c_int>()],
        };

        let res = unsafe {
            libc::ioctl(fd, Self::SIOCGIFINDEX, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        Ok(request.ifr_ifindex)
    }
}

impl IfAddr for ifreq {
    fn get_if_addr(&mut self, fd: libc::c_int) -> Result<Ipv4Address, Errno> {
        #[repr(C)]
        struct Request {
            interface: ifreq,
            ifr_addr: libc::sockaddr_in,
            _pad: [u8; IFREQ_LEN - libc::IF_NAMESIZE - mem::size_of::<libc::sockaddr_in>()],
        }

        let mut request = Request {
            interface: *self,
            ifr_addr: libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: 0,
                sin_addr: libc::in_addr { s_addr: 0 },
                sin_zero: [0; 8],
            },
            _pad: [0; IFREQ_LEN - libc::IF_NAMESIZE - mem::size_of::<libc::sockaddr_in>()],
        };

        let res = unsafe {
            libc::ioctl(fd, Self::SIOCGIFADDR, &mut request as *mut _)
        };

        IoctlResult(res).errno()?;

        // `s_addr` holds the octets in network order already.
        Ok(Ipv4Address(request.ifr_addr.sin_addr.s_addr.to_ne_bytes()))
    }
}

/// Query the primary IPv4 address assigned to the named interface.
///
/// Fails with `EADDRNOTAVAIL` if the interface has no IPv4 address and `ENODEV` if there is no
/// interface of that name.
pub fn interface_ipv4(name: &str) -> Result<Ipv4Address, Errno> {
    let socket = Descriptor::new(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0)?;
    ifreq::new(name).get_if_addr(socket.0)
}
