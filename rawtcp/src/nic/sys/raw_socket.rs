// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use core::{mem, ptr};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use libc;
use super::{ifreq, linux, wait, Descriptor, Errno, IoLenResult, LibcResult, FdResult};
use super::linux::IfIndex;

use crate::Error;
use crate::nic::{self, Capture};
use crate::wire::Endpoint;

/// A raw IP socket in header-inclusion mode.
///
/// Every datagram handed to it must start with a complete IPv4 header. The kernel only fills in
/// what the header leaves at zero, which for datagrams of this crate is nothing but the
/// identification when fragmenting.
#[derive(Debug)]
pub struct RawSocket {
    lower: Descriptor,
}

/// A socket observing inbound traffic at the IP or the link level.
///
/// The IP level delivers every TCP datagram addressed to this host, including those the kernel
/// also handles itself. The link level delivers all frames of an interface (or of all interfaces)
/// with their Ethernet header. Frames sent by the host itself are skipped.
#[derive(Debug)]
pub struct CaptureSocket {
    lower: Descriptor,
    capture: Capture,
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower.0
    }
}

impl AsRawFd for CaptureSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower.0
    }
}

impl RawSocket {
    /// Open a raw socket for sending complete datagrams.
    ///
    /// Requires `CAP_NET_RAW`.
    pub fn new() -> Result<Self, Errno> {
        let lower = Descriptor::new(
            libc::AF_INET,
            libc::SOCK_RAW | libc::SOCK_CLOEXEC,
            libc::IPPROTO_RAW)?;

        // Implied by `IPPROTO_RAW` but spelled out.
        let on: libc::c_int = 1;
        lower.set_option(libc::IPPROTO_IP, libc::IP_HDRINCL, &on)?;

        Ok(RawSocket { lower })
    }

    /// Send a single datagram, returning the number of bytes the kernel accepted.
    pub fn send_to(&mut self, dst: Endpoint, datagram: &[u8]) -> Result<usize, Errno> {
        let sockaddr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: dst.port.to_be(),
            sin_addr: libc::in_addr { s_addr: u32::from_ne_bytes(dst.addr.0) },
            sin_zero: [0; 8],
        };

        let len = unsafe {
            libc::sendto(
                self.lower.0,
                datagram.as_ptr() as *const libc::c_void,
                datagram.len(),
                0,
                &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }
}

impl CaptureSocket {
    /// Open a capture socket on the given level.
    ///
    /// The socket receives from all interfaces until bound with [`bind_interface`]. Requires
    /// `CAP_NET_RAW`.
    ///
    /// [`bind_interface`]: #method.bind_interface
    pub fn new(capture: Capture) -> Result<Self, Errno> {
        let kind = libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
        let lower = match capture {
            Capture::Ip => Descriptor::new(libc::AF_INET, kind, libc::IPPROTO_TCP)?,
            Capture::Link => Descriptor::new(
                libc::AF_PACKET,
                kind,
                linux::ETH_P_ALL.to_be() as libc::c_int)?,
        };

        Ok(CaptureSocket { lower, capture })
    }

    /// Only receive from the named interface.
    ///
    /// See `bind` with `AF_PACKET` and `ETH_P_ALL` for the link level and `SO_BINDTODEVICE` for
    /// the IP level.
    pub fn bind_interface(&mut self, name: &str) -> Result<(), Errno> {
        let mut ifreq = ifreq::new(name);
        match self.capture {
            Capture::Ip => {
                let res = unsafe {
                    libc::setsockopt(
                        self.lower.0,
                        libc::SOL_SOCKET,
                        libc::SO_BINDTODEVICE,
                        ifreq.ifr_name.as_ptr() as *const libc::c_void,
                        ifreq.ifr_name.len() as libc::socklen_t)
                };
                FdResult(res).errno()
            },
            Capture::Link => {
                let sockaddr = libc::sockaddr_ll {
                    sll_family:   libc::AF_PACKET as u16,
                    sll_protocol: linux::ETH_P_ALL.to_be() as u16,
                    sll_ifindex:  ifreq.get_if_index(self.lower.0)?,
                    sll_hatype:   1,
                    sll_pkttype:  0,
                    sll_halen:    6,
                    sll_addr:     [0; 8],
                };

                let res = unsafe {
                    libc::bind(
                        self.lower.0,
                        &sockaddr as *const libc::sockaddr_ll as *const libc::sockaddr,
                        mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t)
                };

                FdResult(res).errno()
            },
        }
    }

    /// The level this socket captures at.
    pub fn capture(&self) -> Capture {
        self.capture
    }

    /// Receive a single frame into the buffer, without blocking.
    ///
    /// Returns the length of the frame on the wire, which exceeds the buffer length if the frame
    /// was truncated. Returns `Ok(None)` if no frame was ready or if the frame was one sent by the
    /// host itself.
    pub fn recv(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, Errno> {
        let mut sockaddr = mem::MaybeUninit::<libc::sockaddr_ll>::zeroed();
        let mut addrlen = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;

        let (addr_ptr, addrlen_ptr) = match self.capture {
            Capture::Ip => (ptr::null_mut(), ptr::null_mut()),
            Capture::Link => (
                sockaddr.as_mut_ptr() as *mut libc::sockaddr,
                &mut addrlen as *mut libc::socklen_t,
            ),
        };

        let len = unsafe {
            libc::recvfrom(
                self.lower.0,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                libc::MSG_TRUNC,
                addr_ptr,
                addrlen_ptr)
        };

        match IoLenResult(len).errno() {
            Ok(()) => (),
            Err(err) if err.would_block() => return Ok(None),
            Err(err) => return Err(err),
        }

        if self.capture == Capture::Link {
            // Zero initialized, and only ever written by the kernel.
            let sockaddr = unsafe { sockaddr.assume_init() };
            if sockaddr.sll_pkttype == linux::PACKET_OUTGOING {
                return Ok(None);
            }
        }

        Ok(Some(len as usize))
    }
}

impl nic::Tx for RawSocket {
    fn send(&mut self, dst: Endpoint, datagram: &[u8]) -> crate::Result<()> {
        let written = self.send_to(dst, datagram)
            .map_err(|err| Error::io("sendto", err.into()))?;

        if written != datagram.len() {
            return Err(Error::ShortWrite { written, len: datagram.len() });
        }

        Ok(())
    }
}

impl nic::Rx for CaptureSocket {
    fn capture(&self) -> Capture {
        self.capture
    }

    fn recv(&mut self, buffer: &mut [u8], timeout: Option<Duration>)
        -> crate::Result<Option<usize>>
    {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            match CaptureSocket::recv(self, buffer) {
                Ok(Some(len)) => return Ok(Some(len)),
                Ok(None) => (),
                Err(err) => return Err(Error::io("recvfrom", err.into())),
            }

            let remaining = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    Some(deadline - now)
                },
            };

            wait(self.lower.0, remaining)
                .map_err(|err| Error::io("select", err.into()))?;
        }
    }
}
