//! Setup around the exchange: everything that looks at the environment.
//!
//! Names are resolved, the source address is looked up and the request is built here, so that
//! the library itself only ever sees explicit addresses.
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{bail, Context, Result};
use rawtcp::nic::sys;
use rawtcp::wire::Ipv4Address;

pub mod config;

/// Resolve a host to its first IPv4 address.
pub fn resolve(host: &str, port: u16) -> Result<Ipv4Address> {
    if let Ok(addr) = host.parse::<Ipv4Address>() {
        return Ok(addr);
    }

    let addrs = (host, port).to_socket_addrs()
        .with_context(|| format!("Resolving {} failed", host))?;

    for addr in addrs {
        if let SocketAddr::V4(addr) = addr {
            return Ok((*addr.ip()).into());
        }
    }

    bail!("{} has no IPv4 address, only IPv4 is supported", host)
}

/// Choose the source address of the exchange.
///
/// An explicit address wins, then the address of the interface. Without either only a loopback
/// destination has an obvious source.
pub fn source_address(config: &config::Config, dst: Ipv4Address) -> Result<Ipv4Address> {
    if let Some(src) = config.src {
        return Ok(src.into());
    }

    if let Some(iface) = &config.iface {
        return sys::interface_ipv4(iface)
            .map_err(io::Error::from)
            .with_context(|| format!("Looking up the address of {} failed", iface));
    }

    if dst.is_loopback() {
        return Ok(dst);
    }

    bail!("No source address, pass --src or --iface")
}

/// A minimal HTTP/1.1 POST request with a JSON body.
pub fn http_request(host: &str, body: &str) -> Vec<u8> {
    format!(
        "POST / HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        host, body.len(), body).into_bytes()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_literals() {
        assert_eq!(resolve("127.0.0.1", 80).unwrap(), Ipv4Address::LOOPBACK);
        assert_eq!(resolve("10.1.2.3", 80).unwrap(), Ipv4Address::new(10, 1, 2, 3));
        assert!(resolve("::1", 80).is_err());
    }

    #[test]
    fn request_layout() {
        let request = http_request("example.com", r#"{"hello":"world"}"#);
        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("POST / HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(request.contains("Content-Length: 17\r\n"));
        assert!(request.ends_with("\r\n\r\n{\"hello\":\"world\"}"));
    }

    #[test]
    fn loopback_source() {
        let config = config::Config {
            host: "127.0.0.1".into(),
            port: 8080,
            src: None,
            iface: None,
            src_port: 25566,
            capture: Default::default(),
            timeout_ms: None,
            data: String::new(),
            latency: false,
        };

        assert_eq!(source_address(&config, Ipv4Address::LOOPBACK).unwrap(), Ipv4Address::LOOPBACK);
        assert!(source_address(&config, Ipv4Address::new(10, 0, 0, 1)).is_err());

        let config = config::Config { src: Some("10.0.0.9".parse().unwrap()), ..config };
        assert_eq!(source_address(&config, Ipv4Address::new(10, 0, 0, 1)).unwrap(),
            Ipv4Address::new(10, 0, 0, 9));
    }
}
