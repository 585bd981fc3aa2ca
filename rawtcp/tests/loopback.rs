//! Exchanges with a kernel socket on the loopback interface.
//!
//! These need `CAP_NET_RAW` and the kernel must be kept from resetting the connection it never
//! opened, for example with:
//!
//! ```text
//! iptables -A OUTPUT -o lo -p tcp --sport 25566 --tcp-flags RST RST -j DROP
//! ```
//!
//! Run them with `cargo test -- --ignored`.
#![cfg(target_os = "linux")]
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use rawtcp::exchange::{Config, Exchange, State};
use rawtcp::latency::measure_round_trip;
use rawtcp::nic::{sys::{CaptureSocket, RawSocket}, Capture};
use rawtcp::wire::{Endpoint, Ipv4Address};

const BODY: &[u8] = b"{\"hello\":\"world\"}";

fn request() -> Vec<u8> {
    let mut request = format!(
        "POST / HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        BODY.len()).into_bytes();
    request.extend_from_slice(BODY);
    request
}

/// Serve exactly one request, returning what was read.
fn serve_once(port: u16) -> thread::JoinHandle<Vec<u8>> {
    let listener = TcpListener::bind(("127.0.0.1", port)).expect("Binding listener failed");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("Accepting failed");
        let mut buffer = [0; 1024];
        let len = stream.read(&mut buffer).expect("Reading request failed");
        stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
            .expect("Writing response failed");
        buffer[..len].to_vec()
    })
}

fn exchange(capture: Capture, port: u16) -> Exchange<RawSocket, CaptureSocket> {
    let tx = RawSocket::new().expect("Opening raw socket failed");
    let mut rx = CaptureSocket::new(capture).expect("Opening capture socket failed");
    if capture == Capture::Link {
        rx.bind_interface("lo").expect("Binding to lo failed");
    }

    let config = Config::new(
            Endpoint::new(Ipv4Address::LOOPBACK, 25566),
            Endpoint::new(Ipv4Address::LOOPBACK, port))
        .payload(request())
        .timeout(Duration::from_secs(5));

    Exchange::new(config, tx, rx)
}

#[test]
#[ignore]
fn http_post_ip_level() {
    let server = serve_once(8080);
    let mut exchange = exchange(Capture::Ip, 8080);

    let response = exchange.run().expect("Exchange failed");
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(exchange.state(), State::Done);

    let seen = server.join().unwrap();
    assert!(seen.ends_with(BODY));
}

#[test]
#[ignore]
fn http_post_link_level() {
    let server = serve_once(8081);
    let mut exchange = exchange(Capture::Link, 8081);

    let response = exchange.run().expect("Exchange failed");
    assert!(response.ends_with(b"ok"));
    server.join().unwrap();
}

#[test]
#[ignore]
fn send_tcp_data_from_strings() {
    let server = serve_once(8083);

    let response = rawtcp::send_tcp_data("127.0.0.1", 8083, "127.0.0.1", 25566, &request())
        .expect("Exchange failed");
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));

    let seen = server.join().unwrap();
    assert!(seen.ends_with(BODY));
}

#[test]
#[ignore]
fn round_trip_over_loopback() {
    let server = serve_once(8082);
    let mut exchange = exchange(Capture::Ip, 8082);

    let round_trip = measure_round_trip(&mut exchange).expect("Exchange failed");
    println!("SYN-ACK after {:?}, response after {:?}", round_trip.syn_ack, round_trip.full);
    assert!(round_trip.full >= round_trip.syn_ack);
    server.join().unwrap();
}
