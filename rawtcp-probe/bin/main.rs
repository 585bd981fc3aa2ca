//! Performs a single exchange with a remote TCP server over raw sockets.
//!
//! Sends a SYN, answers the SYN-ACK, pushes one HTTP request and prints whatever comes back in
//! the first segment with data. Call example:
//!
//! * `rawtcp-probe 127.0.0.1 8080 --timeout-ms 2000`
//! * `rawtcp-probe example.com 80 -i eth0 --capture link --latency`
//!
//! Set `RUST_LOG=rawtcp=debug` to follow the state machine, `trace` also shows every dropped frame.
use anyhow::{Context, Result};
use log::{info, warn};

use rawtcp::client::{open_sockets, send_with};
use rawtcp::exchange::{Config, Exchange};
use rawtcp::latency::measure_round_trip;
use rawtcp::wire::Endpoint;
use rawtcp_probe::{config, http_request, resolve, source_address};

fn main() -> Result<()> {
    env_logger::init();
    let config = config::Config::from_args();

    let dst_addr = resolve(&config.host, config.port)?;
    let src_addr = source_address(&config, dst_addr)?;
    let local = Endpoint::new(src_addr, config.src_port);
    let remote = Endpoint::new(dst_addr, config.port);

    let mut exchange_config = Config::new(local, remote)
        .payload(http_request(&config.host, &config.data));
    exchange_config.timeout = config.timeout();
    if exchange_config.timeout.is_none() {
        warn!("No --timeout-ms given, waiting for {} indefinitely", remote);
    }

    info!("Exchange {} -> {}, capturing at the {} level", local, remote, config.capture);
    let iface = config.iface.as_deref();

    let response = if config.latency {
        let (tx, rx) = open_sockets(config.capture, iface)
            .context("Couldn't open raw sockets, is CAP_NET_RAW missing?")?;
        let mut exchange = Exchange::new(exchange_config, tx, rx);
        let round_trip = measure_round_trip(&mut exchange)?;
        println!("[+] SYN-ACK after {:?}", round_trip.syn_ack);
        println!("[+] Response after {:?}", round_trip.full);
        round_trip.response
    } else {
        send_with(exchange_config, config.capture, iface)?
    };

    info!("Done after {} bytes of response", response.len());
    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}
