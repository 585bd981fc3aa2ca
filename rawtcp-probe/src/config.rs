use std::net;
use std::time::Duration;

use rawtcp::nic::Capture;
use structopt::StructOpt;

/// Send a hand-crafted TCP handshake and a single HTTP request over raw sockets.
///
/// Needs `CAP_NET_RAW`. The kernel knows nothing about the connection and will reset it when the
/// SYN-ACK arrives, drop its outgoing RSTs for the source port first.
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "rawtcp-probe")]
pub struct Config {
    /// Destination host, a name or an IPv4 address.
    pub host: String,

    /// Destination port.
    pub port: u16,

    /// Source address to write into the datagrams.
    #[structopt(long = "src")]
    pub src: Option<net::Ipv4Addr>,

    /// Take the source address from this interface, also restricts capturing to it.
    #[structopt(short = "i", long = "iface")]
    pub iface: Option<String>,

    /// Source port of the exchange.
    #[structopt(long = "src-port", default_value = "25566")]
    pub src_port: u16,

    /// Capture replies at the `ip` or the `link` level.
    #[structopt(long = "capture", default_value = "ip")]
    pub capture: Capture,

    /// Give up waiting for the peer after this many milliseconds.
    #[structopt(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Body of the POST request.
    #[structopt(long = "data", default_value = r#"{"hello":"world"}"#)]
    pub data: String,

    /// Report round trip times instead of only the response.
    #[structopt(long = "latency")]
    pub latency: bool,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
