use super::*;
use crate::nic::{external::External, Capture, RECV_BUFFER_LEN};
use crate::wire::{ethernet, ipv4, Ipv4Address};

const CLIENT: Endpoint = Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 25566);
const SERVER: Endpoint = Endpoint::new(Ipv4Address::new(10, 0, 0, 2), 8080);
const SERVER_ISN: u32 = 1000;

const REQUEST: &[u8] = b"POST / HTTP/1.0\r\nContent-Length: 17\r\n\r\n{\"hello\":\"world\"}";
const RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\n\r\n";

fn segment(src: Endpoint, dst: Endpoint, seq: u32, ack: u32, flags: TcpFlags, payload: &[u8])
    -> Vec<u8>
{
    Segment {
        seq_number: TcpSeqNumber(seq),
        ack_number: TcpSeqNumber(ack),
        payload,
        ..Segment::new(src, dst, flags)
    }.build().unwrap()
}

fn from_server(seq: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
    segment(SERVER, CLIENT, seq, 1, flags, payload)
}

fn syn_ack() -> Vec<u8> {
    from_server(SERVER_ISN, TcpFlags::SYN | TcpFlags::ACK, &[])
}

/// A peer that accepts the connection, acknowledges the push and answers it.
fn server(datagram: &[u8]) -> Vec<Vec<u8>> {
    let inbound = Inbound::decode(datagram).unwrap();
    let flags = inbound.tcp.flags;
    if flags == TcpFlags::SYN {
        vec![syn_ack()]
    } else if flags.psh() {
        let next = SERVER_ISN + 1;
        vec![
            from_server(next, TcpFlags::ACK, &[]),
            from_server(next, TcpFlags::PSH | TcpFlags::ACK, RESPONSE),
        ]
    } else {
        vec![]
    }
}

fn config() -> Config {
    Config::new(CLIENT, SERVER)
        .payload(REQUEST)
        .timeout(Duration::from_millis(200))
}

fn exchange(nic: &External) -> Exchange<External, External> {
    Exchange::new(config(), nic.clone(), nic.clone())
}

fn sent_segments(nic: &External) -> Vec<Inbound> {
    nic.sent()
        .iter()
        .map(|(dst, datagram)| {
            assert_eq!(*dst, SERVER);
            Inbound::decode_verified(datagram).unwrap()
        })
        .collect()
}

#[test]
fn full_exchange() {
    let nic = External::with_responder(Capture::Ip, server);
    let mut exchange = exchange(&nic);

    assert_eq!(exchange.run().unwrap(), RESPONSE);
    assert_eq!(exchange.state(), State::Done);

    let sent = sent_segments(&nic);
    assert_eq!(sent.len(), 3);

    assert_eq!(sent[0].tcp.flags, TcpFlags::SYN);
    assert_eq!(sent[0].tcp.seq_number, TcpSeqNumber(0));
    assert_eq!(sent[0].tcp.ack_number, TcpSeqNumber(0));
    assert!(sent[0].payload.is_empty());

    assert_eq!(sent[1].tcp.flags, TcpFlags::ACK);
    assert_eq!(sent[1].tcp.seq_number, TcpSeqNumber(1));
    assert_eq!(sent[1].tcp.ack_number, TcpSeqNumber(SERVER_ISN + 1));
    assert!(sent[1].payload.is_empty());

    assert_eq!(sent[2].tcp.flags, TcpFlags::PSH | TcpFlags::ACK);
    assert_eq!(sent[2].tcp.seq_number, TcpSeqNumber(1));
    assert_eq!(sent[2].tcp.ack_number, TcpSeqNumber(SERVER_ISN + 1));
    assert_eq!(sent[2].payload, REQUEST);

    for segment in sent.iter() {
        assert_eq!(segment.src(), CLIENT);
        assert_eq!(segment.dst(), SERVER);
    }
}

#[test]
fn single_steps() {
    let nic = External::with_responder(Capture::Ip, server);
    let mut exchange = exchange(&nic);
    assert_eq!(exchange.state(), State::Init);
    assert_eq!(exchange.local_seq(), TcpSeqNumber(0));

    exchange.send_syn().unwrap();
    assert_eq!(exchange.state(), State::SynSent);

    let syn_ack = exchange.await_syn_ack().unwrap();
    assert_eq!(syn_ack.src(), SERVER);
    assert_eq!(exchange.state(), State::GotSynAck);
    assert_eq!(exchange.local_seq(), TcpSeqNumber(1));
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));
    assert_eq!(exchange.ack_number(), TcpSeqNumber(SERVER_ISN + 1));

    exchange.send_ack().unwrap();
    assert_eq!(exchange.state(), State::AckSent);
    exchange.push().unwrap();
    assert_eq!(exchange.state(), State::Pushed);
    assert_eq!(exchange.await_response().unwrap(), RESPONSE);
    assert_eq!(exchange.state(), State::Done);
}

#[test]
fn out_of_order() {
    let nic = External::with_responder(Capture::Ip, server);
    let mut exchange = exchange(&nic);

    match exchange.push() {
        Err(Error::OutOfOrder { op: "push", state: State::Init }) => (),
        other => panic!("unexpected {:?}", other),
    }

    exchange.run().unwrap();
    assert!(matches!(exchange.send_syn(), Err(Error::OutOfOrder { state: State::Done, .. })));
    assert_eq!(nic.sent().len(), 3);
}

#[test]
fn foreign_traffic_is_filtered() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let mut replies = Vec::new();
        if Inbound::decode(datagram).unwrap().tcp.flags == TcpFlags::SYN {
            let stranger = Endpoint::new(Ipv4Address::new(10, 0, 0, 3), SERVER.port);
            let other_service = Endpoint::new(SERVER.addr, 22);
            let other_client = Endpoint::new(CLIENT.addr, 40000);
            let flags = TcpFlags::SYN | TcpFlags::ACK;

            replies.push(segment(stranger, CLIENT, 1, 1, flags, &[]));
            replies.push(segment(other_service, CLIENT, 2, 1, flags, &[]));
            replies.push(segment(SERVER, other_client, 3, 1, flags, &[]));
            // Our own SYN as a capture socket on the sending host sees it.
            replies.push(datagram.to_vec());
            // The same tuple but UDP.
            let mut udp = syn_ack();
            udp[9] = 0x11;
            replies.push(udp);
            // Garbage, and a header cut short.
            replies.push(vec![0xff; 7]);
            replies.push(syn_ack()[..30].to_vec());
        }
        replies.extend(server(datagram));
        replies
    });

    let mut exchange = exchange(&nic);
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));
    assert_eq!(nic.to_recv(), 0);
}

#[test]
fn destination_port_check_disabled() {
    let nic = External::with_responder(Capture::Ip, |_| {
        let other_client = Endpoint::new(CLIENT.addr, 40000);
        vec![segment(SERVER, other_client, 77, 1, TcpFlags::SYN | TcpFlags::ACK, &[])]
    });

    let config = config().check_dst_port(false);
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(77));
}

#[test]
fn syn_ack_requires_both_flags() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        if Inbound::decode(datagram).unwrap().tcp.flags == TcpFlags::SYN {
            vec![
                from_server(5, TcpFlags::SYN, &[]),
                from_server(6, TcpFlags::ACK, &[]),
                syn_ack(),
            ]
        } else {
            vec![]
        }
    });

    let mut exchange = exchange(&nic);
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));
}

#[test]
fn reset_is_terminal() {
    let nic = External::with_responder(Capture::Ip, |_| {
        vec![from_server(0, TcpFlags::RST | TcpFlags::ACK, &[])]
    });

    let mut exchange = exchange(&nic);
    match exchange.run() {
        Err(Error::Reset) => (),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(exchange.state(), State::Reset);
    assert!(exchange.send_ack().is_err());
}

#[test]
fn foreign_reset_is_ignored() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let stranger = Endpoint::new(Ipv4Address::new(10, 0, 0, 3), SERVER.port);
        let mut replies = vec![segment(stranger, CLIENT, 0, 1, TcpFlags::RST, &[])];
        replies.extend(server(datagram));
        replies
    });

    let mut exchange = exchange(&nic);
    assert_eq!(exchange.run().unwrap(), RESPONSE);
}

#[test]
fn silent_peer_times_out() {
    let nic = External::new(Capture::Ip);
    let config = config().timeout(Duration::from_millis(20));
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());

    exchange.send_syn().unwrap();
    match exchange.await_syn_ack() {
        Err(Error::Timeout(timeout)) => assert_eq!(timeout, Duration::from_millis(20)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(exchange.state(), State::SynSent);
}

#[test]
fn zero_timeout_takes_queued_segment() {
    let nic = External::new(Capture::Ip);
    let config = config().timeout(Duration::ZERO);
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());

    exchange.send_syn().unwrap();
    nic.inject(syn_ack());
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));

    exchange.send_ack().unwrap();
    exchange.push().unwrap();
    assert!(matches!(exchange.await_response(), Err(Error::Timeout(_))));
}

#[test]
fn only_acknowledged_push_times_out() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let mut replies = server(datagram);
        // Drop the data, keep the bare ACK.
        replies.truncate(1);
        replies
    });

    let config = config().timeout(Duration::from_millis(20));
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());
    assert!(matches!(exchange.run(), Err(Error::Timeout(_))));
    assert_eq!(exchange.state(), State::Pushed);
}

#[test]
fn checksum_override_applies_once() {
    let nic = External::with_responder(Capture::Ip, server);
    let mut exchange = exchange(&nic);

    exchange.override_checksum(0xdead);
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    exchange.send_ack().unwrap();

    let sent = nic.sent();
    assert_eq!(&sent[0].1[36..38], &[0xde, 0xad]);
    assert!(Inbound::decode_verified(&sent[0].1).is_err());
    assert!(Inbound::decode_verified(&sent[1].1).is_ok());
}

#[test]
fn syn_ack_with_ip_options() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let mut replies = server(datagram);
        for reply in replies.iter_mut() {
            // Record route with no slots, padded with end of options.
            let options: [u8; 4] = [0x07, 0x03, 0x04, 0x00];
            let segment = reply.split_off(ipv4::HEADER_LEN);
            reply.extend_from_slice(&options);
            reply.extend(segment);
            reply[0] = 0x46;
            let total_len = reply.len() as u16;
            let mut packet = ipv4::Packet::new_unchecked(&mut reply[..]);
            packet.set_total_len(total_len);
            packet.fill_checksum();
        }
        replies
    });

    let config = config().verify_checksums(true);
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());
    assert_eq!(exchange.run().unwrap(), RESPONSE);
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));
}

#[test]
fn link_level_capture() {
    fn framed(datagram: Vec<u8>) -> Vec<u8> {
        let mut frame = vec![0; ethernet::HEADER_LEN];
        frame[12] = 0x08;
        frame.extend(datagram);
        frame
    }

    let nic = External::with_responder(Capture::Link, |datagram| {
        let mut arp = vec![0; 42];
        arp[12] = 0x08;
        arp[13] = 0x06;

        let mut replies = vec![arp];
        replies.extend(server(datagram).into_iter().map(framed));
        replies
    });

    let mut exchange = exchange(&nic);
    assert_eq!(exchange.run().unwrap(), RESPONSE);
}

#[test]
fn oversized_frame_is_dropped() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let mut replies = server(datagram);
        if !replies.is_empty() && Inbound::decode(datagram).unwrap().tcp.flags.psh() {
            let huge = vec![b'x'; RECV_BUFFER_LEN];
            replies.insert(0, from_server(SERVER_ISN + 1, TcpFlags::PSH | TcpFlags::ACK, &huge));
        }
        replies
    });

    let mut exchange = exchange(&nic);
    assert_eq!(exchange.run().unwrap(), RESPONSE);
}

#[test]
fn checksums_verified_on_request() {
    let nic = External::with_responder(Capture::Ip, |datagram| {
        let mut replies = server(datagram);
        if Inbound::decode(datagram).unwrap().tcp.flags == TcpFlags::SYN {
            let mut corrupted = from_server(4242, TcpFlags::SYN | TcpFlags::ACK, &[]);
            corrupted[36] ^= 0xff;
            replies.insert(0, corrupted);
        }
        replies
    });

    let config = config().verify_checksums(true);
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(SERVER_ISN));

    // Without verification the corrupted one is taken.
    let nic = External::with_responder(Capture::Ip, |_| {
        let mut corrupted = from_server(4242, TcpFlags::SYN | TcpFlags::ACK, &[]);
        corrupted[36] ^= 0xff;
        vec![corrupted]
    });
    let config = Config::new(CLIENT, SERVER).timeout(Duration::from_millis(200));
    let mut exchange = Exchange::new(config, nic.clone(), nic.clone());
    exchange.send_syn().unwrap();
    exchange.await_syn_ack().unwrap();
    assert_eq!(exchange.remote_seq(), TcpSeqNumber(4242));
}

#[test]
fn into_inner_returns_devices() {
    let nic = External::new(Capture::Link);
    let exchange = exchange(&nic);
    let (_, rx) = exchange.into_inner();
    assert_eq!(rx.capture(), Capture::Link);
}
